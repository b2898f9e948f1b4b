use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use log::info;
use rand::rngs::ThreadRng;
use rand::RngCore;
use sha2::Sha256;
use std::marker::PhantomData;

pub use device::TrackedDevice;
pub use device::UntrackedDevice;
pub use user::User;

mod device;
pub(crate) mod helper;
mod user;

pub(crate) type HmacSha256 = Hmac<Sha256>;

mod private {
    pub trait Sealed {}
}

/// The credentials required to authenticate with AWS Cognito using the Secure Remote
/// Password (SRP).
///
/// These come in three forms:
/// 1. [`User`] - For authenticating via SRP with a user.
/// 2. [`TrackedDevice`] - For authenticating via SRP with a remembered device.
/// 3. [`UntrackedDevice`] - For generating a password verifier for a new device during confirmation.
pub trait Credentials: private::Sealed + Send + Sync {}

/// The parameters required to initiate an authentication flow with AWS Cognito, when using the
/// `USER_SRP_AUTH` flow type, or to respond to the `DEVICE_SRP_AUTH` challenge.
#[derive(Debug, Eq, PartialEq)]
#[must_use]
pub struct AuthParameters {
    /// The **public** `A` for the client.
    pub a: String,

    /// The username of the user - this is the one provided during
    /// instantiation of the SRP client.
    ///
    /// This will only be returned when using [`User`] credentials.
    pub username: Option<String>,

    /// The device key of the tracked device.
    ///
    /// This will only be returned when using [`TrackedDevice`] credentials.
    pub device_key: Option<String>,

    /// The secret hash for the user, when the client is configured with a
    /// client secret.
    pub secret_hash: Option<String>,
}

/// The parameters required to respond to the `PASSWORD_VERIFIER` (if authenticating as a User) and `DEVICE_PASSWORD_VERIFIER`
/// (if authenticating using a Device) challenges.
#[derive(Debug, Eq, PartialEq)]
#[must_use]
pub struct VerificationParameters {
    /// The secret block provided by AWS Cognito at the start of the authentication flow.
    pub password_claim_secret_block: String,

    /// The signature of the password claim generated during verification.
    pub password_claim_signature: String,

    /// The timestamp of the verification.
    pub timestamp: String,

    /// The secret hash for the user, when the client is configured with a
    /// client secret.
    pub secret_hash: Option<String>,
}

/// The parameters required to generate a password verifier when confirming a new device in AWS Cognito.
#[derive(Debug, Eq, PartialEq)]
pub struct PasswordVerifierParameters {
    /// The verifier which can be used by the server to verify the provided password.
    pub verifier: String,

    /// The salt used to generate the verifier.
    pub salt: String,

    /// The random password which can be used by the client to authenticate against the
    /// verifier.
    pub password: String,
}

/// The client for interacting with parameters required for the Secure Remote Password (SRP) protocol.
///
/// This client comes in three forms:
/// 1. [`User`] - For authenticating via SRP with a user.
/// 2. [`TrackedDevice`] - For authenticating via SRP with a remembered device.
/// 3. [`UntrackedDevice`] - For generating a password verifier for a new device during confirmation.
#[derive(Debug)]
pub struct SrpClient<C: Credentials, R: RngCore + Default = ThreadRng> {
    a: Vec<u8>,
    credentials: C,
    client_id: String,
    client_secret: Option<String>,
    // `fn() -> R` keeps the client Send + Sync for thread-local RNGs.
    rng: PhantomData<fn() -> R>,
}

impl<C: Credentials, R: RngCore + Default> SrpClient<C, R> {
    /// Create a new SRP client.
    ///
    /// If the client secret is not provided, the client will not generate a secret hash
    /// for use in the authentication flow.
    #[must_use]
    pub fn new(credentials: C, client_id: &str, client_secret: Option<&str>) -> Self {
        Self {
            a: helper::generate_a(&mut R::default()),
            credentials,
            client_id: client_id.into(),
            client_secret: client_secret.map(std::convert::Into::into),
            rng: PhantomData,
        }
    }

    /// Get the secret hash to be used on login and challenge requests to AWS Cognito.
    ///
    /// The User ID is typically the username (and likely the email address) of the user, but
    /// can depend on the configuration of the AWS Cognito User Pool, and whether the secret is being
    /// used for the `InitiateAuth` or `RespondToAuthChallenge` request.
    ///
    /// Calculation is: `BASE64(HMAC_SHA256(<client secret>, <user id> + <client id>))`
    pub(crate) fn get_secret_hash_for_user_id(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Option<String> {
        self.client_secret
            .as_deref()
            .and_then(|secret| compute_secret_hash(secret, user_id, client_id))
    }
}

/// Compute `BASE64(HMAC_SHA256(<client secret>, <user id> + <client id>))`.
pub(crate) fn compute_secret_hash(
    client_secret: &str,
    user_id: &str,
    client_id: &str,
) -> Option<String> {
    let mut hmac = HmacSha256::new_from_slice(client_secret.as_bytes()).ok()?;
    hmac.update(user_id.as_bytes());
    hmac.update(client_id.as_bytes());

    let hash = BASE64.encode(hmac.finalize().into_bytes());

    info!(hash = hash.as_str(); "Generated client secret hash for user");

    Some(hash)
}
