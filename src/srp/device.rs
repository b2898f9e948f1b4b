use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use digest::{Digest, Mac, Output};
use log::info;
use num_bigint::BigUint;
use rand::RngCore;
use sha2::Sha256;

use crate::constant::{G, N};
use crate::srp::helper::{
    compute_k, compute_pub_a, compute_pub_b, compute_s, compute_u, compute_x,
    generate_key_derive_data, generate_password, generate_salt, get_timestamp, left_pad,
    left_pad_to_even_length,
};
use crate::srp::private;
use crate::srp::{AuthParameters, HmacSha256, PasswordVerifierParameters, VerificationParameters};
use crate::{Credentials, SrpClient, SrpError};

/// A **device** which is tracked against a user in the AWS Cognito user pool.
///
/// This device has previously been confirmed, so, if authenticated correctly, may
/// allow the user to bypass some MFA challenges during the authentication flow (depending
/// on user pool configuration)
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct TrackedDevice {
    device_group_key: String,
    device_key: String,
    device_password: String,
}

impl private::Sealed for TrackedDevice {}
impl Credentials for TrackedDevice {}

/// A **device** which is not yet tracked against a user in the AWS Cognito user pool.
///
/// This device has not previously been confirmed, and thus does not have a password,
/// and is not yet associated with a user (so cannot be used to bypass MFA challenges).
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct UntrackedDevice {
    device_group_key: String,
    device_key: String,
}

impl private::Sealed for UntrackedDevice {}
impl Credentials for UntrackedDevice {}

impl UntrackedDevice {
    /// Create a new untracked device.
    ///
    /// This is a device which has not yet been confirmed with the AWS Cognito User Pool, and
    /// thus does not have a password.
    #[must_use]
    pub fn new(device_group_key: &str, device_key: &str) -> Self {
        Self {
            device_group_key: device_group_key.to_string(),
            device_key: device_key.to_string(),
        }
    }

    /// Convert the untracked device into a tracked device.
    ///
    /// This requires the **device password** (the random password generated for the device
    /// during confirmation).
    #[must_use]
    pub fn into_tracked(self, device_password: &str) -> TrackedDevice {
        TrackedDevice::new(&self.device_group_key, &self.device_key, device_password)
    }
}

impl TrackedDevice {
    /// Create a new tracked device.
    ///
    /// This is a device which has previously been confirmed, and thus has a password.
    ///
    /// When configured correctly, this device may be allowed to bypass some MFA challenges (depending
    /// on the configuration of the AWS Cognito User Pool).
    #[must_use]
    pub fn new(device_group_key: &str, device_key: &str, device_password: &str) -> Self {
        Self {
            device_group_key: device_group_key.to_string(),
            device_key: device_key.to_string(),
            device_password: device_password.to_string(),
        }
    }
}

impl<R: RngCore + Default> SrpClient<TrackedDevice, R> {
    /// Generate the challenge response parameters for the `DEVICE_SRP_AUTH` challenge.
    ///
    /// This begins the device leg of the SRP authentication flow with AWS Cognito, and
    /// exchanges the various initial public parameters which can then be used to validate
    /// the device's password.
    pub fn get_auth_parameters(&self) -> AuthParameters {
        let TrackedDevice { device_key, .. } = &self.credentials;

        info!(
            device_key = device_key.as_str();
            "Generating auth parameters for device"
        );

        AuthParameters {
            a: hex::encode(compute_pub_a(&self.a)),
            device_key: Some(device_key.into()),
            username: None,
            secret_hash: None,
        }
    }

    /// Generate the challenge response parameters for the `DEVICE_PASSWORD_VERIFIER` challenge
    /// issued by AWS Cognito in response to the `DEVICE_SRP_AUTH` challenge response.
    ///
    /// These parameters verify to AWS Cognito that the password known by the client is correct.
    ///
    /// ## Errors
    ///
    /// Returns an error if any of the input values are invalid. For example, if the `b` or `salt`
    /// values are not valid hex strings.
    pub fn verify(
        &self,
        secret_block: &str,
        salt: &str,
        b: &str,
    ) -> Result<VerificationParameters, SrpError> {
        self.verify_at(secret_block, salt, b, get_timestamp())
    }

    pub(crate) fn verify_at(
        &self,
        secret_block: &str,
        salt: &str,
        b: &str,
        timestamp: String,
    ) -> Result<VerificationParameters, SrpError> {
        let key = self.get_device_authentication_key(
            &hex::decode(left_pad_to_even_length(b, '0')).map_err(|err| {
                SrpError::InvalidArgument(format!("Invalid SRP_B. Received '{err}'"))
            })?,
            &hex::decode(left_pad_to_even_length(salt, '0')).map_err(|err| {
                SrpError::InvalidArgument(format!("Invalid salt. Received '{err}'"))
            })?,
        )?;

        let mut msg: Vec<u8> = vec![];
        msg.extend_from_slice(self.credentials.device_group_key.as_bytes());
        msg.extend_from_slice(self.credentials.device_key.as_bytes());
        msg.extend_from_slice(&BASE64.decode(secret_block).map_err(|err| {
            SrpError::InvalidArgument(format!("Invalid base64 secret block. Received '{err}'"))
        })?);
        msg.extend_from_slice(timestamp.as_bytes());

        let mut h256mac = HmacSha256::new_from_slice(&key)?;
        h256mac.update(&msg);
        let signature = BASE64.encode(h256mac.finalize().into_bytes());

        info!(device_key = self.credentials.device_key.as_str(); "Generated verification parameters for device.");

        Ok(VerificationParameters {
            timestamp,
            password_claim_secret_block: secret_block.into(),
            password_claim_signature: signature,
            secret_hash: None,
        })
    }

    /// Generate the password authentication key for the device.
    ///
    /// This key is then used in the final signature for the SRP verification flow.
    fn get_device_authentication_key(&self, b: &[u8], salt: &[u8]) -> Result<Vec<u8>, SrpError> {
        if BigUint::from_bytes_be(b) % &*N == BigUint::from(0u32) {
            return Err(SrpError::ProtocolViolation("B mod N must not be zero"));
        }

        let identity = self.compute_identity::<Sha256>(&self.credentials.device_password);

        let a_pub = compute_pub_a(&self.a);
        let b_pub = compute_pub_b(b);

        let u = compute_u::<Sha256>(&a_pub, &b_pub);
        if u == BigUint::from(0u32) {
            return Err(SrpError::ProtocolViolation("u must not be zero"));
        }

        let x = compute_x::<Sha256>(identity.as_slice(), salt);
        let k = compute_k::<Sha256>();

        // Compute the shared secret
        let s = compute_s(&self.a, &u, &x, k, b);

        // Hash-based Key Derivation Function
        let mut hkdf = HmacSha256::new_from_slice(&left_pad(&u.to_bytes_be(), 0))?;
        hkdf.update(&left_pad(&s.to_bytes_be().1, 0));
        let prk = hkdf.finalize().into_bytes();

        hkdf = HmacSha256::new_from_slice(&prk)?;
        hkdf.update(&generate_key_derive_data());

        let ak = &hkdf.finalize().into_bytes()[..16];

        Ok(ak.to_vec())
    }

    /// Compute identity (`I`) variable in the SRP protocol.
    ///
    /// For AWS Cognito this is the SHA256 of `<device group key><device key>:<device password>`.
    fn compute_identity<D: Digest>(&self, password: &str) -> Output<D> {
        let TrackedDevice {
            device_group_key,
            device_key,
            ..
        } = &self.credentials;

        let mut d = D::new();
        d.update(device_group_key);
        d.update(device_key);
        d.update(":");
        d.update(password);

        d.finalize()
    }
}

impl<R: RngCore + Default> SrpClient<UntrackedDevice, R> {
    /// Generate a password, and the verifier parameters (verifier and salt) for the
    /// `ConfirmDevice` request.
    ///
    /// This generates a (new) random password, along with a salt and verifier which
    /// AWS Cognito records, and can be used during the authentication flow later to validate
    /// the password provided to authenticate.
    #[must_use]
    pub fn get_password_verifier(&self) -> PasswordVerifierParameters {
        let mut rng = R::default();

        let random_password = generate_password(&mut rng);
        let salt = generate_salt(&mut rng);

        // Setup the hash for the device
        let device_hash = self.compute_identity::<Sha256>(&random_password);

        // Compute the verifier, which consists of the salt and the hash
        let mut hasher = Sha256::new();
        hasher.update(&salt);
        hasher.update(device_hash);
        let password_salted = hasher.finalize();

        let password_verifier = left_pad(
            &G.modpow(&BigUint::from_bytes_be(password_salted.as_slice()), &N)
                .to_bytes_be(),
            0,
        );

        info!(device_key = self.credentials.device_key.as_str(); "Generated verifier and random password for device.");

        PasswordVerifierParameters {
            verifier: BASE64.encode(password_verifier.as_slice()),
            salt: BASE64.encode(salt.as_slice()),
            password: random_password,
        }
    }

    /// Compute identity (`I`) variable in the SRP protocol.
    ///
    /// For AWS Cognito this is the SHA256 of `<device group key><device key>:<device password>`.
    fn compute_identity<D: Digest>(&self, password: &str) -> Output<D> {
        let UntrackedDevice {
            device_group_key,
            device_key,
            ..
        } = &self.credentials;

        let mut d = D::new();
        d.update(device_group_key);
        d.update(device_key);
        d.update(":");
        d.update(password);

        d.finalize()
    }
}
