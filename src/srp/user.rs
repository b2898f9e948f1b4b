use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use digest::{Digest, Mac, Output};
use log::info;
use num_bigint::BigUint;
use rand::RngCore;
use sha2::Sha256;

use crate::constant::N;
use crate::srp::helper::{
    compute_k, compute_pub_a, compute_pub_b, compute_s, compute_u, compute_x,
    generate_key_derive_data, get_timestamp, left_pad, left_pad_to_even_length,
};
use crate::srp::{private, AuthParameters, HmacSha256, VerificationParameters};
use crate::{Credentials, SrpClient, SrpError};

/// A **user** stored in the AWS Cognito user pool.
///
/// This user _does not_ have a tracked device (or device key) so may be
/// subject to additional challenges during authentication flows (depending on
/// user pool configuration).
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct User {
    /// The name of the AWS Cognito User Pool the user is registered with.
    ///
    /// This is the part of the pool ID after the region, for example `SqmNeowUdp`
    /// for the pool `us-east-1_SqmNeowUdp`.
    pool_name: String,
    username: String,
    password: String,
}
impl private::Sealed for User {}
impl Credentials for User {}

impl User {
    #[must_use]
    pub fn new<'a>(pool_name: &'a str, username: &'a str, password: &'a str) -> Self {
        User {
            pool_name: pool_name.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl<R: RngCore + Default> SrpClient<User, R> {
    /// Generate the authentication parameters for the initial `InitiateAuth` request.
    ///
    /// This begins the SRP authentication flow with AWS Cognito, and exchanges the various
    /// initial public parameters which can then be used to validate the user's password.
    pub fn get_auth_parameters(&self) -> AuthParameters {
        let User { username, .. } = &self.credentials;

        info!(username = username.as_str(); "Generating auth parameters for user");

        AuthParameters {
            username: Some(username.into()),
            device_key: None,
            a: hex::encode(compute_pub_a(&self.a)),
            secret_hash: self.get_secret_hash_for_user_id(username, &self.client_id),
        }
    }

    /// Generate the challenge response parameters for the `PASSWORD_VERIFIER` challenge issued by
    /// AWS Cognito in response to the `InitiateAuth` request.
    ///
    /// These parameters verify to Cognito that the password known by the client is correct.
    ///
    /// The `user_id` must be the `USER_ID_FOR_SRP` returned alongside the challenge, which
    /// can differ from the username the flow started with when the pool resolves aliases.
    pub fn verify(
        &self,
        secret_block: &str,
        user_id: &str,
        salt: &str,
        b: &str,
    ) -> Result<VerificationParameters, SrpError> {
        self.verify_at(secret_block, user_id, salt, b, get_timestamp())
    }

    pub(crate) fn verify_at(
        &self,
        secret_block: &str,
        user_id: &str,
        salt: &str,
        b: &str,
        timestamp: String,
    ) -> Result<VerificationParameters, SrpError> {
        let key = self.get_password_authentication_key(
            user_id,
            &hex::decode(left_pad_to_even_length(b, '0')).map_err(|err| {
                SrpError::InvalidArgument(format!("Invalid SRP_B. Received '{err}'"))
            })?,
            &hex::decode(left_pad_to_even_length(salt, '0')).map_err(|err| {
                SrpError::InvalidArgument(format!("Invalid salt. Received '{err}'"))
            })?,
        )?;

        let mut msg: Vec<u8> = vec![];
        msg.extend_from_slice(self.credentials.pool_name.as_bytes());
        msg.extend_from_slice(user_id.as_bytes());
        msg.extend_from_slice(&BASE64.decode(secret_block).map_err(|err| {
            SrpError::InvalidArgument(format!("Invalid base64 secret block. Received '{err}'"))
        })?);
        msg.extend_from_slice(timestamp.as_bytes());

        let mut h256mac = HmacSha256::new_from_slice(&key)?;
        h256mac.update(&msg);
        let signature = BASE64.encode(h256mac.finalize().into_bytes());

        Ok(VerificationParameters {
            timestamp,
            password_claim_secret_block: secret_block.into(),
            password_claim_signature: signature,
            secret_hash: self.get_secret_hash_for_user_id(user_id, &self.client_id),
        })
    }

    /// Generate the password authentication key for the user.
    ///
    /// This key is then used in the final signature for the SRP verification flow.
    fn get_password_authentication_key(
        &self,
        user_id: &str,
        b: &[u8],
        salt: &[u8],
    ) -> Result<Vec<u8>, SrpError> {
        if BigUint::from_bytes_be(b) % &*N == BigUint::from(0u32) {
            return Err(SrpError::ProtocolViolation("B mod N must not be zero"));
        }

        let identity = self.compute_identity::<Sha256>(user_id);

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
    /// For AWS Cognito this is the SHA256 of `<pool name><username>:<password>`.
    fn compute_identity<D: Digest>(&self, user_id: &str) -> Output<D> {
        let User {
            pool_name, password, ..
        } = &self.credentials;

        let mut d = D::new();
        d.update(pool_name.as_bytes());
        d.update(user_id.as_bytes());
        d.update(b":");
        d.update(password.as_bytes());

        d.finalize()
    }
}
