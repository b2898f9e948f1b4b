use std::collections::HashMap;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::cache::TokenCache;
use crate::error::CognitoError;
use crate::idp::{Action, HttpDispatcher, IdpDispatcher};
use crate::srp::compute_secret_hash;
use crate::storage::{MemoryStorage, Storage};
use crate::user::CognitoUser;

/// Request metadata forwarded verbatim to pool workflows (triggers, analytics).
pub type ClientMetadata = HashMap<String, String>;

/// Host hook producing the opaque advisory-security blob for a username.
///
/// When the hook returns data, requests carry it as `UserContextData`;
/// otherwise the field is omitted entirely.
pub type UserContextProvider = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A name/value pair attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}

impl UserAttribute {
    #[must_use]
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Where (and through which medium) a verification code was delivered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeDeliveryDetails {
    pub destination: Option<String>,
    pub delivery_medium: Option<String>,
    pub attribute_name: Option<String>,
}

/// The outcome of a successful sign-up request.
#[derive(Debug)]
pub struct SignUpResult {
    /// A user handle for the registered username, ready for confirmation and
    /// authentication.
    pub user: CognitoUser,

    /// Whether the user is already confirmed (no verification step required).
    pub user_confirmed: bool,

    /// The server-assigned immutable user identifier.
    pub user_sub: String,
}

/// Configuration for a [`UserPool`].
///
/// `user_pool_id` and `client_id` are required; everything else has a
/// reasonable default.
#[derive(Clone, Default)]
pub struct PoolConfig {
    /// The pool identifier, in the form `<region>_<pool name>`.
    pub user_pool_id: String,

    /// The app client identifier.
    pub client_id: String,

    /// The app client secret, when the client is configured with one. Enables
    /// the `SECRET_HASH` parameter on every request that carries it.
    pub client_secret: Option<String>,

    /// Overrides the regional endpoint derived from the pool id.
    pub endpoint: Option<String>,

    /// The device name sent when confirming a new device. Defaults to
    /// `default-device`.
    pub device_name: Option<String>,

    /// The persistent store for tokens, device credentials and attributes.
    /// Defaults to a per-pool [`MemoryStorage`].
    pub storage: Option<Arc<dyn Storage>>,

    /// The transport used to reach the identity provider. Defaults to
    /// [`HttpDispatcher`].
    pub dispatcher: Option<Arc<dyn IdpDispatcher>>,

    /// Advisory-security data hook.
    pub user_context_provider: Option<UserContextProvider>,
}

/// A handle onto one app client of a Cognito user pool.
///
/// The pool is the entry point of the crate: it signs users up and hands out
/// [`CognitoUser`] values which drive the authentication flows.
#[derive(Clone)]
pub struct UserPool {
    pool_id: String,
    pool_name: String,
    client_id: String,
    client_secret: Option<String>,
    device_name: String,
    storage: Arc<dyn Storage>,
    dispatcher: Arc<dyn IdpDispatcher>,
    user_context_provider: Option<UserContextProvider>,
}

impl UserPool {
    /// Create a pool handle from its configuration.
    ///
    /// ## Errors
    ///
    /// Fails with [`CognitoError::InvalidParameter`] when the pool id or
    /// client id is missing, or the pool id is not of the form
    /// `<region>_<pool name>`.
    pub fn new(config: PoolConfig) -> Result<Self, CognitoError> {
        if config.user_pool_id.is_empty() || config.client_id.is_empty() {
            return Err(CognitoError::InvalidParameter(
                "Both UserPoolId and ClientId are required.".to_string(),
            ));
        }

        let (region, pool_name) = config
            .user_pool_id
            .split_once('_')
            .filter(|(region, name)| !region.is_empty() && !name.is_empty())
            .ok_or_else(|| {
                CognitoError::InvalidParameter("Invalid UserPoolId format.".to_string())
            })?;

        let dispatcher = match config.dispatcher {
            Some(dispatcher) => dispatcher,
            None => match &config.endpoint {
                Some(endpoint) => Arc::new(HttpDispatcher::with_endpoint(endpoint.clone())),
                None => Arc::new(HttpDispatcher::new(region)),
            },
        };

        Ok(Self {
            pool_name: pool_name.to_string(),
            pool_id: config.user_pool_id.clone(),
            client_id: config.client_id,
            client_secret: config.client_secret,
            device_name: config
                .device_name
                .unwrap_or_else(|| "default-device".to_string()),
            storage: config
                .storage
                .unwrap_or_else(|| Arc::new(MemoryStorage::new())),
            dispatcher,
            user_context_provider: config.user_context_provider,
        })
    }

    /// The full pool id (`<region>_<pool name>`).
    #[must_use]
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    /// The pool name: the part of the pool id after the region.
    #[must_use]
    pub fn pool_name(&self) -> &str {
        &self.pool_name
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub(crate) fn dispatcher(&self) -> &Arc<dyn IdpDispatcher> {
        &self.dispatcher
    }

    pub(crate) fn device_name(&self) -> &str {
        &self.device_name
    }

    pub(crate) fn cache(&self) -> TokenCache {
        TokenCache::new(self.storage.clone(), &self.client_id)
    }

    /// The `SECRET_HASH` for a user id, when a client secret is configured.
    pub(crate) fn secret_hash(&self, user_id: &str) -> Option<String> {
        self.client_secret
            .as_deref()
            .and_then(|secret| compute_secret_hash(secret, user_id, &self.client_id))
    }

    /// The `UserContextData` value for a username, when the advisory-security
    /// hook yields one.
    pub(crate) fn user_context_data(&self, username: &str) -> Option<Value> {
        let provider = self.user_context_provider.as_ref()?;
        let encoded = provider.as_ref()(username)?;

        Some(json!({ "EncodedData": encoded }))
    }

    /// A user handle for a username known to this pool.
    pub fn user(&self, username: &str) -> Result<CognitoUser, CognitoError> {
        CognitoUser::new(username, self)
    }

    /// The user who last completed an authentication against this app client,
    /// if their marker is present in storage.
    #[must_use]
    pub fn current_user(&self) -> Option<CognitoUser> {
        let username = self.cache().last_auth_user()?;

        CognitoUser::new(&username, self).ok()
    }

    /// Register a new user with the pool.
    pub async fn sign_up(
        &self,
        username: &str,
        password: &str,
        user_attributes: &[UserAttribute],
        validation_data: &[UserAttribute],
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<SignUpResult, CognitoError> {
        if username.is_empty() {
            return Err(CognitoError::InvalidParameter(
                "A username is required.".to_string(),
            ));
        }

        let mut body = json!({
            "ClientId": self.client_id,
            "Username": username,
            "Password": password,
            "UserAttributes": user_attributes,
            "ValidationData": validation_data,
        });
        self.attach_common_fields(&mut body, username, client_metadata);

        let response = self.dispatcher.dispatch(Action::SignUp, body).await?;

        info!(username = username; "Signed up user");

        Ok(SignUpResult {
            user: CognitoUser::new(username, self)?,
            user_confirmed: response
                .get("UserConfirmed")
                .and_then(Value::as_bool)
                .unwrap_or_default(),
            user_sub: response
                .get("UserSub")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Confirm a registration with the emailed (or texted) confirmation code.
    pub async fn confirm_registration(
        &self,
        username: &str,
        confirmation_code: &str,
        force_alias_creation: bool,
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<(), CognitoError> {
        let mut body = json!({
            "ClientId": self.client_id,
            "Username": username,
            "ConfirmationCode": confirmation_code,
            "ForceAliasCreation": force_alias_creation,
        });
        self.attach_common_fields(&mut body, username, client_metadata);

        self.dispatcher.dispatch(Action::ConfirmSignUp, body).await?;

        Ok(())
    }

    /// Resend the confirmation code for an unconfirmed registration.
    pub async fn resend_confirmation_code(
        &self,
        username: &str,
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<Option<CodeDeliveryDetails>, CognitoError> {
        let mut body = json!({
            "ClientId": self.client_id,
            "Username": username,
        });
        self.attach_common_fields(&mut body, username, client_metadata);

        let response = self
            .dispatcher
            .dispatch(Action::ResendConfirmationCode, body)
            .await?;

        Ok(response
            .get("CodeDeliveryDetails")
            .cloned()
            .and_then(|details| serde_json::from_value(details).ok()))
    }

    fn attach_common_fields(
        &self,
        body: &mut Value,
        username: &str,
        client_metadata: Option<&ClientMetadata>,
    ) {
        if let Some(hash) = self.secret_hash(username) {
            body["SecretHash"] = json!(hash);
        }
        if let Some(metadata) = client_metadata {
            body["ClientMetadata"] = json!(metadata);
        }
        if let Some(context) = self.user_context_data(username) {
            body["UserContextData"] = context;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PoolConfig, UserPool};
    use crate::error::CognitoError;

    fn config(user_pool_id: &str, client_id: &str) -> PoolConfig {
        PoolConfig {
            user_pool_id: user_pool_id.to_string(),
            client_id: client_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_pool_id_is_split_into_region_and_name() {
        let pool = UserPool::new(config("eu-west-2_Ab129faBb", "client-id")).unwrap();

        assert_eq!(pool.pool_id(), "eu-west-2_Ab129faBb");
        assert_eq!(pool.pool_name(), "Ab129faBb");
    }

    #[test]
    fn test_missing_ids_are_rejected() {
        assert_eq!(
            UserPool::new(config("", "client-id")).err(),
            Some(CognitoError::InvalidParameter(
                "Both UserPoolId and ClientId are required.".to_string()
            ))
        );
        assert_eq!(
            UserPool::new(config("eu-west-2_Ab129faBb", "")).err(),
            Some(CognitoError::InvalidParameter(
                "Both UserPoolId and ClientId are required.".to_string()
            ))
        );
    }

    #[test]
    fn test_malformed_pool_id_is_rejected() {
        for pool_id in ["ab129faBb", "eu-west-2_", "_Ab129faBb"] {
            assert_eq!(
                UserPool::new(config(pool_id, "client-id")).err(),
                Some(CognitoError::InvalidParameter(
                    "Invalid UserPoolId format.".to_string()
                )),
                "pool id {pool_id:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_secret_hash_requires_a_client_secret() {
        let pool = UserPool::new(config("eu-west-2_Ab129faBb", "client-id")).unwrap();
        assert_eq!(pool.secret_hash("carol"), None);

        let pool = UserPool::new(PoolConfig {
            client_secret: Some("secret".to_string()),
            ..config("eu-west-2_Ab129faBb", "client-id")
        })
        .unwrap();
        assert!(pool.secret_hash("carol").is_some());
    }

    #[test]
    fn test_user_context_data_is_omitted_without_a_provider() {
        let pool = UserPool::new(config("eu-west-2_Ab129faBb", "client-id")).unwrap();

        assert_eq!(pool.user_context_data("carol"), None);
    }
}
