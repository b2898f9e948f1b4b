use std::collections::HashMap;
use std::fmt;

use log::info;
use serde_json::{json, Value};

use crate::cache::DeviceCredentials;
use crate::error::CognitoError;
use crate::idp::Action;
use crate::pool::{ClientMetadata, UserPool};
use crate::session::UserSession;
use crate::token::{JwtToken, RefreshToken};
use crate::user::challenge::AuthenticationResult;

pub use account::{Device, DeviceList, MfaOption, MfaSettings};
pub use challenge::{AuthFlowResponse, ChallengeName, MfaType};

mod account;
mod auth;
mod challenge;

/// The flow driven by [`CognitoUser::authenticate_user`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthFlowType {
    /// SRP password verification (the default).
    #[default]
    UserSrpAuth,

    /// The password is sent to the server for verification.
    UserPasswordAuth,

    /// App-defined challenges, opened with an SRP exchange.
    CustomAuth,

    /// Token refresh; driven by [`CognitoUser::refresh_session`], never by
    /// `authenticate_user`.
    RefreshTokenAuth,

    /// Alias some pools use for [`AuthFlowType::RefreshTokenAuth`].
    RefreshToken,
}

impl AuthFlowType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFlowType::UserSrpAuth => "USER_SRP_AUTH",
            AuthFlowType::UserPasswordAuth => "USER_PASSWORD_AUTH",
            AuthFlowType::CustomAuth => "CUSTOM_AUTH",
            AuthFlowType::RefreshTokenAuth => "REFRESH_TOKEN_AUTH",
            AuthFlowType::RefreshToken => "REFRESH_TOKEN",
        }
    }
}

/// Inputs to an authentication attempt.
///
/// The username lives on the [`CognitoUser`] handle; details carry the secret
/// material and per-request metadata.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationDetails {
    /// The user's password. Required for `USER_PASSWORD_AUTH` and to start an
    /// SRP exchange.
    pub password: Option<String>,

    /// Validation data forwarded to pre-authentication triggers.
    pub validation_data: Option<ClientMetadata>,

    /// Metadata forwarded to challenge-response triggers.
    pub client_metadata: Option<ClientMetadata>,

    /// Extra `AuthParameters` merged into the initial request (used by custom
    /// flows).
    pub auth_parameters: ClientMetadata,
}

impl AuthenticationDetails {
    #[must_use]
    pub fn from_password(password: &str) -> Self {
        Self {
            password: Some(password.to_string()),
            ..Self::default()
        }
    }
}

/// A user of the pool, and the state machine driving their authentication.
///
/// The handle is not thread-safe by design: operations take `&mut self`, and a
/// multi-step flow must be driven to completion before another one starts.
pub struct CognitoUser {
    pub(crate) username: String,
    pub(crate) pool: UserPool,
    pub(crate) auth_flow: AuthFlowType,

    /// The opaque correlation token returned by the identity provider between
    /// challenges.
    pub(crate) session_token: Option<String>,
    pub(crate) sign_in_session: Option<UserSession>,

    pub(crate) challenge_name: Option<String>,
    pub(crate) challenge_parameters: Option<HashMap<String, String>>,

    pub(crate) device_key: Option<String>,
    pub(crate) device_group_key: Option<String>,
    pub(crate) device_password: Option<String>,
}

impl CognitoUser {
    /// Create a handle for a username in a pool.
    ///
    /// Picks up any device remembered for the username from the pool's
    /// storage.
    ///
    /// ## Errors
    ///
    /// Fails with [`CognitoError::InvalidParameter`] when the username is
    /// empty.
    pub fn new(username: &str, pool: &UserPool) -> Result<Self, CognitoError> {
        if username.is_empty() {
            return Err(CognitoError::InvalidParameter(
                "Username and Pool information are required.".to_string(),
            ));
        }

        let device = pool.cache().load_device(username);

        Ok(Self {
            username: username.to_string(),
            pool: pool.clone(),
            auth_flow: AuthFlowType::default(),
            session_token: None,
            sign_in_session: None,
            challenge_name: None,
            challenge_parameters: None,
            device_key: device.as_ref().map(|d| d.device_key.clone()),
            device_group_key: device.as_ref().map(|d| d.device_group_key.clone()),
            device_password: device.map(|d| d.device_password),
        })
    }

    /// The username the handle operates as.
    ///
    /// Rewritten to the pool's canonical user id when a `PASSWORD_VERIFIER`
    /// challenge resolves an alias; no other event changes it.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn pool(&self) -> &UserPool {
        &self.pool
    }

    #[must_use]
    pub fn auth_flow(&self) -> AuthFlowType {
        self.auth_flow
    }

    pub fn set_auth_flow(&mut self, auth_flow: AuthFlowType) {
        self.auth_flow = auth_flow;
    }

    /// The in-progress challenge correlation token, when a flow is mid-way.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    /// The signed-in session, when one is held in memory.
    #[must_use]
    pub fn sign_in_session(&self) -> Option<&UserSession> {
        self.sign_in_session.as_ref()
    }

    /// The last challenge name observed, when a flow is mid-way.
    #[must_use]
    pub fn challenge_name(&self) -> Option<&str> {
        self.challenge_name.as_deref()
    }

    /// The parameters of the last challenge observed.
    #[must_use]
    pub fn challenge_parameters(&self) -> Option<&HashMap<String, String>> {
        self.challenge_parameters.as_ref()
    }

    /// The key of the device remembered for this user, if any.
    #[must_use]
    pub fn device_key(&self) -> Option<&str> {
        self.device_key.as_deref()
    }

    /// The current session, reconstituted and silently refreshed as needed.
    ///
    /// Resolution order: a valid in-memory session; a valid cached session; a
    /// cached session with a refresh token, renewed via the identity provider.
    /// Anything else fails with [`CognitoError::NotAuthorized`].
    pub async fn get_session(&mut self) -> Result<UserSession, CognitoError> {
        if let Some(session) = &self.sign_in_session {
            if session.is_valid() {
                return Ok(session.clone());
            }
        }

        let Some(cached) = self.pool.cache().load_session(&self.username) else {
            return Err(CognitoError::NotAuthorized(
                "User is not authenticated".to_string(),
            ));
        };

        if cached.is_valid() {
            self.sign_in_session = Some(cached.clone());
            return Ok(cached);
        }

        if cached.refresh_token().token().is_empty() {
            return Err(CognitoError::NotAuthorized(
                "User is not authenticated".to_string(),
            ));
        }

        let refresh_token = cached.refresh_token().clone();
        self.refresh_session(&refresh_token, None).await
    }

    /// Exchange a refresh token for a fresh session.
    ///
    /// When the response carries no new refresh token, the one passed in is
    /// kept. The fresh session replaces both the in-memory and the cached one.
    pub async fn refresh_session(
        &mut self,
        refresh_token: &RefreshToken,
        client_metadata: Option<&ClientMetadata>,
    ) -> Result<UserSession, CognitoError> {
        let mut auth_parameters = json!({ "REFRESH_TOKEN": refresh_token.token() });
        if let Some(hash) = self.pool.secret_hash(&self.username) {
            auth_parameters["SECRET_HASH"] = json!(hash);
        }
        if let Some(device_key) = &self.device_key {
            auth_parameters["DEVICE_KEY"] = json!(device_key);
        }

        let mut body = json!({
            "ClientId": self.pool.client_id(),
            "AuthFlow": AuthFlowType::RefreshTokenAuth.as_str(),
            "AuthParameters": auth_parameters,
        });
        if let Some(metadata) = client_metadata {
            body["ClientMetadata"] = json!(metadata);
        }
        if let Some(context) = self.pool.user_context_data(&self.username) {
            body["UserContextData"] = context;
        }

        let value = match self
            .pool
            .dispatcher()
            .dispatch(Action::InitiateAuth, body)
            .await
        {
            Ok(value) => value,
            Err(err @ CognitoError::NotAuthorized(_)) => {
                // The refresh token is dead; the cached blobs are useless now.
                self.sign_in_session = None;
                self.pool.cache().clear_session(&self.username);
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let response: challenge::AuthResponse = parse_response(value)?;
        let mut result = response.authentication_result.ok_or_else(|| {
            CognitoError::NotAuthorized("Refresh has failed".to_string())
        })?;

        if result.refresh_token.is_none() {
            result.refresh_token = Some(refresh_token.token().to_string());
        }

        let session = Self::build_session(&result)?;
        self.sign_in_session = Some(session.clone());
        self.pool.cache().cache_session(&self.username, &session);

        info!(username = self.username.as_str(); "Session refreshed");

        Ok(session)
    }

    /// Drop the in-memory session and the cached token blobs.
    ///
    /// The remembered device survives, so the next sign-in can still answer a
    /// device challenge.
    pub fn sign_out(&mut self) {
        self.sign_in_session = None;
        self.session_token = None;
        self.challenge_name = None;
        self.challenge_parameters = None;
        self.pool.cache().clear_session(&self.username);

        info!(username = self.username.as_str(); "Signed out user");
    }

    /// Invalidate every token issued to the user, everywhere, then sign out
    /// locally.
    pub async fn global_sign_out(&mut self) -> Result<(), CognitoError> {
        let access_token = self.access_token().await?;

        self.pool
            .dispatcher()
            .dispatch(Action::GlobalSignOut, json!({ "AccessToken": access_token }))
            .await?;

        self.sign_out();

        Ok(())
    }

    /// A valid access token, via [`CognitoUser::get_session`].
    pub(crate) async fn access_token(&mut self) -> Result<String, CognitoError> {
        Ok(self.get_session().await?.access_token().jwt().to_string())
    }

    pub(crate) fn build_session(
        result: &AuthenticationResult,
    ) -> Result<UserSession, CognitoError> {
        let id_token = result.id_token.as_deref().ok_or_else(missing_token)?;
        let access_token = result.access_token.as_deref().ok_or_else(missing_token)?;

        Ok(UserSession::new(
            JwtToken::new(id_token),
            JwtToken::new(access_token),
            RefreshToken::new(result.refresh_token.as_deref().unwrap_or_default()),
            None,
        ))
    }

    pub(crate) fn remember_device(&mut self, credentials: &DeviceCredentials) {
        self.device_key = Some(credentials.device_key.clone());
        self.device_group_key = Some(credentials.device_group_key.clone());
        self.device_password = Some(credentials.device_password.clone());
        self.pool.cache().cache_device(&self.username, credentials);
    }
}

impl fmt::Debug for CognitoUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CognitoUser")
            .field("username", &self.username)
            .field("auth_flow", &self.auth_flow)
            .field("challenge_name", &self.challenge_name)
            .field("device_key", &self.device_key)
            .finish_non_exhaustive()
    }
}

pub(crate) fn parse_response<T: serde::de::DeserializeOwned>(
    value: Value,
) -> Result<T, CognitoError> {
    serde_json::from_value(value).map_err(|err| {
        CognitoError::InvalidParameter(format!(
            "Malformed response from the identity provider: {err}"
        ))
    })
}

fn missing_token() -> CognitoError {
    CognitoError::NotAuthorized("Authentication result did not include tokens".to_string())
}
