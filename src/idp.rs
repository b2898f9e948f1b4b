use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use std::fmt;

use crate::error::CognitoError;

/// Target prefix carried in the `X-Amz-Target` header of every request.
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";

/// The actions of the identity provider's action-style JSON API used by this
/// crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Action {
    InitiateAuth,
    RespondToAuthChallenge,
    ConfirmDevice,
    SignUp,
    ConfirmSignUp,
    ResendConfirmationCode,
    ForgotPassword,
    ConfirmForgotPassword,
    GetUser,
    UpdateUserAttributes,
    DeleteUserAttributes,
    ChangePassword,
    DeleteUser,
    GlobalSignOut,
    GetUserAttributeVerificationCode,
    VerifyUserAttribute,
    SetUserSettings,
    SetUserMfaPreference,
    AssociateSoftwareToken,
    VerifySoftwareToken,
    ListDevices,
    UpdateDeviceStatus,
    GetDevice,
    ForgetDevice,
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::InitiateAuth => "InitiateAuth",
            Action::RespondToAuthChallenge => "RespondToAuthChallenge",
            Action::ConfirmDevice => "ConfirmDevice",
            Action::SignUp => "SignUp",
            Action::ConfirmSignUp => "ConfirmSignUp",
            Action::ResendConfirmationCode => "ResendConfirmationCode",
            Action::ForgotPassword => "ForgotPassword",
            Action::ConfirmForgotPassword => "ConfirmForgotPassword",
            Action::GetUser => "GetUser",
            Action::UpdateUserAttributes => "UpdateUserAttributes",
            Action::DeleteUserAttributes => "DeleteUserAttributes",
            Action::ChangePassword => "ChangePassword",
            Action::DeleteUser => "DeleteUser",
            Action::GlobalSignOut => "GlobalSignOut",
            Action::GetUserAttributeVerificationCode => "GetUserAttributeVerificationCode",
            Action::VerifyUserAttribute => "VerifyUserAttribute",
            Action::SetUserSettings => "SetUserSettings",
            Action::SetUserMfaPreference => "SetUserMFAPreference",
            Action::AssociateSoftwareToken => "AssociateSoftwareToken",
            Action::VerifySoftwareToken => "VerifySoftwareToken",
            Action::ListDevices => "ListDevices",
            Action::UpdateDeviceStatus => "UpdateDeviceStatus",
            Action::GetDevice => "GetDevice",
            Action::ForgetDevice => "ForgetDevice",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The transport used to reach the identity provider.
///
/// The default is [`HttpDispatcher`]; tests and hosts with bespoke transport
/// stacks can inject their own implementation through
/// [`PoolConfig::dispatcher`](crate::PoolConfig).
#[async_trait]
pub trait IdpDispatcher: Send + Sync {
    /// Send one action request with the given JSON body and return the parsed
    /// JSON response.
    ///
    /// Implementations must surface structured `{__type, message}` error
    /// bodies as [`CognitoError::Service`] / [`CognitoError::NotAuthorized`]
    /// and transport failures as [`CognitoError::Network`].
    async fn dispatch(&self, action: Action, body: Value) -> Result<Value, CognitoError>;
}

/// The default HTTPS transport.
///
/// Posts `application/x-amz-json-1.1` bodies to the regional endpoint with the
/// action routed through the `X-Amz-Target` header.
pub struct HttpDispatcher {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpDispatcher {
    /// A dispatcher for the public regional endpoint
    /// `https://cognito-idp.<region>.amazonaws.com/`.
    #[must_use]
    pub fn new(region: &str) -> Self {
        Self::with_endpoint(format!("https://cognito-idp.{region}.amazonaws.com/"))
    }

    /// A dispatcher for an explicit endpoint override.
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl IdpDispatcher for HttpDispatcher {
    async fn dispatch(&self, action: Action, body: Value) -> Result<Value, CognitoError> {
        debug!(action = action.as_str(); "Dispatching request to the identity provider");

        let response = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/x-amz-json-1.1")
            .header("x-amz-target", format!("{TARGET_PREFIX}.{action}"))
            .body(body.to_string())
            .send()
            .await
            .map_err(|err| CognitoError::Network(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| CognitoError::Network(err.to_string()))?;

        let value = parse_body(&text);

        if status.is_success() {
            return Ok(value);
        }

        Err(error_from_body(&value, status.as_u16()))
    }
}

fn parse_body(text: &str) -> Value {
    if text.is_empty() {
        return Value::Object(serde_json::Map::new());
    }

    serde_json::from_str(text).unwrap_or(Value::Null)
}

/// Map a structured `{__type, message}` error body onto a typed error.
///
/// The kind is the trailing `#`-segment of `__type`; bodies without one fall
/// back to the HTTP status.
pub(crate) fn error_from_body(body: &Value, status: u16) -> CognitoError {
    let message = body
        .get("message")
        .or_else(|| body.get("Message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match body.get("__type").and_then(Value::as_str) {
        Some(kind) => {
            let kind = kind.rsplit('#').next().unwrap_or(kind);
            CognitoError::service(kind, message)
        }
        None => CognitoError::Network(format!("unexpected HTTP {status} response: {message}")),
    }
}
