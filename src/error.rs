use thiserror::Error;

/// An error occurred while generating a parameters for the Secure Remote Password (SRP)
/// protocol.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SrpError {
    /// An argument which was provided to the client was invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The HMAC algorithm failed to generate a hash as the digest length was invalid.
    #[error("Cryptography error: {0}")]
    CryptographyError(#[from] digest::InvalidLength),

    /// The exchange produced a value the protocol forbids (`B mod N = 0` or `u = 0`).
    ///
    /// The authentication flow must be restarted from scratch with fresh
    /// ephemeral values.
    #[error("SRP protocol violation: {0}")]
    ProtocolViolation(&'static str),
}

/// An error surfaced by a user pool or user operation.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CognitoError {
    /// A required input was missing or malformed before any request was issued.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The configured authentication flow cannot be driven by this operation.
    #[error("Unsupported authentication flow: {0}")]
    InvalidAuthenticationFlow(String),

    /// The caller holds no valid credentials for the operation, either locally
    /// (expired or missing session) or according to the identity provider.
    #[error("{0}")]
    NotAuthorized(String),

    /// The request never produced a well-formed response from the identity
    /// provider.
    #[error("Network error: {0}")]
    Network(String),

    /// A structured error returned by the identity provider.
    ///
    /// The kind is the trailing segment of the `__type` field, for example
    /// `CodeMismatchException` or `UserNotConfirmedException`.
    #[error("{kind}: {message}")]
    Service { kind: String, message: String },

    /// The SRP engine rejected the exchange.
    #[error("SRP error: {0}")]
    Srp(#[from] SrpError),
}

impl CognitoError {
    /// Build the error for a structured `{__type, message}` response body.
    ///
    /// `NotAuthorizedException` is folded into [`CognitoError::NotAuthorized`]
    /// so callers can match session failures without string-comparing kinds.
    pub(crate) fn service(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let kind = kind.into();
        let message = message.into();

        if kind == "NotAuthorizedException" {
            CognitoError::NotAuthorized(message)
        } else {
            CognitoError::Service { kind, message }
        }
    }
}
