use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::Value;

/// A JWT issued by the user pool (ID or access token).
///
/// The payload is decoded locally for expiry bookkeeping only; no signature
/// validation happens on the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtToken {
    token: String,
    payload: Value,
}

impl JwtToken {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            payload: decode_payload(token),
            token: token.to_string(),
        }
    }

    /// The raw JWT string.
    #[must_use]
    pub fn jwt(&self) -> &str {
        &self.token
    }

    /// The decoded payload claims. `Value::Null` when the token is malformed.
    #[must_use]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// A single claim from the payload.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// The `exp` claim, in seconds since the epoch.
    #[must_use]
    pub fn expiration(&self) -> Option<i64> {
        self.claim("exp").and_then(Value::as_i64)
    }

    /// The `iat` claim, in seconds since the epoch.
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.claim("iat").and_then(Value::as_i64)
    }

    /// The `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claim("sub").and_then(Value::as_str)
    }

    /// The username claim: `username` on access tokens, `cognito:username` on
    /// ID tokens.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.claim("username")
            .or_else(|| self.claim("cognito:username"))
            .and_then(Value::as_str)
    }
}

/// The opaque refresh token issued alongside the JWT pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    token: String,
}

impl RefreshToken {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }

    /// The raw refresh token string. Empty when the server never issued one.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

fn decode_payload(token: &str) -> Value {
    token
        .split('.')
        .nth(1)
        .and_then(|segment| URL_SAFE_NO_PAD.decode(segment).ok())
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or(Value::Null)
}
