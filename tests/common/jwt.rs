use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use serde_json::{json, Value};

/// Encode claims as an unsigned JWT; the client never validates signatures.
pub fn encode(claims: Value) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// An ID token valid for the next hour.
pub fn id_token(username: &str) -> String {
    let now = Utc::now().timestamp();

    encode(json!({
        "sub": "11111111-2222-3333-4444-555555555555",
        "cognito:username": username,
        "iat": now,
        "exp": now + 3600,
    }))
}

/// An access token valid for the next hour.
pub fn access_token(username: &str) -> String {
    let now = Utc::now().timestamp();

    encode(json!({
        "sub": "11111111-2222-3333-4444-555555555555",
        "username": username,
        "iat": now,
        "exp": now + 3600,
    }))
}

/// A token that expired an hour ago.
pub fn expired_token(username: &str) -> String {
    let now = Utc::now().timestamp();

    encode(json!({
        "username": username,
        "iat": now - 7200,
        "exp": now - 3600,
    }))
}
