use chrono::Utc;

use crate::token::{JwtToken, RefreshToken};

/// An authenticated user session: the ID/access/refresh token triple plus the
/// clock drift observed when the tokens were issued.
///
/// The drift (local clock minus the ID token's `iat`) keeps expiry checks
/// honest on hosts whose clock disagrees with the identity provider's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    id_token: JwtToken,
    access_token: JwtToken,
    refresh_token: RefreshToken,
    clock_drift: i64,
}

impl UserSession {
    /// Build a session from freshly issued (or cached) tokens.
    ///
    /// When `clock_drift` is absent it is computed from the ID token's `iat`
    /// against the local clock, which is correct only at issuance time -
    /// sessions rebuilt from a cache must pass the drift recorded with them.
    #[must_use]
    pub fn new(
        id_token: JwtToken,
        access_token: JwtToken,
        refresh_token: RefreshToken,
        clock_drift: Option<i64>,
    ) -> Self {
        let clock_drift =
            clock_drift.unwrap_or_else(|| calculate_clock_drift(&id_token));

        Self {
            id_token,
            access_token,
            refresh_token,
            clock_drift,
        }
    }

    #[must_use]
    pub fn id_token(&self) -> &JwtToken {
        &self.id_token
    }

    #[must_use]
    pub fn access_token(&self) -> &JwtToken {
        &self.access_token
    }

    #[must_use]
    pub fn refresh_token(&self) -> &RefreshToken {
        &self.refresh_token
    }

    #[must_use]
    pub fn clock_drift(&self) -> i64 {
        self.clock_drift
    }

    /// Whether both JWTs are still within their lifetime, after correcting
    /// for the recorded clock drift.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let adjusted_now = Utc::now().timestamp() - self.clock_drift;

        match (self.id_token.expiration(), self.access_token.expiration()) {
            (Some(id_expiration), Some(access_expiration)) => {
                adjusted_now < id_expiration && adjusted_now < access_expiration
            }
            _ => false,
        }
    }
}

fn calculate_clock_drift(id_token: &JwtToken) -> i64 {
    Utc::now().timestamp() - id_token.issued_at().unwrap_or_default()
}
