use std::sync::Arc;

use log::debug;

use crate::pool::UserAttribute;
use crate::session::UserSession;
use crate::storage::Storage;
use crate::token::{JwtToken, RefreshToken};

/// Prefix shared by every key this crate writes into the injected storage.
pub(crate) const KEY_PREFIX: &str = "CognitoIdentityServiceProvider";

/// Credentials of a device remembered for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeviceCredentials {
    pub device_key: String,
    pub device_group_key: String,
    pub device_password: String,
}

/// The persisted token/device/attribute blobs for one app client.
///
/// Keys are namespaced as `CognitoIdentityServiceProvider.<clientId>.<username>.<item>`,
/// so several users (and several app clients) can share one [`Storage`].
#[derive(Clone)]
pub(crate) struct TokenCache {
    storage: Arc<dyn Storage>,
    client_id: String,
}

impl TokenCache {
    pub fn new(storage: Arc<dyn Storage>, client_id: &str) -> Self {
        Self {
            storage,
            client_id: client_id.to_string(),
        }
    }

    fn user_key(&self, username: &str, item: &str) -> String {
        format!("{KEY_PREFIX}.{}.{username}.{item}", self.client_id)
    }

    fn client_key(&self, item: &str) -> String {
        format!("{KEY_PREFIX}.{}.{item}", self.client_id)
    }

    /// Persist a freshly issued session and mark its user as the last
    /// authenticated one.
    pub fn cache_session(&self, username: &str, session: &UserSession) {
        debug!(username = username; "Caching tokens for user");

        self.storage
            .set_item(&self.user_key(username, "idToken"), session.id_token().jwt());
        self.storage.set_item(
            &self.user_key(username, "accessToken"),
            session.access_token().jwt(),
        );
        self.storage.set_item(
            &self.user_key(username, "refreshToken"),
            session.refresh_token().token(),
        );
        self.storage.set_item(
            &self.user_key(username, "clockDrift"),
            &session.clock_drift().to_string(),
        );
        self.storage
            .set_item(&self.client_key("LastAuthUser"), username);
    }

    /// Rebuild a session from the persisted blobs.
    ///
    /// Requires both JWTs; a missing refresh token yields a session that can
    /// expire but not silently renew.
    pub fn load_session(&self, username: &str) -> Option<UserSession> {
        let id_token = self.storage.get_item(&self.user_key(username, "idToken"))?;
        let access_token = self
            .storage
            .get_item(&self.user_key(username, "accessToken"))?;
        let refresh_token = self
            .storage
            .get_item(&self.user_key(username, "refreshToken"))
            .unwrap_or_default();
        let clock_drift = self
            .storage
            .get_item(&self.user_key(username, "clockDrift"))
            .and_then(|drift| drift.parse().ok());

        Some(UserSession::new(
            JwtToken::new(&id_token),
            JwtToken::new(&access_token),
            RefreshToken::new(&refresh_token),
            clock_drift,
        ))
    }

    /// Drop the four token blobs for the user and the last-auth-user marker.
    ///
    /// Device credentials are left in place: signing out does not unremember
    /// the device.
    pub fn clear_session(&self, username: &str) {
        for item in ["idToken", "accessToken", "refreshToken", "clockDrift"] {
            self.storage.remove_item(&self.user_key(username, item));
        }
        self.storage.remove_item(&self.client_key("LastAuthUser"));
    }

    pub fn last_auth_user(&self) -> Option<String> {
        self.storage.get_item(&self.client_key("LastAuthUser"))
    }

    pub fn cache_device(&self, username: &str, device: &DeviceCredentials) {
        self.storage.set_item(
            &self.user_key(username, "deviceKey"),
            &device.device_key,
        );
        self.storage.set_item(
            &self.user_key(username, "deviceGroupKey"),
            &device.device_group_key,
        );
        self.storage.set_item(
            &self.user_key(username, "randomPasswordKey"),
            &device.device_password,
        );
    }

    pub fn load_device(&self, username: &str) -> Option<DeviceCredentials> {
        Some(DeviceCredentials {
            device_key: self.storage.get_item(&self.user_key(username, "deviceKey"))?,
            device_group_key: self
                .storage
                .get_item(&self.user_key(username, "deviceGroupKey"))?,
            device_password: self
                .storage
                .get_item(&self.user_key(username, "randomPasswordKey"))?,
        })
    }

    pub fn clear_device(&self, username: &str) {
        for item in ["deviceKey", "deviceGroupKey", "randomPasswordKey"] {
            self.storage.remove_item(&self.user_key(username, item));
        }
    }

    pub fn cache_attributes(&self, username: &str, attributes: &[UserAttribute]) {
        for attribute in attributes {
            self.storage.set_item(
                &self.user_key(username, &format!("userAttributes.{}", attribute.name)),
                &attribute.value,
            );
        }
    }

    pub fn remove_attribute(&self, username: &str, name: &str) {
        self.storage
            .remove_item(&self.user_key(username, &format!("userAttributes.{name}")));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use serde_json::json;

    use crate::session::UserSession;
    use crate::storage::{MemoryStorage, Storage};
    use crate::token::{JwtToken, RefreshToken};

    use super::{DeviceCredentials, TokenCache};

    fn jwt(claims: serde_json::Value) -> JwtToken {
        JwtToken::new(&format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        ))
    }

    fn cache() -> (Arc<MemoryStorage>, TokenCache) {
        let storage = Arc::new(MemoryStorage::new());
        let cache = TokenCache::new(storage.clone(), "client-id");

        (storage, cache)
    }

    #[test]
    fn test_session_round_trips_through_the_cache() {
        let (_, cache) = cache();

        let session = UserSession::new(
            jwt(json!({ "iat": 100, "exp": 3700 })),
            jwt(json!({ "iat": 100, "exp": 3700 })),
            RefreshToken::new("refresh-token"),
            Some(42),
        );

        cache.cache_session("carol", &session);

        assert_eq!(cache.load_session("carol"), Some(session));
        assert_eq!(cache.last_auth_user(), Some("carol".to_string()));
    }

    #[test]
    fn test_keys_are_namespaced_per_client_and_user() {
        let (storage, cache) = cache();

        let session = UserSession::new(
            jwt(json!({ "iat": 100, "exp": 3700 })),
            jwt(json!({ "iat": 100, "exp": 3700 })),
            RefreshToken::new("refresh-token"),
            Some(0),
        );

        cache.cache_session("carol", &session);

        assert!(storage
            .get_item("CognitoIdentityServiceProvider.client-id.carol.idToken")
            .is_some());
        assert!(storage
            .get_item("CognitoIdentityServiceProvider.client-id.carol.clockDrift")
            .is_some());
        assert_eq!(
            storage.get_item("CognitoIdentityServiceProvider.client-id.LastAuthUser"),
            Some("carol".to_string())
        );
    }

    #[test]
    fn test_clear_session_keeps_device_credentials() {
        let (storage, cache) = cache();

        let session = UserSession::new(
            jwt(json!({ "iat": 100, "exp": 3700 })),
            jwt(json!({ "iat": 100, "exp": 3700 })),
            RefreshToken::new("refresh-token"),
            Some(0),
        );
        let device = DeviceCredentials {
            device_key: "us-east-1_device-key".to_string(),
            device_group_key: "device-group".to_string(),
            device_password: "device-password".to_string(),
        };

        cache.cache_session("carol", &session);
        cache.cache_device("carol", &device);
        cache.clear_session("carol");

        assert_eq!(cache.load_session("carol"), None);
        assert_eq!(cache.last_auth_user(), None);
        assert_eq!(cache.load_device("carol"), Some(device));
        assert_eq!(
            storage.get_item("CognitoIdentityServiceProvider.client-id.carol.refreshToken"),
            None
        );
    }

    #[test]
    fn test_missing_refresh_token_still_loads() {
        let (storage, cache) = cache();

        storage.set_item(
            "CognitoIdentityServiceProvider.client-id.carol.idToken",
            jwt(json!({ "iat": 100, "exp": 3700 })).jwt(),
        );
        storage.set_item(
            "CognitoIdentityServiceProvider.client-id.carol.accessToken",
            jwt(json!({ "iat": 100, "exp": 3700 })).jwt(),
        );

        let session = cache.load_session("carol").unwrap();

        assert_eq!(session.refresh_token().token(), "");
    }
}
