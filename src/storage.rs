use parking_lot::Mutex;
use std::collections::HashMap;

/// A persistent key/value store holding cached tokens, device credentials and
/// user attributes.
///
/// The store is synchronous: hosts with an async backing store should resolve
/// reads up front and adapt writes behind this interface. Implementations are
/// shared between every user of the same app client, so they must be safe to
/// call from multiple places.
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any existing value.
    fn set_item(&self, key: &str, value: &str);

    /// Remove the value stored under `key`, if any.
    fn remove_item(&self, key: &str);

    /// Remove every stored value.
    fn clear(&self);
}

/// The fallback [`Storage`] used when the host does not inject one.
///
/// Contents do not survive the process; a host wanting silent sign-in across
/// restarts must provide a persistent store.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items.lock().insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items.lock().remove(key);
    }

    fn clear(&self) {
        self.items.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryStorage, Storage};

    #[test]
    fn test_memory_storage_round_trips() {
        let storage = MemoryStorage::new();

        storage.set_item("key", "value");
        assert_eq!(storage.get_item("key"), Some("value".to_string()));

        storage.set_item("key", "other");
        assert_eq!(storage.get_item("key"), Some("other".to_string()));

        storage.remove_item("key");
        assert_eq!(storage.get_item("key"), None);
    }

    #[test]
    fn test_clear_removes_everything() {
        let storage = MemoryStorage::new();

        storage.set_item("one", "1");
        storage.set_item("two", "2");
        storage.clear();

        assert_eq!(storage.get_item("one"), None);
        assert_eq!(storage.get_item("two"), None);
    }
}
