//! In-memory key-value storage adapter.
//!
//! Same contract as [`crate::json_store::JsonStore`] but scoped to the
//! process lifetime: the session-storage twin of the persistent adapter.
//! Used for state that must not survive a restart (and in tests).

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use wayfare_core::storage::KeyValueStore;

struct MemoryEntry {
    value: Value,
    expiry: Option<i64>,
}

/// Process-lifetime [`KeyValueStore`].
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }
}

impl KeyValueStore for MemoryStore {
    fn set(&self, key: &str, value: &Value) -> bool {
        let mut entries = self.entries.write().expect("memory store lock poisoned");
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.clone(),
                expiry: None,
            },
        );
        true
    }

    fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.read().expect("memory store lock poisoned");
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.write().expect("memory store lock poisoned");
        entries.remove(key);
        true
    }

    fn has(&self, key: &str) -> bool {
        let entries = self.entries.read().expect("memory store lock poisoned");
        entries.contains_key(key)
    }

    fn set_with_expiry(&self, key: &str, value: &Value, ttl: Duration) -> bool {
        let mut entries = self.entries.write().expect("memory store lock poisoned");
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.clone(),
                expiry: Some(Self::now_millis() + ttl.as_millis() as i64),
            },
        );
        true
    }

    fn get_with_expiry(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.write().expect("memory store lock poisoned");
        let expired = match entries.get(key) {
            Some(entry) => match entry.expiry {
                Some(expiry) => Self::now_millis() > expiry,
                None => false,
            },
            None => return None,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn clear(&self) -> bool {
        let mut entries = self.entries.write().expect("memory store lock poisoned");
        entries.clear();
        true
    }

    fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().expect("memory store lock poisoned");
        entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_roundtrip() {
        let store = MemoryStore::new();
        store.set("k", &json!({"a": 1}));
        assert_eq!(store.get("k"), Some(json!({"a": 1})));
    }

    #[test]
    fn test_expiry() {
        let store = MemoryStore::new();
        store.set_with_expiry("k", &json!(1), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(store.get_with_expiry("k"), None);
        assert!(!store.has("k"));
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        store.set("a", &json!(1));
        store.clear();
        assert!(store.keys().is_empty());
    }
}
