//! Key-value storage seam.
//!
//! The adapter persists JSON-encoded values under string keys, optionally
//! with an expiry. Implementations live in the infrastructure crate (one
//! file-backed, one in-memory); everything above them depends only on this
//! trait. Calls never fail loudly: a write reports success as a bool, a read
//! that cannot be parsed falls back to the caller's default.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Well-known storage keys shared by the auth manager and the user store.
pub mod keys {
    pub const AUTH_TOKEN: &str = "auth_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const USER_INFO: &str = "user_info";
    pub const USER_PERMISSIONS: &str = "user_permissions";
    pub const USER_SETTINGS: &str = "user_settings";
    pub const LAST_LOGIN_TIME: &str = "last_login_time";
}

/// JSON key-value storage with optional per-entry expiry.
///
/// Object-safe on purpose: stores hold it as `Arc<dyn KeyValueStore>`.
/// Typed access lives in [`KeyValueStoreExt`].
pub trait KeyValueStore: Send + Sync {
    /// Writes a value. Returns false when persistence failed.
    fn set(&self, key: &str, value: &Value) -> bool;

    /// Reads a value, `None` when absent or unreadable.
    fn get(&self, key: &str) -> Option<Value>;

    /// Deletes a key. Returns false when the delete could not be persisted.
    fn remove(&self, key: &str) -> bool;

    /// True when the key currently exists (expired entries excluded).
    fn has(&self, key: &str) -> bool;

    /// Writes a value that [`get_with_expiry`](Self::get_with_expiry) treats
    /// as absent once `ttl` has elapsed.
    fn set_with_expiry(&self, key: &str, value: &Value, ttl: Duration) -> bool;

    /// Reads an expiring value. A past-expiry entry is deleted on the spot
    /// (lazy eviction, no background sweep) and reported absent.
    fn get_with_expiry(&self, key: &str) -> Option<Value>;

    /// Removes every key. Returns false when the wipe could not be persisted.
    fn clear(&self) -> bool;

    /// Currently present keys, expired entries included until evicted.
    fn keys(&self) -> Vec<String>;

    /// Number of currently present keys.
    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Typed convenience layer over [`KeyValueStore`].
pub trait KeyValueStoreExt: KeyValueStore {
    /// Serializes and writes a typed value.
    fn set_as<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, &json),
            Err(error) => {
                tracing::warn!(key, %error, "failed to serialize value for storage");
                false
            }
        }
    }

    /// Reads a typed value, falling back to `default` when the key is absent
    /// or the stored text does not parse as `T`.
    fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or(default)
    }

    /// Like [`get_or`](Self::get_or) but honoring the entry's expiry.
    fn get_with_expiry_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_with_expiry(key)
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or(default)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {}
