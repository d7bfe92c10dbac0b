//! File-backed key-value storage adapter.
//!
//! [`JsonStore`] keeps the whole key space in one JSON document on disk.
//! Every call re-reads the file and every mutation rewrites it atomically
//! (tmp file + fsync + rename). There is no in-memory layer
//! beneath the adapter; callers needing fast repeated reads cache at the
//! store level, as the domain stores do.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write as IoWrite;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wayfare_core::storage::KeyValueStore;

use crate::paths::WayfarePaths;

/// One stored entry: the JSON value plus an optional expiry instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: Value,
    /// Unix milliseconds after which the entry counts as absent.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    expiry: Option<i64>,
}

/// Persistent [`KeyValueStore`] backed by a single JSON file.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Creates a store over an explicit file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Creates a store at the default platform location
    /// (`~/.config/wayfare/state.json`).
    pub fn default_location() -> anyhow::Result<Self> {
        let path = WayfarePaths::state_file()
            .map_err(|e| anyhow::anyhow!("Failed to resolve state path: {}", e))?;
        Ok(Self::new(path))
    }

    /// Loads the whole document. Missing or empty files read as empty; an
    /// unparseable file is logged and read as empty rather than erroring.
    fn load(&self) -> HashMap<String, StoredEntry> {
        if !self.path.exists() {
            return HashMap::new();
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "failed to read state file");
                return HashMap::new();
            }
        };
        if content.trim().is_empty() {
            return HashMap::new();
        }
        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "state file is not valid JSON");
                HashMap::new()
            }
        }
    }

    /// Persists the document via tmp file + fsync + atomic rename.
    fn save(&self, entries: &HashMap<String, StoredEntry>) -> bool {
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            let tmp_path = self.path.with_extension("json.tmp");
            {
                let mut tmp = File::create(&tmp_path)?;
                let text = serde_json::to_string_pretty(entries)
                    .map_err(|e| std::io::Error::other(e.to_string()))?;
                tmp.write_all(text.as_bytes())?;
                tmp.sync_all()?;
            }
            fs::rename(&tmp_path, &self.path)
        })();

        match result {
            Ok(()) => true,
            Err(error) => {
                tracing::error!(path = %self.path.display(), %error, "failed to persist state file");
                false
            }
        }
    }

    fn now_millis() -> i64 {
        Utc::now().timestamp_millis()
    }
}

impl KeyValueStore for JsonStore {
    fn set(&self, key: &str, value: &Value) -> bool {
        let mut entries = self.load();
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.clone(),
                expiry: None,
            },
        );
        self.save(&entries)
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.load().remove(key).map(|entry| entry.value)
    }

    fn remove(&self, key: &str) -> bool {
        let mut entries = self.load();
        entries.remove(key);
        self.save(&entries)
    }

    fn has(&self, key: &str) -> bool {
        self.load().contains_key(key)
    }

    fn set_with_expiry(&self, key: &str, value: &Value, ttl: Duration) -> bool {
        let mut entries = self.load();
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.clone(),
                expiry: Some(Self::now_millis() + ttl.as_millis() as i64),
            },
        );
        self.save(&entries)
    }

    fn get_with_expiry(&self, key: &str) -> Option<Value> {
        let mut entries = self.load();
        let entry = entries.get(key)?;
        match entry.expiry {
            Some(expiry) if Self::now_millis() > expiry => {
                // Lazy eviction: the expired entry is deleted on read.
                entries.remove(key);
                self.save(&entries);
                None
            }
            _ => Some(entry.value.clone()),
        }
    }

    fn clear(&self) -> bool {
        self.save(&HashMap::new())
    }

    fn keys(&self) -> Vec<String> {
        self.load().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wayfare_core::storage::KeyValueStoreExt;

    fn store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = JsonStore::new(dir.path().join("state.json"));
        (dir, store)
    }

    #[test]
    fn test_set_get_roundtrip() {
        let (_dir, store) = store();
        assert!(store.set("theme", &json!("dark")));
        assert_eq!(store.get("theme"), Some(json!("dark")));
        assert!(store.has("theme"));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (_dir, store) = store();
        assert_eq!(store.get("nope"), None);
        assert!(!store.has("nope"));
    }

    #[test]
    fn test_typed_default_on_type_mismatch() {
        let (_dir, store) = store();
        store.set("count", &json!("not-a-number"));
        let count: u32 = store.get_or("count", 7);
        assert_eq!(count, 7);
    }

    #[test]
    fn test_remove() {
        let (_dir, store) = store();
        store.set("k", &json!(1));
        assert!(store.remove("k"));
        assert!(!store.has("k"));
        // Removing an absent key still persists successfully.
        assert!(store.remove("k"));
    }

    #[test]
    fn test_expiry_lazy_eviction() {
        let (_dir, store) = store();
        store.set_with_expiry("flash", &json!("gone soon"), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(store.get_with_expiry("flash"), None);
        // The expired read deleted the entry.
        assert!(!store.has("flash"));
    }

    #[test]
    fn test_unexpired_entry_readable() {
        let (_dir, store) = store();
        store.set_with_expiry("fresh", &json!(42), Duration::from_secs(3600));
        assert_eq!(store.get_with_expiry("fresh"), Some(json!(42)));
        assert!(store.has("fresh"));
    }

    #[test]
    fn test_plain_entry_has_no_expiry() {
        let (_dir, store) = store();
        store.set("keep", &json!(true));
        assert_eq!(store.get_with_expiry("keep"), Some(json!(true)));
    }

    #[test]
    fn test_clear_and_keys() {
        let (_dir, store) = store();
        store.set("a", &json!(1));
        store.set("b", &json!(2));
        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);

        assert!(store.clear());
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_corrupted_file_reads_as_empty() {
        let (_dir, store) = store();
        fs::write(&store.path, "{{ not json").unwrap();
        assert_eq!(store.get("anything"), None);
        // Writes still work afterwards.
        assert!(store.set("anything", &json!("ok")));
        assert_eq!(store.get("anything"), Some(json!("ok")));
    }

    #[test]
    fn test_values_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        JsonStore::new(path.clone()).set("persisted", &json!([1, 2, 3]));

        let reopened = JsonStore::new(path);
        assert_eq!(reopened.get("persisted"), Some(json!([1, 2, 3])));
    }
}
