//! Configuration service.
//!
//! Loads the application configuration from the configuration file
//! (`~/.config/wayfare/config.toml`) once at startup. Environment variables
//! can override the API endpoint settings for local development; there is
//! no hot-reload contract; callers read the config once and keep it.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::paths::WayfarePaths;

/// HTTP endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Append a `_t` cache-busting query parameter to GET requests.
    pub cache_busting: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_ms: 10_000,
            cache_busting: true,
        }
    }
}

/// Token-refresh cadence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// How often the silent-refresh task checks the token, in seconds.
    pub refresh_check_interval_secs: u64,
    /// Refresh when the token expires within this lead time, in seconds.
    pub refresh_lead_time_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_check_interval_secs: 60,
            refresh_lead_time_secs: 300,
        }
    }
}

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub auth: AuthConfig,
}

/// Configuration service that loads and caches the application config.
///
/// The file is read lazily on first access and cached behind a lock to
/// avoid repeated file I/O; `invalidate_cache` forces a reload (used by
/// tests, not part of any hot-reload contract).
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: Option<PathBuf>,
    config: Arc<RwLock<Option<AppConfig>>>,
}

impl ConfigService {
    /// Creates a service reading from the default platform path.
    pub fn new() -> Self {
        Self {
            path: None,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a service reading from an explicit file path.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the configuration, loading from file if not cached.
    pub fn get_config(&self) -> AppConfig {
        {
            let read_lock = self.config.read().expect("config lock poisoned");
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = self.load_config().unwrap_or_else(|error| {
            tracing::warn!(%error, "failed to load config, using defaults");
            AppConfig::default()
        });
        let loaded = Self::apply_env_overrides(loaded);

        {
            let mut write_lock = self.config.write().expect("config lock poisoned");
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().expect("config lock poisoned");
        *write_lock = None;
    }

    /// Reads the TOML file, creating it with defaults when missing.
    fn load_config(&self) -> Result<AppConfig, String> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => WayfarePaths::config_file().map_err(|e| e.to_string())?,
        };

        if !path.exists() {
            let default = AppConfig::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create config directory: {}", e))?;
            }
            let text = toml::to_string_pretty(&default)
                .map_err(|e| format!("Failed to serialize default config: {}", e))?;
            fs::write(&path, text)
                .map_err(|e| format!("Failed to write config file at {:?}: {}", path, e))?;
            return Ok(default);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read config file at {:?}: {}", path, e))?;

        if content.trim().is_empty() {
            return Ok(AppConfig::default());
        }

        toml::from_str(&content).map_err(|e| format!("Failed to parse TOML from {:?}: {}", path, e))
    }

    /// Applies `WAYFARE_API_BASE_URL` / `WAYFARE_API_TIMEOUT_MS` overrides.
    fn apply_env_overrides(mut config: AppConfig) -> AppConfig {
        if let Ok(base_url) = std::env::var("WAYFARE_API_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.api.base_url = base_url;
            }
        }
        if let Ok(timeout) = std::env::var("WAYFARE_API_TIMEOUT_MS") {
            if let Ok(timeout_ms) = timeout.parse() {
                config.api.timeout_ms = timeout_ms;
            }
        }
        config
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let service = ConfigService::with_path(path.clone());

        let config = service.get_config();
        assert_eq!(config.api.timeout_ms, 10_000);
        assert!(path.exists());
    }

    #[test]
    fn test_partial_file_backfills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api]\nbase_url = \"https://api.example.com\"\n").unwrap();

        let config = ConfigService::with_path(path).get_config();
        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.auth.refresh_check_interval_secs, 60);
    }

    #[test]
    fn test_cache_and_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[api]\ntimeout_ms = 5000\n").unwrap();
        let service = ConfigService::with_path(path.clone());
        assert_eq!(service.get_config().api.timeout_ms, 5000);

        fs::write(&path, "[api]\ntimeout_ms = 9000\n").unwrap();
        // Still cached.
        assert_eq!(service.get_config().api.timeout_ms, 5000);

        service.invalidate_cache();
        assert_eq!(service.get_config().api.timeout_ms, 9000);
    }
}
