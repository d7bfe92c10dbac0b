//! Error types for the Wayfare client core.

use serde::Serialize;
use thiserror::Error;

/// A shared error type for the entire Wayfare client layer.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. Every variant carries a
/// message suitable for direct display in UI chrome; the HTTP layer is
/// responsible for translating raw statuses into these messages before the
/// error reaches a store.
#[derive(Error, Debug, Clone, Serialize)]
pub enum WayfareError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Storage adapter error (key-value persistence layer)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "JSON", "TOML", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error: the request never produced a response
    #[error("Network unreachable: {0}")]
    Network(String),

    /// The request timed out before a response arrived
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// HTTP status error with the normalized user-facing message
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Business envelope error: HTTP 200 with an application failure code
    #[error("{message}")]
    Api { code: i64, message: String },

    /// Security/authentication error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Client-side validation error, never reaches the network layer
    #[error("Validation failed for {field}: {message}")]
    Validation { field: String, message: String },

    /// The request was cancelled before completion
    #[error("Request cancelled")]
    Cancelled,

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WayfareError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a Serialization error
    pub fn serialization(format: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            format: format.into(),
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates an Http error
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates an Api (business envelope) error
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Creates an Auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Creates a Validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Classification helpers
    // ============================================================================

    /// Returns true when the error means the session is no longer valid
    /// (HTTP 401 or the backend's not-logged-in envelope code).
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Http { status: 401, .. } | Self::Api { code: -1, .. } | Self::Auth(_)
        )
    }

    /// Returns true for transport-level failures where a retry is reasonable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// The human-readable message carried by this error.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

impl From<std::io::Error> for WayfareError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for WayfareError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: e.to_string(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, WayfareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = WayfareError::not_found("travel_plan", "42");
        assert_eq!(err.to_string(), "Entity not found: travel_plan '42'");
    }

    #[test]
    fn test_unauthorized_classification() {
        assert!(WayfareError::http(401, "Session expired").is_unauthorized());
        assert!(WayfareError::api(-1, "not logged in").is_unauthorized());
        assert!(!WayfareError::http(404, "Not found").is_unauthorized());
        assert!(!WayfareError::api(500, "boom").is_unauthorized());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(WayfareError::network("connection refused").is_retryable());
        assert!(WayfareError::Timeout("10s elapsed".into()).is_retryable());
        assert!(!WayfareError::http(500, "Server error").is_retryable());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: WayfareError = io.into();
        assert!(matches!(err, WayfareError::Io { .. }));
    }
}
