//! Wire-level request/response types and the transport seam.
//!
//! [`Transport`] is the boundary between the request pipeline and the actual
//! HTTP stack: the client crate provides the reqwest implementation, tests
//! provide in-process fakes. A transport reports *transport* failures
//! (network unreachable, timeout, cancellation) as errors; an HTTP error
//! status is a successful transport round-trip and comes back as an
//! [`ApiResponse`] for the pipeline to classify.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// HTTP verbs used by the REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// One outgoing request after interceptor processing.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Absolute URL (base joined with the endpoint path).
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Bearer token injected by the request interceptor, when present.
    pub bearer: Option<String>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(mut self, bearer: Option<String>) -> Self {
        self.bearer = bearer;
        self
    }
}

/// A completed round-trip: status plus the parsed JSON body.
///
/// A body that is empty or not JSON text is represented as `Value::Null`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The server-provided `message` field, wherever the envelope put it.
    pub fn server_message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }
}

/// One part of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub name: String,
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime: String,
}

/// Progress callback: bytes sent so far, total when known.
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Bytes downloaded from the server plus its suggested filename.
#[derive(Debug, Clone)]
pub struct DownloadPayload {
    pub bytes: Vec<u8>,
    /// Parsed from `Content-Disposition` when the server sent one.
    pub filename: Option<String>,
}

impl DownloadPayload {
    /// Writes the payload into `dir`, using the server-suggested filename or
    /// a generic fallback, and returns the written path.
    pub fn save_to(&self, dir: &Path) -> Result<PathBuf> {
        let name = self.filename.as_deref().unwrap_or("download.dat");
        let path = dir.join(name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// The transport seam.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes a JSON request.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse>;

    /// Sends a multipart upload, reporting progress when a callback is given.
    async fn upload(
        &self,
        request: ApiRequest,
        parts: Vec<UploadPart>,
        progress: Option<ProgressFn>,
    ) -> Result<ApiResponse>;

    /// Fetches a binary payload.
    async fn download(&self, request: ApiRequest) -> Result<DownloadPayload>;
}
