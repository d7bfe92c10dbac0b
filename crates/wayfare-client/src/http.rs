//! reqwest-backed [`Transport`] implementation.
//!
//! This is the only module that talks to the real HTTP stack. Transport
//! failures are classified here (timeout vs network); HTTP error statuses
//! come back as ordinary [`ApiResponse`]s for the pipeline to translate.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_DISPOSITION;
use serde_json::Value;
use wayfare_core::error::{Result, WayfareError};
use wayfare_core::transport::{
    ApiRequest, ApiResponse, DownloadPayload, HttpMethod, ProgressFn, Transport, UploadPart,
};

/// Chunk size used when streaming multipart uploads, so the progress
/// callback fires at a useful granularity.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// HTTP transport over a shared [`reqwest::Client`].
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WayfareError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn builder(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Patch => self.client.patch(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer);
        }
        builder
    }
}

/// Maps a reqwest failure to the transport-level error taxonomy.
fn classify(error: reqwest::Error) -> WayfareError {
    if error.is_timeout() {
        WayfareError::Timeout(error.to_string())
    } else {
        WayfareError::network(error.to_string())
    }
}

/// Pulls `filename="..."` out of a Content-Disposition header value.
fn disposition_filename(value: &str) -> Option<String> {
    let (_, rest) = value.split_once("filename=")?;
    let name = rest.trim().trim_matches('"').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let mut builder = self.builder(&request);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            // Non-JSON bodies are preserved verbatim for diagnostics.
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        tracing::debug!(method = request.method.as_str(), url = %request.url, status, "request completed");
        Ok(ApiResponse::new(status, body))
    }

    async fn upload(
        &self,
        request: ApiRequest,
        parts: Vec<UploadPart>,
        progress: Option<ProgressFn>,
    ) -> Result<ApiResponse> {
        let total: u64 = parts.iter().map(|p| p.bytes.len() as u64).sum();
        let mut form = reqwest::multipart::Form::new();

        let mut sent_before: u64 = 0;
        for part in parts {
            let part_len = part.bytes.len() as u64;
            let base = sent_before;
            sent_before += part_len;

            let progress = progress.clone();
            let chunks: Vec<Vec<u8>> = part
                .bytes
                .chunks(UPLOAD_CHUNK_BYTES)
                .map(<[u8]>::to_vec)
                .collect();

            // Progress fires as reqwest pulls chunks off the stream.
            let mut sent_in_part: u64 = 0;
            let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
                sent_in_part += chunk.len() as u64;
                if let Some(progress) = &progress {
                    progress(base + sent_in_part, Some(total));
                }
                Ok::<_, std::io::Error>(chunk)
            }));

            let body = reqwest::Body::wrap_stream(stream);
            let form_part = reqwest::multipart::Part::stream_with_length(body, part_len)
                .file_name(part.filename)
                .mime_str(&part.mime)
                .map_err(|e| WayfareError::internal(format!("invalid upload mime type: {e}")))?;
            form = form.part(part.name, form_part);
        }

        let mut builder = self.builder(&request);
        builder = builder.multipart(form);

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse::new(status, body))
    }

    async fn download(&self, request: ApiRequest) -> Result<DownloadPayload> {
        let response = self.builder(&request).send().await.map_err(classify)?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(WayfareError::http(status, format!("Download failed ({status})")));
        }

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename);

        let bytes = response.bytes().await.map_err(classify)?;
        Ok(DownloadPayload {
            bytes: bytes.to_vec(),
            filename,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="trip.pdf""#),
            Some("trip.pdf".to_string())
        );
        assert_eq!(
            disposition_filename("attachment; filename=plain.csv"),
            Some("plain.csv".to_string())
        );
        assert_eq!(disposition_filename("attachment"), None);
        assert_eq!(disposition_filename(r#"attachment; filename="""#), None);
    }
}
