//! The shared request/response pipeline.
//!
//! Every store action goes through [`ApiClient`]: the request step injects
//! the bearer token and an optional cache-busting parameter; the response
//! step normalizes the two server envelope conventions into one `Result`,
//! maps HTTP statuses to fixed user-facing messages, and broadcasts
//! failures on the event bus so global UI chrome reacts without the caller
//! wiring it explicitly.

use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use wayfare_core::bus::EventBus;
use wayfare_core::error::{Result, WayfareError};
use wayfare_core::event::{AppEvent, FailureKind};
use wayfare_core::session::TokenProvider;
use wayfare_core::transport::{
    ApiRequest, ApiResponse, DownloadPayload, HttpMethod, ProgressFn, Transport, UploadPart,
};

/// Fixed status-to-message table for HTTP error responses.
fn status_message(status: u16) -> String {
    match status {
        400 => "Request parameter error".to_string(),
        401 => "Session expired, please sign in again".to_string(),
        403 => "Access denied".to_string(),
        404 => "Requested resource not found".to_string(),
        408 => "Request timed out".to_string(),
        500 => "Internal server error".to_string(),
        501 => "Service not implemented".to_string(),
        502 => "Bad gateway".to_string(),
        503 => "Service unavailable".to_string(),
        504 => "Gateway timeout".to_string(),
        other => format!("Request failed ({other})"),
    }
}

/// Envelope code the backend uses for "not logged in".
const ENVELOPE_NOT_LOGGED_IN: i64 = -1;
/// Envelope code signalling success.
const ENVELOPE_OK: i64 = 200;

/// Shared HTTP pipeline over a [`Transport`].
///
/// Cheap to clone; all clones share the transport, token provider, bus and
/// cancellation registry.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    bus: EventBus,
    cache_busting: bool,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
        bus: EventBus,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
            tokens,
            bus,
            cache_busting: true,
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Enables or disables the `_t` cache-busting parameter on GETs.
    pub fn with_cache_busting(mut self, enabled: bool) -> Self {
        self.cache_busting = enabled;
        self
    }

    // ------------------------------------------------------------------
    // Verb methods
    // ------------------------------------------------------------------

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T> {
        self.request(HttpMethod::Get, path, query, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(HttpMethod::Post, path, Vec::new(), Some(body))
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(HttpMethod::Put, path, Vec::new(), Some(body))
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(HttpMethod::Patch, path, Vec::new(), Some(body))
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T> {
        self.request(HttpMethod::Delete, path, query, None).await
    }

    /// Delete with a JSON body, used by the batch endpoints.
    pub async fn delete_with_body<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        self.request(HttpMethod::Delete, path, Vec::new(), Some(body))
            .await
    }

    /// Multipart upload with an optional progress callback.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        parts: Vec<UploadPart>,
        progress: Option<ProgressFn>,
    ) -> Result<T> {
        let request = self.intercept(ApiRequest::new(HttpMethod::Post, self.url(path)));
        let token = self.current_cancel_token();
        let result = tokio::select! {
            _ = token.cancelled() => Err(WayfareError::Cancelled),
            r = self.transport.upload(request, parts, progress) => r,
        };
        let response = self.report(result)?;
        self.unwrap_response(response)
    }

    /// Binary download. The caller saves the payload where it wants it.
    pub async fn download(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<DownloadPayload> {
        let request =
            self.intercept(ApiRequest::new(HttpMethod::Get, self.url(path)).with_query(query));
        let token = self.current_cancel_token();
        let result = tokio::select! {
            _ = token.cancelled() => Err(WayfareError::Cancelled),
            r = self.transport.download(request) => r,
        };
        self.report(result)
    }

    /// Cancels every in-flight request, best effort. Requests issued after
    /// this call run normally against a fresh cancellation token.
    pub fn cancel_all(&self) {
        let mut guard = self.cancel.lock().expect("cancel registry lock poisoned");
        guard.cancel();
        *guard = CancellationToken::new();
    }

    // ------------------------------------------------------------------
    // Pipeline internals
    // ------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn current_cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .expect("cancel registry lock poisoned")
            .clone()
    }

    /// Request interceptor: bearer token plus GET cache busting.
    fn intercept(&self, mut request: ApiRequest) -> ApiRequest {
        request.bearer = self.tokens.access_token();
        if request.method == HttpMethod::Get && self.cache_busting {
            request
                .query
                .push(("_t".to_string(), Utc::now().timestamp_millis().to_string()));
        }
        request
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> Result<T> {
        let mut request = ApiRequest::new(method, self.url(path)).with_query(query);
        if let Some(body) = body {
            request = request.with_body(body);
        }
        let request = self.intercept(request);

        let token = self.current_cancel_token();
        let result = tokio::select! {
            _ = token.cancelled() => Err(WayfareError::Cancelled),
            r = self.transport.execute(request) => r,
        };
        let response = self.report(result)?;
        self.unwrap_response(response)
    }

    /// Broadcasts transport-level failures before handing them back.
    fn report<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            self.broadcast_failure(error);
        }
        result
    }

    /// Response interceptor: status mapping plus envelope normalization.
    fn unwrap_response<T: DeserializeOwned>(&self, response: ApiResponse) -> Result<T> {
        if !response.is_success() {
            // Server-provided message wins over the fixed table when present.
            let message = response
                .server_message()
                .map(str::to_string)
                .unwrap_or_else(|| status_message(response.status));
            let error = WayfareError::http(response.status, message);
            if response.status == 401 {
                self.bus.emit(AppEvent::SessionExpired);
            }
            self.broadcast_failure(&error);
            return Err(error);
        }

        let body = response.body;
        let payload = match envelope_parts(&body) {
            Some((code, message)) => {
                if code != ENVELOPE_OK {
                    if code == ENVELOPE_NOT_LOGGED_IN {
                        self.bus.emit(AppEvent::SessionExpired);
                    }
                    let error = WayfareError::api(code, message);
                    self.broadcast_failure(&error);
                    return Err(error);
                }
                body.get("data").cloned().unwrap_or(Value::Null)
            }
            None => body,
        };

        serde_json::from_value(payload).map_err(|e| {
            WayfareError::serialization("JSON", format!("unexpected response shape: {e}"))
        })
    }

    fn broadcast_failure(&self, error: &WayfareError) {
        let kind = match error {
            WayfareError::Network(_) | WayfareError::Timeout(_) => FailureKind::Transport,
            WayfareError::Http { .. } => FailureKind::Http,
            WayfareError::Api { .. } => FailureKind::Envelope,
            // Cancellation is caller-initiated, not a failure worth a toast.
            _ => return,
        };
        self.bus.emit(AppEvent::RequestFailed {
            kind,
            message: error.user_message(),
        });
    }
}

/// Detects the `{code, message, data}` envelope convention.
///
/// Anything without both an integer `code` and a string `message` is treated
/// as a bare payload (the coexisting second convention).
fn envelope_parts(body: &Value) -> Option<(i64, String)> {
    let object = body.as_object()?;
    let code = object.get("code")?.as_i64()?;
    let message = object.get("message")?.as_str()?.to_string();
    Some((code, message))
}

// ----------------------------------------------------------------------
// Concurrent fan-out helpers
// ----------------------------------------------------------------------

/// Runs requests concurrently, failing fast on the first error.
pub async fn fetch_all<T, F>(futures: Vec<F>) -> Result<Vec<T>>
where
    F: Future<Output = Result<T>>,
{
    futures::future::try_join_all(futures).await
}

/// Resolves to whichever request settles first.
pub async fn race<T, F>(futures: Vec<F>) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if futures.is_empty() {
        return Err(WayfareError::internal("race over an empty request set"));
    }
    let pinned: Vec<_> = futures.into_iter().map(Box::pin).collect();
    let (result, _, _) = futures::future::select_all(pinned).await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wayfare_core::event::EventKind;
    use wayfare_core::session::AnonymousTokens;

    /// Transport double that replays canned responses and records requests.
    struct MockTransport {
        responses: Mutex<Vec<Result<ApiResponse>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl MockTransport {
        fn replying(responses: Vec<Result<ApiResponse>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
            self.requests.lock().unwrap().push(request);
            self.responses.lock().unwrap().remove(0)
        }

        async fn upload(
            &self,
            request: ApiRequest,
            _parts: Vec<UploadPart>,
            _progress: Option<ProgressFn>,
        ) -> Result<ApiResponse> {
            self.execute(request).await
        }

        async fn download(&self, _request: ApiRequest) -> Result<DownloadPayload> {
            Err(WayfareError::internal("not used"))
        }
    }

    struct FixedToken(&'static str);

    impl TokenProvider for FixedToken {
        fn access_token(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    fn client(transport: Arc<MockTransport>, bus: EventBus) -> ApiClient {
        ApiClient::new(transport, "http://api.test/api/", Arc::new(AnonymousTokens), bus)
    }

    #[tokio::test]
    async fn test_bearer_injection() {
        let transport = MockTransport::replying(vec![Ok(ApiResponse::new(200, json!(1)))]);
        let client = ApiClient::new(
            transport.clone(),
            "http://api.test/api",
            Arc::new(FixedToken("tok-1")),
            EventBus::new(),
        );

        let _: u32 = client.get("/travel-plans", vec![]).await.unwrap();
        assert_eq!(transport.recorded()[0].bearer.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn test_cache_buster_only_on_get() {
        let transport = MockTransport::replying(vec![
            Ok(ApiResponse::new(200, json!(null))),
            Ok(ApiResponse::new(200, json!(null))),
        ]);
        let client = client(transport.clone(), EventBus::new());

        let _: () = client.get("/x", vec![]).await.unwrap();
        let _: () = client.post("/x", &json!({})).await.unwrap();

        let recorded = transport.recorded();
        assert!(recorded[0].query.iter().any(|(k, _)| k == "_t"));
        assert!(!recorded[1].query.iter().any(|(k, _)| k == "_t"));
    }

    #[tokio::test]
    async fn test_cache_buster_disabled() {
        let transport = MockTransport::replying(vec![Ok(ApiResponse::new(200, json!(null)))]);
        let client = client(transport.clone(), EventBus::new()).with_cache_busting(false);
        let _: () = client.get("/x", vec![]).await.unwrap();
        assert!(transport.recorded()[0].query.is_empty());
    }

    #[tokio::test]
    async fn test_base_url_join() {
        let transport = MockTransport::replying(vec![Ok(ApiResponse::new(200, json!(null)))]);
        let client = client(transport.clone(), EventBus::new());
        let _: () = client.get("/travel-plans", vec![]).await.unwrap();
        assert_eq!(transport.recorded()[0].url, "http://api.test/api/travel-plans");
    }

    #[tokio::test]
    async fn test_envelope_success_unwrapped() {
        let transport = MockTransport::replying(vec![Ok(ApiResponse::new(
            200,
            json!({"code": 200, "message": "success", "data": {"id": "p1"}}),
        ))]);
        let client = client(transport, EventBus::new());

        let data: Value = client.get("/plan", vec![]).await.unwrap();
        assert_eq!(data, json!({"id": "p1"}));
    }

    #[tokio::test]
    async fn test_bare_payload_passthrough() {
        let transport =
            MockTransport::replying(vec![Ok(ApiResponse::new(200, json!({"records": [], "total": 0})))]);
        let client = client(transport, EventBus::new());
        let data: Value = client.get("/plans", vec![]).await.unwrap();
        assert_eq!(data["total"], 0);
    }

    #[tokio::test]
    async fn test_envelope_failure_rejects_and_broadcasts() {
        let transport = MockTransport::replying(vec![Ok(ApiResponse::new(
            200,
            json!({"code": 500, "message": "plan quota exceeded", "data": null}),
        ))]);
        let bus = EventBus::new();
        let failures = Arc::new(AtomicUsize::new(0));
        let f = failures.clone();
        bus.on(EventKind::RequestFailed, move |event| {
            if let AppEvent::RequestFailed { kind, message } = event {
                assert_eq!(*kind, FailureKind::Envelope);
                assert_eq!(message, "plan quota exceeded");
                f.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        let client = client(transport, bus);
        let error = client.get::<Value>("/plan", vec![]).await.unwrap_err();
        assert!(matches!(error, WayfareError::Api { code: 500, .. }));
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_http_401_triggers_session_expired() {
        let transport = MockTransport::replying(vec![Ok(ApiResponse::new(401, json!(null)))]);
        let bus = EventBus::new();
        let expired = Arc::new(AtomicUsize::new(0));
        let e = expired.clone();
        bus.on(EventKind::SessionExpired, move |_| {
            e.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let client = client(transport, bus);
        let error = client.get::<Value>("/me", vec![]).await.unwrap_err();
        assert!(error.is_unauthorized());
        assert_eq!(error.user_message(), "Session expired, please sign in again");
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_envelope_not_logged_in_triggers_session_expired() {
        let transport = MockTransport::replying(vec![Ok(ApiResponse::new(
            200,
            json!({"code": -1, "message": "not logged in", "data": null}),
        ))]);
        let bus = EventBus::new();
        let expired = Arc::new(AtomicUsize::new(0));
        let e = expired.clone();
        bus.on(EventKind::SessionExpired, move |_| {
            e.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let client = client(transport, bus);
        assert!(client.get::<Value>("/me", vec![]).await.is_err());
        assert_eq!(expired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_message_overrides_status_table() {
        let transport = MockTransport::replying(vec![Ok(ApiResponse::new(
            400,
            json!({"message": "endDate must be after startDate"}),
        ))]);
        let client = client(transport, EventBus::new());
        let error = client.get::<Value>("/plans", vec![]).await.unwrap_err();
        assert_eq!(error.user_message(), "endDate must be after startDate");
    }

    #[tokio::test]
    async fn test_transport_failure_broadcast() {
        let transport =
            MockTransport::replying(vec![Err(WayfareError::network("connection refused"))]);
        let bus = EventBus::new();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let k = kinds.clone();
        bus.on(EventKind::RequestFailed, move |event| {
            if let AppEvent::RequestFailed { kind, .. } = event {
                k.lock().unwrap().push(*kind);
            }
            Ok(())
        });

        let client = client(transport, bus);
        let error = client.get::<Value>("/plans", vec![]).await.unwrap_err();
        assert!(error.is_retryable());
        assert_eq!(*kinds.lock().unwrap(), vec![FailureKind::Transport]);
    }

    #[tokio::test]
    async fn test_cancel_all_aborts_in_flight() {
        struct HangingTransport;

        #[async_trait]
        impl Transport for HangingTransport {
            async fn execute(&self, _request: ApiRequest) -> Result<ApiResponse> {
                futures::future::pending().await
            }
            async fn upload(
                &self,
                _request: ApiRequest,
                _parts: Vec<UploadPart>,
                _progress: Option<ProgressFn>,
            ) -> Result<ApiResponse> {
                futures::future::pending().await
            }
            async fn download(&self, _request: ApiRequest) -> Result<DownloadPayload> {
                futures::future::pending().await
            }
        }

        let client = ApiClient::new(
            Arc::new(HangingTransport),
            "http://api.test",
            Arc::new(AnonymousTokens),
            EventBus::new(),
        );

        let canceller = client.clone();
        let (result, ()) = tokio::join!(client.get::<Value>("/slow", vec![]), async move {
            tokio::task::yield_now().await;
            canceller.cancel_all();
        });

        assert!(matches!(result.unwrap_err(), WayfareError::Cancelled));
    }

    #[tokio::test]
    async fn test_fetch_all_and_race() {
        let results = fetch_all(vec![
            Box::pin(async { Ok(1u32) }) as std::pin::Pin<Box<dyn Future<Output = Result<u32>>>>,
            Box::pin(async { Ok(2u32) }),
        ])
        .await
        .unwrap();
        assert_eq!(results, vec![1, 2]);

        let first = race(vec![
            Box::pin(async { Ok(7u32) }) as std::pin::Pin<Box<dyn Future<Output = Result<u32>>>>,
            Box::pin(futures::future::pending()),
        ])
        .await
        .unwrap();
        assert_eq!(first, 7);
    }
}
