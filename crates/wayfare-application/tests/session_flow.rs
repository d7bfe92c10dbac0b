//! End-to-end flows over the wired application layer: auth manager, plan
//! store, HTTP pipeline and event bus, with an in-process transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};
use wayfare_application::auth::{AuthManager, AuthState, Credentials, RefreshPolicy, SessionHandle};
use wayfare_application::store::PlanStore;
use wayfare_client::ApiClient;
use wayfare_core::bus::EventBus;
use wayfare_core::error::{Result, WayfareError};
use wayfare_core::event::EventKind;
use wayfare_core::model::{PlanDraft, PlanStatus, TravelPlan};
use wayfare_core::page::PageQuery;
use wayfare_core::storage::keys;
use wayfare_core::storage::KeyValueStore;
use wayfare_core::transport::{
    ApiRequest, ApiResponse, DownloadPayload, ProgressFn, Transport, UploadPart,
};
use wayfare_infrastructure::MemoryStore;

fn sample_plan(id: &str, title: &str) -> TravelPlan {
    let stamp = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    TravelPlan {
        id: id.to_string(),
        title: title.to_string(),
        destination: "Kyoto".to_string(),
        start_date: NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2026, 9, 20).unwrap(),
        budget: None,
        traveler_count: 1,
        status: PlanStatus::Pending,
        preferences: json!({}),
        created_at: stamp,
        updated_at: stamp,
    }
}

fn records_page(plans: &[TravelPlan]) -> Value {
    json!({"records": plans, "total": plans.len()})
}

fn jwt_like(exp_offset: Duration) -> String {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let exp = (Utc::now() + exp_offset).timestamp();
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{exp}}}"#).as_bytes());
    format!("{header}.{payload}.sig")
}

fn auth_body(token: &str) -> Value {
    json!({
        "user": {
            "id": "u1",
            "username": "ada",
            "email": "ada@example.com",
            "permissions": ["plans:write"],
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        },
        "token": token,
        "refreshToken": "refresh-1"
    })
}

/// Replays canned responses in order, recording each request.
struct SeqTransport {
    responses: Mutex<VecDeque<Result<ApiResponse>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl SeqTransport {
    fn replying(responses: Vec<Result<ApiResponse>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn recorded(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for SeqTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(WayfareError::internal("no canned response left")))
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
        Err(WayfareError::internal("download not faked"))
    }
}

struct App {
    transport: Arc<SeqTransport>,
    storage: Arc<MemoryStore>,
    bus: EventBus,
    manager: Arc<AuthManager>,
    plans: PlanStore,
}

fn app(responses: Vec<Result<ApiResponse>>) -> App {
    let transport = SeqTransport::replying(responses);
    let storage = Arc::new(MemoryStore::new());
    let bus = EventBus::new();
    let handle = SessionHandle::new();
    let api = ApiClient::new(
        transport.clone(),
        "http://api.test/api",
        Arc::new(handle.clone()),
        bus.clone(),
    )
    .with_cache_busting(false);
    let manager = AuthManager::new(
        api.clone(),
        handle,
        storage.clone(),
        bus.clone(),
        RefreshPolicy::default(),
    );
    manager.bind_session_expiry();
    let plans = PlanStore::new(api, bus.clone());
    App {
        transport,
        storage,
        bus,
        manager,
        plans,
    }
}

#[tokio::test]
async fn test_login_then_crud_carries_bearer_token() {
    let token = jwt_like(Duration::hours(8));
    let app = app(vec![
        Ok(ApiResponse::new(200, auth_body(&token))),
        Ok(ApiResponse::new(200, records_page(&[sample_plan("p1", "Kyoto")]))),
        Ok(ApiResponse::new(
            200,
            serde_json::to_value(sample_plan("p2", "Nara")).unwrap(),
        )),
        Ok(ApiResponse::new(200, json!(null))),
    ]);

    app.manager
        .login(Credentials {
            email: "ada@example.com".to_string(),
            password: "secret".to_string(),
        })
        .await
        .unwrap();
    assert!(app.storage.has(keys::AUTH_TOKEN));

    app.plans.fetch_list(PageQuery::default()).await.unwrap();
    app.plans
        .create(PlanDraft {
            title: Some("Nara".to_string()),
            ..PlanDraft::default()
        })
        .await
        .unwrap();
    app.plans.delete("p1").await.unwrap();

    let requests = app.transport.recorded();
    // Login goes out unauthenticated; everything after carries the token.
    assert!(requests[0].bearer.is_none());
    for request in &requests[1..] {
        assert_eq!(request.bearer.as_deref(), Some(token.as_str()));
    }

    let state = app.plans.snapshot().await;
    assert_eq!(state.list.len(), 1);
    assert_eq!(state.list[0].id, "p2");
    assert_eq!(state.pagination.total, 1);
}

#[tokio::test]
async fn test_expired_session_mid_flow_clears_auth_without_replay() {
    let token = jwt_like(Duration::hours(8));
    let app = app(vec![
        Ok(ApiResponse::new(200, auth_body(&token))),
        Ok(ApiResponse::new(401, json!(null))),
    ]);
    let logouts = Arc::new(AtomicUsize::new(0));
    let counter = logouts.clone();
    app.bus.on(EventKind::Logout, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    app.manager
        .login(Credentials {
            email: "ada@example.com".to_string(),
            password: "secret".to_string(),
        })
        .await
        .unwrap();

    // The 401 surfaces to the caller (no transparent replay) and clears
    // the session as a side effect.
    let error = app.plans.fetch_list(PageQuery::default()).await.unwrap_err();
    assert!(error.is_unauthorized());
    assert_eq!(app.manager.state(), AuthState::Anonymous);
    assert!(app.manager.session().is_none());
    assert!(!app.storage.has(keys::AUTH_TOKEN));
    assert_eq!(logouts.load(Ordering::SeqCst), 1);
    // Exactly the two requests: no retry went out.
    assert_eq!(app.transport.recorded().len(), 2);
}

/// First call's response is held back until the second call has resolved.
struct RacingTransport {
    gate: tokio::sync::Notify,
    calls: AtomicUsize,
    delayed: Value,
    immediate: Value,
}

#[async_trait]
impl Transport for RacingTransport {
    async fn execute(&self, _request: ApiRequest) -> Result<ApiResponse> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.notified().await;
            Ok(ApiResponse::new(200, self.delayed.clone()))
        } else {
            self.gate.notify_one();
            Ok(ApiResponse::new(200, self.immediate.clone()))
        }
    }

    async fn upload(
        &self,
        _request: ApiRequest,
        _parts: Vec<UploadPart>,
        _progress: Option<ProgressFn>,
    ) -> Result<ApiResponse> {
        Err(WayfareError::internal("not used"))
    }

    async fn download(&self, _request: ApiRequest) -> Result<DownloadPayload> {
        Err(WayfareError::internal("not used"))
    }
}

#[tokio::test]
async fn test_concurrent_fetch_list_last_resolution_wins() {
    let transport = Arc::new(RacingTransport {
        gate: tokio::sync::Notify::new(),
        calls: AtomicUsize::new(0),
        delayed: records_page(&[sample_plan("slow", "First invoked, last resolved")]),
        immediate: records_page(&[sample_plan("fast", "Second invoked, first resolved")]),
    });
    let bus = EventBus::new();
    let api = ApiClient::new(
        transport,
        "http://api.test/api",
        Arc::new(SessionHandle::new()),
        bus.clone(),
    )
    .with_cache_busting(false);
    let store = PlanStore::new(api, bus);

    let (first, second) = tokio::join!(
        store.fetch_list(PageQuery::default()),
        store.fetch_list(PageQuery::default()),
    );
    first.unwrap();
    second.unwrap();

    let state = store.snapshot().await;
    // The response that resolved last owns the final list, regardless of
    // invocation order.
    assert_eq!(state.list.len(), 1);
    assert_eq!(state.list[0].id, "slow");
    assert!(!state.loading.list);
    // Both responses were merged into the cache along the way.
    assert!(state.cached("fast").is_some());
}
