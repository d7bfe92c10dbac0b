//! Shared test doubles for the store unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::{Value, json};
use wayfare_client::ApiClient;
use wayfare_core::bus::EventBus;
use wayfare_core::error::{Result, WayfareError};
use wayfare_core::model::{
    Expense, ExpenseCategory, ItineraryItem, PlanStatus, TravelPlan, User,
};
use wayfare_core::session::AnonymousTokens;
use wayfare_core::transport::{
    ApiRequest, ApiResponse, DownloadPayload, ProgressFn, Transport, UploadPart,
};

/// Replays canned responses in order and records every request.
pub(crate) struct SeqTransport {
    responses: Mutex<VecDeque<Result<ApiResponse>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl SeqTransport {
    pub(crate) fn replying(responses: Vec<Result<ApiResponse>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn ok(status: u16, body: Value) -> Result<ApiResponse> {
        Ok(ApiResponse::new(status, body))
    }

    pub(crate) fn recorded(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
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

/// Client over a [`SeqTransport`], cache busting off so queries stay exact.
pub(crate) fn api(transport: Arc<SeqTransport>, bus: EventBus) -> ApiClient {
    ApiClient::new(transport, "http://api.test/api", Arc::new(AnonymousTokens), bus)
        .with_cache_busting(false)
}

pub(crate) fn sample_plan(id: &str, title: &str) -> TravelPlan {
    let stamp = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    TravelPlan {
        id: id.to_string(),
        title: title.to_string(),
        destination: "Lisbon".to_string(),
        start_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2026, 6, 10).unwrap(),
        budget: Some(2500.0),
        traveler_count: 2,
        status: PlanStatus::Pending,
        preferences: json!({}),
        created_at: stamp,
        updated_at: stamp,
    }
}

pub(crate) fn sample_item(id: &str, plan_id: &str, day: u32, hour: u32) -> ItineraryItem {
    let stamp = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    ItineraryItem {
        id: id.to_string(),
        plan_id: plan_id.to_string(),
        title: format!("activity {id}"),
        date: NaiveDate::from_ymd_opt(2026, 6, day).unwrap(),
        start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
        location: None,
        description: None,
        activity_type: None,
        tags: Vec::new(),
        order: hour,
        created_at: stamp,
        updated_at: stamp,
    }
}

pub(crate) fn sample_expense(id: &str, plan_id: &str, amount: f64) -> Expense {
    let stamp = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    Expense {
        id: id.to_string(),
        plan_id: plan_id.to_string(),
        category: ExpenseCategory::Food,
        amount,
        description: None,
        expense_date: NaiveDate::from_ymd_opt(2026, 6, 2).unwrap(),
        payment_method: None,
        receipt_url: None,
        created_at: stamp,
        updated_at: stamp,
    }
}

pub(crate) fn sample_user(id: &str) -> User {
    let stamp = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    User {
        id: id.to_string(),
        username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        phone: None,
        avatar_url: None,
        roles: Vec::new(),
        permissions: vec!["plans:write".to_string()],
        created_at: stamp,
        updated_at: stamp,
    }
}

/// Wire-shaped list envelope in the `{records, total}` convention.
pub(crate) fn records_page<T: serde::Serialize>(items: &[T]) -> Value {
    json!({
        "records": items,
        "total": items.len(),
    })
}
