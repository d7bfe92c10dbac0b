//! Travel-plan domain store.
//!
//! Holds the normalized plan collection and exposes the CRUD actions the
//! UI dispatches. Every action follows the same contract: set the
//! operation's loading flag, call the API, reset the flag on success and
//! failure alike, commit the mutation, emit the matching event, and
//! re-throw the error so the calling component can react locally on top
//! of the global broadcast.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use wayfare_client::{ApiClient, endpoints::plans};
use wayfare_core::bus::EventBus;
use wayfare_core::error::Result;
use wayfare_core::event::{AppEvent, NoticeLevel};
use wayfare_core::model::{PlanDraft, PlanStatistics, PlanStatus, TravelPlan};
use wayfare_core::page::{Page, PageQuery};

use super::collection::CollectionState;

/// List filters merged into every plan list request.
#[derive(Debug, Clone)]
pub struct PlanFilters {
    pub search: Option<String>,
    pub status: Option<PlanStatus>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sort_by: String,
    pub sort_order: String,
}

impl Default for PlanFilters {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            start_date: None,
            end_date: None,
            sort_by: "createdAt".to_string(),
            sort_order: "desc".to_string(),
        }
    }
}

impl PlanFilters {
    fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("sortBy".to_string(), self.sort_by.clone()),
            ("sortOrder".to_string(), self.sort_order.clone()),
        ];
        if let Some(search) = &self.search {
            query.push(("search".to_string(), search.clone()));
        }
        if let Some(status) = self.status {
            query.push(("status".to_string(), status.as_str().to_string()));
        }
        if let Some(start_date) = self.start_date {
            query.push(("startDate".to_string(), start_date.to_string()));
        }
        if let Some(end_date) = self.end_date {
            query.push(("endDate".to_string(), end_date.to_string()));
        }
        query
    }
}

/// State container for travel plans.
#[derive(Clone)]
pub struct PlanStore {
    api: ApiClient,
    bus: EventBus,
    state: Arc<RwLock<CollectionState<TravelPlan>>>,
    filters: Arc<RwLock<PlanFilters>>,
    statistics: Arc<RwLock<PlanStatistics>>,
}

impl PlanStore {
    pub fn new(api: ApiClient, bus: EventBus) -> Self {
        Self {
            api,
            bus,
            state: Arc::new(RwLock::new(CollectionState::default())),
            filters: Arc::new(RwLock::new(PlanFilters::default())),
            statistics: Arc::new(RwLock::new(PlanStatistics::default())),
        }
    }

    /// Read-only snapshot of the current collection state.
    pub async fn snapshot(&self) -> CollectionState<TravelPlan> {
        self.state.read().await.clone()
    }

    pub async fn set_filters(&self, filters: PlanFilters) {
        *self.filters.write().await = filters;
    }

    pub async fn reset_filters(&self) {
        *self.filters.write().await = PlanFilters::default();
    }

    /// Fetches one page of plans, replacing the list and merging every
    /// returned record into the id cache.
    ///
    /// Concurrent calls are not deduplicated: the last response to resolve
    /// wins the final state.
    pub async fn fetch_list(&self, query: PageQuery) -> Result<Vec<TravelPlan>> {
        {
            let mut state = self.state.write().await;
            state.loading.list = true;
        }
        let mut params = query.to_query();
        params.extend(self.filters.read().await.to_query());

        let result: Result<Page<TravelPlan>> = self.api.get(&plans::collection(), params).await;

        let mut state = self.state.write().await;
        state.loading.list = false;
        match result {
            Ok(page) => {
                state.apply_page(page, query);
                Ok(state.list.clone())
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    /// Cache-first detail load: a cached id is returned without a network
    /// round-trip; a miss fetches and seeds both `current` and the cache.
    pub async fn fetch_detail(&self, id: &str) -> Result<TravelPlan> {
        {
            let mut state = self.state.write().await;
            if let Some(plan) = state.cached(id).cloned() {
                state.current = Some(plan.clone());
                return Ok(plan);
            }
            state.loading.detail = true;
        }

        let result: Result<TravelPlan> = self.api.get(&plans::item(id), Vec::new()).await;

        let mut state = self.state.write().await;
        state.loading.detail = false;
        match result {
            Ok(plan) => {
                state.select(plan.clone());
                Ok(plan)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    /// Creates a plan; the canonical server record lands at the head of the
    /// list.
    pub async fn create(&self, draft: PlanDraft) -> Result<TravelPlan> {
        {
            let mut state = self.state.write().await;
            state.loading.create = true;
        }

        let result: Result<TravelPlan> = self.api.post(&plans::collection(), &draft).await;

        let mut state = self.state.write().await;
        state.loading.create = false;
        match result {
            Ok(plan) => {
                state.insert_created(plan.clone());
                drop(state);
                self.bus.emit(AppEvent::PlanCreated { plan: plan.clone() });
                self.bus
                    .emit(AppEvent::notify(NoticeLevel::Success, "Travel plan created"));
                Ok(plan)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    /// Updates a plan in place; the record keeps its list position.
    pub async fn update(&self, id: &str, draft: PlanDraft) -> Result<TravelPlan> {
        {
            let mut state = self.state.write().await;
            state.loading.update = true;
        }

        let result: Result<TravelPlan> = self.api.put(&plans::item(id), &draft).await;

        let mut state = self.state.write().await;
        state.loading.update = false;
        match result {
            Ok(plan) => {
                state.apply_updated(plan.clone());
                drop(state);
                self.bus.emit(AppEvent::PlanUpdated { plan: plan.clone() });
                self.bus
                    .emit(AppEvent::notify(NoticeLevel::Success, "Travel plan updated"));
                Ok(plan)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    /// Deletes a plan. Deleting an id the server no longer knows is
    /// rejected as not-found; the operation is not idempotent.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = self.delete_inner(id).await;
        if result.is_ok() {
            self.bus
                .emit(AppEvent::notify(NoticeLevel::Success, "Travel plan deleted"));
        }
        result
    }

    /// Sequential batch delete: not atomic. A failure partway leaves the
    /// earlier deletions committed and the rest unattempted.
    pub async fn batch_delete(&self, ids: &[String]) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.loading.batch = true;
        }

        let mut outcome = Ok(());
        for id in ids {
            if let Err(error) = self.delete_inner(id).await {
                outcome = Err(error);
                break;
            }
        }

        {
            let mut state = self.state.write().await;
            state.loading.batch = false;
        }
        if outcome.is_ok() {
            self.bus.emit(AppEvent::notify(
                NoticeLevel::Success,
                format!("Deleted {} travel plans", ids.len()),
            ));
        }
        outcome
    }

    async fn delete_inner(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.loading.delete = true;
        }

        let result: Result<()> = self.api.delete(&plans::item(id), Vec::new()).await;

        let mut state = self.state.write().await;
        state.loading.delete = false;
        match result {
            Ok(()) => {
                state.remove(id);
                drop(state);
                self.bus.emit(AppEvent::PlanDeleted { id: id.to_string() });
                Ok(())
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    /// Fetches the dashboard counters.
    pub async fn fetch_statistics(&self) -> Result<PlanStatistics> {
        {
            let mut state = self.state.write().await;
            state.loading.statistics = true;
        }

        let result: Result<PlanStatistics> =
            self.api.get(&plans::statistics(), Vec::new()).await;

        let mut state = self.state.write().await;
        state.loading.statistics = false;
        match result {
            Ok(statistics) => {
                drop(state);
                *self.statistics.write().await = statistics.clone();
                Ok(statistics)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    pub async fn statistics(&self) -> PlanStatistics {
        self.statistics.read().await.clone()
    }

    // ------------------------------------------------------------------
    // Derived views over the current page
    // ------------------------------------------------------------------

    pub async fn active_plans(&self) -> Vec<TravelPlan> {
        let state = self.state.read().await;
        state
            .list
            .iter()
            .filter(|plan| plan.status == PlanStatus::InProgress)
            .cloned()
            .collect()
    }

    pub async fn completed_plans(&self) -> Vec<TravelPlan> {
        let state = self.state.read().await;
        state
            .list
            .iter()
            .filter(|plan| plan.status == PlanStatus::Completed)
            .cloned()
            .collect()
    }

    /// Plans starting today or later, soonest first.
    pub async fn upcoming_plans(&self, today: NaiveDate) -> Vec<TravelPlan> {
        let state = self.state.read().await;
        let mut upcoming: Vec<TravelPlan> = state
            .list
            .iter()
            .filter(|plan| plan.is_upcoming(today))
            .cloned()
            .collect();
        upcoming.sort_by_key(|plan| plan.start_date);
        upcoming
    }

    pub async fn ongoing_plans(&self, today: NaiveDate) -> Vec<TravelPlan> {
        let state = self.state.read().await;
        state
            .list
            .iter()
            .filter(|plan| plan.is_ongoing(today))
            .cloned()
            .collect()
    }

    /// Drops everything, e.g. on logout.
    pub async fn clear(&self) {
        self.state.write().await.clear();
        *self.statistics.write().await = PlanStatistics::default();
    }
}
