//! Itinerary domain store, scoped to one travel plan at a time.
//!
//! Same collection contract as the plan store, plus the ordering
//! operations: server-persisted reorder and batch update. Switching plans
//! clears the collection so itineraries of different plans never mix.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tokio::sync::RwLock;
use wayfare_client::{ApiClient, endpoints::itineraries};
use wayfare_core::bus::EventBus;
use wayfare_core::error::Result;
use wayfare_core::event::{AppEvent, NoticeLevel};
use wayfare_core::model::{ItineraryDraft, ItineraryItem, ReorderEntry};
use wayfare_core::page::{Page, PageQuery};

use super::collection::CollectionState;

/// State container for the itineraries of the currently viewed plan.
#[derive(Clone)]
pub struct ItineraryStore {
    api: ApiClient,
    bus: EventBus,
    state: Arc<RwLock<CollectionState<ItineraryItem>>>,
    active_plan: Arc<RwLock<Option<String>>>,
}

impl ItineraryStore {
    pub fn new(api: ApiClient, bus: EventBus) -> Self {
        Self {
            api,
            bus,
            state: Arc::new(RwLock::new(CollectionState::default())),
            active_plan: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn snapshot(&self) -> CollectionState<ItineraryItem> {
        self.state.read().await.clone()
    }

    pub async fn active_plan(&self) -> Option<String> {
        self.active_plan.read().await.clone()
    }

    /// Fetches the itinerary page for `plan_id`. A plan switch drops the
    /// previous plan's records before loading.
    pub async fn fetch_list(&self, plan_id: &str, query: PageQuery) -> Result<Vec<ItineraryItem>> {
        {
            let mut active = self.active_plan.write().await;
            if active.as_deref() != Some(plan_id) {
                self.state.write().await.clear();
                *active = Some(plan_id.to_string());
            }
        }
        {
            let mut state = self.state.write().await;
            state.loading.list = true;
        }

        let result: Result<Page<ItineraryItem>> = self
            .api
            .get(&itineraries::collection(plan_id), query.to_query())
            .await;

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

    /// Cache-first detail load.
    pub async fn fetch_detail(&self, plan_id: &str, id: &str) -> Result<ItineraryItem> {
        {
            let mut state = self.state.write().await;
            if let Some(item) = state.cached(id).cloned() {
                state.current = Some(item.clone());
                return Ok(item);
            }
            state.loading.detail = true;
        }

        let result: Result<ItineraryItem> =
            self.api.get(&itineraries::item(plan_id, id), Vec::new()).await;

        let mut state = self.state.write().await;
        state.loading.detail = false;
        match result {
            Ok(item) => {
                state.select(item.clone());
                Ok(item)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    pub async fn create(&self, plan_id: &str, draft: ItineraryDraft) -> Result<ItineraryItem> {
        {
            let mut state = self.state.write().await;
            state.loading.create = true;
        }

        let result: Result<ItineraryItem> = self
            .api
            .post(&itineraries::collection(plan_id), &draft)
            .await;

        let mut state = self.state.write().await;
        state.loading.create = false;
        match result {
            Ok(item) => {
                state.insert_created(item.clone());
                drop(state);
                self.bus.emit(AppEvent::ItineraryCreated { item: item.clone() });
                self.bus
                    .emit(AppEvent::notify(NoticeLevel::Success, "Activity added"));
                Ok(item)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    pub async fn update(
        &self,
        plan_id: &str,
        id: &str,
        draft: ItineraryDraft,
    ) -> Result<ItineraryItem> {
        {
            let mut state = self.state.write().await;
            state.loading.update = true;
        }

        let result: Result<ItineraryItem> =
            self.api.put(&itineraries::item(plan_id, id), &draft).await;

        let mut state = self.state.write().await;
        state.loading.update = false;
        match result {
            Ok(item) => {
                state.apply_updated(item.clone());
                drop(state);
                self.bus.emit(AppEvent::ItineraryUpdated { item: item.clone() });
                Ok(item)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    pub async fn delete(&self, plan_id: &str, id: &str) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.loading.delete = true;
        }

        let result: Result<()> = self
            .api
            .delete(&itineraries::item(plan_id, id), Vec::new())
            .await;

        let mut state = self.state.write().await;
        state.loading.delete = false;
        match result {
            Ok(()) => {
                state.remove(id);
                drop(state);
                self.bus.emit(AppEvent::ItineraryDeleted { id: id.to_string() });
                Ok(())
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    /// Sequential per-id deletes; not atomic, aborts on the first failure.
    pub async fn batch_delete(&self, plan_id: &str, ids: &[String]) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.loading.batch = true;
        }

        let mut outcome = Ok(());
        for id in ids {
            if let Err(error) = self.delete(plan_id, id).await {
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
                format!("Removed {} activities", ids.len()),
            ));
        }
        outcome
    }

    /// Pushes full replacement items in one request; the server answers
    /// with the canonical records, which replace the local copies in place.
    pub async fn batch_update(
        &self,
        plan_id: &str,
        items: &[ItineraryItem],
    ) -> Result<Vec<ItineraryItem>> {
        {
            let mut state = self.state.write().await;
            state.loading.batch = true;
        }

        let result: Result<Vec<ItineraryItem>> = self
            .api
            .put(&itineraries::batch(plan_id), &json!({ "itineraries": items }))
            .await;

        let mut state = self.state.write().await;
        state.loading.batch = false;
        match result {
            Ok(updated) => {
                for item in &updated {
                    state.apply_updated(item.clone());
                }
                drop(state);
                for item in &updated {
                    self.bus
                        .emit(AppEvent::ItineraryUpdated { item: item.clone() });
                }
                Ok(updated)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    /// Persists a new ordering; the server returns the reordered list,
    /// which replaces the local list wholesale.
    pub async fn reorder(
        &self,
        plan_id: &str,
        entries: &[ReorderEntry],
    ) -> Result<Vec<ItineraryItem>> {
        {
            let mut state = self.state.write().await;
            state.loading.update = true;
        }

        let result: Result<Vec<ItineraryItem>> = self
            .api
            .put(&itineraries::reorder(plan_id), &json!({ "orders": entries }))
            .await;

        let mut state = self.state.write().await;
        state.loading.update = false;
        match result {
            Ok(items) => {
                for item in &items {
                    state
                        .cache_by_id
                        .insert(item.id.clone(), item.clone());
                }
                state.list = items.clone();
                drop(state);
                self.bus.emit(AppEvent::ItineraryReordered {
                    plan_id: plan_id.to_string(),
                });
                Ok(items)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    /// The current page grouped by calendar day, each day sorted by start
    /// time.
    pub async fn grouped_by_day(&self) -> BTreeMap<NaiveDate, Vec<ItineraryItem>> {
        let state = self.state.read().await;
        let mut grouped: BTreeMap<NaiveDate, Vec<ItineraryItem>> = BTreeMap::new();
        for item in &state.list {
            grouped.entry(item.date).or_default().push(item.clone());
        }
        for day in grouped.values_mut() {
            day.sort_by_key(|item| item.start_time);
        }
        grouped
    }

    /// The current page as one chronological timeline.
    pub async fn timeline(&self) -> Vec<ItineraryItem> {
        let state = self.state.read().await;
        let mut items = state.list.clone();
        items.sort_by_key(|item| (item.date, item.start_time));
        items
    }

    pub async fn clear(&self) {
        self.state.write().await.clear();
        *self.active_plan.write().await = None;
    }
}
