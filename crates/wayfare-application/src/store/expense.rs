//! Expense domain store, scoped to one travel plan at a time.
//!
//! Carries the uniform collection contract plus spending statistics and a
//! server-side batch create. Batch delete stays sequential per-id, matching
//! the collection contract: not atomic, aborts on the first failure.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::RwLock;
use wayfare_client::{ApiClient, endpoints::expenses};
use wayfare_core::bus::EventBus;
use wayfare_core::error::Result;
use wayfare_core::event::{AppEvent, NoticeLevel};
use wayfare_core::model::{Expense, ExpenseDraft, ExpenseStatistics};
use wayfare_core::page::{Page, PageQuery};

use super::collection::CollectionState;

/// State container for the expenses of the currently viewed plan.
#[derive(Clone)]
pub struct ExpenseStore {
    api: ApiClient,
    bus: EventBus,
    state: Arc<RwLock<CollectionState<Expense>>>,
    statistics: Arc<RwLock<ExpenseStatistics>>,
    active_plan: Arc<RwLock<Option<String>>>,
}

impl ExpenseStore {
    pub fn new(api: ApiClient, bus: EventBus) -> Self {
        Self {
            api,
            bus,
            state: Arc::new(RwLock::new(CollectionState::default())),
            statistics: Arc::new(RwLock::new(ExpenseStatistics::default())),
            active_plan: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn snapshot(&self) -> CollectionState<Expense> {
        self.state.read().await.clone()
    }

    pub async fn statistics(&self) -> ExpenseStatistics {
        self.statistics.read().await.clone()
    }

    pub async fn fetch_list(&self, plan_id: &str, query: PageQuery) -> Result<Vec<Expense>> {
        {
            let mut active = self.active_plan.write().await;
            if active.as_deref() != Some(plan_id) {
                self.state.write().await.clear();
                *self.statistics.write().await = ExpenseStatistics::default();
                *active = Some(plan_id.to_string());
            }
        }
        {
            let mut state = self.state.write().await;
            state.loading.list = true;
        }

        let result: Result<Page<Expense>> = self
            .api
            .get(&expenses::collection(plan_id), query.to_query())
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
    pub async fn fetch_detail(&self, plan_id: &str, id: &str) -> Result<Expense> {
        {
            let mut state = self.state.write().await;
            if let Some(expense) = state.cached(id).cloned() {
                state.current = Some(expense.clone());
                return Ok(expense);
            }
            state.loading.detail = true;
        }

        let result: Result<Expense> =
            self.api.get(&expenses::item(plan_id, id), Vec::new()).await;

        let mut state = self.state.write().await;
        state.loading.detail = false;
        match result {
            Ok(expense) => {
                state.select(expense.clone());
                Ok(expense)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    pub async fn create(&self, plan_id: &str, draft: ExpenseDraft) -> Result<Expense> {
        {
            let mut state = self.state.write().await;
            state.loading.create = true;
        }

        let result: Result<Expense> =
            self.api.post(&expenses::collection(plan_id), &draft).await;

        let mut state = self.state.write().await;
        state.loading.create = false;
        match result {
            Ok(expense) => {
                state.insert_created(expense.clone());
                drop(state);
                self.bus.emit(AppEvent::ExpenseCreated {
                    expense: expense.clone(),
                });
                self.bus
                    .emit(AppEvent::notify(NoticeLevel::Success, "Expense recorded"));
                Ok(expense)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    /// Creates several expenses in one request; the canonical records land
    /// at the head of the list in server order.
    pub async fn batch_create(
        &self,
        plan_id: &str,
        drafts: &[ExpenseDraft],
    ) -> Result<Vec<Expense>> {
        {
            let mut state = self.state.write().await;
            state.loading.batch = true;
        }

        let result: Result<Vec<Expense>> = self
            .api
            .post(&expenses::batch(plan_id), &json!({ "expenses": drafts }))
            .await;

        let mut state = self.state.write().await;
        state.loading.batch = false;
        match result {
            Ok(created) => {
                for expense in created.iter().rev() {
                    state.insert_created(expense.clone());
                }
                drop(state);
                for expense in &created {
                    self.bus.emit(AppEvent::ExpenseCreated {
                        expense: expense.clone(),
                    });
                }
                self.bus.emit(AppEvent::notify(
                    NoticeLevel::Success,
                    format!("Recorded {} expenses", created.len()),
                ));
                Ok(created)
            }
            Err(error) => {
                state.set_error(error.user_message());
                Err(error)
            }
        }
    }

    pub async fn update(&self, plan_id: &str, id: &str, draft: ExpenseDraft) -> Result<Expense> {
        {
            let mut state = self.state.write().await;
            state.loading.update = true;
        }

        let result: Result<Expense> =
            self.api.put(&expenses::item(plan_id, id), &draft).await;

        let mut state = self.state.write().await;
        state.loading.update = false;
        match result {
            Ok(expense) => {
                state.apply_updated(expense.clone());
                drop(state);
                self.bus.emit(AppEvent::ExpenseUpdated {
                    expense: expense.clone(),
                });
                Ok(expense)
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
            .delete(&expenses::item(plan_id, id), Vec::new())
            .await;

        let mut state = self.state.write().await;
        state.loading.delete = false;
        match result {
            Ok(()) => {
                state.remove(id);
                drop(state);
                self.bus.emit(AppEvent::ExpenseDeleted { id: id.to_string() });
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
                format!("Deleted {} expenses", ids.len()),
            ));
        }
        outcome
    }

    /// Fetches spending totals for the plan.
    pub async fn fetch_statistics(&self, plan_id: &str) -> Result<ExpenseStatistics> {
        {
            let mut state = self.state.write().await;
            state.loading.statistics = true;
        }

        let result: Result<ExpenseStatistics> = self
            .api
            .get(&expenses::statistics(plan_id), Vec::new())
            .await;

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

    /// Spending total over the currently listed page.
    pub async fn listed_total(&self) -> f64 {
        let state = self.state.read().await;
        state.list.iter().map(|expense| expense.amount).sum()
    }

    pub async fn clear(&self) {
        self.state.write().await.clear();
        *self.statistics.write().await = ExpenseStatistics::default();
        *self.active_plan.write().await = None;
    }
}
