//! Application container: explicit wiring of the state layer.
//!
//! Instead of module-level singletons, the whole client core is assembled
//! here and handed to the UI as one value: components read state through
//! the stores' snapshots, mutate only through store actions, and react
//! through the shared event bus.

use std::sync::Arc;
use std::time::Duration;

use wayfare_client::{ApiClient, HttpTransport};
use wayfare_core::bus::EventBus;
use wayfare_core::storage::KeyValueStore;
use wayfare_core::transport::Transport;
use wayfare_infrastructure::{AppConfig, ConfigService, JsonStore};

use crate::auth::{AuthManager, RefreshPolicy, SessionHandle};
use crate::store::{AssistantStore, ExpenseStore, ItineraryStore, PlanStore, UserStore};

/// The fully wired client core.
pub struct AppContainer {
    pub bus: EventBus,
    pub api: ApiClient,
    pub auth: Arc<AuthManager>,
    pub plans: PlanStore,
    pub itineraries: ItineraryStore,
    pub expenses: ExpenseStore,
    pub user: UserStore,
    pub assistant: AssistantStore,
}

impl AppContainer {
    /// Assembles the container from the platform config file, the default
    /// storage location, and a real HTTP transport.
    pub fn build() -> anyhow::Result<Self> {
        let config = ConfigService::new().get_config();
        let storage: Arc<dyn KeyValueStore> = Arc::new(JsonStore::default_location()?);
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(Duration::from_millis(
            config.api.timeout_ms,
        ))?);
        Ok(Self::build_with(config, storage, transport))
    }

    /// Assembles the container from explicit collaborators (tests inject
    /// an in-memory store and a fake transport here).
    pub fn build_with(
        config: AppConfig,
        storage: Arc<dyn KeyValueStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let bus = EventBus::new();
        let handle = SessionHandle::new();
        let api = ApiClient::new(
            transport,
            config.api.base_url.clone(),
            Arc::new(handle.clone()),
            bus.clone(),
        )
        .with_cache_busting(config.api.cache_busting);

        let policy = RefreshPolicy {
            check_interval: Duration::from_secs(config.auth.refresh_check_interval_secs),
            lead_time: chrono::Duration::seconds(config.auth.refresh_lead_time_secs as i64),
        };
        let auth = AuthManager::new(
            api.clone(),
            handle,
            storage.clone(),
            bus.clone(),
            policy,
        );
        auth.bind_session_expiry();

        Self {
            plans: PlanStore::new(api.clone(), bus.clone()),
            itineraries: ItineraryStore::new(api.clone(), bus.clone()),
            expenses: ExpenseStore::new(api.clone(), bus.clone()),
            user: UserStore::new(api.clone(), bus.clone(), storage),
            assistant: AssistantStore::new(api.clone(), bus.clone()),
            auth,
            api,
            bus,
        }
    }

    /// Restores persisted auth and profile state, then starts the silent
    /// refresh task. Call once at startup, inside a tokio runtime.
    pub async fn start(&self) -> bool {
        let restored = self.auth.restore().await;
        self.user.restore().await;
        self.auth.spawn_silent_refresh();
        restored
    }

    /// Drops all per-user state. Wire this to the `Logout` event or call it
    /// from the sign-out flow.
    pub async fn clear_user_state(&self) {
        self.plans.clear().await;
        self.itineraries.clear().await;
        self.expenses.clear().await;
        self.assistant.clear_conversation().await;
        self.user.reset().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{SeqTransport, records_page, sample_plan};
    use wayfare_core::page::PageQuery;
    use wayfare_infrastructure::MemoryStore;

    #[tokio::test]
    async fn test_container_wiring_shares_bus_and_session() {
        let transport = SeqTransport::replying(vec![SeqTransport::ok(
            200,
            records_page(&[sample_plan("p1", "Lisbon")]),
        )]);
        let container = AppContainer::build_with(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            transport,
        );

        container
            .plans
            .fetch_list(PageQuery::default())
            .await
            .unwrap();
        assert_eq!(container.plans.snapshot().await.list.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_user_state_empties_stores() {
        let transport = SeqTransport::replying(vec![SeqTransport::ok(
            200,
            records_page(&[sample_plan("p1", "Lisbon")]),
        )]);
        let container = AppContainer::build_with(
            AppConfig::default(),
            Arc::new(MemoryStore::new()),
            transport,
        );
        container
            .plans
            .fetch_list(PageQuery::default())
            .await
            .unwrap();

        container.clear_user_state().await;
        assert!(container.plans.snapshot().await.list.is_empty());
        assert_eq!(container.assistant.transcript().await.len(), 1);
    }
}
