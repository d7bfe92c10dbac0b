pub mod auth;
pub mod container;
pub mod store;

pub use auth::{AuthManager, AuthState, Credentials, RefreshPolicy, Registration, SessionHandle};
pub use container::AppContainer;
pub use store::{AssistantStore, ExpenseStore, ItineraryStore, PlanStore, UserStore};
