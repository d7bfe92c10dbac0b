//! Domain records held by the client-side stores.
//!
//! All ids are server-assigned strings; records are uniquely identified by
//! id within their collection. The [`Record`] trait is what the generic
//! collection state in the application layer keys its cache on.

pub mod expense;
pub mod itinerary;
pub mod plan;
pub mod user;

pub use expense::{Expense, ExpenseCategory, ExpenseDraft, ExpenseStatistics, PaymentMethod};
pub use itinerary::{ItineraryDraft, ItineraryItem, ReorderEntry};
pub use plan::{PlanDraft, PlanStatistics, PlanStatus, TravelPlan};
pub use user::{User, UserRole, UserSettings};

/// A record with a server-assigned identity.
pub trait Record: Clone + Send + Sync {
    /// The server-assigned id, unique within the record's collection.
    fn id(&self) -> &str;
}
