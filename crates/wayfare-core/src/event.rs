//! Typed application events published on the [`crate::bus::EventBus`].
//!
//! Payloads are tagged variants rather than untyped argument lists, so a
//! handler registered for [`EventKind::PlanCreated`] is statically known to
//! receive the created plan.

use serde::{Deserialize, Serialize};
use strum_macros::EnumDiscriminants;

use crate::model::{Expense, ItineraryItem, TravelPlan, User};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogoutReason {
    /// The user asked to sign out.
    UserInitiated,
    /// The backend rejected the session (401 / not-logged-in envelope).
    SessionExpired,
    /// The silent refresh exchange failed.
    RefreshFailed,
}

/// Which layer a failed request died in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No response reached the client.
    Transport,
    /// The server answered with a 4xx/5xx status.
    Http,
    /// HTTP 200 carrying an application-level failure envelope.
    Envelope,
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Events crossing module boundaries.
///
/// Emission is decoupled from reaction: stores and the auth manager publish,
/// and any interested component (global toast chrome, navigation glue,
/// another store) subscribes without the emitter knowing.
#[derive(Debug, Clone, EnumDiscriminants)]
#[strum_discriminants(name(EventKind), derive(Hash))]
pub enum AppEvent {
    // Auth lifecycle
    LoginSuccess { user: User },
    RegisterSuccess { user: User },
    Logout { reason: LogoutReason },
    /// The backend no longer accepts the current token.
    SessionExpired,
    ProfileUpdated { user: User },

    // Travel plans
    PlanCreated { plan: TravelPlan },
    PlanUpdated { plan: TravelPlan },
    PlanDeleted { id: String },

    // Itineraries
    ItineraryCreated { item: ItineraryItem },
    ItineraryUpdated { item: ItineraryItem },
    ItineraryDeleted { id: String },
    ItineraryReordered { plan_id: String },

    // Expenses
    ExpenseCreated { expense: Expense },
    ExpenseUpdated { expense: Expense },
    ExpenseDeleted { id: String },

    // Request pipeline
    RequestFailed { kind: FailureKind, message: String },

    // Global notification chrome
    Notify { level: NoticeLevel, message: String },
}

impl AppEvent {
    /// The discriminant used as the subscription key.
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }

    /// Shorthand for a toast-style notification event.
    pub fn notify(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self::Notify {
            level,
            message: message.into(),
        }
    }
}
