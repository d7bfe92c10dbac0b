//! Travel plan record and its lifecycle status.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::Record;

/// Lifecycle status of a travel plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl PlanStatus {
    /// The wire spelling used in query parameters.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// A travel plan as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelPlan {
    pub id: String,
    pub title: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default = "default_traveler_count")]
    pub traveler_count: u32,
    pub status: PlanStatus,
    #[serde(default)]
    pub preferences: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_traveler_count() -> u32 {
    1
}

impl Record for TravelPlan {
    fn id(&self) -> &str {
        &self.id
    }
}

impl TravelPlan {
    /// True when the plan has not finished and its date range covers `today`.
    pub fn is_ongoing(&self, today: NaiveDate) -> bool {
        self.status != PlanStatus::Completed
            && self.start_date <= today
            && today <= self.end_date
    }

    /// True when the plan starts on or after `today` and is not completed.
    pub fn is_upcoming(&self, today: NaiveDate) -> bool {
        self.status != PlanStatus::Completed && self.start_date >= today
    }
}

/// Mutable business fields sent on create/update.
///
/// The server assigns id and timestamps; this type carries everything the
/// client is allowed to set. `None` fields are omitted from the payload so
/// partial updates do not clobber server-side values.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traveler_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PlanStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<serde_json::Value>,
}

/// Aggregate plan counters shown on the dashboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatistics {
    #[serde(default)]
    pub total_plans: u64,
    #[serde(default)]
    pub active_plans: u64,
    #[serde(default)]
    pub completed_plans: u64,
    #[serde(default)]
    pub upcoming_plans: u64,
    #[serde(default)]
    pub total_days: u64,
}
