//! REST endpoint paths consumed by the stores.
//!
//! Paths are relative to the configured API base URL. Travel plans own two
//! nested sub-resources (itineraries, expenses) with batch variants.

/// Auth and account endpoints.
pub mod auth {
    pub fn login() -> String {
        "/auth/login".to_string()
    }

    pub fn register() -> String {
        "/auth/register".to_string()
    }

    pub fn logout() -> String {
        "/auth/logout".to_string()
    }

    pub fn refresh() -> String {
        "/auth/refresh".to_string()
    }

    pub fn profile() -> String {
        "/auth/profile".to_string()
    }

    pub fn password() -> String {
        "/auth/password".to_string()
    }
}

/// Travel-plan endpoints.
pub mod plans {
    pub fn collection() -> String {
        "/travel-plans".to_string()
    }

    pub fn item(id: &str) -> String {
        format!("/travel-plans/{id}")
    }

    pub fn statistics() -> String {
        "/travel-plans/statistics".to_string()
    }
}

/// Itinerary endpoints, nested under their plan.
pub mod itineraries {
    pub fn collection(plan_id: &str) -> String {
        format!("/travel-plans/{plan_id}/itineraries")
    }

    pub fn item(plan_id: &str, id: &str) -> String {
        format!("/travel-plans/{plan_id}/itineraries/{id}")
    }

    pub fn batch(plan_id: &str) -> String {
        format!("/travel-plans/{plan_id}/itineraries/batch")
    }

    pub fn reorder(plan_id: &str) -> String {
        format!("/travel-plans/{plan_id}/itineraries/reorder")
    }
}

/// Expense endpoints, nested under their plan.
pub mod expenses {
    pub fn collection(plan_id: &str) -> String {
        format!("/travel-plans/{plan_id}/expenses")
    }

    pub fn item(plan_id: &str, id: &str) -> String {
        format!("/travel-plans/{plan_id}/expenses/{id}")
    }

    pub fn batch(plan_id: &str) -> String {
        format!("/travel-plans/{plan_id}/expenses/batch")
    }

    pub fn statistics(plan_id: &str) -> String {
        format!("/travel-plans/{plan_id}/expenses/statistics")
    }
}

/// Voice-assistant endpoints.
pub mod voice {
    pub fn process() -> String {
        "/voice/process".to_string()
    }

    pub fn history() -> String {
        "/voice/history".to_string()
    }
}

/// File upload endpoint.
pub fn upload_file() -> String {
    "/upload/file".to_string()
}
