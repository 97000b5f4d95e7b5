use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when a healthy match store is installed, "degraded" otherwise.
    pub status: String,
}

impl HealthResponse {
    /// A store is installed and answered its last health check.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// The scheduler and admin actions are unavailable until storage returns.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
        }
    }
}
