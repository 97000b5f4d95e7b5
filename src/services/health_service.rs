use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether a healthy match store is installed, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let healthy = match state.require_match_store().await {
        Ok(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "match store health check failed");
                false
            }
        },
        Err(_) => {
            warn!("match store unavailable (degraded mode)");
            false
        }
    };

    if healthy && !state.is_degraded() {
        HealthResponse::ok()
    } else {
        HealthResponse::degraded()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::match_store::memory::MemoryMatchStore, state::AppState};

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, "degraded");
    }

    #[tokio::test]
    async fn reports_store_health() {
        let store = MemoryMatchStore::new();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;
        assert_eq!(health_status(&state).await.status, "ok");

        store.set_fail_queries(true);
        assert_eq!(health_status(&state).await.status, "degraded");
    }
}
