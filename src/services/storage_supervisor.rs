use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{match_store::MatchStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a match store installed in the shared state.
///
/// While no store is reachable the state stays degraded and the scheduler
/// ticks are no-ops. Once connected the store is health-polled; a failing
/// store is given a few reconnect attempts before it is dropped and a fresh
/// connection is built with `connect`.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn MatchStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_match_store(store.clone()).await;
                info!("match store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                supervise(&state, store.as_ref()).await;

                state.clear_match_store().await;
                warn!("match store dropped; reconnecting from scratch");
            }
            Err(err) => warn!(error = %err, "match store connection attempt failed"),
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Poll `store` until it fails and cannot be revived.
async fn supervise(state: &SharedState, store: &dyn MatchStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.update_degraded(false) {
                    info!("match store healthy again; leaving degraded mode");
                }
            }
            Err(err) => {
                warn!(error = %err, "match store health check failed");
                if !reconnect(state, store).await {
                    warn!("exhausted reconnect attempts; staying in degraded mode");
                    return;
                }
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &dyn MatchStore) -> bool {
    let mut backoff = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "match store reconnected");
                state.update_degraded(false);
                return true;
            }
            Err(err) => {
                if state.update_degraded(true) {
                    warn!(attempt, error = %err, "reconnect failed; entering degraded mode");
                } else {
                    warn!(attempt, error = %err, "reconnect attempt failed");
                }
                sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_DELAY);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig, dao::match_store::memory::MemoryMatchStore, state::AppState,
    };

    #[tokio::test]
    async fn connected_store_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());

        let store = MemoryMatchStore::new();
        let handle = tokio::spawn(run(state.clone(), move || {
            let store = store.clone();
            async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn MatchStore>) }
        }));

        for _ in 0..50 {
            if !state.is_degraded() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(!state.is_degraded());
        assert!(state.match_store().await.is_some());
        handle.abort();
    }

    #[tokio::test]
    async fn failing_connection_keeps_state_degraded() {
        let state = AppState::new(AppConfig::default());
        let handle = tokio::spawn(run(state.clone(), || async {
            Err::<Arc<dyn MatchStore>, _>(StorageError::rejected("unreachable"))
        }));

        sleep(Duration::from_millis(50)).await;
        assert!(state.is_degraded());
        assert!(state.match_store().await.is_none());
        handle.abort();
    }
}
