//! Periodic job advancing match statuses, plus the on-demand tick used by the admin route.

use std::time::SystemTime;

use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, error, info, warn};

use crate::{
    dao::{match_store::MatchStore, models::{MatchStatus, MatchUpdate}},
    error::ServiceError,
    services::batch_applier,
    state::{SharedState, TickReport, lifecycle},
};

/// Result of asking the scheduler to run one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The tick evaluated candidates and committed the due transitions.
    Completed(TickReport),
    /// Another tick held the lease; nothing was read or written.
    Skipped,
}

/// Run one tick evaluated at `now`.
///
/// Open matches are read and staged first, then live matches; a match staged
/// `live` in this tick is only considered for expiry on the next one.
pub async fn run_tick(state: &SharedState, now: SystemTime) -> Result<TickOutcome, ServiceError> {
    let Some(_lease) = state.scheduler().try_acquire() else {
        state.scheduler().record_skip().await;
        return Ok(TickOutcome::Skipped);
    };

    match evaluate_and_commit(state, now).await {
        Ok(report) => {
            state.scheduler().record_success(report.clone()).await;
            Ok(TickOutcome::Completed(report))
        }
        Err(err) => {
            state.scheduler().record_failure(err.to_string(), now).await;
            Err(err)
        }
    }
}

/// Run a tick now on behalf of an HTTP caller; an in-flight tick is reported as busy.
pub async fn trigger_tick(state: &SharedState) -> Result<TickReport, ServiceError> {
    match run_tick(state, SystemTime::now()).await? {
        TickOutcome::Completed(report) => Ok(report),
        TickOutcome::Skipped => Err(ServiceError::Busy(
            "a scheduler tick is already running".into(),
        )),
    }
}

async fn evaluate_and_commit(
    state: &SharedState,
    now: SystemTime,
) -> Result<TickReport, ServiceError> {
    let store = state.require_match_store().await?;
    let threshold = state.config().expiry_threshold();

    let mut report = TickReport {
        started_at: now,
        activated: 0,
        expired: 0,
        skipped_without_start: 0,
        skipped_invalid: 0,
    };

    let mut updates =
        stage_transitions(store.as_ref(), MatchStatus::Open, now, threshold, &mut report).await?;
    report.activated = updates.len();

    let expiring =
        stage_transitions(store.as_ref(), MatchStatus::Live, now, threshold, &mut report).await?;
    report.expired = expiring.len();
    updates.extend(expiring);

    batch_applier::commit(store.as_ref(), updates).await?;
    Ok(report)
}

/// Query matches in `status` and stage the due transitions.
///
/// Candidates without a start time and undecodable documents are counted in
/// `report` and left untouched.
async fn stage_transitions(
    store: &dyn MatchStore,
    status: MatchStatus,
    now: SystemTime,
    threshold: std::time::Duration,
    report: &mut TickReport,
) -> Result<Vec<MatchUpdate>, ServiceError> {
    let scan = store.find_by_status(status).await?;
    for id in &scan.invalid {
        warn!(%id, %status, "skipping undecodable match document");
    }
    report.skipped_invalid += scan.invalid.len();
    report.skipped_without_start += scan
        .matches
        .iter()
        .filter(|entity| entity.date_time_start.is_none())
        .count();

    let updates = scan
        .matches
        .iter()
        .filter_map(|entity| lifecycle::staged_update(entity, now, threshold))
        .inspect(|update| debug!(id = %update.id, from = %status, "staging transition"))
        .collect();

    Ok(updates)
}

/// Drive [`run_tick`] on the configured cadence until `shutdown` flips to `true`.
///
/// Errors are logged and left for the next tick to retry.
pub async fn run(state: SharedState, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(state.config().tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        interval_secs = state.config().tick_interval().as_secs(),
        "match lifecycle scheduler started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("match lifecycle scheduler stopping");
                    break;
                }
                continue;
            }
        }

        match run_tick(&state, SystemTime::now()).await {
            Ok(TickOutcome::Completed(report)) if report.transitions() > 0 => info!(
                activated = report.activated,
                expired = report.expired,
                skipped_invalid = report.skipped_invalid,
                "match statuses updated"
            ),
            Ok(TickOutcome::Completed(report)) => debug!(
                skipped_without_start = report.skipped_without_start,
                skipped_invalid = report.skipped_invalid,
                "no match transition due"
            ),
            Ok(TickOutcome::Skipped) => warn!("previous tick still running; skipping"),
            Err(ServiceError::Degraded) => debug!("storage unavailable; tick skipped"),
            Err(err) => error!(error = %err, "scheduler tick failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::match_store::memory::MemoryMatchStore,
        state::AppState,
    };

    fn minutes(value: u64) -> Duration {
        Duration::from_secs(value * 60)
    }

    fn now() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    async fn setup() -> (SharedState, MemoryMatchStore) {
        let store = MemoryMatchStore::new();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;
        (state, store)
    }

    async fn status_of(store: &MemoryMatchStore, id: &str) -> MatchStatus {
        store.get(id).await.unwrap().status
    }

    fn completed(outcome: TickOutcome) -> TickReport {
        match outcome {
            TickOutcome::Completed(report) => report,
            TickOutcome::Skipped => panic!("tick unexpectedly skipped"),
        }
    }

    #[tokio::test]
    async fn tick_applies_due_transitions_only() {
        let (state, store) = setup().await;
        let started = store.insert(MatchStatus::Open, Some(now() - minutes(10)), true).await;
        let upcoming = store.insert(MatchStatus::Open, Some(now() + minutes(10)), true).await;
        let finished = store.insert(MatchStatus::Live, Some(now() - minutes(95)), true).await;
        let playing = store.insert(MatchStatus::Live, Some(now() - minutes(10)), true).await;
        let unscheduled = store.insert(MatchStatus::Open, None, true).await;

        let report = completed(run_tick(&state, now()).await.unwrap());

        assert_eq!(report.activated, 1);
        assert_eq!(report.expired, 1);
        assert_eq!(report.skipped_without_start, 1);
        assert_eq!(status_of(&store, &started).await, MatchStatus::Live);
        assert_eq!(status_of(&store, &upcoming).await, MatchStatus::Open);
        assert_eq!(status_of(&store, &finished).await, MatchStatus::Expired);
        assert_eq!(status_of(&store, &playing).await, MatchStatus::Live);
        assert_eq!(status_of(&store, &unscheduled).await, MatchStatus::Open);
    }

    #[tokio::test]
    async fn unreadable_document_does_not_block_due_matches() {
        let (state, store) = setup().await;
        store.insert_unreadable(MatchStatus::Open).await;
        store.insert_unreadable(MatchStatus::Live).await;
        let due = store.insert(MatchStatus::Open, Some(now() - minutes(10)), true).await;
        let over = store.insert(MatchStatus::Live, Some(now() - minutes(95)), true).await;

        let report = completed(run_tick(&state, now()).await.unwrap());

        assert_eq!(report.activated, 1);
        assert_eq!(report.expired, 1);
        assert_eq!(report.skipped_invalid, 2);
        assert_eq!(status_of(&store, &due).await, MatchStatus::Live);
        assert_eq!(status_of(&store, &over).await, MatchStatus::Expired);
        assert_eq!(state.scheduler().status().await.ticks_failed, 0);
    }

    #[tokio::test]
    async fn match_activated_this_tick_expires_on_the_next() {
        let (state, store) = setup().await;
        let stale = store.insert(MatchStatus::Open, Some(now() - minutes(200)), true).await;

        completed(run_tick(&state, now()).await.unwrap());
        assert_eq!(status_of(&store, &stale).await, MatchStatus::Live);

        completed(run_tick(&state, now()).await.unwrap());
        assert_eq!(status_of(&store, &stale).await, MatchStatus::Expired);
    }

    #[tokio::test]
    async fn repeated_tick_without_time_advance_is_a_no_op() {
        let (state, store) = setup().await;
        store.insert(MatchStatus::Open, Some(now() - minutes(10)), true).await;
        store.insert(MatchStatus::Live, Some(now() - minutes(95)), false).await;
        store.insert(MatchStatus::Open, Some(now() + minutes(5)), true).await;

        completed(run_tick(&state, now()).await.unwrap());
        let after_first = store.snapshot().await;

        let second = completed(run_tick(&state, now()).await.unwrap());
        assert_eq!(second.transitions(), 0);
        assert_eq!(store.snapshot().await, after_first);
    }

    #[tokio::test]
    async fn failed_commit_changes_no_candidate() {
        let (state, store) = setup().await;
        store.insert(MatchStatus::Open, Some(now() - minutes(10)), true).await;
        store.insert(MatchStatus::Live, Some(now() - minutes(95)), true).await;
        let before = store.snapshot().await;
        store.set_fail_commits(true);

        let err = run_tick(&state, now()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert_eq!(store.snapshot().await, before);

        let status = state.scheduler().status().await;
        assert_eq!(status.ticks_failed, 1);
        assert!(status.last_error.is_some());

        store.set_fail_commits(false);
        let report = completed(run_tick(&state, now()).await.unwrap());
        assert_eq!(report.transitions(), 2);
    }

    #[tokio::test]
    async fn failed_query_aborts_before_any_write() {
        let (state, store) = setup().await;
        store.insert(MatchStatus::Open, Some(now() - minutes(10)), true).await;
        store.set_fail_queries(true);

        assert!(run_tick(&state, now()).await.is_err());
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let (state, store) = setup().await;
        let id = store.insert(MatchStatus::Open, Some(now() - minutes(1)), true).await;

        let lease = state.scheduler().try_acquire();
        assert!(lease.is_some());
        assert_eq!(run_tick(&state, now()).await.unwrap(), TickOutcome::Skipped);
        assert!(matches!(
            trigger_tick(&state).await,
            Err(ServiceError::Busy(_))
        ));
        assert_eq!(status_of(&store, &id).await, MatchStatus::Open);
        drop(lease);

        assert_eq!(state.scheduler().status().await.ticks_skipped, 2);
    }

    #[tokio::test]
    async fn tick_without_store_reports_degraded() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            run_tick(&state, now()).await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn configured_threshold_drives_expiry() {
        let store = MemoryMatchStore::new();
        let config = AppConfig::default().with_expiry_threshold(minutes(130));
        let state = AppState::with_store(config, Arc::new(store.clone())).await;
        let live = store.insert(MatchStatus::Live, Some(now() - minutes(95)), true).await;

        completed(run_tick(&state, now()).await.unwrap());
        assert_eq!(status_of(&store, &live).await, MatchStatus::Live);
    }

    #[tokio::test]
    async fn run_loop_ticks_immediately_and_stops_on_shutdown() {
        let (state, store) = setup().await;
        let id = store
            .insert(
                MatchStatus::Open,
                Some(SystemTime::now() - minutes(1)),
                true,
            )
            .await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(state.clone(), shutdown_rx));
        for _ in 0..50 {
            if status_of(&store, &id).await == MatchStatus::Live {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status_of(&store, &id).await, MatchStatus::Live);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler loop did not stop")
            .unwrap();
    }
}
