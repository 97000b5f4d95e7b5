use std::time::SystemTime;

use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Outcome of one scheduler tick that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Wall-clock time the tick evaluated matches against.
    pub started_at: SystemTime,
    /// Matches moved from `open` to `live`.
    pub activated: usize,
    /// Matches moved from `live` to `expired`.
    pub expired: usize,
    /// Candidates ignored because they carry no start time.
    pub skipped_without_start: usize,
    /// Stored documents in a candidate status that could not be decoded.
    pub skipped_invalid: usize,
}

impl TickReport {
    /// Total number of updates committed by the tick.
    pub fn transitions(&self) -> usize {
        self.activated + self.expired
    }
}

/// Counters and last outcome exposed by the scheduler status route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStatus {
    /// Ticks that reached the store and committed their transitions.
    pub ticks_completed: u64,
    /// Ticks aborted by a storage error.
    pub ticks_failed: u64,
    /// Ticks that found the lease held and did nothing.
    pub ticks_skipped: u64,
    /// Report of the most recent completed tick.
    pub last_report: Option<TickReport>,
    /// Message of the most recent failed tick; kept after later successes.
    pub last_error: Option<String>,
    pub last_error_at: Option<SystemTime>,
}

/// Scheduler sub-state carved out from [`super::AppState`].
///
/// The tick gate is the lease guaranteeing a single tick in flight per process.
#[derive(Default)]
pub struct SchedulerState {
    tick_gate: Mutex<()>,
    status: RwLock<SchedulerStatus>,
}

impl SchedulerState {
    /// Idle scheduler with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the tick lease, or `None` when another tick holds it.
    pub fn try_acquire(&self) -> Option<MutexGuard<'_, ()>> {
        self.tick_gate.try_lock().ok()
    }

    /// Copy of the current counters.
    pub async fn status(&self) -> SchedulerStatus {
        self.status.read().await.clone()
    }

    /// Count a completed tick and keep its report.
    pub async fn record_success(&self, report: TickReport) {
        let mut status = self.status.write().await;
        status.ticks_completed += 1;
        status.last_report = Some(report);
    }

    /// Count a failed tick and remember why it failed.
    pub async fn record_failure(&self, error: String, at: SystemTime) {
        let mut status = self.status.write().await;
        status.ticks_failed += 1;
        status.last_error = Some(error);
        status.last_error_at = Some(at);
    }

    /// Count a tick that found the lease held.
    pub async fn record_skip(&self) {
        self.status.write().await.ticks_skipped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_is_exclusive_until_released() {
        let state = SchedulerState::new();
        let guard = state.try_acquire();
        assert!(guard.is_some());
        assert!(state.try_acquire().is_none());
        drop(guard);
        assert!(state.try_acquire().is_some());
    }

    #[tokio::test]
    async fn outcomes_are_counted() {
        let state = SchedulerState::new();
        let report = TickReport {
            started_at: SystemTime::UNIX_EPOCH,
            activated: 2,
            expired: 1,
            skipped_without_start: 0,
            skipped_invalid: 0,
        };

        state.record_success(report.clone()).await;
        state
            .record_failure("boom".into(), SystemTime::UNIX_EPOCH)
            .await;
        state.record_skip().await;

        let status = state.status().await;
        assert_eq!(status.ticks_completed, 1);
        assert_eq!(status.ticks_failed, 1);
        assert_eq!(status.ticks_skipped, 1);
        assert_eq!(status.last_report.map(|r| r.transitions()), Some(3));
        assert_eq!(status.last_error.as_deref(), Some("boom"));
    }
}
