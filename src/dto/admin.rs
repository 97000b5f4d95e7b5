//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::{SchedulerStatus, TickReport},
};

/// Query string accepted by the force-reset endpoint.
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct ForceResetQuery {
    /// Must be `true`; the reset rewrites every match document.
    #[serde(default)]
    #[validate(custom(function = "crate::dto::validation::validate_confirmed"))]
    pub confirm: bool,
}

/// Acknowledgement returned after a force reset.
#[derive(Debug, Serialize, ToSchema)]
pub struct ForceResetResponse {
    /// Human-readable confirmation.
    pub message: String,
    /// Number of match documents restored to `open` and visible.
    pub updated: usize,
}

impl ForceResetResponse {
    /// Acknowledge a reset of `updated` documents.
    pub fn new(updated: usize) -> Self {
        Self {
            message: "all matches reset to open and visible".into(),
            updated,
        }
    }
}

/// Summary of one scheduler tick.
#[derive(Debug, Serialize, ToSchema)]
pub struct TickResponse {
    /// RFC 3339 timestamp the tick evaluated matches against.
    pub evaluated_at: String,
    /// Matches moved from `open` to `live`.
    pub activated: usize,
    /// Matches moved from `live` to `expired`.
    pub expired: usize,
    /// Candidates left untouched because they have no start time.
    pub skipped_without_start: usize,
    /// Candidate documents that could not be decoded and were left untouched.
    pub skipped_invalid: usize,
}

impl From<&TickReport> for TickResponse {
    fn from(report: &TickReport) -> Self {
        Self {
            evaluated_at: format_system_time(report.started_at),
            activated: report.activated,
            expired: report.expired,
            skipped_without_start: report.skipped_without_start,
            skipped_invalid: report.skipped_invalid,
        }
    }
}

/// Scheduler configuration and counters as exposed to operators.
#[derive(Debug, Serialize, ToSchema)]
pub struct SchedulerStatusResponse {
    /// Seconds between periodic ticks.
    pub tick_interval_secs: u64,
    /// Minutes after the start time at which a live match expires.
    pub expiry_threshold_minutes: u64,
    /// Ticks that committed their transitions.
    pub ticks_completed: u64,
    /// Ticks aborted by a storage error.
    pub ticks_failed: u64,
    /// Ticks dropped because another tick was still running.
    pub ticks_skipped: u64,
    /// True when no storage backend is installed.
    pub degraded: bool,
    /// Report of the last completed tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick: Option<TickResponse>,
    /// Message of the most recent failed tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// RFC 3339 timestamp of the most recent failed tick.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at: Option<String>,
}

impl SchedulerStatusResponse {
    /// Combine the scheduler counters with the configured cadence.
    pub fn new(
        status: &SchedulerStatus,
        tick_interval_secs: u64,
        expiry_threshold_minutes: u64,
        degraded: bool,
    ) -> Self {
        Self {
            tick_interval_secs,
            expiry_threshold_minutes,
            ticks_completed: status.ticks_completed,
            ticks_failed: status.ticks_failed,
            ticks_skipped: status.ticks_skipped,
            degraded,
            last_tick: status.last_report.as_ref().map(TickResponse::from),
            last_error: status.last_error.clone(),
            last_error_at: status.last_error_at.map(format_system_time),
        }
    }
}
