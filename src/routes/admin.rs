use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::admin::{ForceResetQuery, ForceResetResponse, SchedulerStatusResponse, TickResponse},
    error::AppError,
    services::{remediation_service, scheduler_service},
    state::SharedState,
};

/// Operator endpoints acting on the match collection and the scheduler.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/matches/force-reset", post(force_reset))
        .route("/admin/matches/tick", post(trigger_tick))
        .route("/admin/scheduler", get(scheduler_status))
}

/// Reset every match to `open` and visible, whatever its current status.
#[utoipa::path(
    post,
    path = "/admin/matches/force-reset",
    tag = "admin",
    params(ForceResetQuery),
    responses(
        (status = 200, description = "All matches reset", body = ForceResetResponse),
        (status = 400, description = "Missing confirm=true"),
        (status = 500, description = "Storage failure"),
        (status = 503, description = "Storage not connected (degraded mode)")
    )
)]
pub async fn force_reset(
    State(state): State<SharedState>,
    Query(query): Query<ForceResetQuery>,
) -> Result<Json<ForceResetResponse>, AppError> {
    query.validate()?;
    let updated = remediation_service::force_reset(&state, query.confirm).await?;
    Ok(Json(ForceResetResponse::new(updated)))
}

/// Run one scheduler tick immediately.
#[utoipa::path(
    post,
    path = "/admin/matches/tick",
    tag = "admin",
    responses(
        (status = 200, description = "Tick completed", body = TickResponse),
        (status = 409, description = "A tick is already running"),
        (status = 500, description = "Storage failure"),
        (status = 503, description = "Storage not connected (degraded mode)")
    )
)]
pub async fn trigger_tick(
    State(state): State<SharedState>,
) -> Result<Json<TickResponse>, AppError> {
    let report = scheduler_service::trigger_tick(&state).await?;
    Ok(Json(TickResponse::from(&report)))
}

/// Scheduler configuration, counters, and the last tick outcome.
#[utoipa::path(
    get,
    path = "/admin/scheduler",
    tag = "admin",
    responses((status = 200, description = "Scheduler status", body = SchedulerStatusResponse))
)]
pub async fn scheduler_status(State(state): State<SharedState>) -> Json<SchedulerStatusResponse> {
    let status = state.scheduler().status().await;
    let config = state.config();
    Json(SchedulerStatusResponse::new(
        &status,
        config.tick_interval().as_secs(),
        config.expiry_threshold().as_secs() / 60,
        state.is_degraded(),
    ))
}
