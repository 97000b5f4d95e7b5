use utoipa::OpenApi;

/// Aggregated OpenAPI specification for the match lifecycle service.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::admin::force_reset,
        crate::routes::admin::trigger_tick,
        crate::routes::admin::scheduler_status,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::admin::ForceResetResponse,
            crate::dto::admin::TickResponse,
            crate::dto::admin::SchedulerStatusResponse,
            crate::dao::models::MatchStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "admin", description = "Operator actions on the match collection and scheduler"),
    )
)]
pub struct ApiDoc;
