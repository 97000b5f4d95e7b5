/// Chunked atomic commits of staged match updates.
pub mod batch_applier;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Operator-triggered reset of every match to its baseline.
pub mod remediation_service;
/// Periodic status transitions and the on-demand tick.
pub mod scheduler_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
