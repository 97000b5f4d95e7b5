use axum::Router;

use crate::state::SharedState;

pub mod admin;
pub mod docs;
pub mod health;

/// Compose all route trees and bind the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(admin::router())
        .merge(docs::router())
        .with_state(state)
}
