// Local status endpoint handlers and routing.

use axum::extract::State as AxumState;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app::StatusState;

mod types;
pub use types::*;

pub fn router(status: StatusState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(get_status))
        .with_state(status)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

pub async fn status_snapshot(status: &StatusState) -> StatusResponse {
    let connection = *status.connection.borrow();
    let transitions = status.transitions.borrow().clone();
    let presence = *status.presence.borrow();
    let attributes = *status.attributes.borrow();
    StatusResponse {
        connection,
        transitions,
        presence,
        classifier: status.classifier.config_snapshot().await,
        attributes,
        stats: status.stats.snapshot(),
    }
}

async fn get_status(AxumState(status): AxumState<StatusState>) -> impl IntoResponse {
    Json(status_snapshot(&status).await)
}
