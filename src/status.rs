//! REST endpoint for live bot counters.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::router::ConversationRouter;

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub sessions: usize,
    pub in_intake: usize,
    pub busy: usize,
    pub applications_submitted: u64,
    pub deliveries_failed: u64,
    pub applications_lost: u64,
}

impl StatusReport {
    pub async fn collect(router: &ConversationRouter) -> Self {
        let sessions = router.sessions().counts().await;
        let delivery = router.dispatcher().counts();
        Self {
            sessions: sessions.sessions,
            in_intake: sessions.in_intake,
            busy: sessions.busy,
            applications_submitted: delivery.applications_submitted,
            deliveries_failed: delivery.deliveries_failed,
            applications_lost: delivery.applications_lost,
        }
    }
}

/// Shared state for status routes.
#[derive(Clone)]
pub struct StatusRouteState {
    pub router: Arc<ConversationRouter>,
}

/// GET /api/status
async fn get_status(State(state): State<StatusRouteState>) -> impl IntoResponse {
    Json(StatusReport::collect(&state.router).await)
}

/// Build the status REST routes.
pub fn status_routes(state: StatusRouteState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .with_state(state)
}
