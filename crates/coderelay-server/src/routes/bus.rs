//! Page bus over plain HTTP.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{debug, warn};

use coderelay_core::{BusMessage, CaptureBus};
use coderelay_relay::{SessionId, DEFAULT_SESSION};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bus", post(post_bus))
        .route("/session", post(open_session))
        .route("/session/{id}", delete(end_session))
}

#[derive(Debug, Deserialize)]
struct BusQuery {
    session: Option<SessionId>,
}

/// POST /api/bus?session=N: deliver one bus message, acknowledged
/// immediately. Capture ids are deduplicated within the session.
async fn post_bus(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BusQuery>,
    Json(message): Json<BusMessage>,
) -> impl IntoResponse {
    let bus = state
        .router
        .for_session(query.session.unwrap_or(DEFAULT_SESSION));
    match bus.publish(message) {
        Ok(ack) => (StatusCode::OK, Json(serde_json::to_value(ack).unwrap_or_default())),
        Err(e) => {
            warn!("Bus message not delivered: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    }
}

/// POST /api/session: allocate a session for a freshly loaded page.
async fn open_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.router.open_session();
    debug!("Opened bus session {}", session);
    Json(serde_json::json!({ "session": session }))
}

/// DELETE /api/session/{id}: forget the session's delivery ledgers.
async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session): Path<SessionId>,
) -> impl IntoResponse {
    match state.router.end_session(session) {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            warn!("Session {} end not delivered: {}", session, e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
