//! Destination settings.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tracing::{info, warn};

use coderelay_relay::Settings;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/settings", get(get_settings).put(update_settings))
}

async fn get_settings(State(state): State<Arc<AppState>>) -> Json<Settings> {
    Json(state.settings.load())
}

/// PUT /api/settings: replace the destination. A blank value clears it.
async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Settings>,
) -> impl IntoResponse {
    let destination = body.destination.filter(|d| !d.trim().is_empty());
    match state.settings.set_destination(destination) {
        Ok(settings) => {
            info!(
                "Destination set to {}",
                settings.destination.as_deref().unwrap_or("(none)")
            );
            (StatusCode::OK, Json(serde_json::to_value(settings).unwrap_or_default()))
        }
        Err(e) => {
            warn!("Failed to save settings: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
        }
    }
}
