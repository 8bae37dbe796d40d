//! HTTP and WebSocket routes of the router host.

pub mod bus;
pub mod display;
pub mod page;
pub mod settings;
pub mod status;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(bus::routes())
        .merge(page::routes())
        .merge(display::routes())
        .merge(status::routes())
        .merge(settings::routes())
}
