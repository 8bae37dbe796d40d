//! coderelay server: hosts the router and exposes it over HTTP/WebSocket.

pub mod embed;
pub mod routes;
pub mod state;

pub use embed::EmbeddedPage;
pub use routes::build_router;
pub use state::AppState;
