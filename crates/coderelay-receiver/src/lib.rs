//! coderelay receiver: the relay endpoint.
//!
//! Accepts WebSocket connections, writes captures under the paths they name
//! and answers `SYNC` with one `FILE_CONTENT` frame per tracked file.

pub mod handler;
pub mod server;
pub mod store;

pub use handler::handle_text;
pub use server::{router, run, serve};
