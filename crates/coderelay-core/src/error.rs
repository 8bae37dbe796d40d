//! Error types for coderelay.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Relay not connected")]
    NotConnected,

    #[error("Destination not set")]
    DestinationUnset,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
