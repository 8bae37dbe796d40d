//! Runtime configuration and well-known constants.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Fixed delay between a transport drop and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Delay before the page side runs its one-off initial scan.
pub const INITIAL_SCAN_DELAY: Duration = Duration::from_secs(3);

/// Default relay endpoint (the local file-writing receiver).
pub const DEFAULT_RELAY_URL: &str = "ws://localhost:8765/";

/// Default bind address of the receiver.
pub const DEFAULT_RECEIVER_ADDR: &str = "127.0.0.1:8765";

/// Top-level configuration of the router host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP/WebSocket port the router host listens on.
    pub port: u16,
    /// WebSocket URL of the relay endpoint.
    pub relay_url: String,
    /// Directory holding `settings.json`.
    pub data_dir: PathBuf,
    /// Bind address used by `coderelay receiver`.
    pub receiver_addr: String,
}

impl RelayConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Result<Self> {
        let port = std::env::var("CODERELAY_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8766);

        let relay_url =
            std::env::var("CODERELAY_RELAY_URL").unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string());

        let data_dir = std::env::var("CODERELAY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let receiver_addr = std::env::var("CODERELAY_RECEIVER_ADDR")
            .unwrap_or_else(|_| DEFAULT_RECEIVER_ADDR.to_string());

        Self::with_data_dir(data_dir, port, relay_url, receiver_addr)
    }

    /// Build a configuration rooted at `data_dir`, creating it if needed.
    /// The relay endpoint must be a `ws://` or `wss://` URL.
    pub fn with_data_dir(
        data_dir: impl AsRef<Path>,
        port: u16,
        relay_url: String,
        receiver_addr: String,
    ) -> Result<Self> {
        if !(relay_url.starts_with("ws://") || relay_url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "relay endpoint must be a ws:// or wss:// URL, got {}",
                relay_url
            )));
        }
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self {
            port,
            relay_url,
            data_dir,
            receiver_addr,
        })
    }

    /// Path of the persisted settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_data_dir_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("data");
        let config = RelayConfig::with_data_dir(
            &root,
            9000,
            DEFAULT_RELAY_URL.to_string(),
            DEFAULT_RECEIVER_ADDR.to_string(),
        )
        .unwrap();

        assert!(root.is_dir());
        assert_eq!(config.port, 9000);
        assert_eq!(config.settings_file(), root.join("settings.json"));
    }

    #[test]
    fn test_relay_url_must_be_websocket() {
        let dir = tempfile::tempdir().unwrap();
        let result = RelayConfig::with_data_dir(
            dir.path(),
            9000,
            "http://localhost:8765/".to_string(),
            DEFAULT_RECEIVER_ADDR.to_string(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(RelayConfig::with_data_dir(
            dir.path(),
            9000,
            "wss://relay.example/".to_string(),
            DEFAULT_RECEIVER_ADDR.to_string(),
        )
        .is_ok());
    }
}
