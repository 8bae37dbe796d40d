//! Shared application state.

use std::sync::Arc;

use tracing::info;

use coderelay_capture::{Document, PageSelectors};
use coderelay_core::{RelayConfig, Result};
use coderelay_relay::{RelayClient, Router, RouterHandle, SettingsFile, TokioScheduler};

use crate::embed::EmbeddedPage;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: RelayConfig,
    pub router: RouterHandle,
    pub relay: RelayClient,
    pub settings: SettingsFile,
}

impl AppState {
    /// Start the relay client and the router task. Must run inside a tokio
    /// runtime.
    pub fn start(config: RelayConfig) -> Self {
        let settings = SettingsFile::new(config.settings_file());
        let (router, inbox) = RouterHandle::channel();

        let relay = RelayClient::spawn(
            config.relay_url.clone(),
            router.clone(),
            Arc::new(TokioScheduler),
        );
        let switchboard = Router::new(Arc::new(relay.clone()), Arc::new(settings.clone()));
        tokio::spawn(switchboard.run(inbox));

        info!("Settings file: {}", settings.path().display());
        Self {
            config,
            router,
            relay,
            settings,
        }
    }

    /// Run a page owned by this process against the router.
    pub fn embed_page<D: Document + Send + 'static>(
        &self,
        doc: D,
        selectors: PageSelectors,
    ) -> Result<EmbeddedPage<D>> {
        EmbeddedPage::start(&self.router, doc, selectors)
    }

    /// Stop the relay connection task.
    pub fn shutdown(&self) {
        self.relay.shutdown();
    }
}
