//! In-process page sessions.
//!
//! A host that owns the chat page (a webview shell, a headless browser
//! driver) embeds it here instead of speaking `/api/page`. The page's
//! watcher publishes under the page's own session and router commands are
//! fed back into the page loop.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use coderelay_capture::{Document, MutationWatcher, PageInput, PageSelectors, PageSession};
use coderelay_core::Result;
use coderelay_relay::{RouterHandle, SessionId};

/// A page session running next to the router.
pub struct EmbeddedPage<D> {
    session: SessionId,
    input: mpsc::UnboundedSender<PageInput<D>>,
    task: JoinHandle<Option<D>>,
}

impl<D: Document + Send + 'static> EmbeddedPage<D> {
    /// Attach `doc` to the router and start watching it.
    pub fn start(router: &RouterHandle, doc: D, selectors: PageSelectors) -> Result<Self> {
        let (session, mut commands) = router.attach_page()?;
        let watcher = MutationWatcher::new(router.for_session(session), selectors);
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let page = tokio::spawn(PageSession::new(doc, watcher).run(session_rx));

        let (input, mut inputs) = mpsc::unbounded_channel();
        let router = router.clone();
        let task = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    input = inputs.recv() => input,
                    command = commands.recv() => command.map(PageInput::Command),
                };
                let Some(next) = next else { break };
                if session_tx.send(next).is_err() {
                    break;
                }
            }
            drop(session_tx);
            let doc = page.await.ok();
            if let Err(e) = router.detach_page(session) {
                debug!("Page {} detach not delivered: {}", session, e);
            }
            doc
        });

        info!("Embedded page session {} started", session);
        Ok(Self {
            session,
            input,
            task,
        })
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Feed a DOM change into the page loop.
    pub fn send(&self, input: PageInput<D>) -> bool {
        self.input.send(input).is_ok()
    }

    /// End the session and hand the document back.
    pub async fn close(self) -> Option<D> {
        drop(self.input);
        self.task.await.ok().flatten()
    }
}
