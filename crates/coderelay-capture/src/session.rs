//! Page session: the event loop that owns a document and its watcher.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use coderelay_core::config::INITIAL_SCAN_DELAY;
use coderelay_core::{CaptureBus, PageCommand};

use crate::dom::Document;
use crate::prompt::apply_command;
use crate::watcher::MutationWatcher;

/// A DOM edit applied inside the session.
pub type Mutation<D> = Box<dyn FnOnce(&mut D) + Send>;

/// Input delivered to a running page session.
pub enum PageInput<D> {
    /// Structural change to the page; observed like a mutation notification.
    Mutate(Mutation<D>),
    /// Command from the router.
    Command(PageCommand),
}

/// Runs a [`MutationWatcher`] over a document, one input at a time.
pub struct PageSession<D, B> {
    doc: D,
    watcher: MutationWatcher<B>,
    initial_scan_delay: Duration,
}

impl<D: Document, B: CaptureBus> PageSession<D, B> {
    pub fn new(doc: D, watcher: MutationWatcher<B>) -> Self {
        Self {
            doc,
            watcher,
            initial_scan_delay: INITIAL_SCAN_DELAY,
        }
    }

    pub fn with_initial_scan_delay(mut self, delay: Duration) -> Self {
        self.initial_scan_delay = delay;
        self
    }

    /// Process inputs until the sender side is dropped, then hand the
    /// document back.
    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<PageInput<D>>) -> D {
        // Changes made before subscribing are not notifications.
        self.doc.take_mutations();
        self.watcher.attach(&mut self.doc);

        let initial_scan = tokio::time::sleep(self.initial_scan_delay);
        tokio::pin!(initial_scan);
        let mut initial_scan_pending = true;

        loop {
            tokio::select! {
                _ = &mut initial_scan, if initial_scan_pending => {
                    initial_scan_pending = false;
                    self.watcher.initial_scan(&self.doc);
                }
                input = inputs.recv() => match input {
                    Some(PageInput::Mutate(mutate)) => {
                        mutate(&mut self.doc);
                        self.observe();
                    }
                    Some(PageInput::Command(command)) => {
                        let selectors = self.watcher.selectors().clone();
                        apply_command(&mut self.doc, &selectors, command);
                        self.observe();
                    }
                    None => break,
                },
            }
        }

        info!("Page session ended");
        self.doc
    }

    fn observe(&mut self) {
        let batch = self.doc.take_mutations();
        if batch.is_empty() {
            return;
        }
        let outcome = self.watcher.handle_batch(&mut self.doc, &batch);
        debug!("Mutation batch handled: {:?}", outcome);
    }
}
