//! Mutation watcher: turns DOM change batches into bus events.
//!
//! On every batch: toggle affordances are requested for newly added
//! collapsible code containers, then the stop indicator is sampled. On the
//! finished edge both capture streams are scanned and records missing from
//! the delivery ledgers are posted to the router, after which they are
//! recorded as sent.

use tracing::{debug, info, warn};

use coderelay_core::{BusMessage, CaptureBus, CaptureRecord, DeliveryLedger};

use crate::dom::{Document, MutationBatch, NodeId};
use crate::extractor::Extractor;
use crate::generation::{check_stopped, GenerationTracker};
use crate::selectors::PageSelectors;

/// Callback asked to attach a visibility toggle to a code container.
pub type ToggleHook = Box<dyn FnMut(NodeId) + Send>;

/// What one batch produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub toggles_requested: usize,
    pub finished: bool,
    pub snippets_sent: usize,
    pub responses_sent: usize,
}

/// Page-side detector driving [`Extractor`] and [`GenerationTracker`].
pub struct MutationWatcher<B> {
    extractor: Extractor,
    tracker: GenerationTracker,
    snippet_ledger: DeliveryLedger,
    response_ledger: DeliveryLedger,
    bus: B,
    toggle_hook: Option<ToggleHook>,
    attached: bool,
    initial_scan_done: bool,
}

impl<B: CaptureBus> MutationWatcher<B> {
    pub fn new(bus: B, selectors: PageSelectors) -> Self {
        Self {
            extractor: Extractor::new(selectors),
            tracker: GenerationTracker::new(),
            snippet_ledger: DeliveryLedger::new(),
            response_ledger: DeliveryLedger::new(),
            bus,
            toggle_hook: None,
            attached: false,
            initial_scan_done: false,
        }
    }

    pub fn with_toggle_hook(mut self, hook: ToggleHook) -> Self {
        self.toggle_hook = Some(hook);
        self
    }

    pub fn selectors(&self) -> &PageSelectors {
        self.extractor.selectors()
    }

    pub fn snippet_ledger(&self) -> &DeliveryLedger {
        &self.snippet_ledger
    }

    pub fn response_ledger(&self) -> &DeliveryLedger {
        &self.response_ledger
    }

    /// Subscribe to the document. Evaluates the page once; a second call is
    /// ignored.
    pub fn attach<D: Document + ?Sized>(&mut self, doc: &mut D) -> Option<BatchOutcome> {
        if self.attached {
            warn!("Mutation watcher already attached");
            return None;
        }
        self.attached = true;
        info!("Mutation watcher attached");
        Some(self.handle_batch(doc, &MutationBatch::default()))
    }

    /// One-off pass over content that existed before the watcher attached:
    /// requests toggles for collapsible code containers already on the page.
    pub fn initial_scan<D: Document + ?Sized>(&mut self, doc: &D) -> usize {
        if self.initial_scan_done {
            return 0;
        }
        self.initial_scan_done = true;
        info!("Initial check for existing elements");
        let containers = doc.query_all(&self.extractor.selectors().collapsible_code);
        for node in &containers {
            self.request_toggle(*node);
        }
        containers.len()
    }

    /// Process one batch of structural changes.
    pub fn handle_batch<D: Document + ?Sized>(
        &mut self,
        doc: &mut D,
        batch: &MutationBatch,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for node in &batch.added {
            if doc.matches(*node, &self.extractor.selectors().collapsible_code) {
                self.request_toggle(*node);
                outcome.toggles_requested += 1;
            }
        }

        let current = check_stopped(doc, self.extractor.selectors());
        outcome.finished = self.tracker.observe(current);
        debug!("Generation finished status: {}", outcome.finished);
        self.publish(BusMessage::Alive);

        if outcome.finished {
            outcome.snippets_sent = self.relay_snippets(doc);
            outcome.responses_sent = self.relay_responses(doc);
        }

        outcome
    }

    fn relay_snippets<D: Document + ?Sized>(&mut self, doc: &D) -> usize {
        let fresh = unsent(self.extractor.scan_snippets(doc), &self.snippet_ledger);
        if fresh.is_empty() {
            return 0;
        }
        let count = fresh.len();
        let ids: Vec<_> = fresh.iter().map(|r| r.id().clone()).collect();
        info!("Sending {} new snippets to router", count);
        self.publish(BusMessage::NewSnippets { snippets: fresh });
        for id in ids {
            self.snippet_ledger.mark(id);
        }
        count
    }

    fn relay_responses<D: Document + ?Sized>(&mut self, doc: &mut D) -> usize {
        let fresh = unsent(self.extractor.scan_responses(doc), &self.response_ledger);
        if fresh.is_empty() {
            return 0;
        }
        let count = fresh.len();
        let ids: Vec<_> = fresh.iter().map(|r| r.id().clone()).collect();
        info!("Sending {} new assistant responses to router", count);
        self.publish(BusMessage::NewAssistantResponses { responses: fresh });
        for id in ids {
            self.response_ledger.mark(id);
        }
        count
    }

    fn publish(&self, message: BusMessage) {
        let name = message.name();
        if let Err(e) = self.bus.publish(message) {
            warn!("Failed to post {} to router: {}", name, e);
        }
    }

    fn request_toggle(&mut self, node: NodeId) {
        if let Some(hook) = self.toggle_hook.as_mut() {
            hook(node);
        }
    }
}

fn unsent(records: Vec<CaptureRecord>, ledger: &DeliveryLedger) -> Vec<CaptureRecord> {
    records
        .into_iter()
        .filter(|r| !ledger.contains(r.id()))
        .collect()
}
