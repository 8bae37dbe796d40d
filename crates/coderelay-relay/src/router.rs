//! Router: the message switchboard of the background side.
//!
//! All state (ledgers, subscribers, liveness) is owned by one [`Router`] and
//! mutated only from its event loop, one event at a time. Other tasks talk to
//! it through a [`RouterHandle`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use coderelay_core::ledger::file_fingerprint;
use coderelay_core::paths::resolve_capture_path;
use coderelay_core::{
    Ack, BusMessage, CaptureBus, CaptureKind, CaptureRecord, DeliveryLedger, DisplayEvent,
    DisplaySnippet, Error, FilePush, InboundMessage, OutboundMessage, PageCommand, Result,
    StatusReply, StatusSnapshot, TransportState,
};

use crate::client::{RelayEvent, RelayListener, RelaySink};
use crate::destination::DestinationSource;

/// Identifier of a display subscriber or page session.
pub type SubscriberId = u64;

/// Scope of capture ids. Positional ids restart with every page load, so
/// each page session dedups against its own ledgers.
pub type SessionId = u64;

/// Session used by publishers that never opened one.
pub const DEFAULT_SESSION: SessionId = 0;

/// Everything the router reacts to.
#[derive(Debug)]
pub enum RouterEvent {
    /// Message from the page-side detector.
    Bus {
        session: SessionId,
        message: BusMessage,
    },
    /// The page behind `SessionId` is gone; its ledgers are dropped.
    SessionEnded(SessionId),
    SubscriberConnected {
        id: SubscriberId,
        sender: mpsc::UnboundedSender<DisplayEvent>,
    },
    SubscriberDisconnected(SubscriberId),
    PageConnected {
        id: SubscriberId,
        sender: mpsc::UnboundedSender<PageCommand>,
    },
    PageDisconnected(SubscriberId),
    /// Transport state change or inbound frame from the relay client.
    Relay(RelayEvent),
}

/// Capture ids already dispatched for one page session.
#[derive(Debug, Default)]
struct SessionLedgers {
    snippets: DeliveryLedger,
    responses: DeliveryLedger,
}

impl SessionLedgers {
    fn get(&self, kind: CaptureKind) -> &DeliveryLedger {
        match kind {
            CaptureKind::Snippet => &self.snippets,
            CaptureKind::Assistant => &self.responses,
        }
    }

    fn get_mut(&mut self, kind: CaptureKind) -> &mut DeliveryLedger {
        match kind {
            CaptureKind::Snippet => &mut self.snippets,
            CaptureKind::Assistant => &mut self.responses,
        }
    }
}

/// Central switchboard and liveness aggregator.
pub struct Router {
    relay: Arc<dyn RelaySink>,
    destination: Arc<dyn DestinationSource>,
    subscribers: BTreeMap<SubscriberId, mpsc::UnboundedSender<DisplayEvent>>,
    pages: BTreeMap<SubscriberId, mpsc::UnboundedSender<PageCommand>>,
    source_alive: bool,
    transport: TransportState,
    sessions: BTreeMap<SessionId, SessionLedgers>,
    file_ledger: DeliveryLedger<String>,
    status: Arc<RwLock<StatusSnapshot>>,
}

impl Router {
    pub fn new(relay: Arc<dyn RelaySink>, destination: Arc<dyn DestinationSource>) -> Self {
        let transport = relay.state();
        let snapshot = StatusSnapshot {
            source_active: false,
            relay_active: true,
            transport,
        };
        Self {
            relay,
            destination,
            subscribers: BTreeMap::new(),
            pages: BTreeMap::new(),
            source_alive: false,
            transport,
            sessions: BTreeMap::new(),
            file_ledger: DeliveryLedger::new(),
            status: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Current aggregated status.
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            source_active: self.source_alive,
            relay_active: true,
            transport: self.transport,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Ledger of `kind` for `session`, if that session has relayed anything.
    pub fn ledger(&self, session: SessionId, kind: CaptureKind) -> Option<&DeliveryLedger> {
        self.sessions.get(&session).map(|l| l.get(kind))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Handle one event to completion.
    pub fn dispatch(&mut self, event: RouterEvent) -> Ack {
        match event {
            RouterEvent::Bus { session, message } => self.handle_bus(session, message),
            RouterEvent::SessionEnded(session) => self.end_session(session),
            RouterEvent::SubscriberConnected { id, sender } => {
                self.subscribers.insert(id, sender);
                info!("Display subscriber {} connected", id);
                self.broadcast_status();
            }
            RouterEvent::SubscriberDisconnected(id) => {
                if self.subscribers.remove(&id).is_some() {
                    info!("Display subscriber {} disconnected", id);
                    self.broadcast_status();
                }
            }
            RouterEvent::PageConnected { id, sender } => {
                self.pages.insert(id, sender);
                info!("Page session {} connected", id);
            }
            RouterEvent::PageDisconnected(id) => {
                self.end_session(id);
                if self.pages.remove(&id).is_some() {
                    info!("Page session {} disconnected", id);
                    if self.pages.is_empty() {
                        self.set_source_alive(false);
                    }
                }
            }
            RouterEvent::Relay(RelayEvent::State(state)) => {
                if self.transport != state {
                    self.transport = state;
                    info!("Relay transport {}", state);
                    self.broadcast_status();
                }
            }
            RouterEvent::Relay(RelayEvent::Inbound(message)) => self.handle_inbound(message),
        }
        Ack::received()
    }

    /// Process events until every handle is dropped.
    pub async fn run(mut self, mut inbox: RouterInbox) -> Self {
        self.status = inbox.status;
        *self.status.write() = self.snapshot();
        info!("Router started");
        while let Some(event) = inbox.rx.recv().await {
            self.dispatch(event);
        }
        info!("Router stopped");
        self
    }

    // ---------------------------------------------------------------
    // Bus messages
    // ---------------------------------------------------------------

    fn handle_bus(&mut self, session: SessionId, message: BusMessage) {
        debug!("Bus message received from session {}: {}", session, message.name());
        match message {
            BusMessage::NewSnippets { snippets } => {
                self.relay_captures(session, snippets, CaptureKind::Snippet)
            }
            BusMessage::NewAssistantResponses { responses } => {
                self.relay_captures(session, responses, CaptureKind::Assistant)
            }
            BusMessage::Sync => self.handle_sync(),
            BusMessage::SendToChat { content } => self.send_to_chat(content),
            BusMessage::Alive => self.set_source_alive(true),
        }
    }

    fn end_session(&mut self, session: SessionId) {
        if self.sessions.remove(&session).is_some() {
            debug!("Ledgers of session {} dropped", session);
        }
    }

    fn resolve_destination(&self) -> Result<String> {
        self.destination.destination().ok_or(Error::DestinationUnset)
    }

    fn relay_captures(
        &mut self,
        session: SessionId,
        records: Vec<CaptureRecord>,
        kind: CaptureKind,
    ) {
        info!("Handling {} new {} records", records.len(), kind);
        let destination = match self.resolve_destination() {
            Ok(d) => d,
            Err(e) => {
                warn!("{}; skipping {} {} records", e, records.len(), kind);
                return;
            }
        };

        for record in records {
            let record = record.into_kind(kind);
            let ledger = self.sessions.entry(session).or_default().get(kind);
            if ledger.contains(record.id()) {
                debug!("{} ID {} already sent. Skipping.", kind, record.id());
                continue;
            }

            if record.file_path().is_none() {
                debug!(
                    "{} ID {} has no file path; using {}",
                    kind,
                    record.id(),
                    record.relative_path()
                );
            }
            let file_path = resolve_capture_path(&destination, &record.relative_path());

            let delivered = self.broadcast(DisplayEvent::DisplaySnippet {
                snippet: DisplaySnippet {
                    id: record.id().clone(),
                    kind,
                    content: record.content().to_string(),
                    file_path: file_path.clone(),
                },
            });
            debug!("{} ID {} mirrored to {} subscribers", kind, record.id(), delivered);

            info!("Sending {} ID {} to relay as {}", kind, record.id(), file_path);
            if let Err(e) = self.relay.send(&OutboundMessage::capture(&record, file_path)) {
                warn!("Relay dispatch failed for {} ID {}: {}", kind, record.id(), e);
            }

            self.sessions
                .entry(session)
                .or_default()
                .get_mut(kind)
                .mark(record.id().clone());
        }
    }

    fn handle_sync(&mut self) {
        info!("Received sync request");
        let destination = match self.resolve_destination() {
            Ok(d) => d,
            Err(e) => {
                warn!("{}; sync skipped", e);
                return;
            }
        };
        if self.relay.state() != TransportState::Connected {
            warn!("Relay is not connected; sync skipped");
            return;
        }
        if let Err(e) = self.relay.send(&OutboundMessage::sync(destination)) {
            warn!("Sync dispatch failed: {}", e);
        }
    }

    fn send_to_chat(&mut self, content: String) {
        if self.pages.is_empty() {
            warn!("No page session connected; SEND_TO_CHAT dropped");
            return;
        }
        for (id, page) in &self.pages {
            let command = PageCommand::AppendPrompt {
                message: content.clone(),
            };
            if page.send(command).is_err() {
                warn!("Page session {} unreachable", id);
            }
        }
    }

    fn set_source_alive(&mut self, alive: bool) {
        if self.source_alive != alive {
            self.source_alive = alive;
            info!("Source {}", if alive { "active" } else { "inactive" });
            self.broadcast_status();
        }
    }

    // ---------------------------------------------------------------
    // Relay inbound
    // ---------------------------------------------------------------

    fn handle_inbound(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::FileContent(FilePush {
                file_path, content, ..
            }) => {
                let key = file_fingerprint(&file_path, &content);
                if self.file_ledger.contains(&key) {
                    debug!("File {} unchanged since last push. Skipping.", file_path);
                    return;
                }
                info!("Received file content for path: {}", file_path);
                self.broadcast(DisplayEvent::DisplayFile { file_path, content });
                self.file_ledger.mark(key);
            }
            InboundMessage::Status(StatusReply::Success { id, saved_path }) => {
                info!(
                    "Capture ID {} saved to {}",
                    display_id(&id),
                    saved_path.as_deref().unwrap_or("?")
                );
            }
            InboundMessage::Status(StatusReply::Error { id, message }) => {
                warn!("Failed to save capture ID {}: {}", display_id(&id), message);
            }
        }
    }

    // ---------------------------------------------------------------
    // Fan-out
    // ---------------------------------------------------------------

    /// Send `event` to every subscriber; returns how many accepted it.
    fn broadcast(&self, event: DisplayEvent) -> usize {
        let mut delivered = 0;
        for (id, subscriber) in &self.subscribers {
            if subscriber.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!("Display subscriber {} unreachable", id);
            }
        }
        delivered
    }

    fn broadcast_status(&self) {
        let status = self.snapshot();
        *self.status.write() = status;
        self.broadcast(DisplayEvent::StatusUpdate { status });
    }
}

fn display_id(id: &Option<coderelay_core::CaptureId>) -> String {
    id.as_ref().map(|i| i.to_string()).unwrap_or_else(|| "-".to_string())
}

// ---------------------------------------------------------------
// Handle
// ---------------------------------------------------------------

/// Receiving end of a router's event channel.
pub struct RouterInbox {
    rx: mpsc::UnboundedReceiver<RouterEvent>,
    status: Arc<RwLock<StatusSnapshot>>,
}

/// Cloneable sender side of a running [`Router`].
#[derive(Clone)]
pub struct RouterHandle {
    tx: mpsc::UnboundedSender<RouterEvent>,
    session: SessionId,
    next_id: Arc<AtomicU64>,
    status: Arc<RwLock<StatusSnapshot>>,
}

impl RouterHandle {
    /// Create a handle and the inbox a [`Router`] will drain.
    pub fn channel() -> (Self, RouterInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(RwLock::new(StatusSnapshot {
            source_active: false,
            relay_active: true,
            transport: TransportState::Connecting,
        }));
        let handle = Self {
            tx,
            session: DEFAULT_SESSION,
            next_id: Arc::new(AtomicU64::new(1)),
            status: status.clone(),
        };
        (handle, RouterInbox { rx, status })
    }

    pub fn post(&self, event: RouterEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| Error::ChannelClosed("router".to_string()))
    }

    /// A handle whose bus messages belong to `session`.
    pub fn for_session(&self, session: SessionId) -> Self {
        Self {
            session,
            ..self.clone()
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Allocate a session id for a page that talks over plain requests.
    pub fn open_session(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn end_session(&self, session: SessionId) -> Result<()> {
        self.post(RouterEvent::SessionEnded(session))
    }

    /// Latest status published by the router.
    pub fn status(&self) -> StatusSnapshot {
        *self.status.read()
    }

    /// Register a display subscriber.
    pub fn subscribe_display(&self) -> Result<(SubscriberId, mpsc::UnboundedReceiver<DisplayEvent>)> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, rx) = mpsc::unbounded_channel();
        self.post(RouterEvent::SubscriberConnected { id, sender })?;
        Ok((id, rx))
    }

    pub fn unsubscribe_display(&self, id: SubscriberId) -> Result<()> {
        self.post(RouterEvent::SubscriberDisconnected(id))
    }

    /// Register a page session that accepts [`PageCommand`]s. The returned
    /// id doubles as its [`SessionId`].
    pub fn attach_page(&self) -> Result<(SubscriberId, mpsc::UnboundedReceiver<PageCommand>)> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, rx) = mpsc::unbounded_channel();
        self.post(RouterEvent::PageConnected { id, sender })?;
        Ok((id, rx))
    }

    pub fn detach_page(&self, id: SubscriberId) -> Result<()> {
        self.post(RouterEvent::PageDisconnected(id))
    }
}

impl CaptureBus for RouterHandle {
    fn publish(&self, message: BusMessage) -> Result<Ack> {
        self.post(RouterEvent::Bus {
            session: self.session,
            message,
        })?;
        Ok(Ack::received())
    }
}

impl RelayListener for RouterHandle {
    fn on_event(&self, event: RelayEvent) {
        if self.post(RouterEvent::Relay(event)).is_err() {
            debug!("Router gone; relay event dropped");
        }
    }
}
