//! Relay client: one live WebSocket to the relay endpoint, reconnected
//! forever at a fixed interval.
//!
//! `send` never blocks and never queues: while the socket is not open the
//! message is dropped with a warning. Inbound frames are parsed into
//! [`InboundMessage`]s; malformed frames are logged and discarded without
//! touching the connection.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use coderelay_core::config::RECONNECT_DELAY;
use coderelay_core::{Error, InboundMessage, OutboundMessage, Result, TransportState};

/// Something the client reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    State(TransportState),
    Inbound(InboundMessage),
}

/// Receives every state transition and inbound message.
pub trait RelayListener: Send + Sync + 'static {
    fn on_event(&self, event: RelayEvent);
}

impl RelayListener for mpsc::UnboundedSender<RelayEvent> {
    fn on_event(&self, event: RelayEvent) {
        if self.send(event).is_err() {
            debug!("Relay listener dropped");
        }
    }
}

/// Waits out the reconnect delay. Injectable so tests control the clock.
pub trait ReconnectScheduler: Send + Sync + 'static {
    fn delay(&self, period: Duration) -> BoxFuture<'static, ()>;
}

/// Real-time scheduler backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl ReconnectScheduler for TokioScheduler {
    fn delay(&self, period: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(period))
    }
}

/// Outbound half of the relay as seen by the router.
pub trait RelaySink: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<()>;
    fn state(&self) -> TransportState;
}

// ---------------------------------------------------------------
// Transport state machine
// ---------------------------------------------------------------

/// `Connecting -> Connected -> Disconnected -> (retry) -> Connecting`.
///
/// Each connection attempt gets a generation number. Events carrying an
/// older generation belong to an orphaned socket and are ignored, and only
/// the first fault of a socket schedules a reconnect.
#[derive(Debug, Clone)]
pub struct TransportMachine {
    state: TransportState,
    generation: u64,
    reconnect_pending: bool,
}

impl Default for TransportMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportMachine {
    pub fn new() -> Self {
        Self {
            state: TransportState::Connecting,
            generation: 1,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Socket `generation` opened. Returns true if the state changed.
    pub fn on_open(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != TransportState::Connecting {
            return false;
        }
        self.state = TransportState::Connected;
        true
    }

    /// Socket `generation` errored or closed. Returns true if a reconnect
    /// must be scheduled.
    pub fn on_fault(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.reconnect_pending {
            return false;
        }
        self.state = TransportState::Disconnected;
        self.reconnect_pending = true;
        true
    }

    /// Reconnect delay elapsed: start a fresh attempt and return its
    /// generation.
    pub fn on_retry(&mut self) -> u64 {
        self.reconnect_pending = false;
        self.generation += 1;
        self.state = TransportState::Connecting;
        self.generation
    }
}

// ---------------------------------------------------------------
// Client
// ---------------------------------------------------------------

struct Shared {
    state: RwLock<TransportState>,
    outbound: RwLock<Option<mpsc::UnboundedSender<String>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the background connection task. Cheap to clone.
#[derive(Clone)]
pub struct RelayClient {
    url: String,
    shared: Arc<Shared>,
}

impl RelayClient {
    /// Start connecting to `url` with the standard reconnect delay.
    pub fn spawn(
        url: impl Into<String>,
        listener: impl RelayListener,
        scheduler: Arc<dyn ReconnectScheduler>,
    ) -> Self {
        Self::spawn_with_delay(url, listener, scheduler, RECONNECT_DELAY)
    }

    pub fn spawn_with_delay(
        url: impl Into<String>,
        listener: impl RelayListener,
        scheduler: Arc<dyn ReconnectScheduler>,
        reconnect_delay: Duration,
    ) -> Self {
        let url = url.into();
        let shared = Arc::new(Shared {
            state: RwLock::new(TransportState::Connecting),
            outbound: RwLock::new(None),
            task: Mutex::new(None),
        });

        let task = tokio::spawn(run_connection_loop(
            url.clone(),
            shared.clone(),
            Arc::new(listener),
            scheduler,
            reconnect_delay,
        ));
        *shared.task.lock() = Some(task);

        info!("Relay client started for {}", url);
        Self { url, shared }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the connection task. The client reports `Disconnected` after.
    pub fn shutdown(&self) {
        if let Some(task) = self.shared.task.lock().take() {
            task.abort();
        }
        *self.shared.outbound.write() = None;
        *self.shared.state.write() = TransportState::Disconnected;
        info!("Relay client for {} shut down", self.url);
    }
}

impl RelaySink for RelayClient {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        let outbound = self.shared.outbound.read();
        let tx = match outbound.as_ref() {
            Some(tx) if *self.shared.state.read() == TransportState::Connected => tx,
            _ => {
                warn!("Relay is not connected. Cannot send message.");
                return Err(Error::NotConnected);
            }
        };
        let text = serde_json::to_string(message)?;
        tx.send(text).map_err(|_| Error::NotConnected)?;
        debug!("Sent message to relay");
        Ok(())
    }

    fn state(&self) -> TransportState {
        *self.shared.state.read()
    }
}

/// Parse one inbound text frame.
pub fn parse_inbound(text: &str) -> Result<InboundMessage> {
    serde_json::from_str(text).map_err(|e| Error::Protocol(e.to_string()))
}

type RelayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Open one WebSocket to the relay endpoint.
pub async fn open_relay(url: &str) -> Result<RelayStream> {
    tokio_tungstenite::connect_async(url)
        .await
        .map(|(stream, _response)| stream)
        .map_err(|e| Error::Transport(e.to_string()))
}

fn set_state(shared: &Shared, listener: &dyn RelayListener, state: TransportState) {
    *shared.state.write() = state;
    listener.on_event(RelayEvent::State(state));
}

async fn run_connection_loop(
    url: String,
    shared: Arc<Shared>,
    listener: Arc<dyn RelayListener>,
    scheduler: Arc<dyn ReconnectScheduler>,
    reconnect_delay: Duration,
) {
    let mut machine = TransportMachine::new();
    loop {
        let generation = machine.generation();
        set_state(&shared, listener.as_ref(), TransportState::Connecting);

        match open_relay(&url).await {
            Ok(stream) => {
                if machine.on_open(generation) {
                    let (tx, rx) = mpsc::unbounded_channel();
                    *shared.outbound.write() = Some(tx);
                    set_state(&shared, listener.as_ref(), TransportState::Connected);
                    info!("Relay connection established");

                    let reason = pump(stream, rx, listener.as_ref()).await;
                    *shared.outbound.write() = None;
                    info!("Relay connection closed: {}", reason);
                }
            }
            Err(e) => warn!("Relay connection failed: {}", e),
        }

        if machine.on_fault(generation) {
            set_state(&shared, listener.as_ref(), TransportState::Disconnected);
        }
        scheduler.delay(reconnect_delay).await;
        machine.on_retry();
    }
}

async fn pump(
    stream: RelayStream,
    mut outbound: mpsc::UnboundedReceiver<String>,
    listener: &dyn RelayListener,
) -> String {
    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        return format!("send failed: {}", e);
                    }
                }
                None => return "client dropped".to_string(),
            },
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!("Message received from relay: {}", text);
                    match parse_inbound(&text) {
                        Ok(message) => listener.on_event(RelayEvent::Inbound(message)),
                        Err(e) => warn!("Error parsing relay message: {}", e),
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    return match frame {
                        Some(f) => format!("code {}, reason {}", u16::from(f.code), f.reason),
                        None => "no close frame".to_string(),
                    };
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return format!("error: {}", e),
                None => return "stream ended".to_string(),
            },
        }
    }
}
