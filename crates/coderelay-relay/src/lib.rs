//! coderelay relay: the background side.
//!
//! Hosts the [`Router`] that receives captures from the page side, forwards
//! them to the relay endpoint through a reconnecting [`RelayClient`], mirrors
//! them to display subscribers and aggregates liveness into one status.

pub mod client;
pub mod destination;
pub mod router;

pub use client::{
    RelayClient, RelayEvent, RelayListener, RelaySink, ReconnectScheduler, TokioScheduler,
    TransportMachine,
};
pub use destination::{DestinationSource, Settings, SettingsFile, StaticDestination};
pub use router::{
    Router, RouterEvent, RouterHandle, RouterInbox, SessionId, SubscriberId, DEFAULT_SESSION,
};
