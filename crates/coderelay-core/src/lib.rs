//! coderelay core: data model, wire messages, delivery ledger, config.

pub mod bus;
pub mod config;
pub mod error;
pub mod ledger;
pub mod messages;
pub mod paths;
pub mod telemetry;
pub mod types;

pub use bus::CaptureBus;
pub use config::RelayConfig;
pub use error::{Error, Result};
pub use ledger::DeliveryLedger;
pub use messages::*;
pub use types::*;
