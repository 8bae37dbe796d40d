//! The page side's view of the router.

use std::sync::Arc;

use crate::error::Result;
use crate::messages::{Ack, BusMessage};

/// Sink for events posted by the page-side detector.
///
/// `publish` must not block: it hands the message off and returns the
/// acknowledgement.
pub trait CaptureBus {
    fn publish(&self, message: BusMessage) -> Result<Ack>;
}

impl<T: CaptureBus + ?Sized> CaptureBus for Arc<T> {
    fn publish(&self, message: BusMessage) -> Result<Ack> {
        (**self).publish(message)
    }
}

impl<T: CaptureBus + ?Sized> CaptureBus for &T {
    fn publish(&self, message: BusMessage) -> Result<Ack> {
        (**self).publish(message)
    }
}
