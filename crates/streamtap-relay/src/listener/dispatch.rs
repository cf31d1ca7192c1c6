//! Dispatch seam between the listener and whoever owns the registry.

use std::future::Future;

use streamtap_core::{Envelope, TesterId};

/// Why a decoded envelope could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// No relay node is registered for this id.
    #[error("No tester registered for id {0}")]
    UnknownTester(TesterId),

    /// The relay node for this id has stopped.
    #[error("Relay node for tester {0} is closed")]
    RelayClosed(TesterId),
}

/// Receives every decoded envelope from the listener.
pub trait TupleDispatcher: Send + Sync + 'static {
    fn dispatch(
        &self,
        envelope: Envelope,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}
