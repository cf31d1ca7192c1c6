//! Shutdown failure reporting.

use std::time::Duration;

/// Something that did not stop cleanly during shutdown.
///
/// Shutdown always attempts every step; failures are collected, not
/// short-circuited.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("Listener did not stop within {0:?}")]
    ListenerTimeout(Duration),

    #[error("Listener task panicked")]
    ListenerPanicked,

    #[error("{pending} relay node task(s) did not stop within {grace:?}")]
    RelayTimeout { pending: usize, grace: Duration },

    #[error("{0} relay node task(s) panicked")]
    RelayPanicked(usize),

    #[error("Multiple shutdown failures: {}", join(.0))]
    Multiple(Vec<ShutdownError>),
}

fn join(errors: &[ShutdownError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ShutdownError {
    /// Fold collected failures into a single result.
    pub fn collect(mut failures: Vec<Self>) -> Result<(), Self> {
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(Self::Multiple(failures)),
        }
    }
}
