//! Runtime state, per-stream tester records, and setup errors.

use std::fmt;

use streamtap_core::TesterId;

use crate::registry::RegistryError;
use crate::relay::{RelayGraphError, RelayInput, RelayOutput};
use crate::topology::{ObservedStream, TopologyError};

/// Lifecycle state of a [`TesterRuntime`](super::TesterRuntime).
///
/// Transitions only move forward:
/// `Uninitialized -> Finalized -> Running -> Shutdown`, or
/// `Uninitialized -> Failed` when finalize fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeState {
    Uninitialized,
    Finalized,
    Running,
    Shutdown,
    Failed,
}

impl RuntimeState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Finalized => "finalized",
            Self::Running => "running",
            Self::Shutdown => "shutdown",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed stream, as wired during finalize.
#[derive(Debug, Clone)]
pub struct StreamTester {
    /// Sink input port the stream was connected to.
    pub tester_id: TesterId,
    pub stream: ObservedStream,
    /// Relay node input fed by the listener.
    pub input: RelayInput,
    /// Relay node output the stream's observers are attached to.
    pub output: RelayOutput,
}

/// Why finalize failed. The runtime is left `Failed` unless the error is
/// [`AlreadyFinalized`](Self::AlreadyFinalized).
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("finalize may only be called once (runtime is {0})")]
    AlreadyFinalized(RuntimeState),

    #[error("No stream has an observer registered")]
    NoObservedStreams,

    #[error("Invalid configuration: {0}")]
    Config(#[source] streamtap_core::Error),

    #[error("Failed to bind tester listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("Job topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Tester id {0} assigned to more than one stream")]
    DuplicateTesterId(TesterId),

    #[error("Relay graph error: {0}")]
    RelayGraph(#[from] RelayGraphError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// An operation invoked in a state that does not allow it.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation}() called while {state}; expected {expected}")]
pub struct LifecycleViolation {
    pub operation: &'static str,
    pub state: RuntimeState,
    pub expected: RuntimeState,
}
