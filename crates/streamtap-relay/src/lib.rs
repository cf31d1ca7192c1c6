//! streamtap Relay Library
//!
//! Lets test code observe tuples emitted by a data-flow job running
//! elsewhere:
//! - Sink wiring into the job topology (host/port parameters, tester ids)
//! - Local relay graph with one pass-through node per observed stream
//! - Correlation registry mapping tester ids to relay inputs
//! - TCP listener decoding sink envelopes and dispatching them
//! - `TesterRuntime` driving the finalize, start, shutdown lifecycle

pub mod listener;
pub mod orchestrator;
pub mod registry;
pub mod relay;
pub mod shutdown;
pub mod sink;
pub mod topology;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod test_helpers;

pub use orchestrator::{RuntimeState, SetupError, StreamTester, TesterRuntime};
pub use relay::{StreamObserver, StreamObservers, TupleCollector};
pub use shutdown::ShutdownError;
pub use sink::{HostInfo, TesterSinkClient};
pub use topology::{JobGraph, JobTopology, ObservedStream};
