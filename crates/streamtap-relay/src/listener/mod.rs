//! TCP listener receiving envelopes from the job-side tester sink.
//!
//! Data flow:
//! ```text
//! TcpStream -> LineFramer -> decode_line -> TupleDispatcher::dispatch
//! ```
//!
//! The listener knows nothing about tester ids beyond what the dispatcher
//! tells it; unknown ids come back as [`DeliveryError::UnknownTester`],
//! which is logged and counted without dropping the connection.

mod dispatch;
mod frame;
mod server;

pub use dispatch::{DeliveryError, TupleDispatcher};
pub use server::{ListenerHandle, ListenerStats, TesterListener};
