//! Job-side sink: wiring it into the job topology, and the client the sink
//! uses to forward tuples back to the listener.

mod client;
mod wiring;

pub use client::{SinkClientError, TesterSinkClient};
pub use wiring::{HostInfo, SINK_PARAM_HOST, SINK_PARAM_PORT, SinkWiring, TESTER_SINK_KIND};
