//! Attaching the tester sink to the job graph.

use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use streamtap_core::TesterId;

use crate::topology::{JobTopology, NodeId, NodeParams, ObservedStream, TopologyError};

/// Node kind used for the tester sink in the job graph.
pub const TESTER_SINK_KIND: &str = "streamtap::TesterSink";

/// Sink parameter carrying the listener host.
pub const SINK_PARAM_HOST: &str = "host";

/// Sink parameter carrying the listener port.
pub const SINK_PARAM_PORT: &str = "port";

/// Where the job-side sink should send its tuples.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostInfo {
    pub host: String,
    pub port: u16,
}

impl HostInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Build from the listener's bound address, optionally advertising a
    /// different host name.
    pub fn for_listener(addr: SocketAddr, advertise_host: Option<&str>) -> Self {
        let host = advertise_host.map_or_else(|| addr.ip().to_string(), str::to_string);
        Self::new(host, addr.port())
    }

    /// The two parameters that cross into the job graph.
    pub fn to_params(&self) -> NodeParams {
        NodeParams::from([
            (SINK_PARAM_HOST.to_string(), Value::from(self.host.clone())),
            (SINK_PARAM_PORT.to_string(), Value::from(self.port)),
        ])
    }

    /// Read back from sink node parameters, as the job-side sink does.
    pub fn from_params(params: &NodeParams) -> Option<Self> {
        let host = params.get(SINK_PARAM_HOST)?.as_str()?;
        let port = params.get(SINK_PARAM_PORT)?.as_u64()?;
        Some(Self::new(host, u16::try_from(port).ok()?))
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// The single tester sink attached to a job graph for one bridge lifetime.
///
/// Tester ids are the sink's input-port numbers, so they are only stable
/// within one wiring.
#[derive(Debug, Clone)]
pub struct SinkWiring {
    host_info: HostInfo,
    node: NodeId,
}

impl SinkWiring {
    /// Add the sink node to `topology`, parameterised with `host_info`.
    pub fn attach<T>(topology: &mut T, host_info: HostInfo) -> Result<Self, TopologyError>
    where
        T: JobTopology + ?Sized,
    {
        let node = topology.add_sink(TESTER_SINK_KIND, host_info.to_params())?;
        info!(node = %node, sink = %host_info, "Tester sink attached");
        Ok(Self { host_info, node })
    }

    /// Connect `stream` to the sink; the resulting port is its tester id.
    pub fn connect<T>(
        &self,
        topology: &mut T,
        stream: &ObservedStream,
    ) -> Result<TesterId, TopologyError>
    where
        T: JobTopology + ?Sized,
    {
        let port = topology.connect(stream, self.node)?;
        debug!(stream = %stream, tester_id = port, "Stream connected to tester sink");
        Ok(port)
    }

    pub const fn host_info(&self) -> &HostInfo {
        &self.host_info
    }

    pub const fn node(&self) -> NodeId {
        self.node
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_helpers::{int_schema, topology_with};
    use crate::topology::JobGraph;

    #[test]
    fn host_info_round_trips_through_params() {
        let info = HostInfo::new("127.0.0.1", 40_123);
        let params = info.to_params();
        assert_eq!(params.len(), 2);
        assert_eq!(params[SINK_PARAM_HOST], Value::from("127.0.0.1"));
        assert_eq!(params[SINK_PARAM_PORT], Value::from(40_123));
        assert_eq!(HostInfo::from_params(&params), Some(info));
    }

    #[test]
    fn host_info_rejects_out_of_range_port() {
        let mut params = HostInfo::new("h", 1).to_params();
        params.insert(SINK_PARAM_PORT.into(), Value::from(70_000));
        assert_eq!(HostInfo::from_params(&params), None);
    }

    #[test]
    fn advertise_host_overrides_bound_ip() {
        let addr: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(HostInfo::for_listener(addr, None).host, "127.0.0.1");
        assert_eq!(HostInfo::for_listener(addr, Some("tester")).to_string(), "tester:5000");

        let v6: SocketAddr = "[::1]:5000".parse().unwrap();
        assert_eq!(HostInfo::for_listener(v6, None).to_string(), "[::1]:5000");
    }

    #[test]
    fn tester_ids_follow_port_order() {
        let (mut graph, streams) = topology_with(&["a", "b", "c"]);
        let wiring = SinkWiring::attach(&mut graph, HostInfo::new("localhost", 9)).unwrap();

        let ids: Vec<_> = streams
            .iter()
            .map(|s| wiring.connect(&mut graph, s).unwrap())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let sinks: Vec<_> = graph.nodes_of_kind(TESTER_SINK_KIND).collect();
        assert_eq!(sinks.len(), 1);
        assert_eq!(HostInfo::from_params(&sinks[0].params), Some(HostInfo::new("localhost", 9)));
    }

    #[test]
    fn connecting_undeclared_stream_fails() {
        let mut graph = JobGraph::new();
        let wiring = SinkWiring::attach(&mut graph, HostInfo::new("localhost", 9)).unwrap();
        let stray = ObservedStream::new("stray", int_schema());
        assert!(wiring.connect(&mut graph, &stray).is_err());
    }
}
