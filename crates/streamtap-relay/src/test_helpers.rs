//! Shared test helpers for relay test modules.
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use streamtap_core::{BridgeConfig, Envelope, Schema, TesterId, Tuple};

use crate::listener::{DeliveryError, TupleDispatcher};
use crate::relay::{PreparedRelayGraph, RelayGraph, TupleInjector};
use crate::topology::{JobGraph, JobTopology, NodeId, NodeParams, ObservedStream, TopologyError};

pub fn int_schema() -> Schema {
    Schema::parse("tuple<int32 value>").unwrap()
}

/// `{"value": v}`.
pub fn tuple(v: i64) -> Tuple {
    Tuple::new(json!({ "value": v }))
}

/// Config with small channels and a short shutdown grace.
pub fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.relay.channel_capacity = 16;
    config.relay.shutdown_grace_ms = 1_000;
    config
}

/// A job graph with one `int_schema` stream per name.
pub fn topology_with(names: &[&str]) -> (JobGraph, Vec<ObservedStream>) {
    let mut graph = JobGraph::new();
    let streams = names
        .iter()
        .map(|name| graph.add_stream(name, int_schema()).unwrap())
        .collect();
    (graph, streams)
}

/// A prepared relay graph with `n` nodes and one injector per node.
///
/// Keep the graph alive or the injectors fail.
pub fn injectors(n: usize) -> (PreparedRelayGraph, Vec<TupleInjector>) {
    let mut graph = RelayGraph::new();
    let inputs: Vec<_> = (0..n)
        .map(|_| graph.add_relay(Arc::new(int_schema())).0)
        .collect();
    let prepared = graph.prepare(16).unwrap();
    let injectors = inputs
        .into_iter()
        .map(|input| prepared.injector(input).unwrap())
        .collect();
    (prepared, injectors)
}

/// Dispatcher that records envelopes for a fixed set of known ids.
pub struct RecordingDispatcher {
    known: HashSet<TesterId>,
    received: Mutex<Vec<(TesterId, Tuple)>>,
    count: watch::Sender<usize>,
}

impl RecordingDispatcher {
    pub fn new(known: &[TesterId]) -> Self {
        Self {
            known: known.iter().copied().collect(),
            received: Mutex::new(Vec::new()),
            count: watch::Sender::new(0),
        }
    }

    pub fn received(&self) -> Vec<(TesterId, Tuple)> {
        self.received.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        let mut rx = self.count.subscribe();
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|seen| *seen >= n)).await,
            Ok(Ok(_))
        )
    }
}

impl TupleDispatcher for RecordingDispatcher {
    async fn dispatch(&self, envelope: Envelope) -> Result<(), DeliveryError> {
        if !self.known.contains(&envelope.tester_id) {
            return Err(DeliveryError::UnknownTester(envelope.tester_id));
        }
        let len = {
            let mut received = self.received.lock().unwrap();
            received.push((envelope.tester_id, envelope.tuple));
            received.len()
        };
        self.count.send_replace(len);
        Ok(())
    }
}

/// Topology that accepts the sink but rejects every connection.
#[derive(Default)]
pub struct RejectingTopology {
    pub sinks: usize,
}

impl JobTopology for RejectingTopology {
    fn add_sink(&mut self, _kind: &str, _params: NodeParams) -> Result<NodeId, TopologyError> {
        self.sinks += 1;
        Ok(NodeId(0))
    }

    fn connect(&mut self, stream: &ObservedStream, _node: NodeId) -> Result<u32, TopologyError> {
        Err(TopologyError::Rejected(format!("no room for {stream}")))
    }
}

/// Topology that hands out port 0 for every connection.
#[derive(Default)]
pub struct SinglePortTopology;

impl JobTopology for SinglePortTopology {
    fn add_sink(&mut self, _kind: &str, _params: NodeParams) -> Result<NodeId, TopologyError> {
        Ok(NodeId(0))
    }

    fn connect(&mut self, _stream: &ObservedStream, _node: NodeId) -> Result<u32, TopologyError> {
        Ok(0)
    }
}
