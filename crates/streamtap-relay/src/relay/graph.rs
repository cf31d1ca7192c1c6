//! Relay graph declaration and preparation.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use streamtap_core::{Schema, Tuple};

use super::executor::{RelayExecution, RelayNodeTask};
use super::observer::StreamObserver;

/// Input port of a relay node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayInput(usize);

/// Output port of a relay node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayOutput(usize);

impl RelayInput {
    pub const fn node(self) -> usize {
        self.0
    }
}

impl RelayOutput {
    pub const fn node(self) -> usize {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayGraphError {
    #[error("Relay graph has no nodes")]
    Empty,

    #[error("Relay channel capacity must be > 0")]
    ZeroCapacity,

    #[error("No relay node {0} in this graph")]
    UnknownNode(usize),
}

/// Pushing into a relay node whose task has stopped.
#[derive(Debug, thiserror::Error)]
#[error("Relay node {node} no longer accepts tuples")]
pub struct InjectError {
    pub node: usize,
}

/// Builder for the relay graph. Nodes can only be added before
/// [`prepare`](Self::prepare), which consumes the builder.
#[derive(Debug, Default)]
pub struct RelayGraph {
    schemas: Vec<Arc<Schema>>,
}

impl RelayGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pass-through node whose input and output carry `schema`.
    pub fn add_relay(&mut self, schema: Arc<Schema>) -> (RelayInput, RelayOutput) {
        let index = self.schemas.len();
        self.schemas.push(schema);
        (RelayInput(index), RelayOutput(index))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Freeze the graph and allocate each node's bounded input channel.
    pub fn prepare(self, channel_capacity: usize) -> Result<PreparedRelayGraph, RelayGraphError> {
        if self.schemas.is_empty() {
            return Err(RelayGraphError::Empty);
        }
        if channel_capacity == 0 {
            return Err(RelayGraphError::ZeroCapacity);
        }
        let nodes = self
            .schemas
            .into_iter()
            .map(|schema| {
                let (tx, rx) = mpsc::channel(channel_capacity);
                PreparedNode {
                    schema,
                    tx,
                    rx,
                    observers: Vec::new(),
                }
            })
            .collect();
        Ok(PreparedRelayGraph { nodes })
    }
}

struct PreparedNode {
    schema: Arc<Schema>,
    tx: mpsc::Sender<Tuple>,
    rx: mpsc::Receiver<Tuple>,
    observers: Vec<Arc<dyn StreamObserver>>,
}

/// A relay graph ready to execute. Observers and injectors are bound here.
pub struct PreparedRelayGraph {
    nodes: Vec<PreparedNode>,
}

impl PreparedRelayGraph {
    fn node_mut(&mut self, index: usize) -> Result<&mut PreparedNode, RelayGraphError> {
        self.nodes
            .get_mut(index)
            .ok_or(RelayGraphError::UnknownNode(index))
    }

    /// Handle for pushing tuples into a node's input.
    ///
    /// Tuples injected before [`execute`](Self::execute) are buffered up to
    /// the channel capacity.
    pub fn injector(&self, input: RelayInput) -> Result<TupleInjector, RelayGraphError> {
        let node = self
            .nodes
            .get(input.0)
            .ok_or(RelayGraphError::UnknownNode(input.0))?;
        Ok(TupleInjector {
            node: input.0,
            tx: node.tx.clone(),
        })
    }

    pub fn register_observer(
        &mut self,
        output: RelayOutput,
        observer: Arc<dyn StreamObserver>,
    ) -> Result<(), RelayGraphError> {
        self.node_mut(output.0)?.observers.push(observer);
        Ok(())
    }

    pub fn input_schema(&self, input: RelayInput) -> Option<&Schema> {
        self.nodes.get(input.0).map(|n| n.schema.as_ref())
    }

    pub fn output_schema(&self, output: RelayOutput) -> Option<&Schema> {
        self.nodes.get(output.0).map(|n| n.schema.as_ref())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Spawn one task per node on the current Tokio runtime.
    ///
    /// Returns immediately. Cancelling `cancel` stops every node before its
    /// next delivery.
    pub fn execute(self, cancel: CancellationToken) -> RelayExecution {
        let tasks = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(index, node)| {
                // The graph's own sender goes away here so a node's input
                // closes once every injector is dropped.
                drop(node.tx);
                RelayNodeTask {
                    index,
                    rx: node.rx,
                    observers: node.observers,
                }
            })
            .collect::<Vec<_>>();
        info!(nodes = tasks.len(), "Relay graph executing");
        RelayExecution::spawn(tasks, cancel)
    }
}

/// Delivery endpoint for one relay node's input.
#[derive(Debug, Clone)]
pub struct TupleInjector {
    node: usize,
    pub(super) tx: mpsc::Sender<Tuple>,
}

impl TupleInjector {
    /// Push a tuple, waiting for room if the node's input is full.
    pub async fn inject(&self, tuple: Tuple) -> Result<(), InjectError> {
        self.tx
            .send(tuple)
            .await
            .map_err(|_| InjectError { node: self.node })
    }

    pub const fn node(&self) -> usize {
        self.node
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_helpers::{int_schema, tuple};

    #[test]
    fn prepare_rejects_empty_graph_and_zero_capacity() {
        assert!(matches!(RelayGraph::new().prepare(8), Err(RelayGraphError::Empty)));

        let mut graph = RelayGraph::new();
        graph.add_relay(Arc::new(int_schema()));
        assert!(matches!(graph.prepare(0), Err(RelayGraphError::ZeroCapacity)));
    }

    #[test]
    fn node_ports_carry_stream_schema() {
        let schema = Arc::new(Schema::parse("tuple<rstring name, int64 n>").unwrap());
        let mut graph = RelayGraph::new();
        let (in0, out0) = graph.add_relay(Arc::new(int_schema()));
        let (in1, out1) = graph.add_relay(Arc::clone(&schema));
        assert_eq!((in1.node(), out1.node()), (1, 1));

        let prepared = graph.prepare(4).unwrap();
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared.input_schema(in0), Some(&int_schema()));
        assert_eq!(prepared.output_schema(out0), Some(&int_schema()));
        assert_eq!(prepared.input_schema(in1), Some(schema.as_ref()));
        assert_eq!(prepared.output_schema(out1), prepared.input_schema(in1));
    }

    #[test]
    fn unknown_ports_rejected() {
        let mut graph = RelayGraph::new();
        graph.add_relay(Arc::new(int_schema()));
        let mut prepared = graph.prepare(4).unwrap();

        assert!(matches!(
            prepared.injector(RelayInput(3)),
            Err(RelayGraphError::UnknownNode(3))
        ));
        assert!(matches!(
            prepared.register_observer(RelayOutput(3), Arc::new(|_: &Tuple| {})),
            Err(RelayGraphError::UnknownNode(3))
        ));
    }

    #[tokio::test]
    async fn injection_before_execute_is_buffered() {
        let mut graph = RelayGraph::new();
        let (input, _) = graph.add_relay(Arc::new(int_schema()));
        let prepared = graph.prepare(2).unwrap();
        let injector = prepared.injector(input).unwrap();

        injector.inject(tuple(1)).await.unwrap();
        injector.inject(tuple(2)).await.unwrap();
        assert_eq!(injector.node(), 0);
    }

    #[tokio::test]
    async fn inject_after_graph_dropped_fails() {
        let mut graph = RelayGraph::new();
        let (input, _) = graph.add_relay(Arc::new(int_schema()));
        let prepared = graph.prepare(2).unwrap();
        let injector = prepared.injector(input).unwrap();
        drop(prepared);

        let err = injector.inject(tuple(1)).await.unwrap_err();
        assert_eq!(err.node, 0);
    }
}
