//! Job topology seam.
//!
//! The job's own graph is owned by whatever builds and runs the job. The
//! relay only needs two things from it: add a parameterised sink node, and
//! connect an observed stream to that node's next input port.

mod graph;

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use streamtap_core::Schema;

pub use graph::{JobGraph, JobNode};

/// Parameters attached to a node in the job graph.
pub type NodeParams = BTreeMap<String, serde_json::Value>;

/// Identifier of a node within a job graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Immutable handle to a stream in the job graph.
///
/// Identity is the stream name; the schema travels with it.
#[derive(Debug, Clone)]
pub struct ObservedStream {
    name: Arc<str>,
    schema: Arc<Schema>,
}

impl ObservedStream {
    pub fn new(name: impl Into<Arc<str>>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(schema),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub const fn shared_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

impl PartialEq for ObservedStream {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ObservedStream {}

impl Hash for ObservedStream {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for ObservedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Operations the relay needs from the job's graph builder.
pub trait JobTopology {
    /// Add a node of `kind` configured with `params`.
    fn add_sink(&mut self, kind: &str, params: NodeParams) -> Result<NodeId, TopologyError>;

    /// Connect `stream` to the next free input port of `node`, returning
    /// the port number.
    fn connect(&mut self, stream: &ObservedStream, node: NodeId) -> Result<u32, TopologyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Stream not declared in this topology: {0}")]
    UnknownStream(String),

    #[error("Stream already declared: {0}")]
    DuplicateStream(String),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Stream {stream} already connected to {node}")]
    AlreadyConnected { stream: String, node: NodeId },

    #[error("Port space exhausted on {0}")]
    PortsExhausted(NodeId),

    #[error("Topology rejected the change: {0}")]
    Rejected(String),
}
