//! In-memory job topology.

use std::collections::HashMap;

use streamtap_core::Schema;

use super::{JobTopology, NodeId, NodeParams, ObservedStream, TopologyError};

/// A node recorded in a [`JobGraph`].
#[derive(Debug, Clone)]
pub struct JobNode {
    pub id: NodeId,
    pub kind: String,
    pub params: NodeParams,
    /// Connected streams, indexed by input port number.
    pub inputs: Vec<ObservedStream>,
}

/// Declarative job graph kept in memory.
///
/// Records declared streams and sink nodes. Input ports are numbered from 0
/// in connection order, per node.
#[derive(Debug, Default)]
pub struct JobGraph {
    streams: HashMap<String, ObservedStream>,
    nodes: Vec<JobNode>,
}

impl JobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a stream that can later be observed.
    pub fn add_stream(
        &mut self,
        name: &str,
        schema: Schema,
    ) -> Result<ObservedStream, TopologyError> {
        if self.streams.contains_key(name) {
            return Err(TopologyError::DuplicateStream(name.to_string()));
        }
        let stream = ObservedStream::new(name, schema);
        self.streams.insert(name.to_string(), stream.clone());
        Ok(stream)
    }

    pub fn stream(&self, name: &str) -> Option<&ObservedStream> {
        self.streams.get(name)
    }

    pub fn node(&self, id: NodeId) -> Option<&JobNode> {
        usize::try_from(id.0).ok().and_then(|i| self.nodes.get(i))
    }

    pub fn nodes(&self) -> &[JobNode] {
        &self.nodes
    }

    /// Nodes of the given kind.
    pub fn nodes_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a JobNode> + 'a {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }
}

impl JobTopology for JobGraph {
    fn add_sink(&mut self, kind: &str, params: NodeParams) -> Result<NodeId, TopologyError> {
        let id = u32::try_from(self.nodes.len())
            .map(NodeId)
            .map_err(|_| TopologyError::Rejected("too many nodes".into()))?;
        self.nodes.push(JobNode {
            id,
            kind: kind.to_string(),
            params,
            inputs: Vec::new(),
        });
        Ok(id)
    }

    fn connect(&mut self, stream: &ObservedStream, node: NodeId) -> Result<u32, TopologyError> {
        if !self.streams.contains_key(stream.name()) {
            return Err(TopologyError::UnknownStream(stream.name().to_string()));
        }
        let target = usize::try_from(node.0)
            .ok()
            .and_then(|i| self.nodes.get_mut(i))
            .ok_or(TopologyError::UnknownNode(node))?;
        if target.inputs.contains(stream) {
            return Err(TopologyError::AlreadyConnected {
                stream: stream.name().to_string(),
                node,
            });
        }
        let port =
            u32::try_from(target.inputs.len()).map_err(|_| TopologyError::PortsExhausted(node))?;
        target.inputs.push(stream.clone());
        Ok(port)
    }
}
