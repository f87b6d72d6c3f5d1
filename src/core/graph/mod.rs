//! The dependency graph executor.
//!
//! A [`Graph`] owns a set of nodes, each wrapping a [`NodeWork`], connected by
//! directed edges. Before anything runs the graph is validated (non-empty, has
//! a source, acyclic, has a sink) and ordered topologically; nodes then run one
//! at a time in that order. See [`Graph::run`] for the input aggregation and
//! failure rules.

pub mod executor;
pub mod node;
mod order;

pub use executor::{GraphOutput, GraphRun, NodeFailure, RunOptions};
pub use node::{NodeWork, PluginWork};

use crate::core::error::GraphError;
use crate::plugin::{Category, PluginRegistry, RegistryError};
use node::GraphNode;
use std::collections::HashMap;

/// A directed pipeline graph. Nodes are kept in insertion order.
#[derive(Default)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node under `id`.
    ///
    /// # Errors
    /// [`GraphError::DuplicateNode`] if `id` is already taken.
    pub fn add_node<W: NodeWork>(&mut self, id: impl Into<String>, work: W) -> Result<&mut Self, GraphError> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(GraphNode::new(id, Box::new(work)));
        Ok(self)
    }

    /// Adds a node whose work is `capability` of the plugin registered under
    /// (`category`, `name`).
    pub fn add_plugin_node(
        &mut self,
        id: impl Into<String>,
        registry: &PluginRegistry,
        category: Category,
        name: &str,
        capability: &str,
    ) -> Result<&mut Self, PluginNodeError> {
        let plugin = registry.get(category, name)?;
        Ok(self.add_node(id, PluginWork::new(plugin, capability))?)
    }

    /// Adds a directed edge `from -> to`.
    ///
    /// Self-loops are accepted here and rejected later by cycle detection.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<&mut Self, GraphError> {
        let from_idx = self.position(from)?;
        let to_idx = self.position(to)?;
        self.nodes[from_idx].outgoing.push(to_idx);
        self.nodes[to_idx].incoming.push(from_idx);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    /// Nodes without incoming edges, in insertion order.
    pub fn sources(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.is_source())
            .map(|n| n.id.as_str())
            .collect()
    }

    /// Nodes without outgoing edges, in insertion order.
    pub fn sinks(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|n| n.is_sink())
            .map(|n| n.id.as_str())
            .collect()
    }

    /// Ids of the direct predecessors of `id`, in connection order.
    pub fn predecessors(&self, id: &str) -> Result<Vec<&str>, GraphError> {
        let idx = self.position(id)?;
        Ok(self.nodes[idx]
            .incoming
            .iter()
            .map(|&p| self.nodes[p].id.as_str())
            .collect())
    }

    /// Ids of the direct dependents of `id`, in connection order.
    pub fn dependents(&self, id: &str) -> Result<Vec<&str>, GraphError> {
        let idx = self.position(id)?;
        Ok(self.dependents_of(idx))
    }

    /// Validates the graph structure.
    ///
    /// Checks, in order: at least one node, at least one source, no cycle,
    /// at least one sink.
    pub fn validate(&self) -> Result<(), GraphError> {
        self.checked_order().map(|_| ())
    }

    /// The order nodes will run in, after validation.
    pub fn topological_order(&self) -> Result<Vec<&str>, GraphError> {
        Ok(self
            .checked_order()?
            .into_iter()
            .map(|idx| self.nodes[idx].id.as_str())
            .collect())
    }

    pub(crate) fn checked_order(&self) -> Result<Vec<usize>, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::EmptyGraph);
        }
        if !self.nodes.iter().any(GraphNode::is_source) {
            return Err(GraphError::NoSourceNode);
        }
        let order = order::topological_order(&self.nodes)?;
        if !self.nodes.iter().any(GraphNode::is_sink) {
            return Err(GraphError::NoSinkNode);
        }
        Ok(order)
    }

    /// Direct dependents, deduplicated, in connection order.
    pub(crate) fn dependents_of(&self, idx: usize) -> Vec<&str> {
        let mut seen = Vec::new();
        for &succ in &self.nodes[idx].outgoing {
            let id = self.nodes[succ].id.as_str();
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        seen
    }

    fn position(&self, id: &str) -> Result<usize, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }
}

/// Failure to add a registry-backed node.
#[derive(Debug, thiserror::Error)]
pub enum PluginNodeError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NodeValue;
    use crate::core::error::BoxError;

    fn passthrough() -> impl NodeWork {
        |input: NodeValue| async move { Ok::<_, BoxError>(input) }
    }

    #[test]
    fn test_add_node_rejects_duplicates() {
        let mut graph = Graph::new();
        graph.add_node("load", passthrough()).unwrap();
        let err = graph.add_node("load", passthrough()).err().unwrap();
        assert!(matches!(err, GraphError::DuplicateNode(ref id) if id == "load"));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_connect_unknown_node() {
        let mut graph = Graph::new();
        graph.add_node("load", passthrough()).unwrap();
        let err = graph.connect("load", "embed").err().unwrap();
        assert!(matches!(err, GraphError::UnknownNode(ref id) if id == "embed"));
        let err = graph.connect("ghost", "load").err().unwrap();
        assert!(matches!(err, GraphError::UnknownNode(ref id) if id == "ghost"));
    }

    #[test]
    fn test_self_loop_accepted_until_validation() {
        let mut graph = Graph::new();
        graph.add_node("a", passthrough()).unwrap();
        graph.add_node("b", passthrough()).unwrap();
        graph.connect("a", "b").unwrap();
        graph.connect("b", "b").unwrap();
        assert!(matches!(
            graph.validate(),
            Err(GraphError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_validate_empty_graph() {
        assert!(matches!(Graph::new().validate(), Err(GraphError::EmptyGraph)));
    }

    #[test]
    fn test_validate_no_source() {
        let mut graph = Graph::new();
        graph.add_node("a", passthrough()).unwrap();
        graph.add_node("b", passthrough()).unwrap();
        graph.connect("a", "b").unwrap().connect("b", "a").unwrap();
        assert!(matches!(graph.validate(), Err(GraphError::NoSourceNode)));
    }

    #[test]
    fn test_cycle_behind_a_source() {
        let mut graph = Graph::new();
        for id in ["start", "a", "b"] {
            graph.add_node(id, passthrough()).unwrap();
        }
        graph
            .connect("start", "a")
            .unwrap()
            .connect("a", "b")
            .unwrap()
            .connect("b", "a")
            .unwrap();
        match graph.validate() {
            Err(GraphError::CycleDetected { path }) => {
                assert_eq!(path.first(), path.last());
                assert!(path.contains(&"a".to_string()));
                assert!(path.contains(&"b".to_string()));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_sources_sinks_and_neighbours() {
        let mut graph = Graph::new();
        for id in ["load", "embed", "index", "audit"] {
            graph.add_node(id, passthrough()).unwrap();
        }
        graph
            .connect("load", "embed")
            .unwrap()
            .connect("embed", "index")
            .unwrap()
            .connect("load", "audit")
            .unwrap();

        assert_eq!(graph.sources(), vec!["load"]);
        assert_eq!(graph.sinks(), vec!["index", "audit"]);
        assert_eq!(graph.dependents("load").unwrap(), vec!["embed", "audit"]);
        assert_eq!(graph.predecessors("index").unwrap(), vec!["embed"]);
        assert_eq!(
            graph.topological_order().unwrap(),
            vec!["load", "embed", "index", "audit"]
        );
    }
}
