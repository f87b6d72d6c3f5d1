use crate::core::NodeValue;
use crate::core::error::BoxError;
use crate::plugin::Plugin;

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// The unit of work a graph node performs.
///
/// A node receives its aggregated input (the run seed, a single predecessor
/// result, or the ordered list of predecessor results) and either produces an
/// output or fails. Work may suspend on external I/O; the executor awaits it
/// before moving on to the next node.
///
/// Any `Fn(NodeValue) -> impl Future<Output = Result<NodeValue, BoxError>>`
/// closure is a `NodeWork`.
#[async_trait]
pub trait NodeWork: Send + Sync + 'static {
    async fn run(&self, input: NodeValue) -> Result<NodeValue, BoxError>;
}

#[async_trait]
impl<F, Fut> NodeWork for F
where
    F: Fn(NodeValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<NodeValue, BoxError>> + Send + 'static,
{
    async fn run(&self, input: NodeValue) -> Result<NodeValue, BoxError> {
        (self)(input).await
    }
}

/// Node work backed by a capability of a registered plugin.
#[derive(Clone)]
pub struct PluginWork {
    plugin: Arc<Plugin>,
    capability: String,
}

impl PluginWork {
    pub fn new(plugin: Arc<Plugin>, capability: impl Into<String>) -> Self {
        Self {
            plugin,
            capability: capability.into(),
        }
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }
}

#[async_trait]
impl NodeWork for PluginWork {
    async fn run(&self, input: NodeValue) -> Result<NodeValue, BoxError> {
        self.plugin.invoke(&self.capability, input).await
    }
}

/// A node owned by a [`Graph`](crate::core::graph::Graph).
///
/// Edges are stored as indices into the owning graph's node list, in the order
/// they were connected.
pub(crate) struct GraphNode {
    pub(crate) id: String,
    pub(crate) work: Box<dyn NodeWork>,
    pub(crate) incoming: Vec<usize>,
    pub(crate) outgoing: Vec<usize>,
}

impl GraphNode {
    pub(crate) fn new(id: String, work: Box<dyn NodeWork>) -> Self {
        Self {
            id,
            work,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub(crate) fn is_source(&self) -> bool {
        self.incoming.is_empty()
    }

    pub(crate) fn is_sink(&self) -> bool {
        self.outgoing.is_empty()
    }
}
