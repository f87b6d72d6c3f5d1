use crate::core::NodeValue;
use crate::core::error::{BoxError, GraphError};
use crate::core::graph::Graph;
use crate::core::telemetry::{NodeStatus, Telemetry, TraceEntry};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-run knobs for [`Graph::run`].
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Checked before each node and raced against every node's in-flight work.
    pub cancellation: Option<CancellationToken>,
    /// Receives one [`TraceEntry`] per executed node.
    pub telemetry: Option<Arc<dyn Telemetry>>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }
}

/// What a run hands back from its sink nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOutput {
    /// The graph has exactly one sink; this is its result.
    Single(NodeValue),
    /// The graph has several sinks; results keyed by sink id. Sinks whose
    /// work failed are absent.
    Multiple(BTreeMap<String, NodeValue>),
}

impl GraphOutput {
    pub fn as_single(&self) -> Option<&NodeValue> {
        match self {
            GraphOutput::Single(value) => Some(value),
            GraphOutput::Multiple(_) => None,
        }
    }

    /// Looks up a sink result. A single-sink output answers for any id.
    pub fn get(&self, sink: &str) -> Option<&NodeValue> {
        match self {
            GraphOutput::Single(value) => Some(value),
            GraphOutput::Multiple(map) => map.get(sink),
        }
    }

    /// Flattens the output into one value; several sinks become an object.
    pub fn into_value(self) -> NodeValue {
        match self {
            GraphOutput::Single(value) => value,
            GraphOutput::Multiple(map) => NodeValue::Object(map.into_iter().collect()),
        }
    }
}

/// A node whose work failed without starving anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub node: String,
    pub message: String,
}

/// The full report of one graph run.
#[derive(Debug, Clone)]
pub struct GraphRun {
    pub run_id: String,
    pub output: GraphOutput,
    /// Node ids in the order they ran.
    pub executed: Vec<String>,
    /// Non-fatal failures of nodes that had no dependents.
    pub failures: Vec<NodeFailure>,
}

impl Graph {
    /// Validates the graph, runs every node once, and returns the sink results.
    ///
    /// Equivalent to [`run`](Graph::run) with default options.
    pub async fn execute(&self, seed: NodeValue) -> Result<GraphOutput, GraphError> {
        self.run(seed, RunOptions::default()).await.map(|run| run.output)
    }

    /// Runs the graph and returns the full run report.
    ///
    /// Nodes run strictly one at a time, in topological order. A node with no
    /// incoming edge receives `seed`; with one incoming edge, that predecessor's
    /// result; with several, an array of predecessor results in connection
    /// order.
    ///
    /// If a node fails and has dependents, the run stops immediately with
    /// [`GraphError::NodeFailed`] naming the node and its direct dependents;
    /// nothing downstream runs. A failing node without dependents is logged,
    /// recorded in [`GraphRun::failures`], and the run carries on. The one
    /// exception is a graph whose only sink fails: with no result left to
    /// return, the run ends with [`GraphError::SinkFailed`].
    pub async fn run(&self, seed: NodeValue, options: RunOptions) -> Result<GraphRun, GraphError> {
        let order = self.checked_order()?;
        let run_id = uuid::Uuid::new_v4().to_string();
        log::info!("Graph run {} started with {} nodes", run_id, order.len());

        let mut results: Vec<Option<NodeValue>> = vec![None; self.nodes.len()];
        let mut executed = Vec::with_capacity(order.len());
        let mut failures = Vec::new();

        for idx in order {
            let node = &self.nodes[idx];

            if let Some(token) = &options.cancellation {
                if token.is_cancelled() {
                    log::warn!("Graph run {} cancelled before node '{}'", run_id, node.id);
                    return Err(GraphError::Cancelled { node: node.id.clone() });
                }
            }

            let input = match node.incoming.as_slice() {
                [] => seed.clone(),
                [pred] => results[*pred].clone().unwrap_or(NodeValue::Null),
                preds => NodeValue::Array(
                    preds
                        .iter()
                        .map(|&p| results[p].clone().unwrap_or(NodeValue::Null))
                        .collect(),
                ),
            };

            log::debug!("Running node '{}'", node.id);
            let started = Instant::now();
            let outcome: Result<NodeValue, BoxError> = match &options.cancellation {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => {
                            log::warn!("Graph run {} cancelled during node '{}'", run_id, node.id);
                            return Err(GraphError::Cancelled { node: node.id.clone() });
                        }
                        res = node.work.run(input.clone()) => res,
                    }
                }
                None => node.work.run(input.clone()).await,
            };
            let elapsed = started.elapsed();
            executed.push(node.id.clone());

            if let Some(telemetry) = &options.telemetry {
                telemetry.record(trace_entry(&run_id, &node.id, input, &outcome, elapsed.as_millis()));
            }

            match outcome {
                Ok(value) => results[idx] = Some(value),
                Err(source) => {
                    let dependents = self.dependents_of(idx);
                    if !dependents.is_empty() {
                        log::error!(
                            "Node '{}' failed, starving [{}]: {}",
                            node.id,
                            dependents.join(", "),
                            source
                        );
                        return Err(GraphError::NodeFailed {
                            node: node.id.clone(),
                            dependents: dependents.into_iter().map(String::from).collect(),
                            source,
                        });
                    }
                    log::warn!("Node '{}' failed with no dependents, continuing: {}", node.id, source);
                    failures.push(NodeFailure {
                        node: node.id.clone(),
                        message: source.to_string(),
                    });
                }
            }
        }

        if let Some(telemetry) = &options.telemetry {
            telemetry.flush();
        }

        let output = self.collect_output(&mut results, &failures)?;
        log::info!(
            "Graph run {} finished: {} nodes ran, {} non-fatal failures",
            run_id,
            executed.len(),
            failures.len()
        );

        Ok(GraphRun {
            run_id,
            output,
            executed,
            failures,
        })
    }

    fn collect_output(
        &self,
        results: &mut [Option<NodeValue>],
        failures: &[NodeFailure],
    ) -> Result<GraphOutput, GraphError> {
        let sinks: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| self.nodes[idx].is_sink())
            .collect();

        if let [only] = sinks.as_slice() {
            let id = &self.nodes[*only].id;
            return match results[*only].take() {
                Some(value) => Ok(GraphOutput::Single(value)),
                None => {
                    let message = failures
                        .iter()
                        .find(|f| &f.node == id)
                        .map(|f| f.message.clone())
                        .unwrap_or_default();
                    Err(GraphError::SinkFailed {
                        node: id.clone(),
                        message,
                    })
                }
            };
        }

        Ok(GraphOutput::Multiple(
            sinks
                .into_iter()
                .filter_map(|idx| results[idx].take().map(|v| (self.nodes[idx].id.clone(), v)))
                .collect(),
        ))
    }
}

fn trace_entry(
    run_id: &str,
    node_id: &str,
    inputs: NodeValue,
    outcome: &Result<NodeValue, BoxError>,
    duration_ms: u128,
) -> TraceEntry {
    let timestamp = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();

    let (outputs, status, error) = match outcome {
        Ok(value) => (value.clone(), NodeStatus::Succeeded, None),
        Err(e) => (NodeValue::Null, NodeStatus::Failed, Some(e.to_string())),
    };

    TraceEntry {
        timestamp,
        run_id: run_id.to_string(),
        node_id: node_id.to_string(),
        inputs,
        outputs,
        status,
        error,
        duration_ms: u64::try_from(duration_ms).unwrap_or(u64::MAX),
        metadata: HashMap::new(),
    }
}
