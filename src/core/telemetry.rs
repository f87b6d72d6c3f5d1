use crate::core::NodeValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// How a node's unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Succeeded,
    Failed,
}

/// A single entry in the execution trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: u64,
    pub run_id: String,
    pub node_id: String,
    pub inputs: NodeValue,
    pub outputs: NodeValue,
    pub status: NodeStatus,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub metadata: HashMap<String, String>,
}

/// Trait for recording execution traces.
pub trait Telemetry: Send + Sync {
    fn record(&self, entry: TraceEntry);
    fn flush(&self);
}

/// Simple in-memory collector for traces.
#[derive(Default)]
pub struct MemoryTelemetry {
    traces: Mutex<Vec<TraceEntry>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_traces(&self) -> Vec<TraceEntry> {
        self.traces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Telemetry for MemoryTelemetry {
    fn record(&self, entry: TraceEntry) {
        self.traces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }

    fn flush(&self) {
        // No-op for memory collector
    }
}
