//! # Ragweave
//!
//! The orchestration core for pluggable retrieval and generation pipelines.
//!
//! ## Features
//!
//! - **Graph Executor**: wire loaders, embedders, retrievers, rerankers,
//!   generators and evaluators into a directed graph; validated, ordered and run
//!   node by node with failure propagation to dependents
//! - **Contract-checked Registry**: a plugin is only registered once it exposes
//!   every capability its category contract requires
//! - **Version Resolution**: exact versions, semver ranges and
//!   `latest`/`beta`/`alpha` channels with a deterministic fallback chain
//! - **Bounded Batching**: fixed-size batches under a concurrency ceiling, with
//!   per-batch retry and partial-failure tolerance
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ragweave::prelude::*;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let mut graph = Graph::new();
//! graph
//!     .add_node("load", |path: NodeValue| async move {
//!         Ok::<_, BoxError>(json!(format!("{}:loaded", path.as_str().unwrap_or_default())))
//!     })?
//!     .add_node("embed", |doc: NodeValue| async move {
//!         Ok::<_, BoxError>(json!(format!("{}:embedded", doc.as_str().unwrap_or_default())))
//!     })?
//!     .connect("load", "embed")?;
//!
//! let output = graph.execute(json!("doc.txt")).await?;
//! assert_eq!(output.as_single(), Some(&json!("doc.txt:loaded:embedded")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`graph`]: graph construction, validation and execution
//! - [`plugin`]: categories, contracts, validation and the plugin registry
//! - [`version`]: version catalog, resolver and compatibility checks
//! - [`batch`]: the bounded-concurrency batch processor
//! - [`config`]: environment-driven configuration
//! - [`prelude`]: commonly used types (import with `use ragweave::prelude::*`)

// ============================================================================
// Modules
// ============================================================================

mod core;

pub mod config;
pub mod plugin;
pub mod version;

pub use self::core::{batch, error, graph, telemetry, validation};

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Core types
pub use self::core::NodeValue;
pub use self::core::error::{BatchError, BoxError, GraphError};
pub use self::core::validation::{Severity, ValidationIssue, ValidationReport};

// Graph
pub use self::core::graph::{
    Graph, GraphOutput, GraphRun, NodeFailure, NodeWork, PluginNodeError, PluginWork, RunOptions,
};
pub use self::core::telemetry::{MemoryTelemetry, NodeStatus, Telemetry, TraceEntry};

// Batching
pub use self::core::batch::{
    BatchOptions, BatchReport, BatchWork, FailedBatch, process_batches,
    process_batches_with_report,
};

// Plugins
pub use plugin::{
    Capability, Category, ComponentMetadata, Contract, ContractPolicy, ContractSet, Plugin,
    PluginRegistry, RegistryError,
};

// Versions
pub use version::{
    CompatibilityReport, Resolution, ResolutionStrategy, VersionCatalog, VersionError,
    VersionRange, VersionResolver, validate_compatibility,
};

pub use config::{ConfigError, Environment, OrchestratorConfig};

// ============================================================================
// Prelude
// ============================================================================

/// Everything needed to assemble and run a pipeline.
///
/// # Example
/// ```rust
/// use ragweave::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        // Batching
        BatchOptions,
        BoxError,
        // Plugins
        Capability,
        Category,
        ComponentMetadata,
        ContractSet,
        // Graph
        Graph,
        GraphError,
        GraphOutput,
        NodeValue,
        NodeWork,
        OrchestratorConfig,
        Plugin,
        PluginRegistry,
        PluginWork,
        RunOptions,
        // Versions
        VersionCatalog,
        VersionResolver,
        process_batches,
    };
}

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
