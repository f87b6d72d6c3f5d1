//! Resolving plugin builds from a catalog and feeding them to the registry.

use ragweave::prelude::*;
use ragweave::version::{Channel, ResolutionStrategy};
use ragweave::{VersionError, validate_compatibility};
use serde_json::json;
use std::collections::BTreeMap;

const CATALOG: &str = r#"{
    "bm25": {
        "metadata": {
            "name": "bm25",
            "version": "2.0.0",
            "type": "retriever",
            "engines": { "runtime": ">=1.2.0" }
        },
        "versions": {
            "1.0.0": {
                "download_url": "https://registry.example/bm25/1.0.0.tgz",
                "integrity": "sha256-aaa",
                "size": 2048,
                "published_at": "2025-01-10T12:00:00Z",
                "deprecated": true,
                "deprecation_message": "tokenizer bug, upgrade to 1.2.0"
            },
            "1.2.0": {
                "download_url": "https://registry.example/bm25/1.2.0.tgz",
                "integrity": "sha256-bbb",
                "size": 2100,
                "published_at": "2025-03-02T08:30:00Z"
            },
            "2.0.0": {
                "download_url": "https://registry.example/bm25/2.0.0.tgz",
                "published_at": "2025-06-20T16:45:00Z",
                "engines": { "runtime": ">=2.0.0" }
            }
        },
        "channels": { "latest": "2.0.0" }
    }
}"#;

fn catalog() -> VersionCatalog {
    VersionCatalog::from_json(CATALOG).unwrap()
}

#[test]
fn test_caret_range_resolves_highest_compatible() {
    let catalog = catalog();
    let resolution = VersionResolver::new(&catalog)
        .resolve_version("bm25", "^1.0.0")
        .unwrap();

    assert_eq!(resolution.version.to_string(), "1.2.0");
    assert_eq!(resolution.strategy, ResolutionStrategy::Range);
    assert_eq!(resolution.integrity.as_deref(), Some("sha256-bbb"));
    assert_eq!(resolution.size, Some(2100));
    assert!(!resolution.deprecated);
}

#[test]
fn test_channels_and_fallback() {
    let catalog = catalog();
    let resolver = VersionResolver::new(&catalog);

    let latest = resolver.resolve_version("bm25", "latest").unwrap();
    assert_eq!(latest.version.to_string(), "2.0.0");

    let alpha = resolver.resolve_version("bm25", "alpha").unwrap();
    assert_eq!(alpha.version, latest.version);
    assert_eq!(
        alpha.strategy,
        ResolutionStrategy::Fallback {
            requested: Channel::Alpha,
            used: Channel::Latest
        }
    );
    assert_eq!(alpha.warnings.len(), 2);
}

#[test]
fn test_compatibility_of_resolved_set() {
    let catalog = catalog();
    let resolver = VersionResolver::new(&catalog);
    let old = resolver.resolve_version("bm25", "1.0.0").unwrap();
    let new = resolver.resolve_version("bm25", "latest").unwrap();

    let runtime = BTreeMap::from([("runtime".to_string(), "1.5.0".to_string())]);
    let report = validate_compatibility(&[old, new], &runtime);

    assert!(!report.compatible);
    assert_eq!(
        report.issues,
        vec!["bm25@2.0.0 requires runtime >=2.0.0, but 1.5.0 is provided"]
    );
    assert_eq!(
        report.warnings,
        vec!["bm25@1.0.0 is deprecated: tokenizer bug, upgrade to 1.2.0"]
    );
}

#[test]
fn test_lookup_errors_name_the_missing_key() {
    let catalog = catalog();
    let resolver = VersionResolver::new(&catalog);

    let err = resolver.resolve_version("bm25", "1.1.0").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Version 1.1.0 of 'bm25' not found; available: 2.0.0, 1.2.0, 1.0.0"
    );

    let err = resolver.resolve_version("bm25", ">=3").unwrap_err();
    assert!(matches!(err, VersionError::NoMatchingVersion { .. }));

    let err = resolver.resolve_version("splade", "latest").unwrap_err();
    assert!(matches!(err, VersionError::PluginNotInCatalog(_)));
}

#[tokio::test]
async fn test_resolved_build_registers_and_runs() {
    let catalog = catalog();
    let resolution = VersionResolver::new(&catalog)
        .resolve_version("bm25", "~1.2")
        .unwrap();

    let plugin = Plugin::new()
        .with_metadata(
            ComponentMetadata::new("bm25", "1.2.0", Category::Retriever)
                .description("Sparse lexical retrieval"),
        )
        .capability("retrieve", |query: NodeValue| async move {
            Ok::<_, BoxError>(json!({ "query": query, "hits": [] }))
        });

    let mut registry = PluginRegistry::with_contracts(ContractSet::builtin());
    registry
        .register_resolved(Category::Retriever, &resolution, plugin)
        .unwrap();

    let mut graph = Graph::new();
    graph
        .add_plugin_node("search", &registry, Category::Retriever, "bm25", "retrieve")
        .unwrap();
    let output = graph.execute(json!("rust ownership")).await.unwrap();
    assert_eq!(
        output.as_single(),
        Some(&json!({ "query": "rust ownership", "hits": [] }))
    );
}
