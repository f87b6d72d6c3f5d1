use crate::core::validation::ValidationReport;
use crate::plugin::Category;
use crate::version::VersionRange;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").expect("name pattern is a valid regex"));

/// Descriptive metadata a plugin carries. Attached at registration and never
/// mutated afterwards.
///
/// `category` is kept as the raw declared string (`type` on the wire) so that a
/// mismatch against the registering category can be reported rather than
/// failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Engine name → semantic version range the plugin runs on.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub engines: BTreeMap<String, String>,
}

impl ComponentMetadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            category: category.to_string(),
            description: String::new(),
            author: String::new(),
            homepage: None,
            repository: None,
            keywords: Vec::new(),
            license: None,
            engines: BTreeMap::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn engine(mut self, engine: impl Into<String>, range: impl Into<String>) -> Self {
        self.engines.insert(engine.into(), range.into());
        self
    }

    /// The declared category, if it names one.
    pub fn declared_category(&self) -> Option<Category> {
        self.category.parse().ok()
    }
}

/// Shape checks on metadata beyond presence: name pattern, semantic version,
/// and parseable engine ranges. Paths are rooted at `/metadata`.
pub fn validate_metadata(metadata: &ComponentMetadata) -> ValidationReport {
    let mut report = ValidationReport::new();

    if !metadata.name.is_empty() && !NAME_PATTERN.is_match(&metadata.name) {
        report.add_error(
            "/metadata/name",
            format!(
                "Plugin name '{}' must contain only lowercase letters, digits and hyphens",
                metadata.name
            ),
        );
    }

    if !metadata.version.is_empty() {
        if let Err(e) = semver::Version::parse(&metadata.version) {
            report.add_error(
                "/metadata/version",
                format!(
                    "Plugin version '{}' is not a semantic version: {}",
                    metadata.version, e
                ),
            );
        }
    }

    for (engine, range) in &metadata.engines {
        if let Err(e) = VersionRange::parse(range) {
            report.add_error(
                format!("/metadata/engines/{engine}"),
                format!("Engine range '{range}' for '{engine}' is invalid: {e}"),
            );
        }
    }

    if metadata.description.is_empty() {
        report.add_warning("/metadata/description", "Plugin has no description");
    }

    report
}
