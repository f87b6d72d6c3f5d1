//! Contract documents: the structural schema a plugin must satisfy to be
//! registered under a category.
//!
//! A contract is loaded once, checked for its own shape, and then shared
//! read-only by every validation call. Malformed documents are either fatal or
//! skipped depending on [`ContractPolicy`].

use crate::core::NodeValue;
use crate::core::validation::ValidationReport;
use crate::plugin::Category;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

static METHOD_NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("method name pattern is a valid regex")
});

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("Failed to read contract {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Contract {origin} is not valid: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Contract {origin} is malformed: {report}")]
    Malformed {
        origin: String,
        report: ValidationReport,
    },
}

/// What to do with a contract document that fails its own schema check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractPolicy {
    /// Fail loading (development).
    #[default]
    Strict,
    /// Log the problem and skip the contract (production).
    Lenient,
}

/// Type tag of a declared member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Function,
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Function => "function",
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Integer => "integer",
            TypeTag::Boolean => "boolean",
            TypeTag::Object => "object",
            TypeTag::Array => "array",
        }
    }

    /// Whether a plain data member satisfies this tag.
    pub fn accepts(&self, value: &NodeValue) -> bool {
        match self {
            TypeTag::Function => false,
            TypeTag::String => value.is_string(),
            TypeTag::Number => value.is_number(),
            TypeTag::Integer => value.is_i64() || value.is_u64(),
            TypeTag::Boolean => value.is_boolean(),
            TypeTag::Object => value.is_object(),
            TypeTag::Array => value.is_array(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub returns: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: TypeTag,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
}

/// The on-disk shape of a contract, before its own schema is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDocument {
    #[serde(rename = "type")]
    pub category: String,
    pub version: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ContractDocument {
    /// Checks the document's own shape. Paths are JSON pointers into the document.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();

        if self.category.parse::<Category>().is_err() {
            report.add_error(
                "/type",
                format!(
                    "'{}' is not a plugin category; expected one of {}",
                    self.category,
                    Category::names()
                ),
            );
        }

        if semver::Version::parse(&self.version).is_err() {
            report.add_error(
                "/version",
                format!("'{}' is not a semantic version", self.version),
            );
        }

        if self.title.trim().is_empty() {
            report.add_error("/title", "Contract title must not be empty");
        }

        if self.methods.is_empty() {
            report.add_error("/methods", "Contract must declare at least one method");
        }
        for (i, method) in self.methods.iter().enumerate() {
            if !METHOD_NAME_PATTERN.is_match(&method.name) {
                report.add_error(
                    format!("/methods/{i}/name"),
                    format!("'{}' is not a valid method name", method.name),
                );
            }
        }

        if self.properties.is_empty() {
            report.add_error("/properties", "Contract must declare at least one property");
        }

        if self.required.is_empty() {
            report.add_error("/required", "Contract must require at least one member");
        }
        for (i, name) in self.required.iter().enumerate() {
            let declared =
                self.methods.iter().any(|m| &m.name == name) || self.properties.contains_key(name);
            if !declared {
                report.add_error(
                    format!("/required/{i}"),
                    format!("Required member '{name}' is not declared in methods or properties"),
                );
            }
        }

        report
    }
}

/// A required member and the shape it must have on a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredMember {
    pub name: String,
    pub kind: TypeTag,
}

/// A loaded, schema-checked contract. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    category: Category,
    version: semver::Version,
    document: ContractDocument,
}

impl Contract {
    pub fn from_document(document: ContractDocument) -> Result<Self, ContractError> {
        Self::from_document_with_origin(document, "<inline>")
    }

    pub fn from_json(json: &str) -> Result<Self, ContractError> {
        let document = serde_json::from_str(json).map_err(|source| ContractError::Parse {
            origin: "<inline>".into(),
            source,
        })?;
        Self::from_document(document)
    }

    fn from_document_with_origin(
        document: ContractDocument,
        origin: &str,
    ) -> Result<Self, ContractError> {
        let report = document.validate();
        let malformed = |report| ContractError::Malformed {
            origin: origin.to_string(),
            report,
        };
        if !report.is_valid() {
            return Err(malformed(report));
        }
        // Both parse: validate() checked them.
        let parsed = (
            document.category.parse::<Category>(),
            semver::Version::parse(&document.version),
        );
        match parsed {
            (Ok(category), Ok(version)) => Ok(Self {
                category,
                version,
                document,
            }),
            _ => Err(malformed(report)),
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn version(&self) -> &semver::Version {
        &self.version
    }

    pub fn title(&self) -> &str {
        &self.document.title
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.document.methods
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertySchema> {
        &self.document.properties
    }

    /// Members a candidate must expose: the `required` list, in order, followed
    /// by every other property declared as a function.
    ///
    /// A required name counts as a function when it is declared as a method or
    /// has no property descriptor; otherwise its property type tag applies.
    pub fn required_members(&self) -> Vec<RequiredMember> {
        let mut members: Vec<RequiredMember> = self
            .document
            .required
            .iter()
            .map(|name| {
                let is_method = self.document.methods.iter().any(|m| &m.name == name);
                let kind = match self.document.properties.get(name) {
                    Some(schema) if !is_method => schema.kind,
                    _ => TypeTag::Function,
                };
                RequiredMember {
                    name: name.clone(),
                    kind,
                }
            })
            .collect();

        for (name, schema) in &self.document.properties {
            if schema.kind == TypeTag::Function && !members.iter().any(|m| &m.name == name) {
                members.push(RequiredMember {
                    name: name.clone(),
                    kind: TypeTag::Function,
                });
            }
        }

        members
    }

    /// Whether `name` appears anywhere in the contract.
    pub fn declares(&self, name: &str) -> bool {
        self.document.methods.iter().any(|m| m.name == name)
            || self.document.properties.contains_key(name)
    }
}

/// Contracts keyed by category.
#[derive(Debug, Clone, Default)]
pub struct ContractSet {
    contracts: BTreeMap<Category, Arc<Contract>>,
}

impl ContractSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contract, replacing any previous one for the same category.
    pub fn insert(&mut self, contract: Contract) {
        self.contracts.insert(contract.category(), Arc::new(contract));
    }

    pub fn get(&self, category: Category) -> Option<&Arc<Contract>> {
        self.contracts.get(&category)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.contracts.keys().copied()
    }

    /// Loads `<category>.json` from `dir` for every category.
    ///
    /// A missing file is tolerated with a warning. A file that cannot be read,
    /// parsed, or fails its schema check (or declares a different category than
    /// its file name) is an error under [`ContractPolicy::Strict`] and is
    /// logged and skipped under [`ContractPolicy::Lenient`].
    pub fn load_dir(dir: impl AsRef<Path>, policy: ContractPolicy) -> Result<Self, ContractError> {
        let dir = dir.as_ref();
        let mut set = Self::new();

        for category in Category::ALL {
            let path = dir.join(format!("{category}.json"));
            if !path.exists() {
                log::warn!(
                    "No contract for category '{}' at {}; plugins of this category will not be validated",
                    category,
                    path.display()
                );
                continue;
            }

            match load_file(&path, category) {
                Ok(contract) => {
                    log::debug!("Loaded {} contract v{}", category, contract.version());
                    set.insert(contract);
                }
                Err(e) => match policy {
                    ContractPolicy::Strict => return Err(e),
                    ContractPolicy::Lenient => {
                        log::error!("Skipping malformed contract for '{}': {}", category, e);
                    }
                },
            }
        }

        Ok(set)
    }

    /// The default contracts shipped with the crate, one per category.
    pub fn builtin() -> Self {
        let mut set = Self::new();
        for category in Category::ALL {
            match serde_json::from_value::<ContractDocument>(builtin_document(category))
                .map_err(|source| ContractError::Parse {
                    origin: format!("builtin:{category}"),
                    source,
                })
                .and_then(Contract::from_document)
            {
                Ok(contract) => set.insert(contract),
                Err(e) => log::error!("Builtin contract for '{}' rejected: {}", category, e),
            }
        }
        set
    }
}

fn load_file(path: &Path, expected: Category) -> Result<Contract, ContractError> {
    let origin = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| ContractError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document: ContractDocument =
        serde_json::from_str(&text).map_err(|source| ContractError::Parse {
            origin: origin.clone(),
            source,
        })?;

    let contract = Contract::from_document_with_origin(document, &origin)?;
    if contract.category() != expected {
        let mut report = ValidationReport::new();
        report.add_error(
            "/type",
            format!(
                "Contract declares category '{}' but is stored as the '{}' contract",
                contract.category(),
                expected
            ),
        );
        return Err(ContractError::Malformed { origin, report });
    }
    Ok(contract)
}

fn builtin_document(category: Category) -> serde_json::Value {
    let (method, parameters, returns, description) = match category {
        Category::Loader => (
            "load",
            vec!["source", "options"],
            "Document[]",
            "Reads raw documents from a source",
        ),
        Category::Embedder => (
            "embed",
            vec!["texts"],
            "number[][]",
            "Turns texts into embedding vectors",
        ),
        Category::Retriever => (
            "retrieve",
            vec!["query", "k"],
            "Document[]",
            "Finds the documents closest to a query",
        ),
        Category::Reranker => (
            "rerank",
            vec!["query", "documents"],
            "Document[]",
            "Reorders candidate documents by relevance",
        ),
        Category::Generator => (
            "generate",
            vec!["prompt", "context"],
            "string",
            "Produces an answer from a prompt and context",
        ),
        Category::Evaluator => (
            "evaluate",
            vec!["predictions", "references"],
            "object",
            "Scores pipeline output against references",
        ),
    };

    json!({
        "type": category.as_str(),
        "version": "1.0.0",
        "title": format!("{} plugin contract", category),
        "description": description,
        "methods": [
            { "name": method, "parameters": parameters, "returns": returns }
        ],
        "properties": {
            method: {
                "type": "function",
                "description": description,
                "parameters": parameters,
                "returns": returns
            }
        },
        "required": [method]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader_json() -> serde_json::Value {
        json!({
            "type": "loader",
            "version": "1.0.0",
            "title": "Loader",
            "description": "Loads documents",
            "methods": [
                { "name": "load", "parameters": ["source"], "returns": "Document[]" },
                { "name": "supports", "parameters": ["source"], "returns": "boolean" }
            ],
            "properties": {
                "load": { "type": "function", "description": "load documents" },
                "supports": { "type": "function", "description": "format check" },
                "batchSize": { "type": "integer", "description": "documents per call" }
            },
            "required": ["load", "batchSize"]
        })
    }

    #[test]
    fn test_required_members_union_function_properties() {
        let document: ContractDocument = serde_json::from_value(loader_json()).unwrap();
        let contract = Contract::from_document(document).unwrap();
        assert_eq!(contract.category(), Category::Loader);

        let members = contract.required_members();
        assert_eq!(
            members,
            vec![
                RequiredMember { name: "load".into(), kind: TypeTag::Function },
                RequiredMember { name: "batchSize".into(), kind: TypeTag::Integer },
                RequiredMember { name: "supports".into(), kind: TypeTag::Function },
            ]
        );
        assert!(contract.declares("supports"));
        assert!(!contract.declares("embed"));
    }

    #[test]
    fn test_malformed_document_reports_every_defect() {
        let mut doc = loader_json();
        doc["type"] = json!("indexer");
        doc["version"] = json!("v1");
        doc["methods"][0]["name"] = json!("0load");
        doc["required"] = json!(["load", "missing"]);

        let document: ContractDocument = serde_json::from_value(doc).unwrap();
        let report = document.validate();
        let paths: Vec<_> = report.errors().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["/type", "/version", "/methods/0/name", "/required/1"]
        );

        let err = Contract::from_document(document).unwrap_err();
        assert!(matches!(err, ContractError::Malformed { .. }));
    }

    #[test]
    fn test_empty_collections_rejected() {
        let document: ContractDocument = serde_json::from_value(json!({
            "type": "embedder",
            "version": "1.0.0",
            "title": "Embedder"
        }))
        .unwrap();
        let report = document.validate();
        let paths: Vec<_> = report.errors().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["/methods", "/properties", "/required"]);
    }

    #[test]
    fn test_from_json_parse_error() {
        let err = Contract::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ContractError::Parse { .. }));
    }

    #[test]
    fn test_type_tags() {
        assert!(TypeTag::Integer.accepts(&json!(3)));
        assert!(!TypeTag::Integer.accepts(&json!(3.5)));
        assert!(TypeTag::Number.accepts(&json!(3.5)));
        assert!(TypeTag::Array.accepts(&json!([1])));
        assert!(!TypeTag::Function.accepts(&json!("fn")));
    }

    #[test]
    fn test_builtin_covers_every_category() {
        let set = ContractSet::builtin();
        assert_eq!(set.len(), Category::ALL.len());
        let loader = set.get(Category::Loader).unwrap();
        assert_eq!(loader.required_members()[0].name, "load");
        let generator = set.get(Category::Generator).unwrap();
        assert_eq!(generator.methods()[0].parameters, vec!["prompt", "context"]);
    }
}
