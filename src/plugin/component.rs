use crate::core::NodeValue;
use crate::core::error::BoxError;
use crate::plugin::ComponentMetadata;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// An invocable member of a plugin (`load`, `embed`, `retrieve`, ...).
///
/// Any `Fn(NodeValue) -> impl Future<Output = Result<NodeValue, BoxError>>`
/// closure is a `Capability`.
#[async_trait]
pub trait Capability: Send + Sync + 'static {
    async fn invoke(&self, input: NodeValue) -> Result<NodeValue, BoxError>;
}

#[async_trait]
impl<F, Fut> Capability for F
where
    F: Fn(NodeValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<NodeValue, BoxError>> + Send + 'static,
{
    async fn invoke(&self, input: NodeValue) -> Result<NodeValue, BoxError> {
        (self)(input).await
    }
}

/// A named member exposed by a plugin: either something callable, or plain
/// data (a dimension count, a model name, ...).
#[derive(Clone)]
pub enum Member {
    Capability(Arc<dyn Capability>),
    Value(NodeValue),
}

impl Member {
    pub fn is_invocable(&self) -> bool {
        matches!(self, Member::Capability(_))
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Capability(_) => f.write_str("Capability(..)"),
            Member::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Plugin has no capability '{0}'")]
    MissingCapability(String),

    #[error("Plugin member '{0}' is not invocable")]
    NotInvocable(String),
}

/// A registration candidate: optional metadata plus named members.
///
/// This is the only shape the registry consumes. Whether it satisfies a
/// category is decided by the contract validator, not by the type system.
#[derive(Clone, Default)]
pub struct Plugin {
    metadata: Option<ComponentMetadata>,
    members: BTreeMap<String, Member>,
}

impl Plugin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: ComponentMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Adds (or replaces) an invocable member.
    pub fn capability<C: Capability>(mut self, name: impl Into<String>, capability: C) -> Self {
        self.members
            .insert(name.into(), Member::Capability(Arc::new(capability)));
        self
    }

    /// Adds (or replaces) a data member.
    pub fn value(mut self, name: impl Into<String>, value: impl Into<NodeValue>) -> Self {
        self.members.insert(name.into(), Member::Value(value.into()));
        self
    }

    pub fn metadata(&self) -> Option<&ComponentMetadata> {
        self.metadata.as_ref()
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Calls the capability `name` with `input`.
    pub async fn invoke(&self, name: &str, input: NodeValue) -> Result<NodeValue, BoxError> {
        match self.members.get(name) {
            Some(Member::Capability(capability)) => capability.invoke(input).await,
            Some(Member::Value(_)) => Err(Box::new(PluginError::NotInvocable(name.to_string()))),
            None => Err(Box::new(PluginError::MissingCapability(name.to_string()))),
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("metadata", &self.metadata)
            .field("members", &self.members.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::Category;
    use serde_json::json;

    struct UpperCase;

    #[async_trait]
    impl Capability for UpperCase {
        async fn invoke(&self, input: NodeValue) -> Result<NodeValue, BoxError> {
            let text = input.as_str().ok_or("expected text")?;
            Ok(json!(text.to_uppercase()))
        }
    }

    fn plugin() -> Plugin {
        Plugin::new()
            .with_metadata(ComponentMetadata::new("shout", "0.1.0", Category::Generator))
            .capability("generate", UpperCase)
            .value("model", "shout-1")
    }

    #[tokio::test]
    async fn test_invoke_capability() {
        assert_eq!(
            plugin().invoke("generate", json!("hi")).await.unwrap(),
            json!("HI")
        );
    }

    #[tokio::test]
    async fn test_invoke_value_member_fails() {
        let err = plugin().invoke("model", json!(null)).await.unwrap_err();
        assert_eq!(err.to_string(), "Plugin member 'model' is not invocable");
    }

    #[tokio::test]
    async fn test_invoke_missing_member_fails() {
        let err = plugin().invoke("rerank", json!(null)).await.unwrap_err();
        assert_eq!(err.to_string(), "Plugin has no capability 'rerank'");
    }

    #[test]
    fn test_members() {
        let plugin = plugin();
        assert!(plugin.member("generate").is_some_and(Member::is_invocable));
        assert!(plugin.member("model").is_some_and(|m| !m.is_invocable()));
        assert_eq!(plugin.member_names().collect::<Vec<_>>(), vec!["generate", "model"]);
        assert_eq!(plugin.metadata().map(|m| m.name.as_str()), Some("shout"));
    }
}
