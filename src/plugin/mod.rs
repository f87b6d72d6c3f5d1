//! Plugins, the contracts they are checked against, and the registry that
//! stores them.
//!
//! A [`Plugin`] is only admitted into a [`PluginRegistry`] after it passes the
//! [`Contract`] loaded for its [`Category`]. Graph nodes then look plugins up
//! by `(category, name)`.

pub mod category;
pub mod component;
pub mod contract;
pub mod metadata;
pub mod registry;
pub mod validator;

pub use category::Category;
pub use component::{Capability, Member, Plugin, PluginError};
pub use contract::{
    Contract, ContractDocument, ContractError, ContractPolicy, ContractSet, MethodDescriptor,
    PropertySchema, RequiredMember, TypeTag,
};
pub use metadata::{ComponentMetadata, validate_metadata};
pub use registry::{PluginRegistry, RegistryError};
pub use validator::validate as validate_plugin;
