//! Version resolution over an in-memory plugin catalog.
//!
//! [`VersionResolver`] turns a spec (exact version, semver range, or a
//! `latest`/`beta`/`alpha` channel) into one concrete build.
//! [`validate_compatibility`] then checks the chosen builds against the
//! engine versions available at runtime.

pub mod catalog;
pub mod compatibility;
pub mod error;
pub mod range;
pub mod resolver;

pub use catalog::{BuildDescriptor, CatalogEntry, Channel, Channels, VersionCatalog};
pub use compatibility::{CompatibilityReport, validate_compatibility};
pub use error::VersionError;
pub use range::VersionRange;
pub use resolver::{Resolution, ResolutionStrategy, VersionResolver, VersionSpec};
