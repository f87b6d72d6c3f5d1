use crate::version::catalog::{BuildDescriptor, CatalogEntry, Channel, VersionCatalog};
use crate::version::VersionError;
use crate::version::range::VersionRange;

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// What a caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Exact(semver::Version),
    Range(VersionRange),
    Channel(Channel),
    /// Not a version, range or channel. Resolved as `latest`, with a warning.
    Unparseable(String),
}

impl VersionSpec {
    /// Classifies `spec`. Channel names win over ranges, and a bare version
    /// is exact rather than a caret range. Ranges may use npm notation; see
    /// [`VersionRange`].
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if spec.is_empty() {
            return VersionSpec::Unparseable(String::new());
        }
        if let Ok(channel) = spec.parse::<Channel>() {
            return VersionSpec::Channel(channel);
        }
        if let Ok(version) = semver::Version::parse(spec) {
            return VersionSpec::Exact(version);
        }
        match VersionRange::parse(spec) {
            Ok(range) => VersionSpec::Range(range),
            Err(_) => VersionSpec::Unparseable(spec.to_string()),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Exact(v) => write!(f, "{v}"),
            VersionSpec::Range(r) => write!(f, "{r}"),
            VersionSpec::Channel(c) => write!(f, "{c}"),
            VersionSpec::Unparseable(s) => write!(f, "{s:?}"),
        }
    }
}

/// How a resolution was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    Exact,
    Range,
    Channel(Channel),
    /// `requested` was unset; `used` is the channel that answered.
    Fallback { requested: Channel, used: Channel },
    /// The spec could not be parsed; `latest` was used.
    DefaultLatest,
}

/// A concrete build chosen for a plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub name: String,
    pub version: semver::Version,
    pub strategy: ResolutionStrategy,
    pub download_url: Option<String>,
    pub integrity: Option<String>,
    pub size: Option<u64>,
    pub deprecated: bool,
    pub deprecation_message: Option<String>,
    /// Engine ranges the chosen build declares.
    pub engines: BTreeMap<String, String>,
    /// Non-fatal notes: deprecations, channel fallbacks, unparseable specs.
    pub warnings: Vec<String>,
}

/// Picks builds out of a [`VersionCatalog`]. Deterministic for a given catalog.
#[derive(Debug, Clone, Copy)]
pub struct VersionResolver<'a> {
    catalog: &'a VersionCatalog,
}

impl<'a> VersionResolver<'a> {
    pub fn new(catalog: &'a VersionCatalog) -> Self {
        Self { catalog }
    }

    pub fn resolve_version(&self, name: &str, spec: &str) -> Result<Resolution, VersionError> {
        self.resolve(name, &VersionSpec::parse(spec))
    }

    pub fn resolve(&self, name: &str, spec: &VersionSpec) -> Result<Resolution, VersionError> {
        let entry = self
            .catalog
            .get(name)
            .ok_or_else(|| VersionError::PluginNotInCatalog(name.to_string()))?;
        let mut warnings = Vec::new();

        let (version, key, strategy) = match spec {
            VersionSpec::Exact(wanted) => {
                let key = entry
                    .versions
                    .keys()
                    .find(|k| k.as_str() == wanted.to_string())
                    .or_else(|| {
                        entry
                            .versions
                            .keys()
                            .find(|k| semver::Version::parse(k).ok().as_ref() == Some(wanted))
                    })
                    .ok_or_else(|| VersionError::VersionNotFound {
                        name: name.to_string(),
                        version: wanted.to_string(),
                        available: available(entry),
                    })?;
                (wanted.clone(), key.clone(), ResolutionStrategy::Exact)
            }
            VersionSpec::Range(range) => {
                let version = entry
                    .sorted_versions()
                    .into_iter()
                    .find(|v| range.matches(v))
                    .ok_or_else(|| VersionError::NoMatchingVersion {
                        name: name.to_string(),
                        range: range.to_string(),
                        available: available(entry),
                    })?;
                let key = key_for(entry, &version).unwrap_or_else(|| version.to_string());
                (version, key, ResolutionStrategy::Range)
            }
            VersionSpec::Channel(channel) => {
                let (used, key) = follow_channel(name, entry, *channel, &mut warnings)?;
                let strategy = if used == *channel {
                    ResolutionStrategy::Channel(used)
                } else {
                    ResolutionStrategy::Fallback {
                        requested: *channel,
                        used,
                    }
                };
                (parse_pointer(&key)?, key, strategy)
            }
            VersionSpec::Unparseable(raw) => {
                warnings.push(format!(
                    "Unparseable version spec {raw:?} for '{name}'; resolving 'latest' instead"
                ));
                let (_, key) = follow_channel(name, entry, Channel::Latest, &mut warnings)?;
                (parse_pointer(&key)?, key, ResolutionStrategy::DefaultLatest)
            }
        };

        let build = entry
            .versions
            .get(&key)
            .ok_or_else(|| VersionError::VersionNotFound {
                name: name.to_string(),
                version: key.clone(),
                available: available(entry),
            })?;

        if build.deprecated {
            warnings.push(deprecation_warning(name, &version, build));
        }
        for warning in &warnings {
            log::warn!("{}", warning);
        }
        log::debug!("Resolved {} {} -> {} ({:?})", name, spec, version, strategy);

        let engines = if build.engines.is_empty() {
            entry.metadata.engines.clone()
        } else {
            build.engines.clone()
        };

        Ok(Resolution {
            name: name.to_string(),
            version,
            strategy,
            download_url: build.download_url.clone(),
            integrity: build.integrity.clone(),
            size: build.size,
            deprecated: build.deprecated,
            deprecation_message: build.deprecation_message.clone(),
            engines,
            warnings,
        })
    }
}

/// Walks `requested` → fallback channels until one is set. One warning per
/// substitution.
fn follow_channel(
    name: &str,
    entry: &CatalogEntry,
    requested: Channel,
    warnings: &mut Vec<String>,
) -> Result<(Channel, String), VersionError> {
    let mut current = requested;
    loop {
        if let Some(version) = entry.channels.get(current) {
            return Ok((current, version.to_string()));
        }
        match current.fallback() {
            Some(next) => {
                warnings.push(format!(
                    "Channel '{current}' is not set for '{name}'; falling back to '{next}'"
                ));
                current = next;
            }
            None => {
                return Err(VersionError::ChannelUnset {
                    name: name.to_string(),
                    channel: current.to_string(),
                });
            }
        }
    }
}

fn parse_pointer(key: &str) -> Result<semver::Version, VersionError> {
    semver::Version::parse(key).map_err(|source| VersionError::InvalidVersion {
        version: key.to_string(),
        source,
    })
}

fn key_for(entry: &CatalogEntry, version: &semver::Version) -> Option<String> {
    entry
        .versions
        .keys()
        .find(|k| semver::Version::parse(k).ok().as_ref() == Some(version))
        .cloned()
}

fn available(entry: &CatalogEntry) -> String {
    let versions = entry.sorted_versions();
    if versions.is_empty() {
        return "none".to_string();
    }
    versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn deprecation_warning(name: &str, version: &semver::Version, build: &BuildDescriptor) -> String {
    match &build.deprecation_message {
        Some(message) => format!("{name}@{version} is deprecated: {message}"),
        None => format!("{name}@{version} is deprecated"),
    }
}
