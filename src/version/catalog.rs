use crate::plugin::ComponentMetadata;
use crate::version::VersionError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::str::FromStr;

/// One published build of a plugin version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    /// Engine ranges for this build. Empty means the entry's metadata applies.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub engines: BTreeMap<String, String>,
}

impl BuildDescriptor {
    pub fn new(download_url: impl Into<String>) -> Self {
        Self {
            download_url: Some(download_url.into()),
            ..Self::default()
        }
    }

    pub fn with_integrity(mut self, integrity: impl Into<String>, size: u64) -> Self {
        self.integrity = Some(integrity.into());
        self.size = Some(size);
        self
    }

    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecated = true;
        self.deprecation_message = Some(message.into());
        self
    }
}

/// A named release channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Latest,
    Beta,
    Alpha,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Latest => "latest",
            Channel::Beta => "beta",
            Channel::Alpha => "alpha",
        }
    }

    /// The next more stable channel, used when this one is unset.
    pub fn fallback(&self) -> Option<Channel> {
        match self {
            Channel::Alpha => Some(Channel::Beta),
            Channel::Beta => Some(Channel::Latest),
            Channel::Latest => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(Channel::Latest),
            "beta" => Ok(Channel::Beta),
            "alpha" => Ok(Channel::Alpha),
            other => Err(format!("Unknown channel '{other}'")),
        }
    }
}

/// Channel pointers of a catalog entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<String>,
}

impl Channels {
    pub fn get(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Latest => self.latest.as_deref(),
            Channel::Beta => self.beta.as_deref(),
            Channel::Alpha => self.alpha.as_deref(),
        }
    }

    pub fn set(&mut self, channel: Channel, version: impl Into<String>) {
        let slot = match channel {
            Channel::Latest => &mut self.latest,
            Channel::Beta => &mut self.beta,
            Channel::Alpha => &mut self.alpha,
        };
        *slot = Some(version.into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub metadata: ComponentMetadata,
    #[serde(default)]
    pub versions: BTreeMap<String, BuildDescriptor>,
    #[serde(default)]
    pub channels: Channels,
}

impl CatalogEntry {
    pub fn new(metadata: ComponentMetadata) -> Self {
        Self {
            metadata,
            versions: BTreeMap::new(),
            channels: Channels::default(),
        }
    }

    /// Published versions that parse as semver, highest first.
    pub fn sorted_versions(&self) -> Vec<semver::Version> {
        let mut versions: Vec<semver::Version> = self
            .versions
            .keys()
            .filter_map(|v| semver::Version::parse(v).ok())
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions
    }
}

/// Plugin name → catalog entry. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl VersionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, VersionError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Adds an entry for `name`, replacing any existing one.
    pub fn insert(&mut self, name: impl Into<String>, metadata: ComponentMetadata) -> &mut CatalogEntry {
        let entry = CatalogEntry::new(metadata);
        match self.entries.entry(name.into()) {
            Entry::Occupied(mut slot) => {
                slot.insert(entry);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Records a build of `name` at `version`, optionally moving `channel` to it.
    ///
    /// `published_at` defaults to now.
    pub fn publish(
        &mut self,
        name: &str,
        version: &str,
        mut build: BuildDescriptor,
        channel: Option<Channel>,
    ) -> Result<(), VersionError> {
        let parsed = semver::Version::parse(version).map_err(|source| {
            VersionError::InvalidVersion {
                version: version.to_string(),
                source,
            }
        })?;
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| VersionError::PluginNotInCatalog(name.to_string()))?;

        if build.published_at.is_none() {
            build.published_at = Some(Utc::now());
        }
        let key = parsed.to_string();
        entry.versions.insert(key.clone(), build);

        if let Some(channel) = channel {
            log::debug!("Channel {} of '{}' now points at {}", channel, name, key);
            entry.channels.set(channel, key);
        }
        Ok(())
    }

    /// Valid semantic versions published for `name`, highest first.
    pub fn available_versions(&self, name: &str) -> Result<Vec<semver::Version>, VersionError> {
        self.entries
            .get(name)
            .map(CatalogEntry::sorted_versions)
            .ok_or_else(|| VersionError::PluginNotInCatalog(name.to_string()))
    }
}
