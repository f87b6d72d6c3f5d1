use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("Plugin '{0}' is not in the version catalog")]
    PluginNotInCatalog(String),

    #[error("Version {version} of '{name}' not found; available: {available}")]
    VersionNotFound {
        name: String,
        version: String,
        available: String,
    },

    #[error("No version of '{name}' satisfies {range}; available: {available}")]
    NoMatchingVersion {
        name: String,
        range: String,
        available: String,
    },

    #[error("Channel '{channel}' is not set for '{name}'")]
    ChannelUnset { name: String, channel: String },

    #[error("Invalid version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("Failed to parse version catalog: {0}")]
    Catalog(#[from] serde_json::Error),
}
