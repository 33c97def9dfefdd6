//! Deployment configuration: identity, endpoint, policies, scheduling.
//!
//! One TOML file per deployment. Every field has a default, so an empty file
//! is a valid (client-flavored) configuration.

pub mod loader;
pub mod schema;

pub use {
    loader::load,
    schema::{DeploymentConfig, IdentityConfig, PolicyMode, SchedulingMode},
};

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}
