use serde::{Deserialize, Serialize};

use shoal_dispatch::{Scheduling, UnhandledPolicy};

/// Root deployment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    pub identity: IdentityConfig,
    /// Relay endpoint the transport collaborator dials.
    pub endpoint: String,
    pub policy: PolicyMode,
    pub scheduling: SchedulingMode,
    /// Delay before the transport collaborator re-dials a dropped link.
    pub reconnect_delay_secs: u64,
}

/// Who this deployment is. Credentials are handed to the external auth
/// service verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub user_id: String,
    pub password: String,
    /// Stamped into relayed messages as `origin`; defaults to `user_id`.
    pub origin: Option<String>,
}

impl IdentityConfig {
    pub fn origin(&self) -> &str {
        self.origin.as_deref().unwrap_or(&self.user_id)
    }
}

/// What happens to envelopes no handler claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Fatal,
    /// The client-side default.
    #[default]
    LogAndDrop,
}

impl From<PolicyMode> for UnhandledPolicy {
    fn from(mode: PolicyMode) -> Self {
        match mode {
            PolicyMode::Fatal => UnhandledPolicy::Fatal,
            PolicyMode::LogAndDrop => UnhandledPolicy::LogAndDrop,
        }
    }
}

/// Envelope scheduling mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMode {
    #[default]
    Serial,
    TaskPerEnvelope,
}

impl From<SchedulingMode> for Scheduling {
    fn from(mode: SchedulingMode) -> Self {
        match mode {
            SchedulingMode::Serial => Scheduling::Serial,
            SchedulingMode::TaskPerEnvelope => Scheduling::TaskPerEnvelope,
        }
    }
}
