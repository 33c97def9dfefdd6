use std::path::Path;

use tracing::debug;

use crate::{ConfigError, Result, schema::DeploymentConfig};

/// Load and validate a deployment config from a TOML file.
pub fn load(path: &Path) -> Result<DeploymentConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    let config: DeploymentConfig = toml::from_str(&raw)?;
    validate(&config)?;
    debug!(path = %path.display(), "loaded deployment config");
    Ok(config)
}

fn validate(config: &DeploymentConfig) -> Result<()> {
    if config.identity.user_id.is_empty() {
        return Err(ConfigError::invalid("identity.user_id must be set"));
    }
    if config.endpoint.is_empty() {
        return Err(ConfigError::invalid("endpoint must be set"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::io::Write;

    use shoal_dispatch::{Scheduling, UnhandledPolicy};

    use {super::*, crate::schema::{PolicyMode, SchedulingMode}};

    fn write_config(toml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn full_config_round_trips() {
        let file = write_config(
            r#"
            endpoint = "wss://relay.example/ws"
            policy = "fatal"
            scheduling = "task_per_envelope"
            reconnect_delay_secs = 5

            [identity]
            user_id = "svc-1"
            password = "secret"
            origin = "ControlService"
            "#,
        );
        let config = load(file.path()).unwrap();
        assert_eq!(config.identity.origin(), "ControlService");
        assert_eq!(config.policy, PolicyMode::Fatal);
        assert_eq!(UnhandledPolicy::from(config.policy), UnhandledPolicy::Fatal);
        assert_eq!(
            Scheduling::from(config.scheduling),
            Scheduling::TaskPerEnvelope
        );
        assert_eq!(config.reconnect_delay_secs, 5);
    }

    #[test]
    fn defaults_are_client_flavored() {
        let file = write_config(
            r#"
            endpoint = "wss://relay.example/ws"

            [identity]
            user_id = "bot-1"
            "#,
        );
        let config = load(file.path()).unwrap();
        assert_eq!(config.policy, PolicyMode::LogAndDrop);
        assert_eq!(config.scheduling, SchedulingMode::Serial);
        assert_eq!(config.identity.origin(), "bot-1");
    }

    #[test]
    fn missing_identity_is_invalid() {
        let file = write_config(r#"endpoint = "wss://relay.example/ws""#);
        assert!(matches!(
            load(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }
}
