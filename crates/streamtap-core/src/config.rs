//! Configuration resolution for streamtap.
//!
//! Resolution order, lowest priority first:
//! 1. Built-in defaults
//! 2. Optional JSON config file
//! 3. `STREAMTAP_*` environment variables

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete streamtap bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub listener: ListenerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Listener-side configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface the listener binds. The port is always ephemeral.
    pub bind_host: String,
    /// Host published to the job-side sink. Defaults to the bound address.
    pub advertise_host: Option<String>,
    /// Longest envelope line accepted, in bytes.
    pub max_envelope_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            advertise_host: None,
            max_envelope_bytes: 1024 * 1024, // 1 MiB
        }
    }
}

/// Relay graph execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    /// Bounded capacity of each relay node's input channel.
    pub channel_capacity: usize,
    /// How long shutdown waits for tasks to acknowledge cancellation
    /// before aborting them.
    pub shutdown_grace_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl RelayConfig {
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl BridgeConfig {
    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.relay.channel_capacity == 0 {
            return Err(Error::Config("relay.channel_capacity must be > 0".into()));
        }
        if self.listener.max_envelope_bytes == 0 {
            return Err(Error::Config(
                "listener.max_envelope_bytes must be > 0".into(),
            ));
        }
        if self.listener.bind_host.trim().is_empty() {
            return Err(Error::Config("listener.bind_host must not be empty".into()));
        }
        Ok(())
    }
}

/// Load configuration from defaults, an optional file, and the environment.
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig> {
    let mut config = match path {
        Some(p) => load_config_file(p)?,
        None => BridgeConfig::default(),
    };
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<BridgeConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Apply `STREAMTAP_*` overrides read through `lookup`.
///
/// Unparseable numeric values are ignored with a warning.
pub fn apply_overrides(config: &mut BridgeConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("STREAMTAP_BIND_HOST") {
        config.listener.bind_host = val;
    }
    if let Some(val) = lookup("STREAMTAP_ADVERTISE_HOST") {
        config.listener.advertise_host = Some(val);
    }
    if let Some(val) = lookup("STREAMTAP_MAX_ENVELOPE_BYTES") {
        match val.parse() {
            Ok(n) => config.listener.max_envelope_bytes = n,
            Err(_) => tracing::warn!(value = %val, "Ignoring invalid STREAMTAP_MAX_ENVELOPE_BYTES"),
        }
    }
    if let Some(val) = lookup("STREAMTAP_CHANNEL_CAPACITY") {
        match val.parse() {
            Ok(n) => config.relay.channel_capacity = n,
            Err(_) => tracing::warn!(value = %val, "Ignoring invalid STREAMTAP_CHANNEL_CAPACITY"),
        }
    }
    if let Some(val) = lookup("STREAMTAP_SHUTDOWN_GRACE_MS") {
        match val.parse() {
            Ok(n) => config.relay.shutdown_grace_ms = n,
            Err(_) => tracing::warn!(value = %val, "Ignoring invalid STREAMTAP_SHUTDOWN_GRACE_MS"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_binds_loopback() {
        let config = BridgeConfig::default();
        assert_eq!(config.listener.bind_host, "127.0.0.1");
        assert!(config.listener.advertise_host.is_none());
        assert_eq!(config.relay.shutdown_grace(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"relay": {{"channel_capacity": 8}}}}"#).unwrap();

        let config = load_config_file(file.path()).unwrap();
        assert_eq!(config.relay.channel_capacity, 8);
        assert_eq!(config.relay.shutdown_grace_ms, 5_000);
        assert_eq!(config.listener, ListenerConfig::default());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = load_config_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_win_and_bad_numbers_are_skipped() {
        let env: HashMap<&str, &str> = [
            ("STREAMTAP_BIND_HOST", "0.0.0.0"),
            ("STREAMTAP_ADVERTISE_HOST", "tester.local"),
            ("STREAMTAP_CHANNEL_CAPACITY", "lots"),
            ("STREAMTAP_SHUTDOWN_GRACE_MS", "250"),
        ]
        .into_iter()
        .collect();

        let mut config = BridgeConfig::default();
        apply_overrides(&mut config, |k| env.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.listener.bind_host, "0.0.0.0");
        assert_eq!(config.listener.advertise_host.as_deref(), Some("tester.local"));
        assert_eq!(config.relay.channel_capacity, 1024);
        assert_eq!(config.relay.shutdown_grace_ms, 250);
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut config = BridgeConfig::default();
        config.relay.channel_capacity = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
