//! Signaling relay configuration.
//!
//! Configuration is loaded from environment variables. Every variable is
//! optional; a value that is present but unparseable fails startup.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP + WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default reconnect grace window in milliseconds.
pub const DEFAULT_DISCONNECT_GRACE_PERIOD_MS: u64 = 15_000;

/// Default outbound buffer per session.
pub const DEFAULT_SESSION_CHANNEL_BUFFER: usize = 256;

/// Default maximum inbound WebSocket message size in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Default relay instance ID prefix.
pub const DEFAULT_RELAY_ID_PREFIX: &str = "relay";

/// Signaling relay configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP + WebSocket listener address (default: "0.0.0.0:3000").
    pub bind_address: SocketAddr,

    /// Delay between a disconnect and the committed eviction (default: 15s).
    pub disconnect_grace_period: Duration,

    /// Bounded outbound event buffer per session (default: 256).
    pub session_channel_buffer: usize,

    /// Maximum inbound WebSocket message size in bytes (default: 64 KiB).
    pub max_message_size: usize,

    /// Unique identifier for this relay instance, used in logs.
    pub relay_id: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("disconnect_grace_period", &self.disconnect_grace_period)
            .field("session_channel_buffer", &self.session_channel_buffer)
            .field("max_message_size", &self.max_message_size)
            .field("relay_id", &self.relay_id)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{name}={raw}"))),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = match vars.get("RELAY_BIND_ADDRESS") {
            Some(raw) => raw.parse().map_err(|e| {
                ConfigError::InvalidValue(format!("RELAY_BIND_ADDRESS={raw}: {e}"))
            })?,
            None => DEFAULT_BIND_ADDRESS.parse().map_err(|e| {
                ConfigError::InvalidValue(format!("default bind address: {e}"))
            })?,
        };

        let grace_ms = parse_var(
            vars,
            "RELAY_DISCONNECT_GRACE_PERIOD_MS",
            DEFAULT_DISCONNECT_GRACE_PERIOD_MS,
        )?;
        if grace_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_DISCONNECT_GRACE_PERIOD_MS must be greater than zero".to_string(),
            ));
        }

        let session_channel_buffer = parse_var(
            vars,
            "RELAY_SESSION_CHANNEL_BUFFER",
            DEFAULT_SESSION_CHANNEL_BUFFER,
        )?;
        if session_channel_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "RELAY_SESSION_CHANNEL_BUFFER must be greater than zero".to_string(),
            ));
        }

        let max_message_size =
            parse_var(vars, "RELAY_MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE)?;

        // Generate relay instance ID
        let relay_id = vars.get("RELAY_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_RELAY_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            bind_address,
            disconnect_grace_period: Duration::from_millis(grace_ms),
            session_channel_buffer,
            max_message_size,
            relay_id,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config =
            Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), DEFAULT_BIND_ADDRESS);
        assert_eq!(config.disconnect_grace_period, Duration::from_secs(15));
        assert_eq!(config.session_channel_buffer, DEFAULT_SESSION_CHANNEL_BUFFER);
        assert_eq!(config.max_message_size, 65536);
        // Relay ID should be auto-generated
        assert!(config.relay_id.starts_with("relay-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            (
                "RELAY_BIND_ADDRESS".to_string(),
                "127.0.0.1:8080".to_string(),
            ),
            (
                "RELAY_DISCONNECT_GRACE_PERIOD_MS".to_string(),
                "2500".to_string(),
            ),
            ("RELAY_SESSION_CHANNEL_BUFFER".to_string(), "32".to_string()),
            ("RELAY_MAX_MESSAGE_SIZE".to_string(), "1024".to_string()),
            ("RELAY_ID".to_string(), "relay-custom-001".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.disconnect_grace_period, Duration::from_millis(2500));
        assert_eq!(config.session_channel_buffer, 32);
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.relay_id, "relay-custom-001");
    }

    #[test]
    fn test_from_vars_invalid_grace_period() {
        let vars = HashMap::from([(
            "RELAY_DISCONNECT_GRACE_PERIOD_MS".to_string(),
            "fifteen".to_string(),
        )]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidValue(v)) if v.contains("RELAY_DISCONNECT_GRACE_PERIOD_MS"))
        );
    }

    #[test]
    fn test_from_vars_zero_grace_period_rejected() {
        let vars = HashMap::from([(
            "RELAY_DISCONNECT_GRACE_PERIOD_MS".to_string(),
            "0".to_string(),
        )]);

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_from_vars_invalid_bind_address() {
        let vars = HashMap::from([(
            "RELAY_BIND_ADDRESS".to_string(),
            "not-an-address".to_string(),
        )]);

        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(v)) if v.starts_with("RELAY_BIND_ADDRESS")
        ));
    }

    #[test]
    fn test_from_vars_zero_channel_buffer_rejected() {
        let vars = HashMap::from([(
            "RELAY_SESSION_CHANNEL_BUFFER".to_string(),
            "0".to_string(),
        )]);

        assert!(Config::from_vars(&vars).is_err());
    }

    #[test]
    fn test_debug_lists_every_field() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        let debug_output = format!("{config:?}");

        for field in [
            "bind_address",
            "disconnect_grace_period",
            "session_channel_buffer",
            "max_message_size",
            "relay_id",
        ] {
            assert!(debug_output.contains(field), "missing {field}");
        }
    }
}
