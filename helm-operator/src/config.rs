//! Configuration for the operator client.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatorConfig {
    /// Host to connect to.
    pub connection: ConnectionConfig,
    /// Reconnection behavior.
    pub reconnect: ReconnectConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// How many times to retry a lost connection before giving up.
    pub max_attempts: u32,
    /// Linear backoff unit in seconds: delay = base * attempt number.
    pub backoff_base_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            reconnect: ReconnectConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9999,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_secs: 2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl OperatorConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.reconnect.backoff_base_secs)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_config() {
        let cfg = OperatorConfig::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: OperatorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.connection.port, 9999);
        assert_eq!(parsed.reconnect.max_attempts, 3);
        assert_eq!(parsed.backoff_base(), Duration::from_secs(2));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: OperatorConfig =
            toml::from_str("[connection]\nhost = \"10.0.0.2\"\n").unwrap();
        assert_eq!(parsed.connection.host, "10.0.0.2");
        assert_eq!(parsed.connection.port, 9999);
        assert_eq!(parsed.reconnect.backoff_base_secs, 2);
    }
}
