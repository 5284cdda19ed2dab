//! Driftmail configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DriftmailError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DriftmailConfig {
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DriftmailConfig {
    /// Load config from the default path (~/.driftmail/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DriftmailError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| DriftmailError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Driftmail home directory (~/.driftmail).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".driftmail")
    }
}

/// SMTP delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    #[serde(default)]
    pub from_address: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_from_name() -> String {
    "Driftmail".into()
}
fn bool_true() -> bool {
    true
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_name: default_from_name(),
            from_address: String::new(),
            enabled: true,
        }
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}
fn default_gateway_port() -> u16 {
    8470
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

/// Notifier engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite database path. Tilde-expanded by the binary.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// How often the engine wakes to look for due runs.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
}

fn default_db_path() -> String {
    "~/.driftmail/driftmail.db".into()
}
fn default_tick_secs() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            tick_secs: default_tick_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let cfg = DriftmailConfig::default();
        assert_eq!(cfg.smtp.port, 587);
        assert_eq!(cfg.gateway.port, 8470);
        assert_eq!(cfg.engine.tick_secs, 30);
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: DriftmailConfig = toml::from_str(
            r#"
            [smtp]
            host = "mail.example.com"
            from_address = "noreply@example.com"

            [engine]
            tick_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.smtp.host, "mail.example.com");
        assert_eq!(cfg.smtp.port, 587);
        assert_eq!(cfg.engine.tick_secs, 5);
        assert_eq!(cfg.gateway.host, "127.0.0.1");
    }
}
