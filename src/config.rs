//! # Configuration Management
//!
//! Configuration for a session host: listener settings, mod version policy,
//! persisted player data, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment overrides via `from_env()`
//! - Direct instantiation with defaults

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Max allowed frame size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Player id reserved for the host itself
pub const HOST_PLAYER_ID: u16 = 1;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub mods: ModConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults overridden by `SESSION_PROTOCOL_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("SESSION_PROTOCOL_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        if let Ok(limit) = std::env::var("SESSION_PROTOCOL_BACKPRESSURE_LIMIT") {
            config.server.backpressure_limit = limit.parse().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid backpressure limit: {limit}"))
            })?;
        }

        if let Ok(max) = std::env::var("SESSION_PROTOCOL_MAX_CONNECTIONS") {
            config.server.max_connections = max.parse().map_err(|_| {
                ProtocolError::ConfigError(format!("Invalid max connections: {max}"))
            })?;
        }

        if let Ok(path) = std::env::var("SESSION_PROTOCOL_PERSISTENCE_PATH") {
            config.persistence.path = Some(path);
        }

        Ok(config)
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.persistence.validate());
        errors.extend(self.logging.validate());
        errors
    }

    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8469")
    pub address: String,

    /// Outbound frames queued per connection before the peer is dropped as too slow
    pub backpressure_limit: usize,

    pub max_connections: usize,

    /// How long shutdown waits for connection tasks to drain
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    pub max_frame_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("0.0.0.0:8469"),
            backpressure_limit: 256,
            max_connections: 64,
            shutdown_timeout: Duration::from_secs(10),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:8469')",
                self.address
            ));
        }

        if self.backpressure_limit == 0 {
            errors.push("Backpressure limit must be greater than 0".to_string());
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > usize::from(u16::MAX) - 1 {
            errors.push(format!(
                "Max connections too high: {} (player ids are 16-bit)",
                self.max_connections
            ));
        }

        if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        if self.max_frame_size < 1024 {
            errors.push("Max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum: 100 MB)",
                self.max_frame_size
            ));
        }

        errors
    }
}

/// How declared mod versions are compared when a mod brings no checker of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VersionPolicy {
    /// Version strings must be identical
    #[default]
    Exact,
    /// Major version components must match
    Compatible,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ModConfig {
    #[serde(default)]
    pub version_policy: VersionPolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// File holding persisted player data; in-memory only when unset
    pub path: Option<String>,

    /// Write the persisted map to `path` whenever an admitted player leaves
    pub save_on_disconnect: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: None,
            save_on_disconnect: true,
        }
    }
}

impl PersistenceConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(ref path) = self.path {
            if path.is_empty() {
                errors.push("Persistence path cannot be empty".to_string());
            } else if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    errors.push(format!(
                        "Persistence directory does not exist: {}",
                        parent.display()
                    ));
                }
            }
        }
        errors
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub app_name: String,

    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("session-protocol"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }
        errors
    }
}

/// Durations as milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_ascii_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Level::from_str(&raw)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {raw}")))
    }
}
