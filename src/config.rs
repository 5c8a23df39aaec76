//! # Configuration Management
//!
//! Centralized configuration for the relay library.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment-variable overrides via `from_env()`
//!
//! ## Tuning Notes
//! The lock TTL (60 s) bounds the worst-case staleness left behind by a crashed
//! lease holder. The connection TTL (120 s) matches the externally imposed idle
//! expiry of gateway sockets. The probe window (10) and shrink probability
//! (0.02) are deliberate, long-standing constants; retune them only with
//! production telemetry in hand.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default port of the binary push gateway.
pub const DEFAULT_GATEWAY_PORT: u16 = 2195;

/// How long a slot lock may outlive its holder.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60);

/// How long an idle connection payload survives in the shared cache.
pub const DEFAULT_CONNECTION_TTL: Duration = Duration::from_secs(120);

/// Number of slots probed per acquisition when the pool is large.
pub const DEFAULT_PROBE_WINDOW: u64 = 10;

/// Per-call probability of shrinking an over-provisioned pool by one slot.
pub const DEFAULT_SHRINK_PROBABILITY: f64 = 0.02;

/// Main configuration structure containing all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RelayConfig {
    /// Gateway endpoint and credential settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Pool coordination settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| RelayError::Config(format!("failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| RelayError::Config(format!("failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| RelayError::Config(format!("failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables, starting from defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("APNS_POOL_GATEWAY_HOST") {
            config.gateway.host = host;
        }

        if let Ok(port) = std::env::var("APNS_POOL_GATEWAY_PORT") {
            if let Ok(val) = port.parse::<u16>() {
                config.gateway.port = val;
            }
        }

        if let Ok(path) = std::env::var("APNS_POOL_CREDENTIAL_PATH") {
            config.gateway.credential_path = PathBuf::from(path);
        }

        if let Ok(name) = std::env::var("APNS_POOL_NAME") {
            config.pool.name = Some(name);
        }

        if let Ok(level) = std::env::var("APNS_POOL_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means the configuration
    /// is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.gateway.host.is_empty() {
            errors.push("gateway.host must not be empty".to_string());
        }
        if self.gateway.port == 0 {
            errors.push("gateway.port must be nonzero".to_string());
        }
        if self.gateway.credential_path.as_os_str().is_empty() {
            errors.push("gateway.credential_path must be set".to_string());
        }
        if self.pool.lock_ttl_secs == 0 {
            errors.push("pool.lock_ttl_secs must be nonzero".to_string());
        }
        if self.pool.connection_ttl_secs == 0 {
            errors.push("pool.connection_ttl_secs must be nonzero".to_string());
        }
        if self.pool.probe_window == 0 {
            errors.push("pool.probe_window must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.pool.shrink_probability) {
            errors.push("pool.shrink_probability must be within [0, 1]".to_string());
        }

        errors
    }
}

/// Gateway endpoint and credential settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway host name, e.g. `gateway.push.apple.com`
    pub host: String,

    /// Gateway port
    pub port: u16,

    /// Path to the PEM file holding the client certificate chain and key
    pub credential_path: PathBuf,

    /// Skip server certificate verification. Loopback testing only.
    pub danger_accept_invalid_certs: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "gateway.push.apple.com".to_string(),
            port: DEFAULT_GATEWAY_PORT,
            credential_path: PathBuf::new(),
            danger_accept_invalid_certs: false,
        }
    }
}

impl GatewayConfig {
    /// Pool name derived from (credential, destination).
    ///
    /// Two workers configured for the same credential file and host must agree
    /// on this name, since it namespaces every shared-cache key.
    pub fn derived_pool_name(&self) -> String {
        let credential = self
            .credential_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "anonymous".to_string());
        format!("{}_{}", credential, self.host)
    }
}

/// Pool coordination settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Explicit pool name. Defaults to a name derived from the gateway settings.
    pub name: Option<String>,

    /// Slot lock TTL, in seconds
    pub lock_ttl_secs: u64,

    /// Cached connection TTL, in seconds
    pub connection_ttl_secs: u64,

    /// Number of slots probed per acquisition on large pools
    pub probe_window: u64,

    /// Probability of shrinking a fully idle pool by one slot
    pub shrink_probability: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: None,
            lock_ttl_secs: DEFAULT_LOCK_TTL.as_secs(),
            connection_ttl_secs: DEFAULT_CONNECTION_TTL.as_secs(),
            probe_window: DEFAULT_PROBE_WINDOW,
            shrink_probability: DEFAULT_SHRINK_PROBABILITY,
        }
    }
}

impl PoolConfig {
    /// Slot lock TTL as a `Duration`
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    /// Cached connection TTL as a `Duration`
    pub fn connection_ttl(&self) -> Duration {
        Duration::from_secs(self.connection_ttl_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter, e.g. `info` or `apns_pool=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_except_credential_path() {
        let config = RelayConfig::default();
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("credential_path"));
    }

    #[test]
    fn toml_round_trip() {
        let config = RelayConfig::default_with_overrides(|c| {
            c.gateway.host = "gateway.sandbox.push.apple.com".into();
            c.gateway.credential_path = PathBuf::from("/etc/apns/songpop.dev.pem");
            c.pool.probe_window = 4;
        });

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = RelayConfig::from_toml(&text).unwrap();

        assert_eq!(parsed.gateway.host, "gateway.sandbox.push.apple.com");
        assert_eq!(parsed.pool.probe_window, 4);
        assert_eq!(parsed.pool.lock_ttl_secs, 60);
        assert_eq!(parsed.pool.connection_ttl_secs, 120);
    }

    #[test]
    fn pool_name_derived_from_credential_and_host() {
        let config = RelayConfig::default_with_overrides(|c| {
            c.gateway.host = "gateway.sandbox.push.apple.com".into();
            c.gateway.credential_path = PathBuf::from("/etc/apns/songpop.dev.pem");
        });

        assert_eq!(
            config.gateway.derived_pool_name(),
            "songpop.dev.pem_gateway.sandbox.push.apple.com"
        );
    }

    #[test]
    fn shrink_probability_out_of_range_rejected() {
        let config = RelayConfig::default_with_overrides(|c| {
            c.gateway.credential_path = PathBuf::from("/tmp/cert.pem");
            c.pool.shrink_probability = 1.5;
        });
        assert_eq!(config.validate().len(), 1);
    }
}
