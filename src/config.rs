//! Configuration management for Hostwatch.
//!
//! Values are layered from built-in defaults, an optional YAML file and
//! `HOSTWATCH__<SECTION>__<FIELD>` environment variables. Command line flags
//! are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{HostwatchError, Result};
use crate::ratelimit::LimitConfig;

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "HOSTWATCH";

/// Main configuration for the Hostwatch service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostwatchConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Maximum requests per client per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// How often idle clients are swept from the window store, in seconds
    #[serde(default = "default_eviction_interval")]
    pub eviction_interval_secs: u64,

    /// Key clients by the first `X-Forwarded-For` address instead of the
    /// connection's remote address. Only enable behind a trusted proxy.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            eviction_interval_secs: default_eviction_interval(),
            trust_forwarded_for: false,
        }
    }
}

fn default_max_requests() -> u64 {
    20
}

fn default_window_secs() -> u64 {
    30
}

fn default_eviction_interval() -> u64 {
    60
}

impl RateLimitingConfig {
    /// The limiter settings described by this section.
    pub fn limit_config(&self) -> LimitConfig {
        LimitConfig {
            max_requests: self.max_requests,
            window_length: Duration::from_secs(self.window_secs),
        }
    }

    /// Interval between idle-client sweeps.
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON formatted log lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl HostwatchConfig {
    /// Load configuration from defaults, an optional YAML file and the
    /// environment.
    ///
    /// The result is not validated: command line overrides may still replace
    /// any value, so call [`validate`](Self::validate) once they are applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Yaml),
            );
        }

        let config: HostwatchConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: HostwatchConfig = serde_yaml::from_str(yaml)
            .map_err(|e| HostwatchError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the limiter cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limiting.max_requests == 0 {
            return Err(HostwatchError::Config(
                "rate_limiting.max_requests must be greater than zero".to_string(),
            ));
        }
        if self.rate_limiting.window_secs == 0 {
            return Err(HostwatchError::Config(
                "rate_limiting.window_secs must be greater than zero".to_string(),
            ));
        }
        if self.rate_limiting.eviction_interval_secs == 0 {
            return Err(HostwatchError::Config(
                "rate_limiting.eviction_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HostwatchConfig::default();
        assert_eq!(config.server.http_addr.port(), 3000);
        assert_eq!(config.rate_limiting.max_requests, 20);
        assert_eq!(config.rate_limiting.window_secs, 30);
        assert!(!config.rate_limiting.trust_forwarded_for);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
rate_limiting:
  max_requests: 5
"#;
        let config = HostwatchConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.rate_limiting.max_requests, 5);
        assert_eq!(config.rate_limiting.window_secs, 30);
        assert_eq!(config.server.http_addr.port(), 3000);
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
server:
  http_addr: "127.0.0.1:8088"
rate_limiting:
  max_requests: 100
  window_secs: 60
  eviction_interval_secs: 10
  trust_forwarded_for: true
logging:
  level: debug
  json: true
"#;
        let config = HostwatchConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.server.http_addr,
            "127.0.0.1:8088".parse::<SocketAddr>().unwrap()
        );
        assert!(config.rate_limiting.trust_forwarded_for);
        assert_eq!(
            config.rate_limiting.limit_config().window_length,
            Duration::from_secs(60)
        );
        assert_eq!(config.rate_limiting.eviction_interval(), Duration::from_secs(10));
        assert!(config.logging.json);
    }

    #[test]
    fn test_zero_max_requests_rejected() {
        let yaml = r#"
rate_limiting:
  max_requests: 0
"#;
        let err = HostwatchConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, HostwatchError::Config(_)));
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = HostwatchConfig::default();
        config.rate_limiting.window_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let err = HostwatchConfig::from_yaml("server: [not, a, map]").unwrap_err();
        assert!(matches!(err, HostwatchError::Config(_)));
    }

    /// `load` reads the process environment; tests that call it hold this.
    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

    fn temp_yaml(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "hostwatch-{}-{}.yaml",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_and_from_file_read_yaml() {
        let _env = ENV_LOCK.lock();
        let path = std::env::temp_dir().join(format!("hostwatch-test-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "rate_limiting:\n  max_requests: 7\n  window_secs: 15\n",
        )
        .unwrap();

        let loaded = HostwatchConfig::load(Some(path.as_path())).unwrap();
        let parsed = HostwatchConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.rate_limiting.max_requests, 7);
        assert_eq!(loaded.rate_limiting.window_secs, 15);
        assert_eq!(parsed.rate_limiting.max_requests, 7);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let _env = ENV_LOCK.lock();
        let config = HostwatchConfig::load(None).unwrap();
        assert!(config.rate_limiting.max_requests > 0);
    }

    #[test]
    fn test_environment_overrides_file() {
        let _env = ENV_LOCK.lock();
        let path = temp_yaml(
            "env-over-file",
            "server:\n  http_addr: \"127.0.0.1:9000\"\nrate_limiting:\n  max_requests: 7\n  window_secs: 15\n",
        );

        std::env::set_var("HOSTWATCH__RATE_LIMITING__MAX_REQUESTS", "9");
        std::env::set_var("HOSTWATCH__SERVER__HTTP_ADDR", "127.0.0.1:8088");
        std::env::set_var("HOSTWATCH__LOGGING__JSON", "true");
        let loaded = HostwatchConfig::load(Some(path.as_path()));
        std::env::remove_var("HOSTWATCH__RATE_LIMITING__MAX_REQUESTS");
        std::env::remove_var("HOSTWATCH__SERVER__HTTP_ADDR");
        std::env::remove_var("HOSTWATCH__LOGGING__JSON");
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.rate_limiting.max_requests, 9);
        assert_eq!(config.rate_limiting.window_secs, 15);
        assert_eq!(config.server.http_addr.port(), 8088);
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_leaves_validation_to_caller() {
        let _env = ENV_LOCK.lock();

        std::env::set_var("HOSTWATCH__RATE_LIMITING__WINDOW_SECS", "0");
        let loaded = HostwatchConfig::load(None);
        std::env::remove_var("HOSTWATCH__RATE_LIMITING__WINDOW_SECS");

        let mut config = loaded.unwrap();
        assert_eq!(config.rate_limiting.window_secs, 0);
        assert!(config.validate().is_err());

        config.rate_limiting.window_secs = 5;
        assert!(config.validate().is_ok());
    }
}
