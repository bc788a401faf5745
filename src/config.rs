//! Configuration management for Tempo.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::info;

use crate::debounce::{coerce_millis, DebounceOptions};
use crate::error::{Result, TempoError};

/// Prefix for environment overrides, e.g. `TEMPO__DEBOUNCE__WAIT_MS=250`.
pub const ENV_PREFIX: &str = "TEMPO";

/// Main configuration for the Tempo binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TempoConfig {
    /// Debounce policy
    #[serde(default)]
    pub debounce: DebounceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Debounce policy as read from configuration.
///
/// Millisecond values are coerced loosely: numeric strings are accepted and
/// anything non-numeric or negative becomes 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Base debounce delay in milliseconds
    #[serde(default = "default_wait_ms", deserialize_with = "loose_millis")]
    pub wait_ms: u64,

    /// Invoke on the leading edge of a burst
    #[serde(default)]
    pub leading: bool,

    /// Invoke on the trailing edge of a burst
    #[serde(default = "default_trailing")]
    pub trailing: bool,

    /// Ceiling on time between invocations in milliseconds; `null` means none
    #[serde(default, deserialize_with = "loose_optional_millis")]
    pub max_wait_ms: Option<u64>,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            wait_ms: default_wait_ms(),
            leading: false,
            trailing: default_trailing(),
            max_wait_ms: None,
        }
    }
}

fn default_wait_ms() -> u64 {
    200
}

fn default_trailing() -> bool {
    true
}

fn loose_millis<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_millis(&value))
}

fn loose_optional_millis<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(Some(coerce_millis(&value)))
}

impl DebounceConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// Convert to typed options. The max wait is floored at the wait when the
    /// wrapper is built.
    pub fn to_options(&self) -> DebounceOptions {
        DebounceOptions {
            leading: self.leading,
            trailing: self.trailing,
            max_wait: self.max_wait_ms.map(Duration::from_millis),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
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

impl TempoConfig {
    /// Load configuration from an optional YAML file layered under
    /// `TEMPO__`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TempoError::Config(format!("Failed to parse configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Environment variables are process-wide; tests calling `load` hold this.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Sets environment variables and removes them again on drop.
    struct EnvVars(Vec<&'static str>);

    impl EnvVars {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
            Self(vars.iter().map(|(key, _)| *key).collect())
        }
    }

    impl Drop for EnvVars {
        fn drop(&mut self) {
            for key in &self.0 {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_defaults() {
        let config = TempoConfig::default();
        assert_eq!(config.debounce.wait_ms, 200);
        assert!(!config.debounce.leading);
        assert!(config.debounce.trailing);
        assert_eq!(config.debounce.max_wait_ms, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
debounce:
  wait_ms: 100
  leading: true
  trailing: false
  max_wait_ms: 500
logging:
  level: debug
  json: true
"#;
        let config = TempoConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.debounce.wait(), Duration::from_millis(100));
        let options = config.debounce.to_options();
        assert!(options.leading);
        assert!(!options.trailing);
        assert_eq!(options.max_wait, Some(Duration::from_millis(500)));
        assert!(config.logging.json);
    }

    #[test]
    fn test_parse_partial_config_uses_defaults() {
        let config = TempoConfig::from_yaml("debounce:\n  leading: true\n").unwrap();
        assert_eq!(config.debounce.wait_ms, 200);
        assert!(config.debounce.trailing);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_loose_millis_coercion() {
        let yaml = r#"
debounce:
  wait_ms: "250"
  max_wait_ms: soon
"#;
        let config = TempoConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.debounce.wait_ms, 250);
        // Present but non-numeric degrades to 0, later floored at the wait
        assert_eq!(config.debounce.max_wait_ms, Some(0));

        let config = TempoConfig::from_yaml("debounce:\n  wait_ms: -40\n").unwrap();
        assert_eq!(config.debounce.wait_ms, 0);
    }

    #[test]
    fn test_null_max_wait_is_unset() {
        let config = TempoConfig::from_yaml("debounce:\n  max_wait_ms: ~\n").unwrap();
        assert_eq!(config.debounce.max_wait_ms, None);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("tempo-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "debounce:\n  wait_ms: 75\n  max_wait_ms: 300\n").unwrap();

        let config = TempoConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.debounce.wait_ms, 75);
        assert_eq!(config.debounce.max_wait_ms, Some(300));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = TempoConfig::from_yaml("debounce: [unclosed");
        assert!(matches!(result, Err(TempoError::Config(_))));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let _lock = ENV_LOCK.lock();
        let config = TempoConfig::load(None).unwrap();
        assert!(config.debounce.trailing);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let _lock = ENV_LOCK.lock();
        let result = TempoConfig::load(Some(Path::new("/nonexistent/tempo.yaml")));
        assert!(matches!(result, Err(TempoError::Config(_))));
    }

    #[test]
    fn test_load_env_overrides_file() {
        let _lock = ENV_LOCK.lock();
        let path = std::env::temp_dir().join(format!("tempo-layered-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "debounce:\n  wait_ms: 75\n  trailing: false\nlogging:\n  level: warn\n",
        )
        .unwrap();

        let result = {
            let _env = EnvVars::set(&[
                ("TEMPO__DEBOUNCE__WAIT_MS", "250"),
                ("TEMPO__DEBOUNCE__LEADING", "true"),
                ("TEMPO__DEBOUNCE__MAX_WAIT_MS", "soon"),
            ]);
            TempoConfig::load(Some(path.as_path()))
        };
        std::fs::remove_file(&path).unwrap();
        let config = result.unwrap();

        // Environment wins over the file, with loose millisecond coercion
        assert_eq!(config.debounce.wait_ms, 250);
        assert!(config.debounce.leading);
        assert_eq!(config.debounce.max_wait_ms, Some(0));

        // Keys only in the file survive
        assert!(!config.debounce.trailing);
        assert_eq!(config.logging.level, "warn");
    }
}
