//! Configuration source loading and composition
//!
//! Every source yields a partial JSON overlay; the loader folds the overlays
//! over the compiled defaults in priority order, so a source only overrides
//! the keys it actually sets.

use crate::validation::Validate;
use crate::{
    ApplicationConfig, ConfigError, ConfigResult, ENV_API_KEY_ENV, ENV_API_URL, ENV_BATCH_SIZE,
    ENV_EMBEDDING_SEPARATOR, ENV_JSON_LOGS, ENV_PROGRESS_BAR, ENV_TRACING_LEVEL, TIMEOUT_ENV,
};
use serde_json::{Map, Value};
use std::path::Path;

/// Trait for loading configuration from different sources
pub trait ConfigurationSource {
    /// Load the overrides provided by this source
    ///
    /// The returned value is a (possibly empty) JSON object shaped like
    /// `ApplicationConfig`.
    ///
    /// # Errors
    /// Returns configuration loading errors
    fn load(&self) -> ConfigResult<Value>;

    /// Get the name of this configuration source
    fn name(&self) -> &str;

    /// Get the priority of this source (higher number = higher priority)
    fn priority(&self) -> u8;
}

/// Load configuration overrides from environment variables
pub struct EnvironmentSource;

impl EnvironmentSource {
    fn set_string(section: &mut Map<String, Value>, key: &str, var: &str) {
        if let Ok(value) = std::env::var(var) {
            section.insert(key.to_string(), Value::String(value));
        }
    }

    fn set_parsed<T>(section: &mut Map<String, Value>, key: &str, var: &str)
    where
        T: std::str::FromStr + Into<Value>,
    {
        if let Ok(raw) = std::env::var(var) {
            match raw.trim().parse::<T>() {
                Ok(value) => {
                    section.insert(key.to_string(), value.into());
                }
                Err(_) => tracing::warn!("Ignoring unparsable {var}={raw:?}"),
            }
        }
    }
}

impl ConfigurationSource for EnvironmentSource {
    fn load(&self) -> ConfigResult<Value> {
        let mut client = Map::new();
        Self::set_string(&mut client, "api_url", ENV_API_URL);
        Self::set_string(&mut client, "api_key_env", ENV_API_KEY_ENV);
        if std::env::var_os(TIMEOUT_ENV).is_some() {
            client.insert(
                "timeout_seconds".to_string(),
                crate::timeout_seconds_from_env().into(),
            );
        }

        let mut batching = Map::new();
        Self::set_parsed::<u64>(&mut batching, "batch_size", ENV_BATCH_SIZE);
        Self::set_string(&mut batching, "embedding_separator", ENV_EMBEDDING_SEPARATOR);
        Self::set_parsed::<bool>(&mut batching, "progress_bar", ENV_PROGRESS_BAR);

        let mut telemetry = Map::new();
        Self::set_string(&mut telemetry, "tracing_level", ENV_TRACING_LEVEL);
        Self::set_parsed::<bool>(&mut telemetry, "json_logs", ENV_JSON_LOGS);

        let mut overlay = Map::new();
        for (name, section) in [
            ("client", client),
            ("batching", batching),
            ("telemetry", telemetry),
        ] {
            if !section.is_empty() {
                overlay.insert(name.to_string(), Value::Object(section));
            }
        }
        Ok(Value::Object(overlay))
    }

    fn name(&self) -> &'static str {
        "environment"
    }

    fn priority(&self) -> u8 {
        100 // Highest priority - environment variables override everything
    }
}

/// Load configuration from TOML file
pub struct TomlFileSource {
    path: std::path::PathBuf,
}

impl TomlFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigurationSource for TomlFileSource {
    fn load(&self) -> ConfigResult<Value> {
        let content = std::fs::read_to_string(&self.path)?;
        let table: toml::Table = toml::from_str(&content)?;
        Ok(serde_json::to_value(table)?)
    }

    fn name(&self) -> &'static str {
        "toml_file"
    }

    fn priority(&self) -> u8 {
        50 // Medium priority - below env vars, above defaults
    }
}

/// Type alias for configuration sources
type ConfigSources = Vec<Box<dyn ConfigurationSource>>;

/// Configuration loader that combines multiple sources
pub struct ConfigurationLoader {
    sources: ConfigSources,
}

impl ConfigurationLoader {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    #[must_use]
    pub fn add_source(mut self, source: Box<dyn ConfigurationSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Fold all sources over the defaults without validating the result
    ///
    /// A source that fails to load is skipped with a warning.
    ///
    /// # Errors
    /// Returns an error if the merged overlay does not fit `ApplicationConfig`
    pub fn merged(&self) -> ConfigResult<ApplicationConfig> {
        let mut merged = serde_json::to_value(ApplicationConfig::default())?;

        // Lowest priority first, so higher priorities overwrite
        let mut sorted_sources = self.sources.iter().collect::<Vec<_>>();
        sorted_sources.sort_by_key(|source| source.priority());

        for source in sorted_sources {
            match source.load() {
                Ok(overlay) => {
                    tracing::debug!("Loaded configuration from source: {}", source.name());
                    merge_values(&mut merged, overlay);
                }
                Err(e) => {
                    tracing::warn!("Failed to load from source {}: {}", source.name(), e);
                }
            }
        }

        serde_json::from_value(merged).map_err(ConfigError::from)
    }

    /// Load configuration from all sources with priority ordering
    ///
    /// # Errors
    /// Returns configuration loading or validation errors
    pub fn load(&self) -> ConfigResult<ApplicationConfig> {
        let config = self.merged()?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigurationLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `overlay` into `base`; objects merge key by key, everything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    struct StaticSource {
        overlay: Value,
        priority: u8,
    }

    impl ConfigurationSource for StaticSource {
        fn load(&self) -> ConfigResult<Value> {
            Ok(self.overlay.clone())
        }

        fn name(&self) -> &'static str {
            "static"
        }

        fn priority(&self) -> u8 {
            self.priority
        }
    }

    #[test]
    fn test_toml_file_overrides_only_its_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[client]\napi_url = \"http://localhost:9000/v1\"\n\n[batching]\nbatch_size = 4"
        )
        .unwrap();

        let config = ConfigurationLoader::new()
            .add_source(Box::new(TomlFileSource::new(file.path())))
            .load()
            .unwrap();

        assert_eq!(config.client.api_url, "http://localhost:9000/v1");
        assert_eq!(config.batching.batch_size, 4);
        assert_eq!(config.client.api_key_env, crate::DEFAULT_API_KEY_ENV);
        assert!(config.batching.progress_bar);
    }

    #[test]
    fn test_higher_priority_wins() {
        let config = ConfigurationLoader::new()
            .add_source(Box::new(StaticSource {
                overlay: serde_json::json!({"batching": {"batch_size": 100}}),
                priority: 90,
            }))
            .add_source(Box::new(StaticSource {
                overlay: serde_json::json!({"batching": {"batch_size": 7}, "telemetry": {"json_logs": true}}),
                priority: 10,
            }))
            .load()
            .unwrap();

        assert_eq!(config.batching.batch_size, 100);
        assert!(config.telemetry.json_logs);
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let config = ConfigurationLoader::new()
            .add_source(Box::new(TomlFileSource::new("/definitely/not/here.toml")))
            .load()
            .unwrap();
        assert_eq!(config, ApplicationConfig::default());
    }

    #[test]
    fn test_invalid_merged_config_fails_validation() {
        let result = ConfigurationLoader::new()
            .add_source(Box::new(StaticSource {
                overlay: serde_json::json!({"batching": {"batch_size": 0}}),
                priority: 10,
            }))
            .load();
        assert!(result.is_err());
    }
}
