//! Centralized configuration management for nvembed
//!
//! This crate provides the process-wide defaults used by the embedding
//! components and the layered loading that can override them.
//!
//! Configuration follows a simple hierarchy:
//! 1. Safe defaults (defined as constants)
//! 2. Configuration files (TOML)
//! 3. Environment variable overrides
//! 4. Runtime validation

pub mod error;
pub mod source;
pub mod validation;

pub use error::{ConfigError, ConfigResult};

use std::time::Duration;

// =============================================================================
// SAFE DEFAULTS
// =============================================================================

/// Retrieval endpoint of the hosted NVIDIA API catalog
pub const DEFAULT_API_URL: &str = "https://ai.api.nvidia.com/v1/retrieval/nvidia";

/// Environment variable holding the default API key
pub const DEFAULT_API_KEY_ENV: &str = "NVIDIA_API_KEY";

/// Environment variable overriding the request timeout (seconds, float)
pub const TIMEOUT_ENV: &str = "NVIDIA_TIMEOUT";

/// Request timeout used when neither the component nor the environment sets one
pub const DEFAULT_TIMEOUT_SECONDS: f64 = 60.0;

/// Model used against hosted endpoints when none is configured
pub const DEFAULT_HOSTED_MODEL: &str = "nvidia/nv-embedqa-e5-v5";

/// Multi-tenant domains that never go through model auto-discovery
pub const HOSTED_DOMAINS: [&str; 2] = ["integrate.api.nvidia.com", "ai.api.nvidia.com"];

/// Number of documents sent per backend call
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Separator between embedded metadata values and document content
pub const DEFAULT_EMBEDDING_SEPARATOR: &str = "\n";

/// Whether document embedding draws a progress bar
pub const DEFAULT_PROGRESS_BAR: bool = true;

const MAX_BATCH_SIZE: u64 = 100_000;
const DEFAULT_TRACING_LEVEL: &str = "info";
const DEFAULT_JSON_LOGS: bool = false;

// Environment overrides
const ENV_API_URL: &str = "NVEMBED_API_URL";
const ENV_API_KEY_ENV: &str = "NVEMBED_API_KEY_ENV";
const ENV_BATCH_SIZE: &str = "NVEMBED_BATCH_SIZE";
const ENV_EMBEDDING_SEPARATOR: &str = "NVEMBED_EMBEDDING_SEPARATOR";
const ENV_PROGRESS_BAR: &str = "NVEMBED_PROGRESS_BAR";
const ENV_TRACING_LEVEL: &str = "NVEMBED_LOG_LEVEL";
const ENV_JSON_LOGS: &str = "NVEMBED_LOG_JSON";

/// Core configuration for processes using the nvembed components
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Remote inference client settings
    pub client: ClientConfig,

    /// Document batching settings
    pub batching: BatchingConfig,

    /// Logging settings
    pub telemetry: TelemetryConfig,
}

/// Settings shared by every backend client
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Endpoint URL; `http(s)://...` for NIM, `host:port` also accepted for Triton
    pub api_url: String,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,

    /// Request timeout in seconds
    pub timeout_seconds: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl ClientConfig {
    /// Timeout as a `Duration`
    ///
    /// Falls back to the default when `timeout_seconds` is out of range.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds).unwrap_or_else(|_| default_timeout())
    }
}

/// How document lists are cut into backend calls
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Documents per backend call
    pub batch_size: usize,

    /// Joins embedded metadata values and the document content
    pub embedding_separator: String,

    /// Draw a progress bar while embedding documents
    pub progress_bar: bool,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            embedding_separator: DEFAULT_EMBEDDING_SEPARATOR.to_string(),
            progress_bar: DEFAULT_PROGRESS_BAR,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Default `tracing` level when `RUST_LOG` is unset
    pub tracing_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            tracing_level: DEFAULT_TRACING_LEVEL.to_string(),
            json_logs: DEFAULT_JSON_LOGS,
        }
    }
}

impl TelemetryConfig {
    /// Install the global `tracing` subscriber at this level and format
    ///
    /// `RUST_LOG` still takes precedence. Only the first installation in a
    /// process has any effect.
    pub fn install_subscriber(&self) {
        nvembed_common::init::init_tracing(&self.tracing_level, self.json_logs);
    }
}

impl ApplicationConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        source::ConfigurationLoader::new()
            .add_source(Box::new(source::EnvironmentSource))
            .merged()
            .unwrap_or_else(|e| {
                tracing::warn!("Ignoring environment overrides: {e}");
                Self::default()
            })
    }
}

/// Request timeout from `NVIDIA_TIMEOUT`, or 60 seconds
///
/// An unparsable, non-positive or out-of-range value falls back to the
/// default with a warning.
pub fn request_timeout() -> Duration {
    Duration::try_from_secs_f64(timeout_seconds_from_env()).unwrap_or_else(|_| default_timeout())
}

fn default_timeout() -> Duration {
    Duration::from_secs_f64(DEFAULT_TIMEOUT_SECONDS)
}

/// Timeout in seconds from `NVIDIA_TIMEOUT`, or 60.0
pub fn timeout_seconds_from_env() -> f64 {
    match std::env::var(TIMEOUT_ENV) {
        Ok(raw) => match raw.trim().parse::<f64>() {
            Ok(seconds) if validation::validate_duration_seconds(seconds, TIMEOUT_ENV).is_ok() => {
                seconds
            }
            _ => {
                tracing::warn!(
                    "{TIMEOUT_ENV}={raw:?} is not a usable number of seconds, using {DEFAULT_TIMEOUT_SECONDS}"
                );
                DEFAULT_TIMEOUT_SECONDS
            }
        },
        Err(_) => DEFAULT_TIMEOUT_SECONDS,
    }
}

impl validation::Validate for ClientConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_non_empty(&self.api_url, "client.api_url")?;
        validation::validate_endpoint(&self.api_url, "client.api_url")?;
        validation::validate_non_empty(&self.api_key_env, "client.api_key_env")?;
        validation::validate_duration_seconds(self.timeout_seconds, "client.timeout_seconds")
            .map(|_| ())
    }
}

impl validation::Validate for BatchingConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(
            self.batch_size as u64,
            1,
            MAX_BATCH_SIZE,
            "batching.batch_size",
        )
    }
}

impl validation::Validate for TelemetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self.tracing_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::Generic {
                message: format!("Invalid tracing level: {}", self.tracing_level),
            }),
        }
    }
}

impl validation::Validate for ApplicationConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.client.validate()?;
        self.batching.validate()?;
        self.telemetry.validate()
    }
}
