//! Construction parameters shared by every transport

use super::BackendKind;
use crate::{EmbeddingError, EmbeddingResult, EmbeddingTruncateMode, Secret};
use nvembed_config::ApplicationConfig;
use nvembed_config::validation::validate_duration_seconds;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything needed to build a backend, kept unresolved until warm-up
///
/// Serializes to the `init_parameters` shape of the embedding components;
/// secrets appear as descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// API key, sent as a bearer token
    #[serde(default = "default_api_key")]
    pub api_key: Option<Secret>,

    /// Model to request; discovered at warm-up when unset on a local endpoint
    #[serde(default)]
    pub model: Option<String>,

    /// Endpoint URL (`http://host:port` for NIM, `host:port` also accepted for Triton)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// NIM-only input truncation policy
    #[serde(default)]
    pub truncate: Option<EmbeddingTruncateMode>,

    /// Transport to use
    #[serde(default)]
    pub backend: BackendKind,

    /// Request timeout in seconds; `NVIDIA_TIMEOUT` or 60 when unset
    #[serde(default)]
    pub timeout: Option<f64>,

    /// HTTP basic auth user name (takes precedence over `api_key` with `password`)
    #[serde(default)]
    pub username: Option<Secret>,

    /// HTTP basic auth password
    #[serde(default)]
    pub password: Option<Secret>,

    /// Triton client and inference options
    #[serde(default)]
    pub backend_kwargs: Option<BackendKwargs>,
}

fn default_api_key() -> Option<Secret> {
    Some(Secret::from_env_var(nvembed_config::DEFAULT_API_KEY_ENV))
}

fn default_api_url() -> String {
    nvembed_config::DEFAULT_API_URL.to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            model: None,
            api_url: default_api_url(),
            truncate: None,
            backend: BackendKind::default(),
            timeout: None,
            username: None,
            password: None,
            backend_kwargs: None,
        }
    }
}

impl BackendConfig {
    /// Seed endpoint, credential variable and timeout from process configuration
    pub fn from_app_config(config: &ApplicationConfig) -> Self {
        Self {
            api_key: Some(Secret::from_env_var(config.client.api_key_env.clone())),
            api_url: config.client.api_url.clone(),
            timeout: Some(config.client.timeout_seconds),
            ..Self::default()
        }
    }

    /// Check parameter combinations without touching the network
    ///
    /// # Errors
    /// Returns `EmbeddingError::Validation` for truncation on a Triton
    /// transport, a non-positive timeout, an empty URL or an option the
    /// selected transport cannot honour.
    pub fn validate(&self) -> EmbeddingResult<()> {
        if self.truncate.is_some() && self.backend != BackendKind::Nim {
            return Err(EmbeddingError::validation_error(
                "Truncation is only supported with the nim backend.",
            ));
        }
        if self.api_url.trim().is_empty() {
            return Err(EmbeddingError::validation_error("api_url cannot be empty"));
        }
        self.request_timeout()?;
        if let Some(kwargs) = &self.backend_kwargs {
            kwargs.validate(self.backend)?;
        }
        Ok(())
    }

    /// Effective request timeout
    ///
    /// # Errors
    /// Returns `EmbeddingError::Validation` for a non-positive or out-of-range timeout.
    pub fn request_timeout(&self) -> EmbeddingResult<Duration> {
        match self.timeout {
            Some(seconds) => validate_duration_seconds(seconds, "timeout").map_err(EmbeddingError::from),
            None => Ok(nvembed_config::request_timeout()),
        }
    }
}

/// Options forwarded to the Triton client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendKwargs {
    /// Connection-level options
    #[serde(default, skip_serializing_if = "TritonClientOptions::is_empty")]
    pub client_kwargs: TritonClientOptions,

    /// Per-inference options
    #[serde(default, skip_serializing_if = "TritonInferOptions::is_empty")]
    pub infer_kwargs: TritonInferOptions,
}

impl BackendKwargs {
    fn validate(&self, backend: BackendKind) -> EmbeddingResult<()> {
        if self.client_kwargs.concurrency == Some(0) {
            return Err(EmbeddingError::validation_error(
                "client_kwargs.concurrency must be at least 1",
            ));
        }
        self.client_kwargs.connection_timeout()?;

        let infer = &self.infer_kwargs;
        let uses_deflate = [
            infer.request_compression_algorithm,
            infer.response_compression_algorithm,
        ]
        .contains(&Some(Compression::Deflate));
        if backend == BackendKind::TritonGrpc && uses_deflate {
            return Err(EmbeddingError::validation_error(
                "deflate compression is not supported over gRPC, use gzip",
            ));
        }
        Ok(())
    }
}

/// Connection-level Triton options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TritonClientOptions {
    /// Maximum concurrent connections (HTTP idle pool size, gRPC in-flight limit)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Use TLS for scheme-less endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl: Option<bool>,

    /// Connect timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<f64>,
}

impl TritonClientOptions {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether TLS was requested
    pub fn use_ssl(&self) -> bool {
        self.ssl.unwrap_or(false)
    }

    /// Connect timeout as a `Duration`
    ///
    /// # Errors
    /// Returns `EmbeddingError::Validation` for a non-positive or out-of-range value.
    pub fn connection_timeout(&self) -> EmbeddingResult<Option<Duration>> {
        self.connection_timeout
            .map(|seconds| validate_duration_seconds(seconds, "client_kwargs.connection_timeout"))
            .transpose()
            .map_err(EmbeddingError::from)
    }
}

/// Per-inference Triton options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TritonInferOptions {
    /// Compress request bodies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_compression_algorithm: Option<Compression>,

    /// Ask the server to compress responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_compression_algorithm: Option<Compression>,

    /// Pin a model version instead of the server's default policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,

    /// Scheduling priority (lower value is higher priority, 0 uses the model default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u64>,
}

impl TritonInferOptions {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Body compression algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Gzip,
    Deflate,
}

impl Compression {
    /// `Content-Encoding` token
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }
}
