//! Remote inference transports
//!
//! Every transport implements [`EmbeddingBackend`]; [`build_backend`] picks
//! the implementation named by [`BackendKind`] and hands it the resolved
//! credentials.

pub mod auth;
pub mod config;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod nim;
pub mod triton;

pub use auth::AuthHeaders;
pub use config::{BackendConfig, BackendKwargs, Compression, TritonClientOptions, TritonInferOptions};
pub use nim::NimBackend;
pub use triton::{TritonBackend, TritonProtocol};

use crate::{Document, EmbeddingError, EmbeddingMeta, EmbeddingResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Model information as listed by an endpoint
///
/// `aliases` are deprecated names of the model; `base_model` names the root
/// model when this entry is a derivative or alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub base_model: Option<String>,
}

impl Model {
    /// Model with just an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            aliases: Vec::new(),
            base_model: None,
        }
    }

    /// A root model has no base model, or is its own base model
    pub fn is_root(&self) -> bool {
        self.base_model
            .as_deref()
            .is_none_or(|base_model| base_model == self.id)
    }
}

/// Result of a text-generation call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub replies: Vec<String>,
    pub meta: Vec<Map<String, Value>>,
}

/// A network transport that turns text into vectors
///
/// Implementations are owned by one component and called one batch at a
/// time; they are not expected to be shared across threads without
/// external synchronization.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed `texts`, returning one vector per input in input order
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<(Vec<Vec<f32>>, EmbeddingMeta)>;

    /// Models served at the endpoint
    ///
    /// # Errors
    /// Returns `EmbeddingError::Config` when the listing is empty.
    async fn models(&self) -> EmbeddingResult<Vec<Model>>;

    /// Rerank `documents` against `query`
    async fn rank(
        &self,
        _query: &str,
        _documents: &[Document],
        _endpoint: Option<&str>,
    ) -> EmbeddingResult<Vec<Map<String, Value>>> {
        Err(EmbeddingError::NotImplemented("rank"))
    }

    /// Generate text for `prompt`
    async fn generate(&self, _prompt: &str) -> EmbeddingResult<Generation> {
        Err(EmbeddingError::NotImplemented("generate"))
    }

    /// Model the backend sends requests for, if one is set
    fn model(&self) -> Option<&str>;

    /// Point the backend at `model`
    fn set_model(&mut self, model: String);
}

/// Transport selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// REST-style NIM endpoint
    #[default]
    #[serde(rename = "nim")]
    Nim,
    /// Triton inference server over HTTP
    #[serde(rename = "triton-http")]
    TritonHttp,
    /// Triton inference server over gRPC
    #[serde(rename = "triton-grpc")]
    TritonGrpc,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Nim => "nim",
            Self::TritonHttp => "triton-http",
            Self::TritonGrpc => "triton-grpc",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for BackendKind {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nim" => Ok(Self::Nim),
            "triton-http" => Ok(Self::TritonHttp),
            "triton-grpc" => Ok(Self::TritonGrpc),
            _ => Err(EmbeddingError::Validation(format!(
                "Unknown backend '{s}'. Supported backends are: nim, triton-http, triton-grpc"
            ))),
        }
    }
}

/// Whether `api_url` points at one of the hosted multi-tenant domains
///
/// Anything with an explicit port or without a parsable host counts as local.
pub fn is_hosted(api_url: &str) -> bool {
    reqwest::Url::parse(api_url).is_ok_and(|url| {
        url.port().is_none()
            && url
                .host_str()
                .is_some_and(|host| nvembed_config::HOSTED_DOMAINS.contains(&host))
    })
}

/// Build the transport described by `config`
///
/// Credentials are resolved here, so a missing strict API key surfaces at
/// warm-up rather than at component construction.
///
/// # Errors
/// Returns secret resolution, validation or client construction errors.
pub fn build_backend(config: &BackendConfig) -> EmbeddingResult<Box<dyn EmbeddingBackend>> {
    config.validate()?;

    let timeout = config.request_timeout()?;
    let auth = AuthHeaders::from_credentials(
        config.api_key.as_ref(),
        config.username.as_ref(),
        config.password.as_ref(),
    )?;

    tracing::info!(
        backend = %config.backend,
        api_url = %config.api_url,
        model = config.model.as_deref().unwrap_or("<auto>"),
        auth = auth.scheme(),
        "Building embedding backend"
    );

    let backend: Box<dyn EmbeddingBackend> = match config.backend {
        BackendKind::Nim => Box::new(NimBackend::new(
            config.model.clone(),
            &config.api_url,
            &auth,
            config.truncate,
            timeout,
        )?),
        BackendKind::TritonHttp => Box::new(TritonBackend::new(
            config.model.clone(),
            &config.api_url,
            &auth,
            TritonProtocol::Http,
            timeout,
            config.backend_kwargs.clone().unwrap_or_default(),
        )?),
        BackendKind::TritonGrpc => Box::new(TritonBackend::new(
            config.model.clone(),
            &config.api_url,
            &auth,
            TritonProtocol::Grpc,
            timeout,
            config.backend_kwargs.clone().unwrap_or_default(),
        )?),
    };
    Ok(backend)
}

/// Fail with the configuration error every transport uses for an empty listing
pub(crate) fn ensure_models_found(models: Vec<Model>, url: &str) -> EmbeddingResult<Vec<Model>> {
    if models.is_empty() {
        return Err(EmbeddingError::Config(format!(
            "No hosted model were found at URL '{url}'."
        )));
    }
    Ok(models)
}
