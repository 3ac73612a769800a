//! Single-string embedding component

use super::{EmbedderCore, InitWarning};
use crate::backend::{BackendConfig, EmbeddingBackend, Model};
use crate::component::{Component, ComponentDict, input_field};
use crate::{EmbeddingError, EmbeddingMeta, EmbeddingResult};
use async_trait::async_trait;
use nvembed_config::ApplicationConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Constructor parameters of [`NvidiaTextEmbedder`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextEmbedderParams {
    #[serde(flatten)]
    pub backend: BackendConfig,

    /// Prepended to the text
    #[serde(default)]
    pub prefix: String,

    /// Appended to the text
    #[serde(default)]
    pub suffix: String,
}

impl TextEmbedderParams {
    /// Parameters seeded from process configuration
    pub fn from_app_config(config: &ApplicationConfig) -> Self {
        Self {
            backend: BackendConfig::from_app_config(config),
            ..Self::default()
        }
    }
}

/// Embedding of one string
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextEmbedding {
    pub embedding: Vec<f32>,
    pub meta: EmbeddingMeta,
}

/// Embeds a single string, typically a query
///
/// ```no_run
/// # async fn demo() -> nvembed_embeddings::EmbeddingResult<()> {
/// use nvembed_embeddings::{NvidiaTextEmbedder, TextEmbedderParams};
///
/// let mut embedder = NvidiaTextEmbedder::new(TextEmbedderParams::default())?;
/// embedder.warm_up().await?;
/// let result = embedder.embed_text("What is the capital of France?").await?;
/// println!("{} dimensions", result.embedding.len());
/// # Ok(())
/// # }
/// ```
pub struct NvidiaTextEmbedder {
    core: EmbedderCore,
    prefix: String,
    suffix: String,
}

impl NvidiaTextEmbedder {
    /// Validate parameters; no credential is resolved and no request is sent
    ///
    /// # Errors
    /// Returns `EmbeddingError::Validation` for inconsistent parameters.
    pub fn new(params: TextEmbedderParams) -> EmbeddingResult<Self> {
        Ok(Self {
            core: EmbedderCore::new(params.backend)?,
            prefix: params.prefix,
            suffix: params.suffix,
        })
    }

    /// Current parameters, including a model filled in by default or discovery
    pub fn params(&self) -> TextEmbedderParams {
        TextEmbedderParams {
            backend: self.core.config().clone(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
        }
    }

    /// Model requests are sent for, once known
    pub fn model(&self) -> Option<&str> {
        self.core.config().model.as_deref()
    }

    pub const fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    /// Build the configured backend and resolve the model
    ///
    /// Returns the warnings raised along the way; calling it again once
    /// ready does nothing.
    ///
    /// # Errors
    /// Returns credential, client construction or model discovery errors.
    pub async fn warm_up(&mut self) -> EmbeddingResult<Vec<InitWarning>> {
        self.core.warm_up().await
    }

    /// Warm up over a caller-supplied backend
    ///
    /// # Errors
    /// Returns model discovery errors.
    pub async fn warm_up_with_backend(
        &mut self,
        backend: Box<dyn EmbeddingBackend>,
    ) -> EmbeddingResult<Vec<InitWarning>> {
        self.core.warm_up_with_backend(backend).await
    }

    /// Models served at the endpoint
    ///
    /// # Errors
    /// Returns `EmbeddingError::NotInitialized` before warm-up, or listing errors.
    pub async fn available_models(&self) -> EmbeddingResult<Vec<Model>> {
        self.core.available_models().await
    }

    /// Embed `prefix + text + suffix` with a single backend call
    ///
    /// # Errors
    /// Returns `EmbeddingError::NotInitialized` before warm-up, transport
    /// errors, or `EmbeddingError::Response` if the service does not return
    /// exactly one vector.
    pub async fn embed_text(&self, text: &str) -> EmbeddingResult<TextEmbedding> {
        let backend = self.core.backend()?;
        let input = [self.prefix.as_str(), text, self.suffix.as_str()].concat();

        let (embeddings, meta) = backend.embed(&[input]).await?;
        let [embedding]: [Vec<f32>; 1] = embeddings.try_into().map_err(|got: Vec<Vec<f32>>| {
            EmbeddingError::Response(format!("expected 1 embedding, received {}", got.len()))
        })?;
        Ok(TextEmbedding { embedding, meta })
    }
}

#[async_trait]
impl Component for NvidiaTextEmbedder {
    const TYPE_NAME: &'static str = "nvembed_embeddings::embedder::text::NvidiaTextEmbedder";

    async fn warm_up(&mut self) -> EmbeddingResult<Vec<InitWarning>> {
        Self::warm_up(self).await
    }

    /// Expects `{"text": <string>}`, returns `{"embedding": [...], "meta": {...}}`
    async fn run(&self, input: Value) -> EmbeddingResult<Value> {
        if !self.is_ready() {
            return Err(EmbeddingError::NotInitialized);
        }
        let Some(Value::String(text)) = input_field(&input, "text") else {
            return Err(EmbeddingError::InvalidInput(
                "NvidiaTextEmbedder expects a string as an input. In case you want to embed a \
                 list of Documents, please use the NvidiaDocumentEmbedder."
                    .to_string(),
            ));
        };

        let result = self.embed_text(text).await?;
        Ok(json!({"embedding": result.embedding, "meta": result.meta}))
    }

    fn to_dict(&self) -> EmbeddingResult<ComponentDict> {
        ComponentDict::new(Self::TYPE_NAME, &self.params())
    }

    fn from_dict(dict: ComponentDict) -> EmbeddingResult<Self> {
        Self::new(dict.into_params(Self::TYPE_NAME)?)
    }
}
