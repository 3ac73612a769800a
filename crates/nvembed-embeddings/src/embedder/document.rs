//! Batched document embedding component

use super::{EmbedderCore, InitWarning};
use crate::backend::{BackendConfig, EmbeddingBackend, Model};
use crate::component::{Component, ComponentDict, input_field};
use crate::{Document, EmbeddingError, EmbeddingMeta, EmbeddingResult};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use nvembed_config::ApplicationConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Constructor parameters of [`NvidiaDocumentEmbedder`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEmbedderParams {
    #[serde(flatten)]
    pub backend: BackendConfig,

    /// Prepended to each text
    #[serde(default)]
    pub prefix: String,

    /// Appended to each text
    #[serde(default)]
    pub suffix: String,

    /// Documents per backend call, at least 1
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Draw a progress bar on stderr
    #[serde(default = "default_progress_bar")]
    pub progress_bar: bool,

    /// Metadata fields embedded ahead of the content, in this order
    #[serde(default)]
    pub meta_fields_to_embed: Vec<String>,

    /// Joins embedded metadata values and the content
    #[serde(default = "default_embedding_separator")]
    pub embedding_separator: String,
}

const fn default_batch_size() -> usize {
    nvembed_config::DEFAULT_BATCH_SIZE
}

const fn default_progress_bar() -> bool {
    nvembed_config::DEFAULT_PROGRESS_BAR
}

fn default_embedding_separator() -> String {
    nvembed_config::DEFAULT_EMBEDDING_SEPARATOR.to_string()
}

impl Default for DocumentEmbedderParams {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            prefix: String::new(),
            suffix: String::new(),
            batch_size: default_batch_size(),
            progress_bar: default_progress_bar(),
            meta_fields_to_embed: Vec::new(),
            embedding_separator: default_embedding_separator(),
        }
    }
}

impl DocumentEmbedderParams {
    /// Parameters seeded from process configuration
    pub fn from_app_config(config: &ApplicationConfig) -> Self {
        Self {
            backend: BackendConfig::from_app_config(config),
            batch_size: config.batching.batch_size,
            progress_bar: config.batching.progress_bar,
            embedding_separator: config.batching.embedding_separator.clone(),
            ..Self::default()
        }
    }
}

/// Documents with embeddings attached, plus aggregated metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentEmbeddings {
    pub documents: Vec<Document>,
    pub meta: EmbeddingMeta,
}

/// Embeds a list of documents in batches, attaching a vector to each
pub struct NvidiaDocumentEmbedder {
    core: EmbedderCore,
    prefix: String,
    suffix: String,
    batch_size: usize,
    progress_bar: bool,
    meta_fields_to_embed: Vec<String>,
    embedding_separator: String,
}

impl NvidiaDocumentEmbedder {
    /// Validate parameters; no credential is resolved and no request is sent
    ///
    /// # Errors
    /// Returns `EmbeddingError::Validation` for a zero batch size or
    /// inconsistent backend parameters.
    pub fn new(params: DocumentEmbedderParams) -> EmbeddingResult<Self> {
        if params.batch_size == 0 {
            return Err(EmbeddingError::validation_error(
                "batch_size must be at least 1",
            ));
        }
        Ok(Self {
            core: EmbedderCore::new(params.backend)?,
            prefix: params.prefix,
            suffix: params.suffix,
            batch_size: params.batch_size,
            progress_bar: params.progress_bar,
            meta_fields_to_embed: params.meta_fields_to_embed,
            embedding_separator: params.embedding_separator,
        })
    }

    /// Current parameters, including a model filled in by default or discovery
    pub fn params(&self) -> DocumentEmbedderParams {
        DocumentEmbedderParams {
            backend: self.core.config().clone(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            batch_size: self.batch_size,
            progress_bar: self.progress_bar,
            meta_fields_to_embed: self.meta_fields_to_embed.clone(),
            embedding_separator: self.embedding_separator.clone(),
        }
    }

    pub fn model(&self) -> Option<&str> {
        self.core.config().model.as_deref()
    }

    pub const fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    /// Build the configured backend and resolve the model
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

    /// Strings sent to the backend, one per document
    ///
    /// Configured metadata values that are present and non-null come first,
    /// then the content (empty when absent), joined by the separator and
    /// wrapped in prefix and suffix.
    pub fn prepare_texts(&self, documents: &[Document]) -> Vec<String> {
        documents
            .iter()
            .map(|doc| {
                let mut parts: Vec<String> = self
                    .meta_fields_to_embed
                    .iter()
                    .filter_map(|field| doc.meta_text(field))
                    .collect();
                parts.push(doc.content.clone().unwrap_or_default());
                [
                    self.prefix.as_str(),
                    &parts.join(&self.embedding_separator),
                    self.suffix.as_str(),
                ]
                .concat()
            })
            .collect()
    }

    /// Embed `documents`, attaching one vector to each
    ///
    /// An empty list returns immediately without contacting the backend.
    ///
    /// # Errors
    /// Returns `EmbeddingError::NotInitialized` before warm-up, the first
    /// transport error, or `EmbeddingError::Response` when a batch comes back
    /// with the wrong number of vectors or mixed dimensions.
    pub async fn embed_documents(
        &self,
        mut documents: Vec<Document>,
    ) -> EmbeddingResult<DocumentEmbeddings> {
        let backend = self.core.backend()?;
        if documents.is_empty() {
            return Ok(DocumentEmbeddings {
                documents,
                meta: EmbeddingMeta::default(),
            });
        }

        let texts = self.prepare_texts(&documents);
        let (embeddings, meta) = self.embed_batches(backend, &texts).await?;
        for (doc, embedding) in documents.iter_mut().zip(embeddings) {
            doc.embedding = Some(embedding);
        }
        Ok(DocumentEmbeddings { documents, meta })
    }

    /// One backend call per chunk of `batch_size`, in order
    async fn embed_batches(
        &self,
        backend: &dyn EmbeddingBackend,
        texts: &[String],
    ) -> EmbeddingResult<(Vec<Vec<f32>>, EmbeddingMeta)> {
        let batch_count = texts.len().div_ceil(self.batch_size);
        let progress = self.progress(batch_count);

        let mut all_embeddings: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        let mut aggregated: Option<EmbeddingMeta> = None;

        for (index, batch) in texts.chunks(self.batch_size).enumerate() {
            tracing::debug!(batch = index, size = batch.len(), of = batch_count, "Embedding batch");

            let (embeddings, meta) = backend.embed(batch).await?;
            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::Response(format!(
                    "batch {index} sent {} texts but received {} embeddings",
                    batch.len(),
                    embeddings.len()
                )));
            }
            let expected_dim = all_embeddings.first().or_else(|| embeddings.first()).map(Vec::len);
            if let Some(dim) = expected_dim {
                if embeddings.iter().any(|embedding| embedding.len() != dim) {
                    return Err(EmbeddingError::Response(format!(
                        "batch {index} returned embeddings that are not all {dim}-dimensional"
                    )));
                }
            }

            all_embeddings.extend(embeddings);
            aggregated = Some(match aggregated {
                Some(total) => total.merge(meta),
                None => meta,
            });
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok((all_embeddings, aggregated.unwrap_or_default()))
    }

    fn progress(&self, batch_count: usize) -> ProgressBar {
        if !self.progress_bar {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(u64::try_from(batch_count).unwrap_or(u64::MAX));
        if let Ok(style) =
            ProgressStyle::with_template("Calculating embeddings {bar:40.cyan/blue} {pos}/{len}")
        {
            bar.set_style(style);
        }
        bar
    }
}

#[async_trait]
impl Component for NvidiaDocumentEmbedder {
    const TYPE_NAME: &'static str =
        "nvembed_embeddings::embedder::document::NvidiaDocumentEmbedder";

    async fn warm_up(&mut self) -> EmbeddingResult<Vec<InitWarning>> {
        Self::warm_up(self).await
    }

    /// Expects `{"documents": [...]}`, returns `{"documents": [...], "meta": {...}}`
    async fn run(&self, input: Value) -> EmbeddingResult<Value> {
        if !self.is_ready() {
            return Err(EmbeddingError::NotInitialized);
        }
        let documents = input_field(&input, "documents")
            .filter(|value| value.is_array())
            .and_then(|value| Vec::<Document>::deserialize(value).ok())
            .ok_or_else(|| {
                EmbeddingError::InvalidInput(
                    "NvidiaDocumentEmbedder expects a list of Documents as input. In case you \
                     want to embed a string, please use the NvidiaTextEmbedder."
                        .to_string(),
                )
            })?;

        let result = self.embed_documents(documents).await?;
        Ok(json!({"documents": result.documents, "meta": result.meta}))
    }

    fn to_dict(&self) -> EmbeddingResult<ComponentDict> {
        ComponentDict::new(Self::TYPE_NAME, &self.params())
    }

    fn from_dict(dict: ComponentDict) -> EmbeddingResult<Self> {
        Self::new(dict.into_params(Self::TYPE_NAME)?)
    }
}
