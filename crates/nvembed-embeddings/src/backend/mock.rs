//! In-memory backend for tests

use super::{EmbeddingBackend, Model, ensure_models_found};
use crate::{EmbeddingMeta, EmbeddingResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Vector returned for every input
pub const MOCK_EMBEDDING: [f32; 3] = [0.1, 0.2, 0.3];

/// Backend that records every batch and answers with fixed vectors
///
/// Clones share the recorded batches, so a test can keep a handle after
/// giving the backend to a component.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    model: Option<String>,
    models: Vec<Model>,
    batches: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `models` from the model listing
    #[must_use]
    pub fn with_models(mut self, models: Vec<Model>) -> Self {
        self.models = models;
        self
    }

    /// Start with `model` already selected
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Every batch received so far, in call order
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches
            .lock()
            .map(|batches| batches.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl EmbeddingBackend for MockBackend {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<(Vec<Vec<f32>>, EmbeddingMeta)> {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(texts.to_vec());
        }
        let embeddings = texts.iter().map(|_| MOCK_EMBEDDING.to_vec()).collect();
        Ok((embeddings, EmbeddingMeta::with_usage(4, 4)))
    }

    async fn models(&self) -> EmbeddingResult<Vec<Model>> {
        ensure_models_found(self.models.clone(), "mock://models")
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn set_model(&mut self, model: String) {
        self.model = Some(model);
    }
}
