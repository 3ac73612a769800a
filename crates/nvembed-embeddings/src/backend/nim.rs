//! REST transport for NVIDIA NIM endpoints

use super::{AuthHeaders, EmbeddingBackend, Model, ensure_models_found};
use crate::meta::Usage;
use crate::{EmbeddingError, EmbeddingMeta, EmbeddingResult, EmbeddingTruncateMode};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const INPUT_TYPE_QUERY: &str = "query";

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<EmbeddingTruncateMode>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    root: Option<String>,
}

/// Client for the `/embeddings` and `/models` routes of a NIM endpoint
#[derive(Debug, Clone)]
pub struct NimBackend {
    client: Client,
    api_url: String,
    model: Option<String>,
    truncate: Option<EmbeddingTruncateMode>,
}

impl NimBackend {
    /// Build a client with the auth header baked into its default headers
    ///
    /// # Errors
    /// Returns an error if the credential is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(
        model: Option<String>,
        api_url: &str,
        auth: &AuthHeaders,
        truncate: Option<EmbeddingTruncateMode>,
        timeout: Duration,
    ) -> EmbeddingResult<Self> {
        let mut headers = auth.header_map()?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            model,
            truncate,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{route}", self.api_url)
    }
}

#[async_trait]
impl EmbeddingBackend for NimBackend {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<(Vec<Vec<f32>>, EmbeddingMeta)> {
        let model = self.model.as_deref().ok_or_else(|| {
            EmbeddingError::validation_error("no model configured for the NIM backend")
        })?;
        let request = EmbeddingsRequest {
            model,
            input: texts,
            input_type: INPUT_TYPE_QUERY,
            truncate: self.truncate,
        };

        let url = self.url("embeddings");
        tracing::debug!(url = %url, model, inputs = texts.len(), "NIM embeddings request");

        let response: EmbeddingsResponse = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut data = response.data;
        data.sort_by_key(|entry| entry.index);
        let embeddings = data.into_iter().map(|entry| entry.embedding).collect();

        Ok((embeddings, EmbeddingMeta { usage: response.usage }))
    }

    async fn models(&self) -> EmbeddingResult<Vec<Model>> {
        let url = self.url("models");
        let listing: ModelsResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let models = listing
            .data
            .into_iter()
            .filter_map(|entry| {
                entry.id.map(|id| Model {
                    id,
                    aliases: Vec::new(),
                    base_model: entry.root,
                })
            })
            .collect();
        ensure_models_found(models, &url)
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn set_model(&mut self, model: String) {
        self.model = Some(model);
    }
}
