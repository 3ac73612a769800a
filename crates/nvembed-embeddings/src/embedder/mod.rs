//! Pipeline components that embed text and documents
//!
//! Both components wrap an [`EmbedderCore`] holding the backend parameters
//! until `warm_up` turns them into a live [`EmbeddingBackend`].

pub mod document;
pub mod text;

pub use document::{DocumentEmbedderParams, DocumentEmbeddings, NvidiaDocumentEmbedder};
pub use text::{NvidiaTextEmbedder, TextEmbedderParams, TextEmbedding};

use crate::backend::{BackendConfig, EmbeddingBackend, Model, build_backend, is_hosted};
use crate::{EmbeddingError, EmbeddingResult};

/// Non-fatal condition raised while warming up a component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitWarning {
    /// No model was configured and discovery picked one
    DefaultModelSelected { model: String },
}

impl std::fmt::Display for InitWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DefaultModelSelected { model } => write!(
                f,
                "Default model is set as: {model}. Set model using the model parameter. \
                 To get available models use available_models()."
            ),
        }
    }
}

/// Backend parameters plus the backend built from them
pub(crate) struct EmbedderCore {
    config: BackendConfig,
    backend: Option<Box<dyn EmbeddingBackend>>,
}

impl EmbedderCore {
    /// Validate parameters and fill in the hosted default model
    ///
    /// Nothing is resolved or contacted here.
    pub(crate) fn new(mut config: BackendConfig) -> EmbeddingResult<Self> {
        config.validate()?;
        config.model = config.model.filter(|model| !model.is_empty());
        if config.model.is_none() && is_hosted(&config.api_url) {
            config.model = Some(nvembed_config::DEFAULT_HOSTED_MODEL.to_string());
        }
        Ok(Self {
            config,
            backend: None,
        })
    }

    pub(crate) const fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub(crate) const fn is_ready(&self) -> bool {
        self.backend.is_some()
    }

    pub(crate) fn backend(&self) -> EmbeddingResult<&dyn EmbeddingBackend> {
        self.backend.as_deref().ok_or(EmbeddingError::NotInitialized)
    }

    pub(crate) async fn warm_up(&mut self) -> EmbeddingResult<Vec<InitWarning>> {
        if self.is_ready() {
            return Ok(Vec::new());
        }
        let backend = build_backend(&self.config)?;
        self.warm_up_with_backend(backend).await
    }

    /// Install `backend`, resolving the model first if none is configured
    ///
    /// A failed discovery leaves the component unready.
    pub(crate) async fn warm_up_with_backend(
        &mut self,
        mut backend: Box<dyn EmbeddingBackend>,
    ) -> EmbeddingResult<Vec<InitWarning>> {
        if self.is_ready() {
            return Ok(Vec::new());
        }

        let mut warnings = Vec::new();
        let current = backend.model().map(str::to_string);
        match (self.config.model.clone(), current) {
            (Some(model), current) => {
                if current.as_deref() != Some(model.as_str()) {
                    backend.set_model(model);
                }
            }
            (None, Some(current)) => self.config.model = Some(current),
            (None, None) => {
                let model = default_model(backend.as_ref()).await?;
                tracing::warn!(
                    model = %model,
                    api_url = %self.config.api_url,
                    "No model configured, using the first model served by the endpoint"
                );
                backend.set_model(model.clone());
                self.config.model = Some(model.clone());
                warnings.push(InitWarning::DefaultModelSelected { model });
            }
        }

        self.backend = Some(backend);
        Ok(warnings)
    }

    pub(crate) async fn available_models(&self) -> EmbeddingResult<Vec<Model>> {
        self.backend()?.models().await
    }
}

/// First root model served by `backend`, in listing order
async fn default_model(backend: &dyn EmbeddingBackend) -> EmbeddingResult<String> {
    backend
        .models()
        .await?
        .into_iter()
        .find(Model::is_root)
        .map(|model| model.id)
        .ok_or_else(|| EmbeddingError::Config("No locally hosted model was found.".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind;
    use crate::backend::mock::MockBackend;
    use crate::{EmbeddingTruncateMode, Secret};

    fn local_config() -> BackendConfig {
        BackendConfig {
            api_key: Some(Secret::from_token("fake-api-key")),
            api_url: "http://localhost:8080/v1".to_string(),
            ..BackendConfig::default()
        }
    }

    fn listing() -> Vec<Model> {
        vec![
            Model {
                base_model: Some("model0".to_string()),
                ..Model::new("model0-alias")
            },
            Model::new("model1"),
            Model::new("model2"),
        ]
    }

    #[test]
    fn test_hosted_url_gets_default_model() {
        let core = EmbedderCore::new(BackendConfig::default()).unwrap();
        assert_eq!(core.config().model.as_deref(), Some("nvidia/nv-embedqa-e5-v5"));

        let local = EmbedderCore::new(local_config()).unwrap();
        assert_eq!(local.config().model, None);
    }

    #[test]
    fn test_truncate_with_triton_fails_at_construction() {
        let config = BackendConfig {
            backend: BackendKind::TritonGrpc,
            truncate: Some(EmbeddingTruncateMode::Start),
            ..local_config()
        };
        assert!(matches!(
            EmbedderCore::new(config),
            Err(EmbeddingError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_discovery_picks_first_root_model_and_warns_once() {
        let mut core = EmbedderCore::new(local_config()).unwrap();
        let warnings = core
            .warm_up_with_backend(Box::new(MockBackend::new().with_models(listing())))
            .await
            .unwrap();

        assert_eq!(
            warnings,
            vec![InitWarning::DefaultModelSelected {
                model: "model1".to_string()
            }]
        );
        assert!(warnings[0].to_string().starts_with("Default model is set as: model1"));
        assert_eq!(core.config().model.as_deref(), Some("model1"));
        assert_eq!(core.backend().unwrap().model(), Some("model1"));

        // Second warm-up is a no-op
        assert!(core.warm_up().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_discovery_without_root_models_fails() {
        let mut core = EmbedderCore::new(local_config()).unwrap();
        let aliases_only = vec![Model {
            base_model: Some("hidden".to_string()),
            ..Model::new("alias")
        }];
        let err = core
            .warm_up_with_backend(Box::new(MockBackend::new().with_models(aliases_only)))
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Config(_)));
        assert!(!core.is_ready());
    }

    #[tokio::test]
    async fn test_empty_listing_fails() {
        let mut core = EmbedderCore::new(local_config()).unwrap();
        let err = core
            .warm_up_with_backend(Box::new(MockBackend::new()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No hosted model were found"));
    }

    #[tokio::test]
    async fn test_configured_model_is_pushed_to_backend() {
        let config = BackendConfig {
            model: Some("configured".to_string()),
            ..local_config()
        };
        let mut core = EmbedderCore::new(config).unwrap();
        let warnings = core
            .warm_up_with_backend(Box::new(MockBackend::new().with_model("other")))
            .await
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(core.backend().unwrap().model(), Some("configured"));
    }

    #[tokio::test]
    async fn test_unready_core_refuses_work() {
        let core = EmbedderCore::new(local_config()).unwrap();
        assert!(matches!(core.backend(), Err(EmbeddingError::NotInitialized)));
        assert!(matches!(
            core.available_models().await,
            Err(EmbeddingError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_warm_up_resolves_strict_key() {
        let config = BackendConfig {
            api_key: Some(Secret::from_env_var("NVEMBED_TEST_CORE_KEY_NEVER_SET")),
            model: Some("m".to_string()),
            ..local_config()
        };
        let mut core = EmbedderCore::new(config).unwrap();
        assert!(matches!(
            core.warm_up().await,
            Err(EmbeddingError::Secret(_))
        ));
    }
}
