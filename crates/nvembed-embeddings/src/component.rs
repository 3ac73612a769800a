//! Pipeline component contract and its serialized form

use crate::embedder::InitWarning;
use crate::{EmbeddingError, EmbeddingResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Serialized component: its type path plus constructor parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDict {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub init_parameters: Map<String, Value>,
}

/// A unit a pipeline can warm up, run and persist
#[async_trait]
pub trait Component: Send + Sync {
    /// Type path written into [`ComponentDict::type_name`]
    const TYPE_NAME: &'static str;

    /// Build whatever the component needs before `run`; idempotent
    ///
    /// # Errors
    /// Returns construction, credential or discovery errors.
    async fn warm_up(&mut self) -> EmbeddingResult<Vec<InitWarning>>;

    /// Process one dynamically typed input mapping
    ///
    /// # Errors
    /// Returns `EmbeddingError::NotInitialized` before warm-up,
    /// `EmbeddingError::InvalidInput` for inputs of the wrong shape, and
    /// transport errors.
    async fn run(&self, input: Value) -> EmbeddingResult<Value>;

    /// Serialize the constructor parameters
    ///
    /// # Errors
    /// Returns `EmbeddingError::Serialization` when a parameter (such as a
    /// token secret) cannot be persisted.
    fn to_dict(&self) -> EmbeddingResult<ComponentDict>;

    /// Rebuild a component from [`Component::to_dict`] output
    ///
    /// # Errors
    /// Returns `EmbeddingError::Serialization` for a foreign type path or
    /// malformed parameters, and validation errors from construction.
    fn from_dict(dict: ComponentDict) -> EmbeddingResult<Self>
    where
        Self: Sized;
}

impl ComponentDict {
    /// Wrap serializable parameters under `type_name`
    ///
    /// # Errors
    /// Returns `EmbeddingError::Serialization` when the parameters do not
    /// serialize to a JSON object.
    pub fn new<P: Serialize>(type_name: &str, params: &P) -> EmbeddingResult<Self> {
        match serde_json::to_value(params)
            .map_err(|e| EmbeddingError::Serialization(e.to_string()))?
        {
            Value::Object(init_parameters) => Ok(Self {
                type_name: type_name.to_string(),
                init_parameters,
            }),
            other => Err(EmbeddingError::Serialization(format!(
                "init parameters must serialize to an object, got {other}"
            ))),
        }
    }

    /// Decode the parameters after checking the type path
    ///
    /// # Errors
    /// Returns `EmbeddingError::Serialization` on a type mismatch or
    /// malformed parameters.
    pub fn into_params<P: for<'de> Deserialize<'de>>(self, type_name: &str) -> EmbeddingResult<P> {
        if self.type_name != type_name {
            return Err(EmbeddingError::Serialization(format!(
                "cannot deserialize '{}' as '{type_name}'",
                self.type_name
            )));
        }
        serde_json::from_value(Value::Object(self.init_parameters))
            .map_err(|e| EmbeddingError::Serialization(e.to_string()))
    }
}

/// Fetch a field of a `run` input mapping
pub(crate) fn input_field<'a>(input: &'a Value, field: &str) -> Option<&'a Value> {
    input.as_object().and_then(|fields| fields.get(field))
}
