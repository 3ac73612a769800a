//! Error types for the nvembed-embeddings crate
//!
//! This module defines embedding-specific error types for component
//! lifecycle, input validation, backend transports and serialization.

use nvembed_common::{CommonError, impl_common_conversions};
use thiserror::Error;

/// Result type alias for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Comprehensive error type for embedding operations
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Component used before `warm_up`
    #[error("The embedding model has not been loaded. Please call warm_up() before running.")]
    NotInitialized,

    /// Input of the wrong shape handed to a component
    #[error("{0}")]
    InvalidInput(String),

    /// Construction-time parameter validation
    #[error("Invalid parameters: {0}")]
    Validation(String),

    /// Configuration errors surfaced by the remote service (model discovery, listing)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential could not be resolved
    #[error("Secret resolution failed: {0}")]
    Secret(String),

    /// Capability the transport does not offer
    #[error("{0} is not implemented for this backend")]
    NotImplemented(&'static str),

    /// HTTP transport failure, propagated unmodified
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// gRPC call failure, propagated unmodified
    #[error(transparent)]
    Grpc(#[from] tonic::Status),

    /// gRPC channel setup failure
    #[error(transparent)]
    GrpcTransport(#[from] tonic::transport::Error),

    /// Service answered with a payload that cannot be turned into embeddings
    #[error("Unexpected response: {0}")]
    Response(String),

    /// Component (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic error for other cases
    #[error("Other error: {0}")]
    Other(String),
}

impl EmbeddingError {
    /// Create a validation error
    pub fn validation_error(msg: &str) -> Self {
        Self::Validation(msg.to_string())
    }

    /// Create a malformed-response error
    pub fn response_error(msg: &str) -> Self {
        Self::Response(msg.to_string())
    }
}

impl CommonError for EmbeddingError {
    fn io_error(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    fn parse_error(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    fn other_error(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

impl_common_conversions!(EmbeddingError, with_serde);

impl From<nvembed_config::ConfigError> for EmbeddingError {
    fn from(err: nvembed_config::ConfigError) -> Self {
        Self::Validation(err.to_string())
    }
}
