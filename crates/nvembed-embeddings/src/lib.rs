//! NVIDIA embedding components
//!
//! This crate turns text and documents into vectors through a remote NVIDIA
//! inference service. Three transports sit behind one [`EmbeddingBackend`]
//! trait: the NIM REST API, and a Triton inference server spoken to over
//! HTTP or gRPC. [`NvidiaTextEmbedder`] and [`NvidiaDocumentEmbedder`] add
//! input decoration, batching and usage aggregation on top.

pub mod backend;
pub mod component;
pub mod document;
pub mod embedder;
pub mod error;
pub mod meta;
pub mod secret;
pub mod truncate;

// Re-export main types
pub use backend::{BackendConfig, BackendKind, EmbeddingBackend, Model, build_backend, is_hosted};
pub use component::{Component, ComponentDict};
pub use document::Document;
pub use embedder::{
    DocumentEmbedderParams, DocumentEmbeddings, InitWarning, NvidiaDocumentEmbedder,
    NvidiaTextEmbedder, TextEmbedderParams, TextEmbedding,
};
pub use error::{EmbeddingError, EmbeddingResult};
pub use meta::{EmbeddingMeta, Usage};
pub use secret::{Secret, SecretDescriptor};
pub use truncate::EmbeddingTruncateMode;
