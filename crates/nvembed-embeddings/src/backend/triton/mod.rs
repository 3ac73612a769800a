//! Triton inference server transport
//!
//! Both wire protocols send one BYTES input tensor named `text` holding the
//! batch and read back the `embeddings` output tensor. Triton reports no token
//! usage, so every call returns empty metadata.

mod grpc;
mod http;
pub mod proto;

use super::{AuthHeaders, BackendKwargs, EmbeddingBackend, Model, ensure_models_found};
use crate::{EmbeddingError, EmbeddingMeta, EmbeddingResult};
use async_trait::async_trait;
use std::time::Duration;

pub(crate) const INPUT_NAME: &str = "text";
pub(crate) const OUTPUT_NAME: &str = "embeddings";
pub(crate) const BYTES_DATATYPE: &str = "BYTES";

/// Wire protocol spoken to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TritonProtocol {
    Http,
    Grpc,
}

#[derive(Debug, Clone)]
enum Transport {
    Http(http::HttpTransport),
    Grpc(grpc::GrpcTransport),
}

/// Embedding client for a Triton-hosted model
#[derive(Debug, Clone)]
pub struct TritonBackend {
    model: Option<String>,
    api_url: String,
    transport: Transport,
}

impl TritonBackend {
    /// Build a client for `api_url`
    ///
    /// The gRPC channel connects lazily, on the first call; it must be built
    /// inside a tokio runtime.
    ///
    /// # Errors
    /// Returns an error when the URL or credential is unusable or the client
    /// cannot be built.
    pub fn new(
        model: Option<String>,
        api_url: &str,
        auth: &AuthHeaders,
        protocol: TritonProtocol,
        timeout: Duration,
        kwargs: BackendKwargs,
    ) -> EmbeddingResult<Self> {
        let base_url = base_url(api_url, kwargs.client_kwargs.use_ssl());
        let transport = match protocol {
            TritonProtocol::Http => {
                Transport::Http(http::HttpTransport::new(&base_url, auth, timeout, kwargs)?)
            }
            TritonProtocol::Grpc => {
                Transport::Grpc(grpc::GrpcTransport::new(&base_url, auth, timeout, kwargs)?)
            }
        };

        Ok(Self {
            model,
            api_url: api_url.to_string(),
            transport,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for TritonBackend {
    async fn embed(&self, texts: &[String]) -> EmbeddingResult<(Vec<Vec<f32>>, EmbeddingMeta)> {
        let model = self.model.as_deref().ok_or_else(|| {
            EmbeddingError::validation_error("no model configured for the Triton backend")
        })?;

        let embeddings = match &self.transport {
            Transport::Http(transport) => transport.infer(model, texts).await?,
            Transport::Grpc(transport) => transport.infer(model, texts).await?,
        };
        Ok((embeddings, EmbeddingMeta::default()))
    }

    async fn models(&self) -> EmbeddingResult<Vec<Model>> {
        let names = match &self.transport {
            Transport::Http(transport) => transport.repository_index().await?,
            Transport::Grpc(transport) => transport.repository_index().await?,
        };
        ensure_models_found(names.into_iter().map(Model::new).collect(), &self.api_url)
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn set_model(&mut self, model: String) {
        self.model = Some(model);
    }
}

/// Triton accepts bare `host:port`; give it a scheme the clients understand
fn base_url(api_url: &str, ssl: bool) -> String {
    let trimmed = api_url.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else if ssl {
        format!("https://{trimmed}")
    } else {
        format!("http://{trimmed}")
    }
}

/// Serialize strings into Triton's BYTES layout: each element is a
/// little-endian `u32` length followed by its bytes
pub(crate) fn encode_bytes_tensor(texts: &[String]) -> EmbeddingResult<Vec<u8>> {
    let capacity = texts.iter().map(|text| text.len() + 4).sum();
    let mut buffer = Vec::with_capacity(capacity);
    for text in texts {
        let len = u32::try_from(text.len()).map_err(|_| {
            EmbeddingError::InvalidInput("input text exceeds the 4 GiB BYTES element limit".into())
        })?;
        buffer.extend_from_slice(&len.to_le_bytes());
        buffer.extend_from_slice(text.as_bytes());
    }
    Ok(buffer)
}

/// Cut a row-major tensor into one vector per input
pub(crate) fn reshape(
    flat: Vec<f32>,
    shape: &[i64],
    expected_rows: usize,
) -> EmbeddingResult<Vec<Vec<f32>>> {
    let dims = shape
        .iter()
        .map(|&dim| usize::try_from(dim))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| EmbeddingError::response_error("embeddings tensor has a negative dimension"))?;

    let Some((&rows, rest)) = dims.split_first() else {
        return Err(EmbeddingError::response_error(
            "embeddings tensor has no shape",
        ));
    };
    if rows != expected_rows {
        return Err(EmbeddingError::Response(format!(
            "expected {expected_rows} embeddings, server returned {rows}"
        )));
    }

    let overflow = || EmbeddingError::Response(format!("embeddings tensor shape {shape:?} overflows"));
    let width = rest
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(overflow)?;
    let total = rows.checked_mul(width).ok_or_else(overflow)?;
    if flat.len() != total {
        return Err(EmbeddingError::Response(format!(
            "embeddings tensor of shape {shape:?} carries {} values",
            flat.len()
        )));
    }
    if width == 0 {
        return Ok(vec![Vec::new(); rows]);
    }
    Ok(flat.chunks(width).map(<[f32]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_scheme() {
        assert_eq!(base_url("localhost:8001", false), "http://localhost:8001");
        assert_eq!(base_url("localhost:8001", true), "https://localhost:8001");
        assert_eq!(base_url("http://host.com/v1/", true), "http://host.com/v1");
    }

    #[test]
    fn test_bytes_tensor_layout() {
        let encoded = encode_bytes_tensor(&["ab".to_string(), String::new(), "é".to_string()])
            .unwrap();
        assert_eq!(
            encoded,
            vec![2, 0, 0, 0, b'a', b'b', 0, 0, 0, 0, 2, 0, 0, 0, 0xC3, 0xA9]
        );
    }

    #[test]
    fn test_reshape_rows() {
        let rows = reshape(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], 2).unwrap();
        assert_eq!(rows, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_reshape_rejects_mismatches() {
        assert!(reshape(vec![1.0, 2.0], &[2, 1], 3).is_err());
        assert!(reshape(vec![1.0, 2.0, 3.0], &[2, 2], 2).is_err());
        assert!(reshape(vec![], &[], 0).is_err());
        assert!(reshape(vec![1.0], &[-1, 1], 1).is_err());
    }

    #[test]
    fn test_reshape_rejects_overflowing_shape() {
        let err = reshape(vec![1.0], &[1, i64::MAX, 4], 1).unwrap_err();
        assert!(matches!(err, EmbeddingError::Response(_)));
        assert!(err.to_string().contains("overflows"));
    }
}
