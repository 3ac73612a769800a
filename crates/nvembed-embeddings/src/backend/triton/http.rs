//! KServe v2 JSON protocol over HTTP

use super::{BYTES_DATATYPE, INPUT_NAME, OUTPUT_NAME, reshape};
use crate::backend::{AuthHeaders, BackendKwargs, Compression};
use crate::{EmbeddingError, EmbeddingResult};
use flate2::write::{GzEncoder, ZlibEncoder};
use nvembed_common::CorrelationId;
use reqwest::Client;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct InferRequest<'a> {
    id: String,
    inputs: [InferInput<'a>; 1],
    outputs: [RequestedOutput; 1],
    #[serde(skip_serializing_if = "Map::is_empty")]
    parameters: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct InferInput<'a> {
    name: &'static str,
    shape: [usize; 1],
    datatype: &'static str,
    data: &'a [String],
}

#[derive(Debug, Serialize)]
struct RequestedOutput {
    name: &'static str,
    parameters: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct InferResponse {
    #[serde(default)]
    outputs: Vec<OutputTensor>,
}

#[derive(Debug, Deserialize)]
struct OutputTensor {
    name: String,
    #[serde(default)]
    shape: Vec<i64>,
    #[serde(default)]
    data: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
}

#[derive(Debug, Clone)]
pub(super) struct HttpTransport {
    client: Client,
    base_url: String,
    model_version: Option<String>,
    priority: Option<u64>,
    request_compression: Option<Compression>,
    response_compression: Option<Compression>,
}

impl HttpTransport {
    pub(super) fn new(
        base_url: &str,
        auth: &AuthHeaders,
        timeout: Duration,
        kwargs: BackendKwargs,
    ) -> EmbeddingResult<Self> {
        let client_opts = kwargs.client_kwargs;
        let mut builder = Client::builder()
            .default_headers(auth.header_map()?)
            .timeout(timeout);
        if let Some(concurrency) = client_opts.concurrency {
            builder = builder.pool_max_idle_per_host(concurrency);
        }
        if let Some(connect_timeout) = client_opts.connection_timeout()? {
            builder = builder.connect_timeout(connect_timeout);
        }

        let infer = kwargs.infer_kwargs;
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.to_string(),
            model_version: infer.model_version,
            priority: infer.priority,
            request_compression: infer.request_compression_algorithm,
            response_compression: infer.response_compression_algorithm,
        })
    }

    fn infer_url(&self, model: &str) -> String {
        match self.model_version.as_deref().filter(|v| !v.is_empty()) {
            Some(version) => format!("{}/v2/models/{model}/versions/{version}/infer", self.base_url),
            None => format!("{}/v2/models/{model}/infer", self.base_url),
        }
    }

    pub(super) async fn infer(&self, model: &str, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let mut parameters = Map::new();
        if let Some(priority) = self.priority {
            parameters.insert("priority".to_string(), json!(priority));
        }
        let request = InferRequest {
            id: CorrelationId::new().to_string(),
            inputs: [InferInput {
                name: INPUT_NAME,
                shape: [texts.len()],
                datatype: BYTES_DATATYPE,
                data: texts,
            }],
            outputs: [RequestedOutput {
                name: OUTPUT_NAME,
                parameters: Map::from_iter([("binary_data".to_string(), Value::Bool(false))]),
            }],
            parameters,
        };

        let url = self.infer_url(model);
        tracing::debug!(url = %url, request_id = %request.id, inputs = texts.len(), "Triton HTTP infer");

        let body = serde_json::to_vec(&request)?;
        let mut call = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(algorithm) = self.response_compression {
            call = call.header(ACCEPT_ENCODING, algorithm.as_str());
        }
        call = match self.request_compression {
            Some(algorithm) => call
                .header(CONTENT_ENCODING, algorithm.as_str())
                .body(compress(&body, algorithm)?),
            None => call.body(body),
        };

        let response: InferResponse = call.send().await?.error_for_status()?.json().await?;
        let output = response
            .outputs
            .into_iter()
            .find(|output| output.name == OUTPUT_NAME)
            .ok_or_else(|| {
                EmbeddingError::response_error("response carries no 'embeddings' output")
            })?;
        reshape(output.data, &output.shape, texts.len())
    }

    pub(super) async fn repository_index(&self) -> EmbeddingResult<Vec<String>> {
        let url = format!("{}/v2/repository/index", self.base_url);
        let entries: Vec<IndexEntry> = self
            .client
            .post(&url)
            .json(&json!({}))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(entries.into_iter().map(|entry| entry.name).collect())
    }
}

fn compress(body: &[u8], algorithm: Compression) -> EmbeddingResult<Vec<u8>> {
    let level = flate2::Compression::default();
    let compressed = match algorithm {
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), level);
            encoder.write_all(body)?;
            encoder.finish()?
        }
        Compression::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), level);
            encoder.write_all(body)?;
            encoder.finish()?
        }
    };
    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Secret;
    use crate::backend::{EmbeddingBackend, TritonBackend, TritonProtocol};
    use flate2::read::GzDecoder;
    use std::io::Read;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn backend(server: &MockServer, kwargs: BackendKwargs) -> TritonBackend {
        let auth = AuthHeaders::from_credentials(
            None,
            Some(&Secret::from_token("user")),
            Some(&Secret::from_token("pass")),
        )
        .unwrap();
        // Scheme-less, as Triton users usually write it
        let address = server.uri().trim_start_matches("http://").to_string();
        TritonBackend::new(
            Some("nv-embedqa".to_string()),
            &address,
            &auth,
            TritonProtocol::Http,
            Duration::from_secs(5),
            kwargs,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_infer_sends_bytes_tensor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/models/nv-embedqa/infer"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .and(body_partial_json(json!({
                "inputs": [{"name": "text", "shape": [2], "datatype": "BYTES", "data": ["a", "b"]}],
                "outputs": [{"name": "embeddings", "parameters": {"binary_data": false}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model_name": "nv-embedqa",
                "outputs": [{
                    "name": "embeddings",
                    "datatype": "FP32",
                    "shape": [2, 2],
                    "data": [0.5, 0.25, 1.0, 2.0]
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (embeddings, meta) = backend(&server, BackendKwargs::default())
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings, vec![vec![0.5, 0.25], vec![1.0, 2.0]]);
        assert_eq!(meta.usage, None);
    }

    #[tokio::test]
    async fn test_version_priority_and_gzip_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/models/nv-embedqa/versions/3/infer"))
            .and(header("content-encoding", "gzip"))
            .and(header("accept-encoding", "gzip"))
            .and(|request: &Request| {
                let mut decoded = String::new();
                GzDecoder::new(request.body.as_slice())
                    .read_to_string(&mut decoded)
                    .is_ok_and(|_| decoded.contains("\"priority\":2"))
            })
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "outputs": [{"name": "embeddings", "shape": [1, 1], "data": [7.0]}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let kwargs: BackendKwargs = serde_json::from_value(json!({
            "infer_kwargs": {
                "model_version": "3",
                "priority": 2,
                "request_compression_algorithm": "gzip",
                "response_compression_algorithm": "gzip"
            }
        }))
        .unwrap();
        let (embeddings, _) = backend(&server, kwargs)
            .embed(&["a".to_string()])
            .await
            .unwrap();
        assert_eq!(embeddings, vec![vec![7.0]]);
    }

    #[tokio::test]
    async fn test_missing_output_is_response_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/models/nv-embedqa/infer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"outputs": []})))
            .mount(&server)
            .await;

        let err = backend(&server, BackendKwargs::default())
            .embed(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Response(_)));
    }

    #[tokio::test]
    async fn test_repository_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/repository/index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "nv-embedqa", "version": "1", "state": "READY"},
                {"name": "reranker", "version": "1", "state": "READY"}
            ])))
            .mount(&server)
            .await;

        let models = backend(&server, BackendKwargs::default())
            .models()
            .await
            .unwrap();
        let ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["nv-embedqa", "reranker"]);
    }

    #[tokio::test]
    async fn test_empty_repository_is_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/repository/index"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = backend(&server, BackendKwargs::default())
            .models()
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Config(_)));
    }

    #[test]
    fn test_deflate_is_zlib_framed() {
        let compressed = compress(b"hello", Compression::Deflate).unwrap();
        let mut decoded = String::new();
        flate2::read::ZlibDecoder::new(compressed.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "hello");
    }
}
