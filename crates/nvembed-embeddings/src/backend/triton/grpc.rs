//! `inference.GRPCInferenceService` client

use super::proto::{
    InferInputTensor, InferOutputTensor, InferParameter, InferRequestedOutputTensor,
    ModelInferRequest, ModelInferResponse, RepositoryIndexRequest, RepositoryIndexResponse,
};
use super::{BYTES_DATATYPE, INPUT_NAME, OUTPUT_NAME, encode_bytes_tensor, reshape};
use crate::backend::{AuthHeaders, BackendKwargs, Compression};
use crate::{EmbeddingError, EmbeddingResult};
use nvembed_common::CorrelationId;
use std::collections::HashMap;
use std::time::Duration;
use tonic::codec::{CompressionEncoding, ProstCodec};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

const MODEL_INFER_PATH: &str = "/inference.GRPCInferenceService/ModelInfer";
const REPOSITORY_INDEX_PATH: &str = "/inference.GRPCInferenceService/RepositoryIndex";

#[derive(Debug, Clone)]
pub(super) struct GrpcTransport {
    channel: Channel,
    auth: AuthHeaders,
    timeout: Duration,
    model_version: String,
    priority: Option<u64>,
    send_gzip: bool,
    accept_gzip: bool,
}

impl GrpcTransport {
    pub(super) fn new(
        base_url: &str,
        auth: &AuthHeaders,
        timeout: Duration,
        kwargs: BackendKwargs,
    ) -> EmbeddingResult<Self> {
        let client_opts = kwargs.client_kwargs;
        let mut endpoint = Endpoint::from_shared(base_url.to_string())?.timeout(timeout);
        if let Some(connect_timeout) = client_opts.connection_timeout()? {
            endpoint = endpoint.connect_timeout(connect_timeout);
        }
        if let Some(concurrency) = client_opts.concurrency {
            endpoint = endpoint.concurrency_limit(concurrency);
        }
        if base_url.starts_with("https://") {
            endpoint = endpoint.tls_config(ClientTlsConfig::new().with_webpki_roots())?;
        }

        let infer = kwargs.infer_kwargs;
        Ok(Self {
            channel: endpoint.connect_lazy(),
            auth: auth.clone(),
            timeout,
            model_version: infer.model_version.unwrap_or_default(),
            priority: infer.priority,
            send_gzip: infer.request_compression_algorithm == Some(Compression::Gzip),
            accept_gzip: infer.response_compression_algorithm == Some(Compression::Gzip),
        })
    }

    fn client(&self) -> tonic::client::Grpc<Channel> {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        if self.send_gzip {
            grpc = grpc.send_compressed(CompressionEncoding::Gzip);
        }
        if self.accept_gzip {
            grpc = grpc.accept_compressed(CompressionEncoding::Gzip);
        }
        grpc
    }

    fn request<T>(&self, message: T) -> EmbeddingResult<tonic::Request<T>> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.timeout);
        self.auth.apply_metadata(request.metadata_mut())?;
        Ok(request)
    }

    /// `ModelInfer` request for one batch, with deadline and credentials attached
    fn infer_request(
        &self,
        model: &str,
        texts: &[String],
    ) -> EmbeddingResult<tonic::Request<ModelInferRequest>> {
        let batch = i64::try_from(texts.len())
            .map_err(|_| EmbeddingError::InvalidInput("batch too large".into()))?;
        let mut parameters = HashMap::new();
        if let Some(priority) = self.priority {
            parameters.insert("priority".to_string(), InferParameter::uint64(priority));
        }

        let message = ModelInferRequest {
            model_name: model.to_string(),
            model_version: self.model_version.clone(),
            id: CorrelationId::new().to_string(),
            parameters,
            inputs: vec![InferInputTensor {
                name: INPUT_NAME.to_string(),
                datatype: BYTES_DATATYPE.to_string(),
                shape: vec![batch],
                ..InferInputTensor::default()
            }],
            outputs: vec![InferRequestedOutputTensor {
                name: OUTPUT_NAME.to_string(),
                ..InferRequestedOutputTensor::default()
            }],
            raw_input_contents: vec![encode_bytes_tensor(texts)?],
        };
        tracing::debug!(model, request_id = %message.id, inputs = texts.len(), "Triton gRPC infer");
        self.request(message)
    }

    pub(super) async fn infer(&self, model: &str, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let request = self.infer_request(model, texts)?;
        let mut grpc = self.client();
        grpc.ready().await?;
        let response: ModelInferResponse = grpc
            .unary(
                request,
                PathAndQuery::from_static(MODEL_INFER_PATH),
                ProstCodec::default(),
            )
            .await?
            .into_inner();

        extract_embeddings(response, texts.len())
    }

    pub(super) async fn repository_index(&self) -> EmbeddingResult<Vec<String>> {
        let request = self.request(RepositoryIndexRequest::default())?;
        let mut grpc = self.client();
        grpc.ready().await?;
        let response: RepositoryIndexResponse = grpc
            .unary(
                request,
                PathAndQuery::from_static(REPOSITORY_INDEX_PATH),
                ProstCodec::default(),
            )
            .await?
            .into_inner();
        Ok(response.models.into_iter().map(|model| model.name).collect())
    }
}

/// Pull the `embeddings` tensor out of a response, from raw bytes or typed contents
#[allow(clippy::cast_possible_truncation)]
fn extract_embeddings(
    response: ModelInferResponse,
    expected_rows: usize,
) -> EmbeddingResult<Vec<Vec<f32>>> {
    let position = response
        .outputs
        .iter()
        .position(|output| output.name == OUTPUT_NAME)
        .ok_or_else(|| EmbeddingError::response_error("response carries no 'embeddings' output"))?;
    let mut raw_outputs = response.raw_output_contents;
    let mut outputs = response.outputs;
    let output: InferOutputTensor = outputs.swap_remove(position);

    let flat = if position < raw_outputs.len() {
        decode_raw(&raw_outputs.swap_remove(position), &output.datatype)?
    } else {
        let contents = output.contents.unwrap_or_default();
        if contents.fp64_contents.is_empty() {
            contents.fp32_contents
        } else {
            contents.fp64_contents.into_iter().map(|v| v as f32).collect()
        }
    };
    reshape(flat, &output.shape, expected_rows)
}

/// Decode little-endian FP32/FP64 raw tensor bytes
#[allow(clippy::cast_possible_truncation)]
fn decode_raw(raw: &[u8], datatype: &str) -> EmbeddingResult<Vec<f32>> {
    let misaligned = || {
        EmbeddingError::Response(format!(
            "raw {datatype} tensor of {} bytes is not element aligned",
            raw.len()
        ))
    };
    match datatype {
        "FP32" => raw
            .chunks_exact(4)
            .map(|chunk| <[u8; 4]>::try_from(chunk).map(f32::from_le_bytes))
            .collect::<Result<Vec<_>, _>>()
            .ok()
            .filter(|_| raw.len() % 4 == 0)
            .ok_or_else(misaligned),
        "FP64" => raw
            .chunks_exact(8)
            .map(|chunk| <[u8; 8]>::try_from(chunk).map(|bytes| f64::from_le_bytes(bytes) as f32))
            .collect::<Result<Vec<_>, _>>()
            .ok()
            .filter(|_| raw.len() % 8 == 0)
            .ok_or_else(misaligned),
        other => Err(EmbeddingError::Response(format!(
            "unsupported embeddings datatype '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::proto::InferTensorContents;
    use super::*;
    use crate::Secret;

    fn output(datatype: &str, shape: Vec<i64>) -> InferOutputTensor {
        InferOutputTensor {
            name: OUTPUT_NAME.to_string(),
            datatype: datatype.to_string(),
            shape,
            ..InferOutputTensor::default()
        }
    }

    #[test]
    fn test_raw_fp32_output() {
        let raw: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let response = ModelInferResponse {
            outputs: vec![output("FP32", vec![2, 2])],
            raw_output_contents: vec![raw],
            ..ModelInferResponse::default()
        };
        assert_eq!(
            extract_embeddings(response, 2).unwrap(),
            vec![vec![1.0, 2.0], vec![3.0, 4.0]]
        );
    }

    #[test]
    fn test_raw_fp64_output_picks_named_tensor() {
        let raw: Vec<u8> = [0.5f64, 1.5].iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut other = output("FP32", vec![1, 1]);
        other.name = "pooled".to_string();
        let response = ModelInferResponse {
            outputs: vec![other, output("FP64", vec![1, 2])],
            raw_output_contents: vec![1.0f32.to_le_bytes().to_vec(), raw],
            ..ModelInferResponse::default()
        };
        assert_eq!(extract_embeddings(response, 1).unwrap(), vec![vec![0.5, 1.5]]);
    }

    #[test]
    fn test_typed_contents_output() {
        let mut tensor = output("FP32", vec![1, 3]);
        tensor.contents = Some(InferTensorContents {
            fp32_contents: vec![0.1, 0.2, 0.3],
            ..InferTensorContents::default()
        });
        let response = ModelInferResponse {
            outputs: vec![tensor],
            ..ModelInferResponse::default()
        };
        assert_eq!(
            extract_embeddings(response, 1).unwrap(),
            vec![vec![0.1, 0.2, 0.3]]
        );
    }

    #[test]
    fn test_missing_output_and_bad_datatype() {
        let response = ModelInferResponse::default();
        assert!(matches!(
            extract_embeddings(response, 1),
            Err(EmbeddingError::Response(_))
        ));
        assert!(decode_raw(&[0; 4], "INT8").is_err());
        assert!(decode_raw(&[0; 6], "FP32").is_err());
    }

    #[tokio::test]
    async fn test_channel_builds_lazily() {
        let auth = AuthHeaders::default();
        let transport = GrpcTransport::new(
            "http://localhost:8001",
            &auth,
            Duration::from_secs(1),
            BackendKwargs::default(),
        )
        .unwrap();
        assert!(!transport.send_gzip);
        assert!(transport.model_version.is_empty());
    }

    fn transport(kwargs: BackendKwargs) -> GrpcTransport {
        let auth = AuthHeaders::from_credentials(
            Some(&Secret::from_token("fake-api-key")),
            None,
            None,
        )
        .unwrap();
        GrpcTransport::new(
            "http://localhost:8001",
            &auth,
            Duration::from_secs(5),
            kwargs,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_infer_request_layout() {
        let kwargs: BackendKwargs = serde_json::from_value(serde_json::json!({
            "infer_kwargs": {"model_version": "2", "priority": 7}
        }))
        .unwrap();
        let texts = vec!["first".to_string(), "second".to_string(), String::new()];

        let request = transport(kwargs).infer_request("embed-model", &texts).unwrap();

        let metadata = request.metadata();
        assert_eq!(
            metadata.get("authorization").unwrap().to_str().unwrap(),
            "Bearer fake-api-key"
        );
        assert!(metadata.get("grpc-timeout").is_some());

        let message = request.into_inner();
        assert_eq!(message.model_name, "embed-model");
        assert_eq!(message.model_version, "2");
        assert!(!message.id.is_empty());
        assert_eq!(message.parameters.get("priority"), Some(&InferParameter::uint64(7)));

        assert_eq!(message.inputs.len(), 1);
        let input = &message.inputs[0];
        assert_eq!(input.name, "text");
        assert_eq!(input.datatype, "BYTES");
        assert_eq!(input.shape, vec![3]);
        assert_eq!(
            message.raw_input_contents,
            vec![encode_bytes_tensor(&texts).unwrap()]
        );

        assert_eq!(message.outputs.len(), 1);
        assert_eq!(message.outputs[0].name, "embeddings");
    }

    #[tokio::test]
    async fn test_requests_without_priority_or_version() {
        let grpc = transport(BackendKwargs::default());
        let message = grpc
            .infer_request("m", &["only".to_string()])
            .unwrap()
            .into_inner();
        assert!(message.parameters.is_empty());
        assert!(message.model_version.is_empty());
        assert_eq!(message.inputs[0].shape, vec![1]);

        let index = grpc.request(RepositoryIndexRequest::default()).unwrap();
        assert_eq!(
            index.metadata().get("authorization").unwrap().to_str().unwrap(),
            "Bearer fake-api-key"
        );
    }
}
