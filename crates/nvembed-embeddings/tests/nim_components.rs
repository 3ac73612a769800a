//! End-to-end tests of the embedding components against a mocked NIM endpoint

use nvembed_embeddings::{
    BackendConfig, Component, Document, DocumentEmbedderParams, EmbeddingError, EmbeddingMeta,
    InitWarning, NvidiaDocumentEmbedder, NvidiaTextEmbedder, Secret, TextEmbedderParams,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Answers `/embeddings` with one 3-dimensional vector per input, in reverse index order
struct EchoEmbeddings;

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let count = body["input"].as_array().map_or(0, Vec::len);
        let data: Vec<Value> = (0..count)
            .rev()
            .map(|i| json!({"index": i, "embedding": [i as f32, 0.5, 1.0], "object": "embedding"}))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({
            "data": data,
            "usage": {"prompt_tokens": count * 2, "total_tokens": count * 2}
        }))
    }
}

fn backend(server: &MockServer, model: Option<&str>) -> BackendConfig {
    BackendConfig {
        api_key: Some(Secret::from_token("fake-api-key")),
        api_url: format!("{}/v1", server.uri()),
        model: model.map(str::to_string),
        ..BackendConfig::default()
    }
}

#[tokio::test]
async fn test_text_embedder_round_trip() {
    nvembed_common::init::initialize_test_environment();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer fake-api-key"))
        .and(body_partial_json(json!({
            "model": "nvolveqa",
            "input": ["query: capital of France?"],
            "input_type": "query"
        })))
        .respond_with(EchoEmbeddings)
        .expect(1)
        .mount(&server)
        .await;

    let mut embedder = NvidiaTextEmbedder::new(TextEmbedderParams {
        backend: backend(&server, Some("nvolveqa")),
        prefix: "query: ".to_string(),
        suffix: String::new(),
    })
    .unwrap();
    assert!(embedder.warm_up().await.unwrap().is_empty());

    let output = Component::run(&embedder, json!({"text": "capital of France?"}))
        .await
        .unwrap();
    assert_eq!(output["embedding"], json!([0.0, 0.5, 1.0]));
    assert_eq!(
        output["meta"],
        json!({"usage": {"prompt_tokens": 2, "total_tokens": 2}})
    );
}

#[tokio::test]
async fn test_document_embedder_batches_and_sums_usage() {
    nvembed_common::init::initialize_test_environment();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(EchoEmbeddings)
        .expect(3)
        .mount(&server)
        .await;

    let mut embedder = NvidiaDocumentEmbedder::new(DocumentEmbedderParams {
        backend: backend(&server, Some("nvolveqa")),
        batch_size: 2,
        progress_bar: false,
        meta_fields_to_embed: vec!["topic".to_string()],
        embedding_separator: " | ".to_string(),
        ..DocumentEmbedderParams::default()
    })
    .unwrap();
    embedder.warm_up().await.unwrap();

    let documents: Vec<Document> = (0..5)
        .map(|i| {
            let mut doc = Document::new(format!("document {i}"));
            doc.meta.insert("topic".to_string(), json!("ML"));
            doc
        })
        .collect();
    let result = embedder.embed_documents(documents).await.unwrap();

    assert_eq!(result.documents.len(), 5);
    // Index order is restored within each batch
    let first_components: Vec<f32> = result
        .documents
        .iter()
        .filter_map(|doc| doc.embedding.as_ref().and_then(|e| e.first().copied()))
        .collect();
    assert_eq!(first_components, vec![0.0, 1.0, 0.0, 1.0, 0.0]);
    // 2 + 2 + 1 inputs at 2 tokens each
    assert_eq!(result.meta, EmbeddingMeta::with_usage(10, 10));

    let requests = server.received_requests().await.unwrap_or_default();
    let first: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(first["input"], json!(["ML | document 0", "ML | document 1"]));
}

#[tokio::test]
async fn test_local_endpoint_discovers_model() {
    nvembed_common::init::initialize_test_environment();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "model1-lora", "root": "model1"},
                {"id": "model1", "root": "model1"},
                {"id": "model2"}
            ]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let mut embedder = NvidiaDocumentEmbedder::new(DocumentEmbedderParams {
        backend: backend(&server, None),
        ..DocumentEmbedderParams::default()
    })
    .unwrap();
    assert_eq!(embedder.model(), None);

    let warnings = embedder.warm_up().await.unwrap();
    assert_eq!(
        warnings,
        vec![InitWarning::DefaultModelSelected {
            model: "model1".to_string()
        }]
    );
    assert_eq!(embedder.model(), Some("model1"));

    // Idempotent: no second discovery, no second warning
    assert!(embedder.warm_up().await.unwrap().is_empty());
    assert_eq!(embedder.available_models().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_server_error_propagates() {
    nvembed_common::init::initialize_test_environment();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut embedder = NvidiaTextEmbedder::new(TextEmbedderParams {
        backend: backend(&server, Some("nvolveqa")),
        ..TextEmbedderParams::default()
    })
    .unwrap();
    embedder.warm_up().await.unwrap();

    let err = embedder.embed_text("hello").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::Http(_)));
}

#[tokio::test]
async fn test_dict_round_trip_keeps_parameters() {
    let server = MockServer::start().await;
    let embedder = NvidiaDocumentEmbedder::new(DocumentEmbedderParams {
        backend: BackendConfig {
            api_key: Some(Secret::from_env_var("NVIDIA_API_KEY")),
            ..backend(&server, Some("nvolveqa"))
        },
        batch_size: 7,
        ..DocumentEmbedderParams::default()
    })
    .unwrap();

    let dict = embedder.to_dict().unwrap();
    let restored = NvidiaDocumentEmbedder::from_dict(dict).unwrap();
    assert_eq!(restored.params(), embedder.params());
    assert!(!restored.is_ready());
}
