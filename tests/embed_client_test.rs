use caregraph::client::EmbeddedClient;
use caregraph::config::{EmbeddingConfig, EmbeddingProviderKind};
use caregraph::embed::{EmbedError, EmbeddingClient, EmbeddingProvider};
use caregraph::ingest::{self, GraphSchema, Ingestor, SourceRecord, VectorIndexSpec};
use caregraph::retrieval::QueryRunner;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn openai_config(server: &MockServer, dimensions: usize) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: EmbeddingProviderKind::OpenAI,
        model: "text-embedding-ada-002".to_string(),
        api_key: Some("sk-test".to_string()),
        api_base_url: Some(format!("{}/v1", server.uri())),
        dimensions,
    }
}

fn ollama_config(server: &MockServer) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: EmbeddingProviderKind::Ollama,
        model: "nomic-embed-text".to_string(),
        api_key: None,
        api_base_url: Some(server.uri()),
        dimensions: 3,
    }
}

#[tokio::test]
async fn test_openai_embeddings_are_returned_in_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "text-embedding-ada-002"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0, 0.0]},
                {"index": 0, "embedding": [1.0, 0.0, 0.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&openai_config(&server, 3)).unwrap();
    let embeddings = client
        .generate_embeddings(&["heart".to_string(), "skin".to_string()])
        .await
        .unwrap();
    assert_eq!(embeddings, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
}

#[tokio::test]
async fn test_openai_error_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&openai_config(&server, 3)).unwrap();
    let err = client.embed("heart").await.unwrap_err();
    match err {
        EmbedError::ApiError(message) => assert!(message.contains("invalid api key")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_dimension_mismatch_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": [1.0, 0.0]}]
        })))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&openai_config(&server, 3)).unwrap();
    let err = client.embed("heart").await.unwrap_err();
    assert!(matches!(err, EmbedError::DimensionMismatch { expected: 3, got: 2 }));
}

#[tokio::test]
async fn test_malformed_body_is_serialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vector": [1.0]})))
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&ollama_config(&server)).unwrap();
    let err = client.embed("heart").await.unwrap_err();
    assert!(matches!(err, EmbedError::SerializationError(_)));
}

#[tokio::test]
async fn test_ollama_sends_one_request_per_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({"model": "nomic-embed-text"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.5, 0.5, 0.0]})))
        .expect(2)
        .mount(&server)
        .await;

    let client = EmbeddingClient::new(&ollama_config(&server)).unwrap();
    assert_eq!(client.dimensions(), 3);
    let embeddings = client
        .generate_embeddings(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(embeddings.len(), 2);
}

/// Embeds by keyword so ranking is predictable: dermatology bios point one way,
/// everything else the other
fn keyword_embedding(request: &Request) -> ResponseTemplate {
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
    let text = body["input"][0].as_str().unwrap_or_default().to_lowercase();
    let embedding = if text.contains("skin") || text.contains("dermatolog") {
        vec![0.0, 1.0, 0.1]
    } else if text.contains("heart") || text.contains("cardiolog") {
        vec![1.0, 0.0, 0.1]
    } else {
        vec![0.3, 0.3, 1.0]
    };
    ResponseTemplate::new(200).set_body_json(json!({"data": [{"index": 0, "embedding": embedding}]}))
}

#[tokio::test]
async fn test_similarity_search_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(keyword_embedding)
        .mount(&server)
        .await;

    let client = Arc::new(EmbeddedClient::new());
    let ingestor = Ingestor::new(client.clone(), GraphSchema::healthcare()).unwrap();
    for (provider, bio, specialization) in [
        ("Dr. Smith", "Heart and vascular care.", "Cardiology"),
        ("Dr. Johnson", "Skin conditions and eczema.", "Dermatology"),
        ("Dr. Lee", "Migraine and epilepsy.", "Neurology"),
    ] {
        let record = SourceRecord::new()
            .with("Provider", provider)
            .with("Patient", "Alice")
            .with("Specialization", specialization)
            .with("Location", "Houston")
            .with("Bio", bio)
            .with("Patient_Age", 40i64)
            .with("Patient_Gender", "F")
            .with("Patient_Condition", "Migraine");
        ingestor.ingest(&record).await.unwrap();
    }

    let spec = VectorIndexSpec {
        dimensions: 3,
        ..VectorIndexSpec::default()
    };
    let embedder = Arc::new(EmbeddingClient::new(&openai_config(&server, 3)).unwrap());
    ingest::ensure_vector_index(client.as_ref(), &spec).await.unwrap();
    let report = ingest::backfill_embeddings(client.as_ref(), embedder.as_ref(), &spec)
        .await
        .unwrap();
    assert_eq!(report.embedded, 3);

    let runner = QueryRunner::new(client).with_embedder(embedder, spec);
    let hits = runner
        .similar("give me a list of healthcare providers in the area of dermatology", 2)
        .await;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].name.as_deref(), Some("Dr. Johnson"));
    assert_eq!(hits[0].bio.as_deref(), Some("Skin conditions and eczema."));
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn test_provider_outage_yields_empty_similarity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let embedder = Arc::new(EmbeddingClient::new(&openai_config(&server, 3)).unwrap());
    let runner = QueryRunner::new(Arc::new(EmbeddedClient::new()))
        .with_embedder(embedder, VectorIndexSpec::default());
    assert!(runner.similar("dermatology", 3).await.is_empty());
}
