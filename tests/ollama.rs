//! Ollama provider and retriever against a mock embedding service.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use knowledge_forge::config::EmbeddingConfig;
use knowledge_forge::embedding::{EmbeddingProvider, OllamaProvider};
use knowledge_forge::error::EmbeddingError;
use knowledge_forge::models::{KnowledgeItem, KnowledgeKind};
use knowledge_forge::retrieve::Retriever;

fn ollama_config(server: &MockServer) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "ollama".to_string(),
        url: server.uri(),
        timeout_secs: 5,
        ..EmbeddingConfig::default()
    }
}

fn item(title: &str, content: &str, embedding: Option<Vec<f32>>) -> KnowledgeItem {
    KnowledgeItem {
        id: title.to_lowercase(),
        title: title.to_string(),
        content: content.to_string(),
        kind: KnowledgeKind::Note,
        created_at: Utc::now(),
        embedding,
    }
}

#[tokio::test]
async fn sends_model_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_json(json!({
            "model": "nomic-embed-text",
            "prompt": "hourly rate"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.25, -0.5, 1.0]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(&ollama_config(&server)).unwrap();
    let v = provider.embed("hourly rate").await.unwrap();
    assert_eq!(v, vec![0.25, -0.5, 1.0]);
}

#[tokio::test]
async fn trailing_slash_in_url_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [1.0] })))
        .mount(&server)
        .await;

    let mut config = ollama_config(&server);
    config.url = format!("{}/", server.uri());
    let provider = OllamaProvider::new(&config).unwrap();
    assert_eq!(provider.url(), server.uri());
    assert_eq!(provider.embed("x").await.unwrap(), vec![1.0]);
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(&ollama_config(&server)).unwrap();
    match provider.embed("anything").await {
        Err(EmbeddingError::Status { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("model not found"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn success_status_other_than_200_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "embedding": [1.0] })))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(&ollama_config(&server)).unwrap();
    match provider.embed("anything").await {
        Err(EmbeddingError::Status { status, .. }) => assert_eq!(status, 201),
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_embedding_field_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "busy" })))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(&ollama_config(&server)).unwrap();
    assert!(matches!(
        provider.embed("anything").await,
        Err(EmbeddingError::Malformed(_))
    ));
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embedding": [1.0] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = ollama_config(&server);
    config.timeout_secs = 1;
    let provider = OllamaProvider::new(&config).unwrap();
    match provider.embed("anything").await {
        Err(EmbeddingError::Http(e)) => assert!(e.is_timeout()),
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_service_is_an_error_and_offline() {
    // bind then drop, so nothing listens on the port
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = EmbeddingConfig {
        provider: "ollama".to_string(),
        url: format!("http://{}", addr),
        timeout_secs: 2,
        ..EmbeddingConfig::default()
    };
    let provider = OllamaProvider::new(&config).unwrap();
    assert!(matches!(
        provider.embed("anything").await,
        Err(EmbeddingError::Http(_))
    ));
    assert!(!provider.health().await);
}

#[tokio::test]
async fn health_reflects_root_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Ollama is running"))
        .mount(&server)
        .await;

    let provider = OllamaProvider::new(&ollama_config(&server)).unwrap();
    assert!(provider.health().await);
}

#[tokio::test]
async fn retriever_ranks_against_live_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({ "prompt": "do you deliver?" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": [0.0, 1.0, 0.0]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let items = vec![
        item("Pricing", "Hourly rate is 40.", Some(vec![1.0, 0.0, 0.0])),
        item("Delivery", "Free delivery within 20 km.", Some(vec![0.1, 0.9, 0.0])),
        item("Draft", "Not embedded yet.", None),
        item("Logistics", "Deliveries leave at 8am.", Some(vec![0.0, 0.8, 0.6])),
    ];

    let provider: Arc<dyn EmbeddingProvider> =
        Arc::new(OllamaProvider::new(&ollama_config(&server)).unwrap());
    let retriever = Retriever::new(provider);

    let results = retriever
        .retrieve("do you deliver?", &items, 3, 0.4)
        .await
        .unwrap();
    assert_eq!(
        results,
        vec![
            "Free delivery within 20 km.".to_string(),
            "Deliveries leave at 8am.".to_string(),
        ]
    );
}

#[tokio::test]
async fn retriever_degrades_to_empty_on_provider_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let items = vec![item("Pricing", "Hourly rate is 40.", Some(vec![1.0, 0.0]))];
    let provider: Arc<dyn EmbeddingProvider> =
        Arc::new(OllamaProvider::new(&ollama_config(&server)).unwrap());
    let retriever = Retriever::new(provider);

    let results = retriever
        .retrieve("hourly rate", &items, 3, 0.4)
        .await
        .unwrap();
    assert!(results.is_empty());
}
