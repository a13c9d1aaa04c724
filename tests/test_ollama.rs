//! Integration tests for the Ollama provider
//!
//! Tests behavioral contracts against a mock Ollama service:
//! - Non-streaming chat request and response handling
//! - Error mapping for missing models and server failures
//! - Model pulls used by the bootstrapper
//! - Health checks

use agentcrew::bootstrap::ModelInstaller;
use agentcrew::llm::provider::{CompletionRequest, FinishReason, LlmError, LlmProvider, Message};
use agentcrew::llm::providers::ollama::{OllamaConfig, OllamaProvider};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> OllamaConfig {
    OllamaConfig {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        pull_timeout: Duration::from_secs(5),
    }
}

fn test_request(model: &str) -> CompletionRequest {
    CompletionRequest::new(
        model,
        vec![Message::system("You are CEO."), Message::user("Hello")],
    )
    .with_sampling(Some(0.7), None)
}

#[tokio::test]
async fn test_ollama_provider_returns_successful_completion() {
    let mock_server = MockServer::start().await;

    let response_body = serde_json::json!({
        "model": "llama2:1b",
        "created_at": "2024-01-01T00:00:00Z",
        "message": {
            "role": "assistant",
            "content": "Hello! How can I help?"
        },
        "done": true,
        "done_reason": "stop",
        "prompt_eval_count": 12,
        "eval_count": 8
    });

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama2:1b",
            "stream": false,
            "options": { "temperature": 0.7 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(test_request("llama2:1b")).await.unwrap();

    assert_eq!(response.content.as_deref(), Some("Hello! How can I help?"));
    assert_eq!(response.model, "llama2:1b");
    assert_eq!(response.finish_reason, FinishReason::Stop);
    assert_eq!(response.usage.prompt_tokens, 12);
    assert_eq!(response.usage.completion_tokens, 8);
    assert_eq!(response.usage.total_tokens, 20);
}

#[tokio::test]
async fn test_ollama_provider_sends_roles_in_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "messages": [
                { "role": "system", "content": "You are CEO." },
                { "role": "user", "content": "Hello" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama2:1b",
            "message": { "role": "assistant", "content": "ok" },
            "done": true
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(test_request("llama2:1b")).await.unwrap();
    assert_eq!(response.content.as_deref(), Some("ok"));
}

#[tokio::test]
async fn test_ollama_provider_maps_length_finish_reason() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama2:1b",
            "message": { "role": "assistant", "content": "truncated" },
            "done": true,
            "done_reason": "length"
        })))
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    let response = provider.complete(test_request("llama2:1b")).await.unwrap();
    assert_eq!(response.finish_reason, FinishReason::Length);
}

#[tokio::test]
async fn test_ollama_provider_reports_missing_model() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": "model \"nope\" not found, try pulling it first"
        })))
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request("nope")).await;

    match result {
        Err(LlmError::ModelNotFound(message)) => {
            assert!(message.contains("nope"));
            assert!(message.contains("try pulling it first"));
        }
        other => panic!("Expected ModelNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ollama_provider_handles_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request("llama2:1b")).await;

    match result {
        Err(LlmError::ApiError(message)) => assert!(message.contains("server error")),
        other => panic!("Expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ollama_provider_does_not_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    assert!(provider.complete(test_request("llama2:1b")).await.is_err());
}

#[tokio::test]
async fn test_ollama_provider_rejects_malformed_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.complete(test_request("llama2:1b")).await;
    assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_ollama_provider_network_failure() {
    // Nothing listens on this port
    let provider = OllamaProvider::new(test_config("http://127.0.0.1:1")).unwrap();
    let result = provider.complete(test_request("llama2:1b")).await;
    assert!(matches!(result, Err(LlmError::NetworkError(_))));
}

#[tokio::test]
async fn test_ollama_provider_requires_base_url() {
    let result = OllamaProvider::new(test_config("  "));
    assert!(matches!(result, Err(LlmError::NotConfigured(_))));
}

#[tokio::test]
async fn test_ollama_pull_installs_model() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama2:1b",
            "stream": false
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "success" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    assert_eq!(provider.manager_name(), "ollama");
    provider.install("llama2:1b").await.unwrap();
}

#[tokio::test]
async fn test_ollama_pull_fails_on_unknown_model() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": "pull model manifest: file does not exist"
        })))
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    let result = provider.install("not-a-model").await;
    match result {
        Err(LlmError::ApiError(message)) => assert!(message.contains("file does not exist")),
        other => panic!("Expected ApiError, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ollama_pull_fails_on_unexpected_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/pull"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "pulling manifest" })),
        )
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    assert!(provider.install("llama2:1b").await.is_err());
}

#[tokio::test]
async fn test_ollama_health_check() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "models": [] })))
        .mount(&mock_server)
        .await;

    let provider = OllamaProvider::new(test_config(&mock_server.uri())).unwrap();
    assert!(provider.health_check().await.is_ok());

    let unreachable = OllamaProvider::new(test_config("http://127.0.0.1:1")).unwrap();
    assert!(unreachable.health_check().await.is_err());
}
