//! Ollama provider implementation
//!
//! Talks to a local Ollama service: `/api/chat` for completions, `/api/tags`
//! for health and `/api/pull` for installing models during bootstrap.

use crate::bootstrap::ModelInstaller;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
    MessageRole, TokenUsage,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Ollama provider configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Model downloads are slow; pulls get their own limit
    pub pull_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(300),
            pull_timeout: Duration::from_secs(3600),
        }
    }
}

impl OllamaConfig {
    /// Build from the `[llm]` config section
    pub fn from_section(section: &crate::config::LlmSection) -> Self {
        Self {
            base_url: section.base_url.clone(),
            timeout: Duration::from_secs(section.timeout_secs),
            ..Default::default()
        }
    }
}

/// Ollama provider implementation
pub struct OllamaProvider {
    config: OllamaConfig,
    client: Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        if config.base_url.trim().is_empty() {
            return Err(LlmError::NotConfigured(
                "Ollama base URL is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Convert completion request to Ollama format (pure function)
    fn convert_to_ollama_request(request: &CompletionRequest) -> OllamaChatRequest {
        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        OllamaChatRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            stream: false,
            options,
        }
    }

    /// Convert internal message to Ollama format (pure function)
    fn convert_message(message: &Message) -> OllamaMessage {
        OllamaMessage {
            role: match message.role {
                MessageRole::System => "system".to_string(),
                MessageRole::User => "user".to_string(),
                MessageRole::Assistant => "assistant".to_string(),
            },
            content: message.content.clone(),
        }
    }

    /// Parse Ollama chat response (pure function)
    fn parse_chat_response(
        response: OllamaChatResponse,
        request_metadata: HashMap<String, String>,
    ) -> Result<CompletionResponse, LlmError> {
        if !response.done {
            return Err(LlmError::InvalidResponse(
                "Ollama returned an unfinished response".to_string(),
            ));
        }

        let prompt_tokens = response.prompt_eval_count.unwrap_or(0);
        let completion_tokens = response.eval_count.unwrap_or(0);

        Ok(CompletionResponse {
            content: response.message.map(|m| m.content),
            model: response.model,
            usage: TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            finish_reason: Self::convert_done_reason(response.done_reason.as_deref()),
            metadata: request_metadata,
        })
    }

    /// Convert Ollama done reason to internal format (pure function)
    fn convert_done_reason(reason: Option<&str>) -> FinishReason {
        match reason {
            Some("stop") | None => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some(_) => FinishReason::Error,
        }
    }

    /// Map a non-success status to a provider error (pure function)
    fn status_error(status: StatusCode, body: &str, model: &str) -> LlmError {
        let detail = serde_json::from_str::<OllamaErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.to_string());

        if status == StatusCode::NOT_FOUND {
            LlmError::ModelNotFound(format!("{model}: {detail}"))
        } else if status.is_server_error() {
            LlmError::ApiError(format!("Ollama server error: {status} - {detail}"))
        } else {
            LlmError::ApiError(format!("Ollama API error: {status} - {detail}"))
        }
    }

    fn network_error(e: reqwest::Error) -> LlmError {
        let error_msg = format!(
            "HTTP request failed: {} (is_connect: {}, is_timeout: {})",
            e,
            e.is_connect(),
            e.is_timeout()
        );
        warn!("Ollama network error details: {}", error_msg);
        LlmError::NetworkError(error_msg)
    }

    /// Pull a model into the local service, blocking until it is installed
    pub async fn pull_model(&self, model: &str) -> Result<(), LlmError> {
        info!("Pulling model {} from {}", model, self.config.base_url);

        let response = self
            .client
            .post(self.endpoint("/api/pull"))
            .timeout(self.config.pull_timeout)
            .json(&OllamaPullRequest {
                model: model.to_string(),
                stream: false,
            })
            .send()
            .await
            .map_err(Self::network_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Ollama pull failed - Status: {}, Response: {}", status, error_text);
            return Err(Self::status_error(status, &error_text, model));
        }

        let body: OllamaPullResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        match body.status.as_str() {
            "success" => {
                info!("Model {} installed", model);
                Ok(())
            }
            other => Err(LlmError::ApiError(format!(
                "Pull of {model} ended with status '{other}'"
            ))),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let ollama_request = Self::convert_to_ollama_request(&request);
        debug!(
            "Ollama request: model {}, {} messages",
            ollama_request.model,
            ollama_request.messages.len()
        );

        let response = self
            .client
            .post(self.endpoint("/api/chat"))
            .json(&ollama_request)
            .send()
            .await
            .map_err(Self::network_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "Ollama API error - Status: {}, Response: {}",
                status, error_text
            );
            return Err(Self::status_error(status, &error_text, &request.model));
        }

        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let response = Self::parse_chat_response(ollama_response, request.metadata)?;
        debug!(
            "Ollama response: {} tokens used (prompt: {}, completion: {}), finish_reason: {:?}",
            response.usage.total_tokens,
            response.usage.prompt_tokens,
            response.usage.completion_tokens,
            response.finish_reason
        );
        Ok(response)
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        let response = self
            .client
            .get(self.endpoint("/api/tags"))
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::ApiError(format!(
                "Ollama health check returned {}",
                response.status()
            )))
        }
    }
}

#[async_trait]
impl ModelInstaller for OllamaProvider {
    fn manager_name(&self) -> &str {
        "ollama"
    }

    async fn install(&self, package: &str) -> Result<(), LlmError> {
        self.pull_model(package).await
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    model: String,
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OllamaPullRequest {
    model: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaPullResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_config_default() {
        let config = OllamaConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_ollama_provider_requires_base_url() {
        let config = OllamaConfig {
            base_url: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            OllamaProvider::new(config),
            Err(LlmError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let provider = OllamaProvider::new(OllamaConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            provider.endpoint("/api/chat"),
            "http://localhost:11434/api/chat"
        );
    }

    #[test]
    fn test_request_conversion_omits_empty_options() {
        let request = CompletionRequest::new(
            "llama2:1b",
            vec![Message::system("be brief"), Message::user("hi")],
        );
        let ollama = OllamaProvider::convert_to_ollama_request(&request);

        let json = serde_json::to_value(&ollama).unwrap();
        assert_eq!(json["model"], "llama2:1b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_request_conversion_maps_max_tokens_to_num_predict() {
        let mut request = CompletionRequest::new("llama2:1b", vec![Message::user("hi")]);
        request.temperature = Some(0.3);
        request.max_tokens = Some(128);

        let json = serde_json::to_value(OllamaProvider::convert_to_ollama_request(&request)).unwrap();
        assert_eq!(json["options"]["num_predict"], 128);
        assert!(json["options"]["temperature"].is_number());
    }

    #[test]
    fn test_done_reason_conversion() {
        assert!(matches!(
            OllamaProvider::convert_done_reason(Some("stop")),
            FinishReason::Stop
        ));
        assert!(matches!(
            OllamaProvider::convert_done_reason(None),
            FinishReason::Stop
        ));
        assert!(matches!(
            OllamaProvider::convert_done_reason(Some("length")),
            FinishReason::Length
        ));
        assert!(matches!(
            OllamaProvider::convert_done_reason(Some("load")),
            FinishReason::Error
        ));
    }

    #[test]
    fn test_status_error_mapping() {
        let err = OllamaProvider::status_error(
            StatusCode::NOT_FOUND,
            r#"{"error":"model 'x' not found"}"#,
            "x",
        );
        assert!(matches!(err, LlmError::ModelNotFound(ref m) if m.contains("not found")));

        let err = OllamaProvider::status_error(StatusCode::BAD_GATEWAY, "upstream", "x");
        assert!(matches!(err, LlmError::ApiError(ref m) if m.contains("server error")));
    }

    #[test]
    fn test_unfinished_response_rejected() {
        let response = OllamaChatResponse {
            model: "llama2:1b".to_string(),
            message: None,
            done: false,
            done_reason: None,
            prompt_eval_count: None,
            eval_count: None,
        };
        assert!(matches!(
            OllamaProvider::parse_chat_response(response, HashMap::new()),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
