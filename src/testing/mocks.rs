//! Mock implementations for testing
//!
//! Provides a recording LlmProvider and a scriptable ModelInstaller so the
//! crew, server and bootstrap can be exercised without a model service.

use crate::bootstrap::ModelInstaller;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

type Responder = Box<dyn Fn(&CompletionRequest) -> String + Send + Sync>;

/// Mock LLM provider for testing
///
/// Every request is recorded, including ones that fail.
pub struct MockLlmProvider {
    pub responses: Vec<String>,
    pub current_response: Arc<Mutex<usize>>,
    pub requests: Arc<Mutex<Vec<CompletionRequest>>>,
    pub should_fail: bool,
    pub delay: Option<Duration>,
    responder: Option<Responder>,
}

impl std::fmt::Debug for MockLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLlmProvider")
            .field("responses", &self.responses)
            .field("should_fail", &self.should_fail)
            .finish()
    }
}

impl MockLlmProvider {
    /// Cycle through `responses` in order
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            current_response: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            should_fail: false,
            delay: None,
            responder: None,
        }
    }

    pub fn with_failure() -> Self {
        Self {
            should_fail: true,
            ..Self::new(vec![])
        }
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Compute each reply from the request
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> String + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new(vec![])
        }
    }

    /// Reply `"<role> done"`, taking the role from the system prompt
    pub fn echo_role() -> Self {
        Self::with_responder(|request| {
            let role = request
                .messages
                .first()
                .and_then(|m| m.content.strip_prefix("You are "))
                .and_then(|rest| rest.split('.').next())
                .unwrap_or("unknown")
                .to_string();
            format!("{role} done")
        })
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn get_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.requests.lock().await.clear();
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock LLM failure".to_string()));
        }

        let content = if let Some(responder) = &self.responder {
            responder(&request)
        } else {
            let mut current = self.current_response.lock().await;
            let response_idx = *current % self.responses.len().max(1);
            *current += 1;

            self.responses
                .get(response_idx)
                .cloned()
                .unwrap_or_else(|| "Mock response".to_string())
        };

        Ok(CompletionResponse {
            content: Some(content),
            model: request.model,
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::NetworkError(
                "Mock health check failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Mock package installer for bootstrap tests
#[derive(Debug, Default)]
pub struct MockInstaller {
    pub installed: Arc<Mutex<Vec<String>>>,
    pub fail_on: Option<String>,
}

impl MockInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when asked to install `package`
    pub fn failing_on(package: impl Into<String>) -> Self {
        Self {
            fail_on: Some(package.into()),
            ..Default::default()
        }
    }

    pub async fn get_installed(&self) -> Vec<String> {
        self.installed.lock().await.clone()
    }
}

#[async_trait]
impl ModelInstaller for MockInstaller {
    fn manager_name(&self) -> &str {
        "mock"
    }

    async fn install(&self, package: &str) -> Result<(), LlmError> {
        if self.fail_on.as_deref() == Some(package) {
            return Err(LlmError::ModelNotFound(package.to_string()));
        }
        self.installed.lock().await.push(package.to_string());
        Ok(())
    }
}
