//! Agent roles and the shared model handle they reason with

use crate::config::LlmSection;
use crate::crew::delegation::{parse_delegation, DelegationRequest};
use crate::error::CrewResult;
use crate::llm::provider::{CompletionRequest, LlmError, LlmProvider, Message};
use crate::observability::metrics::metrics;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One model handle shared by every agent in a crew
#[derive(Clone)]
pub struct SharedLlm {
    provider: Arc<dyn LlmProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl fmt::Debug for SharedLlm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLlm")
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .finish()
    }
}

impl SharedLlm {
    pub fn new(provider: Arc<dyn LlmProvider>, section: &LlmSection) -> Self {
        Self {
            provider,
            model: section.model.clone(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
        }
    }

    pub fn with_model(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Run one completion and return its text
    pub async fn chat(&self, messages: Vec<Message>) -> Result<String, LlmError> {
        let request = CompletionRequest::new(self.model.clone(), messages)
            .with_sampling(self.temperature, self.max_tokens);

        let result = self.provider.complete(request).await;
        metrics().llm_call(result.is_ok());

        let content = result?.content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse(
                "model returned empty content".to_string(),
            ));
        }
        Ok(content)
    }
}

/// A named role with a goal and backstory
#[derive(Debug, Clone)]
pub struct AgentRole {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub allow_delegation: bool,
    pub verbose: bool,
    llm: SharedLlm,
}

impl AgentRole {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        llm: SharedLlm,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            allow_delegation: false,
            verbose: false,
            llm,
        }
    }

    pub fn allow_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn llm(&self) -> &SharedLlm {
        &self.llm
    }

    /// System prompt; the coworker roster appears only for delegating agents
    pub fn system_prompt(&self, coworkers: &[Arc<AgentRole>]) -> String {
        let mut prompt = format!(
            "You are {}.\n{}\n\nYour personal goal is: {}",
            self.role, self.backstory, self.goal
        );

        if self.allow_delegation && !coworkers.is_empty() {
            let roster = coworkers
                .iter()
                .map(|c| c.role.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            prompt.push_str(&format!(
                "\n\nYou can ask one of your coworkers for help: {roster}.\n\
                 To do so, reply with a single line of the form\n\
                 DELEGATE TO <coworker role>: <question>\n\
                 Otherwise reply with your final answer."
            ));
        }

        prompt
    }

    /// Work a task prompt to a final answer, consulting coworkers when allowed
    pub async fn execute(
        &self,
        task_prompt: &str,
        coworkers: &[Arc<AgentRole>],
        max_delegations: u32,
    ) -> CrewResult<String> {
        let mut messages = vec![
            Message::system(self.system_prompt(coworkers)),
            Message::user(task_prompt),
        ];
        let mut rounds = 0u32;
        let mut final_demanded = false;

        loop {
            let reply = self.llm.chat(messages.clone()).await?;

            let request = match self.delegation_request(&reply) {
                Some(request) if !final_demanded => request,
                _ => return Ok(reply),
            };

            let coworker = coworkers
                .iter()
                .find(|c| c.role.eq_ignore_ascii_case(&request.coworker) && c.role != self.role);

            messages.push(Message::assistant(reply));

            match coworker {
                Some(coworker) if rounds < max_delegations => {
                    rounds += 1;
                    metrics().delegation();
                    info!(
                        from = %self.role,
                        to = %coworker.role,
                        round = rounds,
                        "Delegating question"
                    );

                    let answer = coworker.answer(&self.role, &request.question).await?;
                    messages.push(Message::user(format!(
                        "{} answered:\n{}\n\nContinue with your task.",
                        coworker.role, answer
                    )));
                }
                Some(_) => {
                    warn!(agent = %self.role, "Delegation limit reached");
                    final_demanded = true;
                    messages.push(Message::user(
                        "You cannot delegate any further. Give your final answer now.",
                    ));
                }
                None => {
                    warn!(agent = %self.role, coworker = %request.coworker, "Unknown coworker");
                    final_demanded = true;
                    messages.push(Message::user(format!(
                        "There is no coworker named '{}'. Give your final answer now.",
                        request.coworker
                    )));
                }
            }
        }
    }

    fn delegation_request(&self, reply: &str) -> Option<DelegationRequest> {
        if !self.allow_delegation {
            return None;
        }
        parse_delegation(reply)
    }

    /// Answer a coworker's question without delegating further
    pub async fn answer(&self, asked_by: &str, question: &str) -> CrewResult<String> {
        debug!(agent = %self.role, asked_by, "Answering delegated question");
        let messages = vec![
            Message::system(self.system_prompt(&[])),
            Message::user(format!("{asked_by} asks you: {question}")),
        ];
        Ok(self.llm.chat(messages).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlmProvider;

    fn llm() -> SharedLlm {
        SharedLlm::with_model(Arc::new(MockLlmProvider::single_response("ok")), "mock")
    }

    #[test]
    fn test_system_prompt_contains_identity() {
        let agent = AgentRole::new("Writer", "Write well", "You write.", llm());
        let prompt = agent.system_prompt(&[]);
        assert!(prompt.starts_with("You are Writer."));
        assert!(prompt.contains("Your personal goal is: Write well"));
        assert!(!prompt.contains("DELEGATE TO"));
    }

    #[test]
    fn test_roster_hidden_without_delegation() {
        let coworker = Arc::new(AgentRole::new("Manager", "g", "b", llm()));
        let agent = AgentRole::new("Researcher", "g", "b", llm());
        assert!(!agent.system_prompt(&[coworker.clone()]).contains("Manager"));

        let delegating = agent.allow_delegation(true);
        let prompt = delegating.system_prompt(&[coworker]);
        assert!(prompt.contains("Manager"));
        assert!(prompt.contains("DELEGATE TO"));
    }

    #[tokio::test]
    async fn test_empty_content_is_an_error() {
        let llm = SharedLlm::with_model(Arc::new(MockLlmProvider::single_response("   ")), "mock");
        let result = llm.chat(vec![Message::user("hi")]).await;
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }
}
