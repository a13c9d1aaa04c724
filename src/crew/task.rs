//! Tasks and their outputs

use crate::crew::agent::AgentRole;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A textual instruction bound to one agent
#[derive(Debug, Clone)]
pub struct Task {
    pub description: String,
    pub expected_output: Option<String>,
    pub agent: Arc<AgentRole>,
}

impl Task {
    pub fn new(description: impl Into<String>, agent: Arc<AgentRole>) -> Self {
        Self {
            description: description.into(),
            expected_output: None,
            agent,
        }
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    /// Prompt for this task given the outputs of the tasks before it
    pub fn prompt(&self, context: &[TaskOutput]) -> String {
        let mut prompt = format!("Current task: {}", self.description);

        if let Some(expected) = &self.expected_output {
            prompt.push_str(&format!("\n\nExpected output: {expected}"));
        }

        if !context.is_empty() {
            prompt.push_str("\n\nContext from earlier work:");
            for output in context {
                prompt.push_str(&format!(
                    "\n\n[{}] {}\n{}",
                    output.agent, output.description, output.raw
                ));
            }
        }

        prompt
    }
}

/// Result of one executed task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOutput {
    pub agent: String,
    pub description: String,
    pub raw: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crew::agent::SharedLlm;
    use crate::testing::MockLlmProvider;

    fn agent(role: &str) -> Arc<AgentRole> {
        let llm = SharedLlm::with_model(Arc::new(MockLlmProvider::single_response("ok")), "mock");
        Arc::new(AgentRole::new(role, "goal", "backstory", llm))
    }

    #[test]
    fn test_prompt_without_context() {
        let task = Task::new("Summarize the request", agent("CEO"));
        assert_eq!(task.prompt(&[]), "Current task: Summarize the request");
    }

    #[test]
    fn test_prompt_includes_expected_output_and_context() {
        let task = Task::new("Write it", agent("Writer")).with_expected_output("A short essay");
        let context = vec![TaskOutput {
            agent: "Manager".to_string(),
            description: "Plan it".to_string(),
            raw: "Step 1, step 2".to_string(),
        }];

        let prompt = task.prompt(&context);
        assert!(prompt.contains("Expected output: A short essay"));
        assert!(prompt.contains("[Manager] Plan it\nStep 1, step 2"));
    }
}
