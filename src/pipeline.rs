//! The fixed four-agent pipeline
//!
//! Every request runs the same four tasks in the same order:
//! CEO analysis, Manager plan, Researcher research, Writer execution.

use crate::config::CrewSection;
use crate::crew::{AgentRole, Crew, CrewOutput, Process, SharedLlm, Task};
use crate::error::CrewResult;
use std::sync::Arc;
use tracing::info;

pub const CEO_ROLE: &str = "CEO";
pub const MANAGER_ROLE: &str = "Manager";
pub const RESEARCHER_ROLE: &str = "Researcher";
pub const WRITER_ROLE: &str = "Writer";

/// Prefix of the CEO's task; the user message follows it
pub const ANALYZE_TASK_PREFIX: &str =
    "Analyze the following user request and determine the necessary steps: ";
pub const PLAN_TASK: &str =
    "Create a detailed plan to fulfill the user request based on the CEO's analysis";
pub const RESEARCH_TASK: &str = "Conduct necessary research to support the plan";
pub const EXECUTE_TASK: &str = "Execute the plan and produce the required output";

/// Four statically configured agents sharing one model handle
#[derive(Debug)]
pub struct CrewPipeline {
    ceo: Arc<AgentRole>,
    manager: Arc<AgentRole>,
    researcher: Arc<AgentRole>,
    writer: Arc<AgentRole>,
    settings: CrewSection,
}

impl CrewPipeline {
    pub fn new(llm: SharedLlm, settings: CrewSection) -> Self {
        let verbose = settings.verbose;

        let ceo = AgentRole::new(
            CEO_ROLE,
            "Analyze user requests and delegate tasks",
            "You are the CEO of an AI company, responsible for understanding user needs and coordinating the team.",
            llm.clone(),
        )
        .allow_delegation(true)
        .verbose(verbose);

        let manager = AgentRole::new(
            MANAGER_ROLE,
            "Coordinate tasks and oversee their execution",
            "You are a skilled project manager, responsible for breaking down tasks and ensuring their completion.",
            llm.clone(),
        )
        .allow_delegation(true)
        .verbose(verbose);

        let researcher = AgentRole::new(
            RESEARCHER_ROLE,
            "Gather and analyze information from various sources",
            "You are an expert at finding and synthesizing information from the internet and other sources.",
            llm.clone(),
        )
        .verbose(verbose);

        let writer = AgentRole::new(
            WRITER_ROLE,
            "Create high-quality written content",
            "You are a skilled writer, capable of producing engaging and informative content on various topics.",
            llm,
        )
        .verbose(verbose);

        info!(model = %ceo.llm().model(), "Agent pipeline constructed");

        Self {
            ceo: Arc::new(ceo),
            manager: Arc::new(manager),
            researcher: Arc::new(researcher),
            writer: Arc::new(writer),
            settings,
        }
    }

    /// Agents in execution order
    pub fn agents(&self) -> [Arc<AgentRole>; 4] {
        [
            self.ceo.clone(),
            self.manager.clone(),
            self.researcher.clone(),
            self.writer.clone(),
        ]
    }

    /// The four tasks for one message
    pub fn build_tasks(&self, message: &str) -> Vec<Task> {
        vec![
            Task::new(format!("{ANALYZE_TASK_PREFIX}{message}"), self.ceo.clone()),
            Task::new(PLAN_TASK, self.manager.clone()),
            Task::new(RESEARCH_TASK, self.researcher.clone()),
            Task::new(EXECUTE_TASK, self.writer.clone()),
        ]
    }

    /// Run the crew for one user message
    pub async fn process(&self, message: &str) -> CrewResult<CrewOutput> {
        let crew = Crew::new(
            self.agents().to_vec(),
            self.build_tasks(message),
            Process::Sequential,
        )
        .with_max_delegations(self.settings.max_delegations);

        crew.kickoff().await
    }
}
