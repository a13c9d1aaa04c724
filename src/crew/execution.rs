//! Crew assembly and kickoff

use crate::crew::agent::AgentRole;
use crate::crew::task::{Task, TaskOutput};
use crate::error::{CrewError, CrewResult};
use crate::observability::metrics::metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

/// How a crew works through its task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Process {
    /// One task at a time, in list order, each seeing all earlier outputs
    Sequential,
}

/// Outcome of a crew run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewOutput {
    pub run_id: Uuid,
    /// Output of the last task
    pub raw: String,
    pub tasks_output: Vec<TaskOutput>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A group of agents executing a list of tasks
#[derive(Debug)]
pub struct Crew {
    agents: Vec<Arc<AgentRole>>,
    tasks: Vec<Task>,
    process: Process,
    max_delegations: u32,
}

impl Crew {
    pub fn new(agents: Vec<Arc<AgentRole>>, tasks: Vec<Task>, process: Process) -> Self {
        Self {
            agents,
            tasks,
            process,
            max_delegations: 2,
        }
    }

    pub fn with_max_delegations(mut self, max_delegations: u32) -> Self {
        self.max_delegations = max_delegations;
        self
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Run every task and return the combined output
    pub async fn kickoff(&self) -> CrewResult<CrewOutput> {
        self.validate()?;

        match self.process {
            Process::Sequential => self.run_sequential().await,
        }
    }

    fn validate(&self) -> CrewResult<()> {
        if self.tasks.is_empty() {
            return Err(CrewError::invalid_input("crew has no tasks"));
        }

        for task in &self.tasks {
            if !self.agents.iter().any(|a| Arc::ptr_eq(a, &task.agent)) {
                return Err(CrewError::internal(format!(
                    "task '{}' is assigned to {} who is not a crew member",
                    task.description, task.agent.role
                )));
            }
        }

        Ok(())
    }

    async fn run_sequential(&self) -> CrewResult<CrewOutput> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());

        info!(%run_id, tasks = self.tasks.len(), "Crew kickoff");

        for (index, task) in self.tasks.iter().enumerate() {
            let span = crate::task_span!(%run_id, index, agent = %task.agent.role);
            let output = self
                .run_task(task, &outputs)
                .instrument(span)
                .await?;
            outputs.push(output);
        }

        let raw = outputs
            .last()
            .map(|o| o.raw.clone())
            .unwrap_or_default();

        info!(%run_id, "Crew finished");
        Ok(CrewOutput {
            run_id,
            raw,
            tasks_output: outputs,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn run_task(&self, task: &Task, context: &[TaskOutput]) -> CrewResult<TaskOutput> {
        let agent = &task.agent;
        let prompt = task.prompt(context);

        if agent.verbose {
            info!(agent = %agent.role, task = %task.description, "Working on task");
        } else {
            debug!(agent = %agent.role, task = %task.description, "Working on task");
        }

        let coworkers: Vec<Arc<AgentRole>> = self
            .agents
            .iter()
            .filter(|a| !Arc::ptr_eq(*a, agent))
            .cloned()
            .collect();

        let raw = agent
            .execute(&prompt, &coworkers, self.max_delegations)
            .await
            .map_err(|e| match e {
                CrewError::Llm(source) => {
                    CrewError::task_failed(&agent.role, &task.description, source.to_string())
                }
                other => other,
            })?;

        if agent.verbose {
            info!(agent = %agent.role, output = %raw, "Task complete");
        }
        metrics().task_completed();

        Ok(TaskOutput {
            agent: agent.role.clone(),
            description: task.description.clone(),
            raw,
        })
    }
}
