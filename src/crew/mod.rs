//! Minimal sequential crew engine
//!
//! Agents are roles backed by a shared model handle, tasks are instructions
//! bound to one agent, and a crew runs its tasks in order, passing earlier
//! outputs forward as context.

pub mod agent;
pub mod delegation;
pub mod execution;
pub mod task;

pub use agent::{AgentRole, SharedLlm};
pub use delegation::{parse_delegation, DelegationRequest};
pub use execution::{Crew, CrewOutput, Process};
pub use task::{Task, TaskOutput};
