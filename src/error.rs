//! Error types for the agent crew service
//!
//! Every failure surfaces through `CrewError`. The HTTP layer turns it into
//! a sanitized JSON body so model service details and credentials never leak
//! to callers.

use crate::bootstrap::BootstrapError;
use crate::llm::provider::LlmError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for crew operations
#[derive(Debug, Error)]
pub enum CrewError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("LLM provider error: {0}")]
    Llm(#[from] LlmError),

    #[error("Task '{task}' failed for agent {agent}: {message}")]
    TaskFailed {
        agent: String,
        task: String,
        message: String,
    },

    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// JSON body returned for failed requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

impl CrewError {
    /// Sanitized error body for HTTP responses
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody {
            error: sanitize_error_message(&self.to_string()),
        }
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create task failure error
    pub fn task_failed(
        agent: impl Into<String>,
        task: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TaskFailed {
            agent: agent.into(),
            task: task.into(),
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("static regex compiles")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("static regex compiles")
});

const MAX_ERROR_LEN: usize = 500;

/// Strip secrets and credential paths, then cap the length
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_ERROR_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_ERROR_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for crew operations
pub type CrewResult<T> = Result<T, CrewError>;
