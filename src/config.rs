//! Configuration system for the agent crew service
//!
//! Every section carries defaults, so the service starts with no file at all
//! and a TOML file only needs to name the values it changes.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CrewConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub bootstrap: BootstrapSection,
    #[serde(default)]
    pub crew: CrewSection,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Interface the chat and health listeners bind to
    ///
    /// Must be a literal IP address such as `127.0.0.1` or `0.0.0.0`;
    /// hostnames like `localhost` are rejected, not resolved.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port for `POST /chat`
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port for the health listener; disabled when unset
    pub health_port: Option<u16>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            health_port: None,
        }
    }
}

/// Language model client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name (only "ollama" is supported)
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier shared by all four agents
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the model service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Optional cap on generated tokens per call
    pub max_tokens: Option<u32>,
    /// Transport timeout for a single model call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "llama2:1b".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// First-run environment settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BootstrapSection {
    /// Directory holding the isolated environment
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,
    /// Packages installed on first run; empty means `[llm.model]`
    #[serde(default)]
    pub packages: Vec<String>,
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from("ai_agents_env")
}

impl Default for BootstrapSection {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            packages: Vec::new(),
        }
    }
}

/// Crew execution settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewSection {
    /// Log every task's input and output
    #[serde(default = "default_verbose")]
    pub verbose: bool,
    /// Delegation rounds allowed per task
    #[serde(default = "default_max_delegations")]
    pub max_delegations: u32,
}

fn default_verbose() -> bool {
    true
}

fn default_max_delegations() -> u32 {
    2
}

impl Default for CrewSection {
    fn default() -> Self {
        Self {
            verbose: default_verbose(),
            max_delegations: default_max_delegations(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CrewConfig {
    /// Load configuration from a TOML file, then apply environment overrides
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration without touching the environment
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Built-in defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `PORT` and `OLLAMA_HOST`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("PORT").ok(),
            std::env::var("OLLAMA_HOST").ok(),
        );
    }

    /// Apply override values; unparseable ports are ignored
    pub fn apply_overrides(&mut self, port: Option<String>, ollama_host: Option<String>) {
        if let Some(port) = port.and_then(|p| p.trim().parse::<u16>().ok()) {
            self.server.port = port;
        }

        if let Some(host) = ollama_host {
            let host = host.trim();
            if !host.is_empty() {
                self.llm.base_url = ollama_base_url(host);
            }
        }
    }

    /// Socket address of the chat listener
    pub fn chat_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        Ok(std::net::SocketAddr::new(self.listen_ip()?, self.server.port))
    }

    /// Socket address of the health listener, if one is configured
    pub fn health_addr(&self) -> Result<Option<std::net::SocketAddr>, ConfigError> {
        match self.server.health_port {
            Some(port) => Ok(Some(std::net::SocketAddr::new(self.listen_ip()?, port))),
            None => Ok(None),
        }
    }

    fn listen_ip(&self) -> Result<std::net::IpAddr, ConfigError> {
        self.server.host.parse::<std::net::IpAddr>().map_err(|e| {
            ConfigError::InvalidConfig(format!(
                "server.host '{}' must be an IP address: {e}",
                self.server.host
            ))
        })
    }

    /// Packages the bootstrapper installs
    pub fn bootstrap_packages(&self) -> Vec<String> {
        if self.bootstrap.packages.is_empty() {
            vec![self.llm.model.clone()]
        } else {
            self.bootstrap.packages.clone()
        }
    }

    /// Check field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider != "ollama" {
            return Err(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider: {}",
                self.llm.provider
            )));
        }

        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "llm.model must not be empty".to_string(),
            ));
        }

        let url = Url::parse(&self.llm.base_url).map_err(|e| {
            ConfigError::InvalidConfig(format!("llm.base_url '{}': {e}", self.llm.base_url))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidConfig(format!(
                "llm.base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "llm.temperature {temperature} outside 0.0..=2.0"
                )));
            }
        }

        if self.server.host.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::InvalidConfig(format!(
                "server.host '{}' must be an IP address",
                self.server.host
            )));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be non-zero".to_string(),
            ));
        }

        for package in self.bootstrap_packages() {
            validate_package_name(&package)?;
        }

        Ok(())
    }
}

/// Port an Ollama service listens on unless told otherwise
pub const OLLAMA_DEFAULT_PORT: u16 = 11434;

/// Turn an `OLLAMA_HOST` value into a base URL
///
/// A bare `host` or `host:port` is taken as http, and a bare host gets
/// [`OLLAMA_DEFAULT_PORT`]. A value with a scheme keeps that scheme's own
/// default port. Unparseable values are kept so validation can report them.
fn ollama_base_url(host: &str) -> String {
    let has_scheme = host.contains("://");
    let candidate = if has_scheme {
        host.to_string()
    } else {
        format!("http://{host}")
    };

    let Ok(mut url) = Url::parse(&candidate) else {
        return candidate;
    };

    if !has_scheme && url.port().is_none() && !has_explicit_port(host) {
        // Only fails for cannot-be-a-base URLs, which an http URL never is
        if url.set_port(Some(OLLAMA_DEFAULT_PORT)).is_err() {
            return candidate;
        }
    }

    url.as_str().trim_end_matches('/').to_string()
}

/// Whether a scheme-less `host[:port][/path]` names a port
fn has_explicit_port(host: &str) -> bool {
    let authority = host.split(['/', '?', '#']).next().unwrap_or_default();
    // Skip past a bracketed IPv6 literal
    let after_ip = authority.rsplit_once(']').map_or(authority, |(_, rest)| rest);
    after_ip
        .rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
}

/// Package names are passed verbatim to the model service
fn validate_package_name(name: &str) -> Result<(), ConfigError> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '/' | '-'));

    if name.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidConfig(format!(
            "Package '{name}' must match pattern [A-Za-z0-9._:/-]+"
        )));
    }

    Ok(())
}
