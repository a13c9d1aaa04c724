//! First-run environment bootstrap and self-relaunch
//!
//! Running the binary with no arguments prepares a directory-scoped
//! environment, installs the fixed package list into the local model
//! service, then re-executes the same binary inside that environment with
//! the [`SERVER_MARKER`] argument. Any failure aborts; nothing is retried.

use crate::config::CrewConfig;
use crate::llm::provider::LlmError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, Instrument};

/// Argument that switches the binary into server mode
pub const SERVER_MARKER: &str = "run_server";

/// Environment variable carrying the workspace path into the relaunched process
pub const ENV_VAR: &str = "AGENTCREW_ENV";

/// Manifest file written once installation succeeds
pub const MANIFEST_FILE: &str = "manifest.toml";

/// Bootstrap and relaunch errors
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Workspace error at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to install package '{package}': {source}")]
    InstallFailed {
        package: String,
        #[source]
        source: LlmError,
    },
    #[error("Failed to write manifest: {0}")]
    Manifest(String),
    #[error("Failed to relaunch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Server process exited with {0}")]
    ChildFailed(ExitStatus),
}

/// External package manager the bootstrapper installs through
#[async_trait]
pub trait ModelInstaller: Send + Sync {
    /// Name recorded in the manifest
    fn manager_name(&self) -> &str;

    /// Install one package, blocking until it is available
    async fn install(&self, package: &str) -> Result<(), LlmError>;
}

/// Record of a completed bootstrap
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallManifest {
    pub manager: String,
    pub packages: Vec<String>,
    pub installed_at: DateTime<Utc>,
}

/// A prepared environment
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub workspace: PathBuf,
    pub manifest_path: PathBuf,
}

/// Creates the workspace and installs the package list
pub struct Bootstrapper {
    workspace_dir: PathBuf,
    packages: Vec<String>,
    installer: Arc<dyn ModelInstaller>,
}

impl Bootstrapper {
    pub fn new(
        workspace_dir: impl Into<PathBuf>,
        packages: Vec<String>,
        installer: Arc<dyn ModelInstaller>,
    ) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            packages,
            installer,
        }
    }

    pub fn from_config(config: &CrewConfig, installer: Arc<dyn ModelInstaller>) -> Self {
        Self::new(
            config.bootstrap.workspace_dir.clone(),
            config.bootstrap_packages(),
            installer,
        )
    }

    /// Create the workspace, install every package in order, write the manifest
    pub async fn setup_environment(&self) -> Result<Environment, BootstrapError> {
        let span = crate::bootstrap_span!(
            workspace = %self.workspace_dir.display(),
            packages = self.packages.len()
        );

        async {
            let workspace = self.create_workspace()?;
            self.install_packages().await?;
            let manifest_path = self.write_manifest(&workspace)?;

            info!("Environment ready at {}", workspace.display());
            Ok(Environment {
                workspace,
                manifest_path,
            })
        }
        .instrument(span)
        .await
    }

    fn create_workspace(&self) -> Result<PathBuf, BootstrapError> {
        let to_error = |source| BootstrapError::Workspace {
            path: self.workspace_dir.clone(),
            source,
        };

        std::fs::create_dir_all(&self.workspace_dir).map_err(to_error)?;
        self.workspace_dir.canonicalize().map_err(to_error)
    }

    async fn install_packages(&self) -> Result<(), BootstrapError> {
        for package in &self.packages {
            info!(
                "Installing {} via {}",
                package,
                self.installer.manager_name()
            );
            self.installer
                .install(package)
                .await
                .map_err(|source| BootstrapError::InstallFailed {
                    package: package.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    fn write_manifest(&self, workspace: &Path) -> Result<PathBuf, BootstrapError> {
        let manifest = InstallManifest {
            manager: self.installer.manager_name().to_string(),
            packages: self.packages.clone(),
            installed_at: Utc::now(),
        };
        let content = toml::to_string_pretty(&manifest)
            .map_err(|e| BootstrapError::Manifest(e.to_string()))?;

        let manifest_path = workspace.join(MANIFEST_FILE);
        std::fs::write(&manifest_path, content).map_err(|source| BootstrapError::Workspace {
            path: manifest_path.clone(),
            source,
        })?;
        Ok(manifest_path)
    }
}

/// Read a manifest back from a workspace
pub fn read_manifest(workspace: &Path) -> Result<InstallManifest, BootstrapError> {
    let path = workspace.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path)
        .map_err(|source| BootstrapError::Workspace { path, source })?;
    toml::from_str(&content).map_err(|e| BootstrapError::Manifest(e.to_string()))
}

/// Arguments passed to the relaunched process
pub fn relaunch_args(config_path: Option<&Path>) -> Vec<OsString> {
    let mut args = Vec::new();
    if let Some(path) = config_path {
        args.push(OsString::from("--config"));
        args.push(path.as_os_str().to_owned());
    }
    args.push(OsString::from(SERVER_MARKER));
    args
}

/// Re-execute the current binary in server mode inside `env`
pub async fn relaunch(
    env: &Environment,
    config_path: Option<&Path>,
) -> Result<ExitStatus, BootstrapError> {
    let program = std::env::current_exe().map_err(|source| BootstrapError::Spawn {
        program: "current executable".to_string(),
        source,
    })?;

    // The child runs from the workspace, so relative config paths must be resolved here
    let config_path = match config_path {
        Some(path) if path.is_relative() => {
            let cwd = std::env::current_dir().map_err(|source| BootstrapError::Workspace {
                path: path.to_path_buf(),
                source,
            })?;
            Some(cwd.join(path))
        }
        other => other.map(Path::to_path_buf),
    };

    relaunch_with(program.as_os_str(), env, config_path.as_deref()).await
}

/// Run `program` with the relaunch arguments and wait for it
pub async fn relaunch_with(
    program: &std::ffi::OsStr,
    env: &Environment,
    config_path: Option<&Path>,
) -> Result<ExitStatus, BootstrapError> {
    let program_name = program.to_string_lossy().to_string();
    info!(
        "Relaunching {} in {}",
        program_name,
        env.workspace.display()
    );

    let status = Command::new(program)
        .args(relaunch_args(config_path))
        .current_dir(&env.workspace)
        .env(ENV_VAR, &env.workspace)
        .status()
        .await
        .map_err(|source| BootstrapError::Spawn {
            program: program_name,
            source,
        })?;

    if status.success() {
        Ok(status)
    } else {
        Err(BootstrapError::ChildFailed(status))
    }
}
