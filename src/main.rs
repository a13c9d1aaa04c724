//! agentcrew entry point
//!
//! With no subcommand the binary bootstraps its environment and relaunches
//! itself with `run_server`; with `run_server` it serves `POST /chat`.

use agentcrew::bootstrap::{self, Bootstrapper, ENV_VAR};
use agentcrew::config::CrewConfig;
use agentcrew::crew::SharedLlm;
use agentcrew::llm::providers::{OllamaConfig, OllamaProvider};
use agentcrew::observability::{init_default_logging, HealthServer};
use agentcrew::server::{self, ChatState};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Self-bootstrapping four-agent chat service
#[derive(Parser)]
#[command(name = "agentcrew")]
#[command(about = "Bootstraps a local model environment and serves a four-agent crew over HTTP")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve POST /chat directly, skipping bootstrap
    #[command(name = "run_server", alias = "run-server")]
    RunServer,
    /// Validate configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting agentcrew v{}", env!("CARGO_PKG_VERSION"));

    let config_path = resolve_config_path(cli.config);
    let config = match load_configuration(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        None => bootstrap_and_relaunch(&config, config_path.as_deref()).await,
        Some(Commands::RunServer) => run_server(config).await,
        Some(Commands::Config { show }) => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

/// The named config file, else the first default location that exists
fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        ["agentcrew.toml", "config/agentcrew.toml"]
            .into_iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    })
}

fn load_configuration(config_path: Option<&Path>) -> Result<CrewConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(CrewConfig::load_from_file(path)?)
        }
        None => {
            info!("No configuration file found, using built-in defaults");
            Ok(CrewConfig::from_env()?)
        }
    }
}

fn build_provider(config: &CrewConfig) -> Result<Arc<OllamaProvider>, Box<dyn std::error::Error>> {
    Ok(Arc::new(OllamaProvider::new(OllamaConfig::from_section(
        &config.llm,
    ))?))
}

/// Prepare the environment, then hand over to a server-mode child process
async fn bootstrap_and_relaunch(
    config: &CrewConfig,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let installer = build_provider(config)?;
    let env = Bootstrapper::from_config(config, installer)
        .setup_environment()
        .await?;

    let status = bootstrap::relaunch(&env, config_path).await?;
    info!("Server process exited with {}", status);
    Ok(())
}

async fn run_server(config: CrewConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Ok(workspace) = std::env::var(ENV_VAR) {
        info!("Running inside environment {}", workspace);
    }

    let provider = build_provider(&config)?;
    let llm = SharedLlm::new(provider, &config.llm);
    let state = Arc::new(ChatState::new(llm, config.crew.clone()));

    if let Some(health_addr) = config.health_addr()? {
        let health_server = Arc::new(HealthServer::new("agentcrew", health_addr, state.clone()));
        tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Health server stopped: {}", e);
            }
        });
    }

    let addr = config.chat_addr()?;
    server::serve(state, addr, shutdown_signal()).await?;
    Ok(())
}

fn handle_config_command(config: &CrewConfig, show: bool) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down gracefully..."),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
    }
}
