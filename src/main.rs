//! DDP Router - Main Entry Point
//!
//! Command-line front end for the delegation engine: validate configuration,
//! preview how a request would be routed and planned, or simulate a full
//! session against echo workers.

use clap::{Parser, Subcommand};
use ddp_router::config::RouterConfig;
use ddp_router::intent::KeywordExtractor;
use ddp_router::observability::{init_default_logging, metrics};
use ddp_router::protocol::Request;
use ddp_router::session::Orchestrator;
use ddp_router::testing::MockWorker;
use ddp_router::worker::WorkerPool;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Delegation Decision Protocol router
#[derive(Parser)]
#[command(name = "ddp-router")]
#[command(about = "Deterministic task routing and delegation engine")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "DDP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RequestArgs {
    /// Request text
    text: String,

    /// Answer directly without delegating
    #[arg(long)]
    forbid_delegation: bool,

    /// Constraint forwarded to every delegation step (repeatable)
    #[arg(long = "constraint", value_name = "TEXT")]
    constraints: Vec<String>,
}

impl RequestArgs {
    fn into_request(self) -> Request {
        let mut request = Request::new(self.text);
        request.constraints = self.constraints;
        request.forbid_delegation = self.forbid_delegation;
        request
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
    /// Print signals, resolution and plan for a request without dispatching
    Route(RequestArgs),
    /// Run a full session against echo workers and print the report
    Simulate {
        #[command(flatten)]
        request: RequestArgs,

        /// Also print the metrics snapshot
        #[arg(long)]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::Route(args) => route_request(&config, args.into_request()).await,
        Commands::Simulate { request, metrics } => {
            simulate_session(&config, request.into_request(), metrics).await
        }
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<RouterConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(RouterConfig::load_from_file(path)?)
        }
        None => {
            for path_str in ["ddp.toml", "config/ddp.toml"] {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(RouterConfig::load_from_file(&path)?);
                }
            }

            info!("No configuration file found, using built-in profiles");
            Ok(RouterConfig::default())
        }
    }
}

fn build_orchestrator(
    config: &RouterConfig,
) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let registry = Arc::new(config.build_registry()?);
    let extractor = Arc::new(KeywordExtractor::new(registry.lexicon().clone()));

    let mut workers = WorkerPool::new();
    for profile in registry.profiles() {
        workers.register(profile.id.clone(), MockWorker::compliant().into_arc());
    }

    Ok(Orchestrator::new(
        registry,
        extractor,
        workers,
        config.orchestrator_settings(),
    ))
}

fn handle_config_command(
    config: &RouterConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let registry = config.build_registry()?;
    info!(
        profiles = registry.len(),
        orchestrator = %config.engine.orchestrator_id,
        "Configuration is valid"
    );

    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}

async fn route_request(
    config: &RouterConfig,
    request: Request,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = build_orchestrator(config)?;
    let preview = orchestrator.preview(&request).await;
    println!("{}", serde_json::to_string_pretty(&preview)?);
    Ok(())
}

async fn simulate_session(
    config: &RouterConfig,
    request: Request,
    show_metrics: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = build_orchestrator(config)?;
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received interrupt, cancelling session");
            interrupt.cancel();
        }
    });

    let report = orchestrator.run_with_cancellation(request, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if show_metrics {
        println!("{}", serde_json::to_string_pretty(&metrics().snapshot())?);
    }
    Ok(())
}
