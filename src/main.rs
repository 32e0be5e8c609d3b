//! EdgeRPC - Entry Point
//!
//! Command-line front end for sending JSON-RPC calls to a daemon socket.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

use edgerpc::{Config, RpcClient, VERSION};

/// EdgeRPC - JSON-RPC over Unix domain sockets
#[derive(Parser)]
#[command(name = "edgerpc")]
#[command(version = VERSION)]
#[command(about = "Send JSON-RPC requests and notifications to a daemon socket")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Daemon socket path (overrides the config file)
    #[arg(short, long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a request and print its result
    Request(CallArgs),
    /// Send a notification
    Notify(CallArgs),
    /// Check whether the daemon socket is writable
    Probe,
}

#[derive(Args)]
struct CallArgs {
    /// Method name
    method: String,

    /// Parameters as a JSON value
    #[arg(short, long)]
    params: Option<String>,

    /// Routing target (overrides the config file)
    #[arg(short, long)]
    target: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    // Initialize tracing
    edgerpc::util::init_tracing(&config.logging)?;

    debug!(
        version = VERSION,
        socket = %config.client.socket.display(),
        target = ?config.client.target,
        "Starting EdgeRPC"
    );

    run(cli.command, &config).await
}

/// Load the config file, then apply command-line overrides on top
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };

    if let Some(socket) = &cli.socket {
        config.client.socket = socket.clone();
    }
    if let Commands::Request(args) | Commands::Notify(args) = &cli.command {
        if let Some(target) = &args.target {
            config.client.target = Some(target.clone());
        }
    }

    Ok(config)
}

async fn run(command: Commands, config: &Config) -> Result<ExitCode> {
    let client = RpcClient::from_config(&config.client);

    match command {
        Commands::Request(args) => {
            let params = parse_params(args.params.as_deref())?;
            let result = client
                .request(&args.method, params)
                .await
                .with_context(|| format!("Request {} failed", args.method))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Notify(args) => {
            let params = parse_params(args.params.as_deref())?;
            client
                .notify(&args.method, params)
                .await
                .with_context(|| format!("Notification {} failed", args.method))?;
            client.close().await;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Probe => {
            if client.is_endpoint_writable() {
                println!("{}: writable", client.endpoint().display());
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{}: not writable", client.endpoint().display());
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn parse_params(raw: Option<&str>) -> Result<Option<Value>> {
    raw.map(|raw| serde_json::from_str(raw).context("--params is not valid JSON"))
        .transpose()
}
