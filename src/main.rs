//! Telemetry bridge - Main Entry Point
//!
//! Wires configuration, credential minting, the MQTT connector and the
//! lifecycle controller together, then runs until a termination signal.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use telebridge::auth::CredentialMinter;
use telebridge::bridge::{LifecycleController, ShellCommandDispatcher, SimulatedSensor};
use telebridge::config::BridgeConfig;
use telebridge::observability::{init_default_logging, metrics};
use telebridge::transport::mqtt::MqttConnector;
use tokio::signal;
use tracing::{error, info};

/// Device-to-cloud telemetry bridge
#[derive(Parser)]
#[command(name = "telebridge")]
#[command(about = "Device-to-cloud MQTT telemetry bridge")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge until terminated
    Run,
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

    init_default_logging();

    info!("Starting telebridge v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_bridge(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(BridgeConfig::load_from_file(path)?)
        }
        None => {
            // Try default locations
            let default_paths = vec![
                "telebridge.toml",
                "config/telebridge.toml",
                "/etc/telebridge/config.toml",
            ];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(BridgeConfig::load_from_file(&path)?);
                }
            }

            error!(
                "No configuration file found. Please provide one with -c/--config or create telebridge.toml"
            );
            process::exit(1);
        }
    }
}

async fn run_bridge(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        device_id = %config.device.device_id,
        broker = %config.broker.host,
        "Bridge starting"
    );

    let mut controller = build_controller(&config)?;

    // Graceful shutdown on SIGINT or SIGTERM
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        result = controller.run() => {
            // Only a startup credential failure ends the loop from inside
            result?;
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }

    info!("Application shutdown initiated");
    match serde_json::to_string(&metrics().get_metrics()) {
        Ok(snapshot) => info!(metrics = %snapshot, "Final metrics snapshot"),
        Err(e) => error!("Failed to serialize metrics snapshot: {}", e),
    }

    Ok(())
}

/// Bootstrap factory - builds the controller with injected dependencies
fn build_controller(
    config: &BridgeConfig,
) -> Result<LifecycleController<MqttConnector>, Box<dyn std::error::Error>> {
    let minter = CredentialMinter::from_config(config)?;
    let connector = MqttConnector::from_config(config);

    Ok(LifecycleController::new(
        config,
        connector,
        minter,
        Box::new(SimulatedSensor),
        Box::new(ShellCommandDispatcher),
    ))
}

fn handle_config_command(
    config: BridgeConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("Current configuration:");
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
