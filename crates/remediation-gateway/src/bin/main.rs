//! Recovery orchestrator executable.

use clap::{Parser, Subcommand};
use remediation_common::{RemediationConfig, Result};
use remediation_gateway::{build_executor, AdapterCredentials, AppState, Server};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "remediation-gateway", version, about = "Pipeline recovery orchestrator")]
struct Cli {
    /// Path to a TOML configuration file (overrides built-in defaults, is itself overridden
    /// by REMEDIATION_* / legacy environment variables).
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP operator surface and webhook intake.
    Serve {
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Load and validate configuration, then print it, without starting the server.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    let config = match RemediationConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::CheckConfig => match render_config(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                error!(error = %e, "failed to render configuration");
                std::process::exit(1);
            }
        },
        Commands::Serve { bind } => {
            let bind_addr = bind.unwrap_or_else(|| {
                format!("{}:{}", config.gateway.bind_address, config.gateway.port)
            });
            let credentials = AdapterCredentials::from_env();
            let executor = build_executor(config, credentials);
            let state = AppState { executor };

            info!("starting recovery orchestrator");
            if let Err(e) = Server::new(state).run(&bind_addr).await {
                error!(error = %e, "server exited with an error");
                std::process::exit(1);
            }
        }
    }
}

/// Renders the loaded configuration back to the operator, going through `Error::Serialization`
/// rather than unwrapping `serde_json`'s error directly.
fn render_config(config: &RemediationConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
