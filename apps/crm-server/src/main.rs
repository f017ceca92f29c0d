mod health;
mod server;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use crm_bootstrap::{AppConfig, CliOverrides, init_logging};
use crm_db::DbHandle;
use tracing::Instrument;

/// CRM Server - tenant-isolated customers and vehicles over gRPC
#[derive(Parser)]
#[command(name = "crm-server")]
#[command(about = "CRM Server - tenant-isolated customers and vehicles over gRPC")]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port override for the gRPC listener (overrides config)
    #[arg(long)]
    grpc_port: Option<u16>,

    /// Port override for the health HTTP listener (overrides config)
    #[arg(long)]
    http_port: Option<u16>,

    /// Print effective configuration (JSON, secrets masked) and exit
    #[arg(long)]
    print_config: bool,

    /// Start without applying schema migrations
    #[arg(long)]
    skip_migrations: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (CRM__*) -> 4) CLI overrides
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        grpc_port: cli.grpc_port,
        http_port: cli.http_port,
        verbose: cli.verbose,
    })?;

    // Held until exit so the file writer flushes.
    let _log_guard = init_logging(&config.logging)?;

    if cli.print_config {
        println!("Effective configuration:\n{}", config.to_redacted_json()?);
        return Ok(());
    }

    let span = tracing::info_span!("crm", service = health::SERVICE_NAME);
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            async {
                tracing::info!(
                    version = env!("CARGO_PKG_VERSION"),
                    environment = %config.server.environment,
                    "CRM server starting"
                );
                server::run(&config, cli.skip_migrations).await
            }
            .instrument(span)
            .await
        }
        Commands::Check => span.in_scope(|| check_config(&config)),
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    // load() validated the sections; the assembled DSN is checked on its own.
    let dsn = config.database.dsn()?;
    DbHandle::detect(&dsn)?;
    println!("Configuration is valid");
    println!("{}", config.to_redacted_json()?);
    Ok(())
}
