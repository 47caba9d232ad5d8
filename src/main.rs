use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{ConfigCommand, ExportCommand, ImportCommand};
use config::{Config, ConfigError, ConfigSource};
use vault_sync::FunctionRegistry;

#[derive(Parser)]
#[command(name = "vault-sync")]
#[command(version)]
#[command(about = "Export Vault secrets to a YAML file and import them back", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Vault API address
    #[arg(long, global = true)]
    vault_addr: Option<String>,

    /// Vault token (defaults to VAULT_TOKEN or ~/.vault-token)
    #[arg(long, global = true)]
    vault_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export secrets from Vault into a file
    Export(ExportCommand),

    /// Import secrets from a file into Vault
    Import(ImportCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", format_error(e.as_ref()));
        std::process::exit(1);
    }
}

/// Formats an error followed by every cause not already in the message.
fn format_error(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = format!("Error: {}", error);
    let mut source = error.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !out.contains(&message) {
            out.push_str(&format!("\n  caused by: {}", message));
        }
        source = cause.source();
    }
    out
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration, command line flags win
    let mut config = Config::load(cli.config)?;
    config.vault_addr.override_with(cli.vault_addr, ConfigSource::Flag);
    config.vault_token.override_with(cli.vault_token, ConfigSource::Flag);
    config.log_level.override_with(cli.log_level, ConfigSource::Flag);

    init_tracing(&config.log_level.value, cli.verbose)?;

    let registry = FunctionRegistry::standard()?;
    tracing::debug!(functions = ?registry.names(), "Registered template functions");

    match cli.command {
        Commands::Export(cmd) => cmd.run(&config)?,
        Commands::Import(cmd) => cmd.run(&config, &registry)?,
        Commands::Config(cmd) => cmd.run(&config)?,
    }

    Ok(())
}

/// Logs go to stderr so they never mix with command output.
fn init_tracing(level: &str, verbose: bool) -> Result<(), ConfigError> {
    let level = if verbose {
        "debug"
    } else {
        config::parse_log_level(level)?
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("warn,vault_sync={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
