use clap::{Args, Subcommand, ValueEnum};
use std::fs;
use std::io::Write;

use crate::config::{mask, Config};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Initialize configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# vault-sync configuration

# Vault API address (env: VAULT_ADDR)
# vault_addr: https://127.0.0.1:8200

# Vault token (env: VAULT_TOKEN, falls back to ~/.vault-token)
# vault_token: ""

# File to import from / export to (env: VAULT_SYNC_FILE)
file: vault.yaml

# Paths to export (env: VAULT_SYNC_EXPORT_PATHS, comma separated)
export_paths:
  - secret

# Skip unreadable or unwritable paths instead of stopping
ignore_errors: false

# Log level: trace, debug, info, warn, error (env: VAULT_SYNC_LOG_LEVEL)
log_level: info
"#;

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => show_text(config),
                }
                Ok(())
            }

            ConfigSubcommand::Init => {
                let config_path = Config::default_config_path();

                if config_path.exists() {
                    println!("Config file already exists: {}", config_path.display());
                    println!("Use 'vault-sync config show' to view current configuration.");
                    return Ok(());
                }

                if let Some(parent) = config_path.parent() {
                    fs::create_dir_all(parent)?;
                }

                let mut file = fs::File::create(&config_path)?;
                file.write_all(DEFAULT_CONFIG.as_bytes())?;

                println!("Created config file: {}", config_path.display());
                println!("\nEdit this file to customize your settings.");
                Ok(())
            }
        }
    }
}

fn show_text(config: &Config) {
    println!("Configuration");
    println!("=============\n");

    if let Some(path) = &config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!(
            "Config file: {} (not found)",
            Config::default_config_path().display()
        );
    }
    println!();

    println!("vault_addr: {}", config.vault_addr.value);
    println!("  source: {}", config.vault_addr.source);
    println!();

    println!("vault_token: {}", mask(&config.vault_token.value));
    println!("  source: {}", config.vault_token.source);
    println!();

    if let Some(namespace) = &config.vault_namespace {
        println!("vault_namespace: {}", namespace);
        println!();
    }

    println!("file: {}", config.file.value.display());
    println!("  source: {}", config.file.source);
    println!();

    println!("export_paths: {}", config.export_paths.value.join(","));
    println!("  source: {}", config.export_paths.source);
    println!();

    println!("ignore_errors: {}", config.ignore_errors.value);
    println!("  source: {}", config.ignore_errors.source);
    println!();

    println!("log_level: {}", config.log_level.value);
    println!("  source: {}", config.log_level.source);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_loadable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, DEFAULT_CONFIG).unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.export_paths.value, vec!["secret".to_string()]);
        assert_eq!(config.log_level.value, "info");
    }
}
