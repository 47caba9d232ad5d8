use clap::Args;
use std::path::PathBuf;

use vault_sync::FunctionRegistry;

use super::{print_summary, CommandError};
use crate::config::{Config, ConfigSource};

/// Import secrets from a YAML file into Vault
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// File to read
    #[arg(long, short)]
    file: Option<PathBuf>,

    /// Skip failed writes and deletes instead of stopping
    #[arg(long)]
    ignore_errors: bool,
}

impl ImportCommand {
    pub fn run(&self, config: &Config, registry: &FunctionRegistry) -> Result<(), CommandError> {
        let mut file = config.file.clone();
        file.override_with(self.file.clone(), ConfigSource::Flag);
        let ignore_errors = self.ignore_errors || config.ignore_errors.value;

        let path = &file.value;
        if !path.exists() {
            return Err(CommandError::InputMissing(path.clone()));
        }
        let source = std::fs::read(path).map_err(|e| CommandError::Io(path.clone(), e))?;

        let client = config.vault_client()?;
        tracing::info!(
            address = %client.address(),
            file = %path.display(),
            "Importing into Vault"
        );

        let report = vault_sync::import_document(&client, registry, &source, ignore_errors)?;
        print_summary("Imported", &report);
        Ok(())
    }
}
