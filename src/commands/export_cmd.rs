//! Export command: dump Vault paths into a document file.

use clap::Args;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{print_summary, CommandError};
use crate::config::{split_paths, Config, ConfigSource, ConfigValue};

/// Export secrets from Vault into a YAML file
#[derive(Debug, Args)]
pub struct ExportCommand {
    /// File to write (must not exist)
    #[arg(long, short)]
    file: Option<PathBuf>,

    /// Comma separated list of paths to export
    #[arg(long)]
    export_paths: Option<String>,

    /// Skip unreadable paths instead of stopping
    #[arg(long)]
    ignore_errors: bool,
}

impl ExportCommand {
    pub fn run(&self, config: &Config) -> Result<(), CommandError> {
        let mut file = config.file.clone();
        file.override_with(self.file.clone(), ConfigSource::Flag);
        let mut paths = config.export_paths.clone();
        paths.override_with(
            self.export_paths.as_deref().map(split_paths),
            ConfigSource::Flag,
        );
        let ignore_errors = self.ignore_errors || config.ignore_errors.value;

        self.export(config, &file, &paths, ignore_errors)
    }

    fn export(
        &self,
        config: &Config,
        file: &ConfigValue<PathBuf>,
        paths: &ConfigValue<Vec<String>>,
        ignore_errors: bool,
    ) -> Result<(), CommandError> {
        let path = &file.value;
        if path.exists() {
            return Err(CommandError::OutputExists(path.clone()));
        }

        let client = config.vault_client()?;
        tracing::info!(
            address = %client.address(),
            paths = ?paths.value,
            "Exporting from Vault"
        );

        let (bytes, report) = vault_sync::export_document(&client, &paths.value, ignore_errors)?;

        let mut out = create_private(path).map_err(|e| CommandError::Io(path.clone(), e))?;
        out.write_all(&bytes)
            .map_err(|e| CommandError::Io(path.clone(), e))?;

        print_summary("Exported", &report);
        println!("Wrote {}", path.display());
        Ok(())
    }
}

/// Creates a new file readable only by the current user.
fn create_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
