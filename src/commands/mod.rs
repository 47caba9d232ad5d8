mod config_cmd;
mod export_cmd;
mod import_cmd;

pub use config_cmd::ConfigCommand;
pub use export_cmd::ExportCommand;
pub use import_cmd::ImportCommand;

use std::path::PathBuf;

use vault_sync::SyncReport;

use crate::config::ConfigError;

/// Prints the outcome of an export or import run.
fn print_summary(action: &str, report: &SyncReport) {
    print!("{}", summary(action, report));
}

fn summary(action: &str, report: &SyncReport) -> String {
    let mut out = format!(
        "{} {} key{}\n",
        action,
        report.processed,
        if report.processed == 1 { "" } else { "s" }
    );

    if report.has_skips() {
        out.push_str(&format!("\nSkipped {} path(s):\n", report.skipped.len()));
        for skipped in &report.skipped {
            out.push_str(&format!("  ✗ {} - {}\n", skipped.path, skipped.reason));
        }
    }
    out
}

/// Errors from export and import commands
#[derive(Debug)]
pub enum CommandError {
    Config(ConfigError),
    Sync(vault_sync::Error),
    Io(PathBuf, std::io::Error),
    OutputExists(PathBuf),
    InputMissing(PathBuf),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Config(e) => write!(f, "{}", e),
            CommandError::Sync(e) => write!(f, "{}", e),
            CommandError::Io(path, e) => write!(f, "{}: {}", path.display(), e),
            CommandError::OutputExists(path) => {
                write!(f, "File {} already exists", path.display())
            }
            CommandError::InputMissing(path) => {
                write!(f, "File {} does not exist", path.display())
            }
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Config(e) => Some(e),
            CommandError::Sync(e) => Some(e),
            CommandError::Io(_, e) => Some(e),
            CommandError::OutputExists(_) | CommandError::InputMissing(_) => None,
        }
    }
}

impl From<ConfigError> for CommandError {
    fn from(e: ConfigError) -> Self {
        CommandError::Config(e)
    }
}

impl From<vault_sync::Error> for CommandError {
    fn from(e: vault_sync::Error) -> Self {
        CommandError::Sync(e)
    }
}
