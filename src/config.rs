use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;

use vault_sync::store::vault::{
    token_from_file, DEFAULT_ADDRESS, ENV_ADDRESS, ENV_NAMESPACE, ENV_TOKEN,
};
use vault_sync::VaultClient;

const ENV_FILE: &str = "VAULT_SYNC_FILE";
const ENV_EXPORT_PATHS: &str = "VAULT_SYNC_EXPORT_PATHS";
const ENV_LOG_LEVEL: &str = "VAULT_SYNC_LOG_LEVEL";

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
    TokenFile,
    Flag,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
            ConfigSource::TokenFile => write!(f, "token file"),
            ConfigSource::Flag => write!(f, "command line"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Replaces the value if `value` is set.
    pub fn override_with(&mut self, value: Option<T>, source: ConfigSource) {
        if let Some(value) = value {
            *self = Self::new(value, source);
        }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Vault API address
    pub vault_addr: ConfigValue<String>,
    /// Vault token, masked when shown
    #[serde(serialize_with = "mask_token")]
    pub vault_token: ConfigValue<String>,
    /// Vault Enterprise namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vault_namespace: Option<String>,
    /// File to import from / export to
    pub file: ConfigValue<PathBuf>,
    /// Paths to export
    pub export_paths: ConfigValue<Vec<String>>,
    /// Do not stop on read/write errors
    pub ignore_errors: ConfigValue<bool>,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    vault_addr: Option<String>,
    vault_token: Option<String>,
    vault_namespace: Option<String>,
    file: Option<PathBuf>,
    export_paths: Option<Vec<String>>,
    ignore_errors: Option<bool>,
    log_level: Option<String>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Start with defaults
        let mut vault_addr = ConfigValue::new(DEFAULT_ADDRESS.to_string(), ConfigSource::Default);
        let mut vault_token = ConfigValue::new(String::new(), ConfigSource::Default);
        let mut vault_namespace = None;
        let mut file = ConfigValue::new(PathBuf::from("vault.yaml"), ConfigSource::Default);
        let mut export_paths = ConfigValue::new(vec!["secret".to_string()], ConfigSource::Default);
        let mut ignore_errors = ConfigValue::new(false, ConfigSource::Default);
        let mut log_level = ConfigValue::new("info".to_string(), ConfigSource::Default);
        let mut config_file = None;

        // Try to load from config file
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(doc_path) = file_config.file {
                // Resolve relative paths against config file's directory
                let resolved_path = if doc_path.is_relative() {
                    path.parent().map(|p| p.join(&doc_path)).unwrap_or(doc_path)
                } else {
                    doc_path
                };
                file = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            vault_addr.override_with(file_config.vault_addr, ConfigSource::File);
            vault_token.override_with(file_config.vault_token, ConfigSource::File);
            export_paths.override_with(file_config.export_paths, ConfigSource::File);
            ignore_errors.override_with(file_config.ignore_errors, ConfigSource::File);
            log_level.override_with(file_config.log_level, ConfigSource::File);
            vault_namespace = file_config.vault_namespace;
        }

        // Apply environment variable overrides
        vault_addr.override_with(env_var(ENV_ADDRESS), ConfigSource::Environment);
        vault_token.override_with(env_var(ENV_TOKEN), ConfigSource::Environment);
        file.override_with(env_var(ENV_FILE).map(PathBuf::from), ConfigSource::Environment);
        export_paths.override_with(
            env_var(ENV_EXPORT_PATHS).map(|v| split_paths(&v)),
            ConfigSource::Environment,
        );
        log_level.override_with(env_var(ENV_LOG_LEVEL), ConfigSource::Environment);
        if let Some(namespace) = env_var(ENV_NAMESPACE) {
            vault_namespace = Some(namespace);
        }

        // Fall back to the token left behind by `vault login`
        if vault_token.value.is_empty() {
            vault_token.override_with(token_from_file(), ConfigSource::TokenFile);
        }

        Ok(Self {
            vault_addr,
            vault_token,
            vault_namespace,
            file,
            export_paths,
            ignore_errors,
            log_level,
            config_file,
        })
    }

    /// Builds the Vault client used for export and import.
    pub fn vault_client(&self) -> Result<VaultClient, ConfigError> {
        if self.vault_token.value.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }

        VaultClient::new(self.vault_addr.value.clone(), self.vault_token.value.clone())
            .map(|client| client.with_namespace(self.vault_namespace.clone()))
            .map_err(|e| ConfigError::InvalidValue("vault_addr", e.to_string()))
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/vault-sync/
    /// - macOS: ~/Library/Application Support/vault-sync/
    /// - Windows: %APPDATA%/vault-sync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vault-sync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

/// Normalises a log level name for the tracing filter.
///
/// `fatal` and `panic` are accepted as `error` for compatibility with older
/// configuration files.
pub fn parse_log_level(level: &str) -> Result<&'static str, ConfigError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "fatal" | "panic" => Ok("error"),
        _ => Err(ConfigError::InvalidValue("log_level", level.to_string())),
    }
}

/// Splits a comma separated path list, dropping empty entries.
pub fn split_paths(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn mask_token<S: Serializer>(token: &ConfigValue<String>, serializer: S) -> Result<S::Ok, S::Error> {
    ConfigValue::new(mask(&token.value), token.source.clone()).serialize(serializer)
}

/// Hides a secret for display.
pub fn mask(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        "********".to_string()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(&'static str, String),
    MissingToken,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(name, value) => {
                write!(f, "Invalid value for {}: {}", name, value)
            }
            ConfigError::MissingToken => write!(
                f,
                "No Vault token configured. Use --vault-token, VAULT_TOKEN or `vault login`."
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.file.value, PathBuf::from("vault.yaml"));
        assert_eq!(config.file.source, ConfigSource::Default);
        assert_eq!(config.export_paths.value, vec!["secret".to_string()]);
        assert!(!config.ignore_errors.value);
        assert_eq!(config.log_level.value, "info");
        assert_eq!(config.config_file, None);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "file: /backups/vault.yaml").unwrap();
        writeln!(file, "export_paths: [secret/app, secret/shared]").unwrap();
        writeln!(file, "ignore_errors: true").unwrap();
        writeln!(file, "log_level: debug").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.file.value, PathBuf::from("/backups/vault.yaml"));
        assert_eq!(config.file.source, ConfigSource::File);
        assert_eq!(
            config.export_paths.value,
            vec!["secret/app".to_string(), "secret/shared".to_string()]
        );
        assert!(config.ignore_errors.value);
        assert_eq!(config.ignore_errors.source, ConfigSource::File);
        assert_eq!(config.log_level.value, "debug");
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_relative_file_resolves_against_config_dir() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "file: backup.yaml").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.file.value, temp_dir.path().join("backup.yaml"));
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "log_level: warn").unwrap();

        std::env::set_var(ENV_LOG_LEVEL, "debug");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.log_level.value, "debug");
        assert_eq!(config.log_level.source, ConfigSource::Environment);

        std::env::remove_var(ENV_LOG_LEVEL);
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_unknown_key_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "export_path: secret").unwrap();

        let err = Config::load(Some(config_path)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
    }

    #[test]
    fn test_override_with_flag() {
        let mut value = ConfigValue::new("info".to_string(), ConfigSource::Default);
        value.override_with(None, ConfigSource::Flag);
        assert_eq!(value.source, ConfigSource::Default);

        value.override_with(Some("debug".to_string()), ConfigSource::Flag);
        assert_eq!(value.value, "debug");
        assert_eq!(value.source, ConfigSource::Flag);
    }

    #[test]
    fn test_token_is_masked_in_json() {
        let temp_dir = tempdir().unwrap();
        let mut config = Config::load(Some(temp_dir.path().join("none.yaml"))).unwrap();
        config
            .vault_token
            .override_with(Some("s.supersecret".to_string()), ConfigSource::Flag);

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("supersecret"));
        assert!(json.contains("********"));
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let mut config = Config::load(Some(temp_dir.path().join("none.yaml"))).unwrap();
        config.vault_token = ConfigValue::new(String::new(), ConfigSource::Default);

        assert!(matches!(
            config.vault_client().unwrap_err(),
            ConfigError::MissingToken
        ));
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("INFO").unwrap(), "info");
        assert_eq!(parse_log_level("fatal").unwrap(), "error");
        assert_eq!(parse_log_level("warning").unwrap(), "warn");
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_split_paths() {
        assert_eq!(
            split_paths("secret, /shared/ ,,"),
            vec!["secret".to_string(), "/shared/".to_string()]
        );
    }
}
