use crate::constants::*;
use crate::errors::{AppError, AppResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Resolved pipeline configuration with all values filled in (no Options
/// except where absence is meaningful). Deserializable by the TOML loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolvedConfig {
    /// Local root the remote container is mirrored under
    pub data_dir: PathBuf,
    /// Directory for per-table database CSV exports
    pub db_export_dir: PathBuf,
    /// Export only database tables in these schemas; empty keeps every schema
    pub db_schemas: Vec<String>,
    /// Drop database tables whose bare name starts with this prefix
    pub db_exclude_prefix: Option<String>,
    /// Source folder prefixes to mirror; a trailing separator is kept as
    /// written, it is never auto-appended
    pub source_folders: Vec<String>,
    /// Keep only objects ending in `.{extension}` when set
    pub keep_extension: Option<String>,
    /// Drop objects ending in `.{extension}` when set
    pub exclude_extension: Option<String>,
    /// Drop objects whose name contains no `.` at all
    pub require_dot: bool,
    /// Number of concurrent object downloads within one job
    pub concurrent_downloads: usize,
    /// Lifetime of each job's container access grant, in hours
    pub grant_duration_hours: i64,
    /// Per-request timeout for listing and transfers, in seconds
    pub request_timeout_secs: u64,
    /// Source folder holding the two-stage archive
    pub archive_folder: String,
    /// Outer zip archive name within `archive_folder`
    pub archive_name: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            db_export_dir: PathBuf::from(DEFAULT_DB_EXPORT_DIR),
            db_schemas: DEFAULT_DB_SCHEMAS.iter().map(|s| s.to_string()).collect(),
            db_exclude_prefix: Some(DEFAULT_DB_EXCLUDE_PREFIX.to_string()),
            source_folders: DEFAULT_SOURCE_FOLDERS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            keep_extension: None,
            exclude_extension: None,
            require_dot: false,
            concurrent_downloads: 4,
            grant_duration_hours: 1,
            request_timeout_secs: 300,
            archive_folder: DEFAULT_ARCHIVE_FOLDER.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
        }
    }
}

/// Configuration loadable from a TOML file.
///
/// Validates the fields that must be positive for the pipeline to make
/// progress.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolvedConfigFile {
    /// Whether to delete consumed archives after successful extraction
    /// (defaults to `true`)
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,
    /// Flattened resolved configuration with pipeline defaults
    #[serde(flatten)]
    pub resolved: ResolvedConfig,
}

impl ResolvedConfigFile {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the TOML is malformed or a bound that must
    /// be positive is zero.
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ResolvedConfigFile = toml::from_str(&contents)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config: {e}")))?;

        if config.resolved.concurrent_downloads == 0 {
            return Err(AppError::ConfigError(
                "concurrent_downloads must be greater than 0".into(),
            ));
        }
        if config.resolved.grant_duration_hours <= 0 {
            return Err(AppError::ConfigError(
                "grant_duration_hours must be greater than 0".into(),
            ));
        }
        if config.resolved.request_timeout_secs == 0 {
            return Err(AppError::ConfigError(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }
        if config.resolved.source_folders.is_empty() {
            return Err(AppError::ConfigError(
                "source_folders must name at least one folder".into(),
            ));
        }

        Ok(config)
    }
}

fn default_cleanup() -> bool {
    true
}

/// Reads a required environment variable, failing fast when it is absent.
pub fn require_env(key: &str) -> AppResult<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::ConfigError(format!(
            "The environment variable '{key}' is not set"
        ))),
    }
}

/// Object storage credentials sourced from the environment.
///
/// The account key is an opaque secret; it is kept out of Debug output.
#[derive(Clone)]
pub struct StorageCredentials {
    pub account: String,
    pub key: String,
    pub container: String,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("account", &self.account)
            .field("key", &"<redacted>")
            .field("container", &self.container)
            .finish()
    }
}

impl StorageCredentials {
    /// Loads credentials, failing before any network call if one is missing.
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            account: require_env(ENV_ACCOUNT_NAME)?,
            key: require_env(ENV_ACCOUNT_KEY)?,
            container: require_env(ENV_CONTAINER_NAME)?,
        })
    }
}

/// Database credentials sourced from the environment.
///
/// The database itself sits behind [`crate::db::TableSource`]; these are the
/// variables a driver implementation is handed.
#[derive(Clone)]
pub struct DbCredentials {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for DbCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbCredentials")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl DbCredentials {
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            server: require_env(ENV_DB_SERVER)?,
            database: require_env(ENV_DB_NAME)?,
            user: require_env(ENV_DB_USER)?,
            password: require_env(ENV_DB_PASSWORD)?,
        })
    }
}
