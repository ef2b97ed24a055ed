//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from an optional TOML file. Nothing in the
//! core reads global state: the service builds a [`TomlConfig`] once at
//! startup and passes the relevant values down explicitly.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the SQLite database inside the root folder
pub const DATABASE_FILE_NAME: &str = "unicat.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Root folder holding the database (optional, see [`resolve_root_folder`])
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub exchange: ExchangeConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            database: DatabaseConfig::default(),
            exchange: ExchangeConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Connection pool settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// SQLite busy timeout; writers wait this long for the lock
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Exchange directory settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExchangeConfig {
    /// Programs in the home country are hidden from the directory
    #[serde(default = "default_home_country_code")]
    pub home_country_code: String,

    /// Programs per directory page
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            home_country_code: default_home_country_code(),
            page_size: default_page_size(),
        }
    }
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_home_country_code() -> String {
    "ES".to_string()
}

fn default_page_size() -> i64 {
    60
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.exchange.page_size < 1 {
            return Err(Error::Config(format!(
                "exchange.page_size must be positive, got {}",
                self.exchange.page_size
            )));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Config("database.max_connections must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Load the TOML bootstrap configuration
///
/// An explicit path must exist and parse. Without one, the platform config
/// locations are tried; when none exists the compiled defaults are used and
/// a warning is logged.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match config_source(explicit_path) {
        Some(path) => path,
        None => {
            warn!("No config file found, using built-in defaults");
            return Ok(TomlConfig::default());
        }
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    let config = TomlConfig::from_toml_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// The file `load_toml_config` reads, or `None` when defaults are used
///
/// Binaries load their config before logging is set up and call this
/// afterwards to report where the settings came from.
pub fn config_source(explicit_path: Option<&Path>) -> Option<PathBuf> {
    match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_file(),
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Database file location for a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// First existing config file among the platform locations
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("unicat").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/unicat/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("unicat"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/unicat"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("unicat"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/unicat"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("unicat"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\unicat"))
    } else {
        PathBuf::from("./unicat_data")
    }
}
