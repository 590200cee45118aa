//! Configuration loading and validation
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `LABELDESK_CONFIG` environment variable
//! 3. `<config_dir>/labeldesk/config.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing file is not fatal: defaults apply and the caller logs a
//! warning via [`ConfigSource::report`].
//! Secrets are taken from the environment in preference to the file.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::roster::Roster;
use crate::taxonomy::{Category, LabelOption, Taxonomy};
use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "LABELDESK_CONFIG";
/// Environment variable overriding `[auth] password`
pub const PASSWORD_ENV: &str = "LABELDESK_PASSWORD";
/// Environment variable carrying the Sheets bearer token
pub const SHEETS_TOKEN_ENV: &str = "LABELDESK_SHEETS_TOKEN";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5730;
pub const DEFAULT_INPUT_TABLE: &str = "sampled_50";
pub const DEFAULT_OUTPUT_TABLE: &str = "sample_30_labelled";

/// Raw TOML configuration file contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub store: StoreConfig,
    /// Labeller names; the built-in roster when absent
    pub roster: Option<Vec<String>>,
    pub taxonomy: TaxonomyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub password: Option<String>,
}

/// Which tabular store backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Sheets,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub input_table: String,
    pub output_table: String,
    pub sqlite_path: Option<PathBuf>,
    pub sheets: SheetsConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            input_table: DEFAULT_INPUT_TABLE.to_string(),
            output_table: DEFAULT_OUTPUT_TABLE.to_string(),
            sqlite_path: None,
            sheets: SheetsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub base_url: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            base_url: crate::store::DEFAULT_SHEETS_BASE_URL.to_string(),
        }
    }
}

/// Per-category option overrides and definitions text
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaxonomyConfig {
    pub definitions: Option<String>,
    pub categories: BTreeMap<Category, Vec<LabelOption>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// This file was named but does not exist; defaults apply
    Missing(PathBuf),
    /// No file was named or found; defaults apply
    Defaults,
}

impl ConfigSource {
    /// Log the outcome of [`TomlConfig::load`]
    ///
    /// Loading happens before the subscriber exists (the file picks the log
    /// level), so the outcome is reported afterwards.
    pub fn report(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::Missing(path) => {
                warn!("Config file {} not found, using compiled defaults", path.display())
            }
            ConfigSource::Defaults => warn!("No config file found, using compiled defaults"),
        }
    }
}

impl TomlConfig {
    /// Load from `path`, falling back to defaults when there is no file
    pub fn load(path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let Some(path) = path else {
            return Ok((Self::default(), ConfigSource::Defaults));
        };

        if !path.exists() {
            return Ok((Self::default(), ConfigSource::Missing(path.to_path_buf())));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok((config, ConfigSource::File(path.to_path_buf())))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }
}

/// Locate the config file following the priority order above
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("labeldesk").join("config.toml"))
        .filter(|p| p.exists())
}

/// OS-dependent default location of the SQLite store
pub fn default_sqlite_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("labeldesk"))
        .unwrap_or_else(|| PathBuf::from("./labeldesk_data"))
        .join("labeldesk.db")
}

/// Connection settings for the Sheets backend
#[derive(Clone)]
pub struct SheetsSettings {
    pub base_url: String,
    pub spreadsheet_id: String,
    pub token: String,
}

impl std::fmt::Debug for SheetsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsSettings")
            .field("base_url", &self.base_url)
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish_non_exhaustive()
    }
}

/// Resolved store settings
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub input_table: String,
    pub output_table: String,
    pub sqlite_path: PathBuf,
    pub sheets: Option<SheetsSettings>,
}

/// Validated runtime configuration
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub store: StoreSettings,
    pub roster: Roster,
    pub taxonomy: Taxonomy,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("store", &self.store)
            .field("roster", &self.roster)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Resolve secrets from the process environment and validate
    pub fn from_toml(toml: TomlConfig) -> Result<Self> {
        Self::resolve(toml, |name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup
    pub fn resolve(toml: TomlConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let password = env(PASSWORD_ENV)
            .filter(|p| !p.is_empty())
            .or(toml.auth.password)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "No password configured. Set {} or [auth] password in the config file",
                    PASSWORD_ENV
                ))
            })?;

        let store = toml.store;
        let input_table = store.input_table.trim().to_string();
        let output_table = store.output_table.trim().to_string();
        if input_table.is_empty() || output_table.is_empty() {
            return Err(Error::Config("Input and output table names must be set".to_string()));
        }
        if input_table == output_table {
            return Err(Error::Config(format!(
                "Input and output tables must differ (both '{}')",
                input_table
            )));
        }

        let sheets = match store.backend {
            StoreBackend::Sheets => {
                let spreadsheet_id = store.sheets.spreadsheet_id.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
                    Error::Config("[store.sheets] spreadsheet_id is required for the sheets backend".to_string())
                })?;
                let token = env(SHEETS_TOKEN_ENV).filter(|t| !t.trim().is_empty()).ok_or_else(|| {
                    Error::Config(format!("{} is required for the sheets backend", SHEETS_TOKEN_ENV))
                })?;
                Some(SheetsSettings {
                    base_url: store.sheets.base_url,
                    spreadsheet_id,
                    token,
                })
            }
            _ => None,
        };

        let roster = match toml.roster {
            Some(names) => Roster::new(names)?,
            None => Roster::default(),
        };

        let taxonomy = Taxonomy::default()
            .with_overrides(toml.taxonomy.categories, toml.taxonomy.definitions)?;

        Ok(Self {
            host: toml.server.host,
            port: toml.server.port,
            password,
            store: StoreSettings {
                backend: store.backend,
                input_table,
                output_table,
                sqlite_path: store.sqlite_path.unwrap_or_else(default_sqlite_path),
                sheets,
            },
            roster,
            taxonomy,
        })
    }
}
