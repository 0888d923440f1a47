//! Configuration file resolution and loading
//!
//! Config file resolution follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SNH_CONFIG`)
//! 3. User config directory (`<config_dir>/sonhario/config.toml`)
//! 4. Compiled defaults (no file)
//!
//! A missing or unreadable file never aborts startup: the loader logs a
//! warning and falls back to defaults. A file that exists but does not
//! parse is reported, since silently ignoring a typo would be worse.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SNH_CONFIG";

/// Materials repository connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Base URL of the PostgREST service
    pub base_url: String,
    /// Anonymous API key sent as `apikey` and bearer token
    pub api_key: String,
    /// Table holding the materials
    pub table: String,
    /// Categories consumed by the engines (empty = all)
    pub categories: Vec<String>,
    /// Local JSON export used instead of the REST endpoint when set
    pub local_export: Option<PathBuf>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            table: "materials".to_string(),
            categories: Vec::new(),
            local_export: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive (overridden by `RUST_LOG`)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Locates the config file following the priority order above
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
    env_var: String,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self {
            cli_path,
            env_var: CONFIG_ENV_VAR.to_string(),
        }
    }

    /// Use a different environment variable name
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Resolve the config path, or None when only defaults apply
    pub fn resolve(&self) -> Option<PathBuf> {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(&self.env_var) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        // Priority 3: User config directory
        default_config_path().filter(|p| p.exists())
    }

    /// Resolve and load, degrading to `T::default()` when no file is usable
    pub fn load<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.resolve() {
            Some(path) => load_or_default(&path),
            None => {
                info!("No config file found, using compiled defaults");
                Ok(T::default())
            }
        }
    }
}

/// `<config_dir>/sonhario/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sonhario").join("config.toml"))
}

/// Parse a TOML document
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

/// Load a TOML file; a missing file yields defaults with a warning
pub fn load_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let parsed = parse_toml(&content).map_err(|e| {
                Error::Config(format!("{}: {}", path.display(), e))
            })?;
            info!("Loaded config from {}", path.display());
            Ok(parsed)
        }
        Err(e) => {
            warn!(
                "Config file {} not readable ({}), using compiled defaults",
                path.display(),
                e
            );
            Ok(T::default())
        }
    }
}
