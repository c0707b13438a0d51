//! Configuration loading
//!
//! Settings come from an optional TOML file (by default
//! `<config_home>/b3futures/config.toml`). Every key has a default, so a
//! missing default file is not an error. An explicit `--config` path must
//! exist.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::FuturesError;

pub const DEFAULT_SOURCE_URL: &str =
    "https://www2.bmf.com.br/pages/portal/bmfbovespa/lumis/lum-ajustes-do-pregao-enUS.asp";
pub const DB_PATH_ENV: &str = "B3FUTURES_DB";

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Store location; falls back to ~/.b3futures/b3_futures.db
    pub db_path: Option<PathBuf>,
    pub source_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Where `analyze` writes chart files
    pub output_dir: PathBuf,
    pub sync: SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            timeout_secs: 60,
            user_agent: concat!("b3futures/", env!("CARGO_PKG_VERSION")).to_string(),
            output_dir: PathBuf::from("charts"),
            sync: SyncConfig::default(),
        }
    }
}

/// Working-copy synchronization before analysis
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub repo_path: Option<PathBuf>,
    pub on_failure: SyncPolicy,
}

/// What a failed `git pull` means for the analysis run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Log a warning and analyze the possibly stale local store
    #[default]
    Warn,
    /// Abort the analysis
    Fail,
}

/// Default config file location, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dir_spec::config_home().map(|dir| dir.join("b3futures").join("config.toml"))
}

impl Config {
    /// Load from an explicit path, or from the default location when present
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(FuturesError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    ))
                    .into());
                }
                Self::from_file(path)
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| FuturesError::Config(e.to_string()))?;
        if config.timeout_secs == 0 {
            return Err(FuturesError::Config("timeout_secs must be positive".into()).into());
        }
        Ok(config)
    }

    /// Store path with precedence: CLI flag, `B3FUTURES_DB`, config file, default
    pub fn resolve_db_path(&self, cli_override: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = cli_override {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(DB_PATH_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        crate::db::get_default_db_path()
    }
}
