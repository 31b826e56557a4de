//! Configuration loading
//!
//! Settings resolve in priority order:
//! 1. Command-line argument (highest)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! CLI and environment handling live with each binary (clap); this module
//! owns the TOML layer and the OS-dependent defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Retry policy section of the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryToml {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

/// TOML configuration file contents (all fields optional; missing values
/// fall through to compiled defaults)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub database_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub workers: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub claim_lease_secs: Option<u32>,
    pub retry: Option<RetryToml>,
}

/// Load TOML configuration.
///
/// With an explicit path, a missing or malformed file is an error. Without
/// one, the default locations are probed and absence falls back to defaults.
pub fn load_toml_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit_path {
        Some(p) => p.to_path_buf(),
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(TomlConfig::default()),
        },
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Write TOML configuration (used by tests and setup tooling)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Default config file location: `~/.config/pitchside/config.toml`, with
/// `/etc/pitchside/config.toml` as the system-wide fallback on Linux.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        let user_config = dir.join("pitchside").join("config.toml");
        if user_config.exists() {
            return Some(user_config);
        }
    }
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/pitchside/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    None
}

/// OS-dependent default database path
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("pitchside"))
        .unwrap_or_else(|| PathBuf::from("./pitchside_data"))
        .join("pitchside.db")
}
