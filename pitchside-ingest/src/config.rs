//! Service settings resolution
//!
//! Merges CLI arguments (already env-aware via clap) over the TOML config
//! file over compiled defaults into one concrete settings struct.

use std::path::PathBuf;
use std::time::Duration;

use pitchside_common::config::TomlConfig;

use crate::retry::RetryPolicy;

/// Default HTTP port for the ingest service
pub const DEFAULT_PORT: u16 = 6190;

/// Resolved, concrete service settings
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub database_path: PathBuf,
    pub port: u16,
    /// Number of queue worker tasks
    pub workers: usize,
    /// Idle wait between queue polls when no message is available
    pub poll_interval: Duration,
    /// Queue claim lease; an expired lease makes the message deliverable again
    pub claim_lease_secs: u32,
    pub retry: RetryPolicy,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            database_path: pitchside_common::config::default_database_path(),
            port: DEFAULT_PORT,
            workers: 4,
            poll_interval: Duration::from_millis(500),
            claim_lease_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

impl IngestSettings {
    /// Merge CLI overrides and TOML values over the defaults
    pub fn resolve(
        cli_database: Option<PathBuf>,
        cli_port: Option<u16>,
        cli_workers: Option<usize>,
        toml: &TomlConfig,
    ) -> Self {
        let defaults = IngestSettings::default();

        let mut retry = RetryPolicy::default();
        if let Some(r) = &toml.retry {
            if let Some(n) = r.max_attempts {
                retry.max_attempts = n.max(1);
            }
            if let Some(ms) = r.base_delay_ms {
                retry.base_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = r.max_delay_ms {
                retry.max_delay = Duration::from_millis(ms);
            }
        }

        Self {
            database_path: cli_database
                .or_else(|| toml.database_path.clone())
                .unwrap_or(defaults.database_path),
            port: cli_port.or(toml.port).unwrap_or(defaults.port),
            workers: cli_workers.or(toml.workers).unwrap_or(defaults.workers).max(1),
            poll_interval: toml
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            claim_lease_secs: toml.claim_lease_secs.unwrap_or(defaults.claim_lease_secs),
            retry,
        }
    }
}
