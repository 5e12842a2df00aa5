//! Configuration management for Breakwater.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable naming the Redis connection target.
pub const REDIS_URL_VAR: &str = "REDIS_URL";

/// Settings for the rate-limiting and caching subsystem.
///
/// A missing Redis URL is a supported configuration, not an error: the
/// subsystem then runs entirely against the in-process fallback store.
/// This is the expected mode for local development.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379`). `None` means
    /// fallback-only mode for the process lifetime.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Upper bound on any single Redis command, including connection
    /// establishment. On timeout the operation degrades to the in-memory
    /// fallback exactly as on a hard error.
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// How often the in-memory fallback store sweeps expired entries.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            redis_url: None,
            command_timeout_ms: default_command_timeout_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_command_timeout_ms() -> u64 {
    2000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Settings {
    /// Build settings from the process environment.
    ///
    /// Reads `REDIS_URL`; everything else takes its default. Never fails:
    /// an absent variable selects fallback-only mode.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var(REDIS_URL_VAR).ok().filter(|v| !v.is_empty()),
            ..Self::default()
        }
    }

    /// Load settings from a YAML file.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::BreakwaterError::Config(e.to_string()))
    }

    /// The command timeout as a `Duration`.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// The sweep interval as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
