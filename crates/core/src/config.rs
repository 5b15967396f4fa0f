use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::paths::Paths;

/// Account map as a JSON object, e.g. `{"id1":"pw1","id2":"pw2"}`.
/// Takes precedence over the `accounts` section of the config file.
pub const ACCOUNTS_ENV: &str = "PATROL_ACCOUNTS";
pub const DELAY_HOURS_ENV: &str = "PATROL_DELAY_HOURS";
pub const MIN_DWELL_SECS_ENV: &str = "PATROL_MIN_DWELL_SECS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Account identifier -> secret material.
    #[serde(default)]
    pub accounts: HashMap<String, String>,
    /// Minimum delay between two completed visits with the same account.
    #[serde(default = "default_delay_hours")]
    pub delay_hours: u64,
    /// Minimum time a visit must stay open before it counts as complete.
    #[serde(default = "default_min_dwell_secs")]
    pub min_dwell_secs: u64,
    /// Age after which an in-progress visit is presumed crashed.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Upper bound for each browser step (open, authenticate, visit).
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
}

fn default_delay_hours() -> u64 {
    48
}

fn default_min_dwell_secs() -> u64 {
    6
}

fn default_stale_after_secs() -> u64 {
    3600
}

fn default_step_timeout_secs() -> u64 {
    120
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts: HashMap::new(),
            delay_hours: default_delay_hours(),
            min_dwell_secs: default_min_dwell_secs(),
            stale_after_secs: default_stale_after_secs(),
            step_timeout_secs: default_step_timeout_secs(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the config file (when present) and fold in environment
    /// overrides. The environment wins over the file.
    pub fn from_env(paths: &Paths) -> Result<Self> {
        let mut config = Self::load_or_default(paths)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(ACCOUNTS_ENV) {
            self.accounts = serde_json::from_str(&raw).map_err(|e| {
                Error::Config(format!(
                    "{} is not a JSON object of id -> secret: {}",
                    ACCOUNTS_ENV, e
                ))
            })?;
        }
        if let Ok(raw) = std::env::var(DELAY_HOURS_ENV) {
            self.delay_hours = raw.parse().map_err(|_| {
                Error::Config(format!("{} must be an integer number of hours", DELAY_HOURS_ENV))
            })?;
        }
        if let Ok(raw) = std::env::var(MIN_DWELL_SECS_ENV) {
            self.min_dwell_secs = raw.parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be an integer number of seconds",
                    MIN_DWELL_SECS_ENV
                ))
            })?;
        }
        Ok(())
    }

    pub fn min_delay(&self) -> chrono::Duration {
        chrono::Duration::hours(self.delay_hours as i64)
    }

    pub fn min_dwell(&self) -> Duration {
        Duration::from_secs(self.min_dwell_secs)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_after_secs as i64)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}
