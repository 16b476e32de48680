pub mod env;
pub use env::apply_env_overrides;

use crate::action::DEFAULT_ANONYMOUS_LABEL;
use crate::reservation::{DEFAULT_RESERVATION_MINUTES, MAX_RESERVATION_MINUTES};
use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the TOML config file
pub const CONFIG_PATH_ENV: &str = "RESPAWN_CONFIG";

/// Complete tracker configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reservation: ReservationConfig,
    #[serde(default)]
    pub actions: ActionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Which instance this session tracks
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    #[serde(default = "default_instance_id")]
    pub id: String,
}

fn default_instance_id() -> String {
    "pico7f".to_string()
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            id: default_instance_id(),
        }
    }
}

/// Where documents, the action log and session files live
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_directory")]
    pub directory: PathBuf,
}

fn default_storage_directory() -> PathBuf {
    PathBuf::from(".respawn")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_storage_directory(),
        }
    }
}

impl StorageConfig {
    pub fn instances_dir(&self) -> PathBuf {
        self.directory.join("instances")
    }

    pub fn action_db_path(&self) -> PathBuf {
        self.directory.join("actions.db")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationConfig {
    #[serde(default = "default_reservation_minutes")]
    pub duration_minutes: i64,
}

fn default_reservation_minutes() -> i64 {
    DEFAULT_RESERVATION_MINUTES
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            duration_minutes: default_reservation_minutes(),
        }
    }
}

impl ReservationConfig {
    /// Reservation length; values outside 1..=MAX_RESERVATION_MINUTES fall back to the default
    pub fn duration(&self) -> Duration {
        let minutes = if (1..=MAX_RESERVATION_MINUTES).contains(&self.duration_minutes) {
            self.duration_minutes
        } else {
            DEFAULT_RESERVATION_MINUTES
        };
        Duration::minutes(minutes)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    /// Actor recorded when no nickname was given
    #[serde(default = "default_anonymous_label")]
    pub anonymous_label: String,
}

fn default_anonymous_label() -> String {
    DEFAULT_ANONYMOUS_LABEL.to_string()
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            anonymous_label: default_anonymous_label(),
        }
    }
}

/// Front-end pacing
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    /// Board refresh tick (milliseconds)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// How often the instance document is re-read and recent actions are shown (seconds)
    #[serde(default = "default_log_refresh_seconds")]
    pub log_refresh_seconds: u64,
    /// Entries shown by the `log` command
    #[serde(default = "default_log_limit")]
    pub log_limit: usize,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_log_refresh_seconds() -> u64 {
    60
}

fn default_log_limit() -> usize {
    20
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            log_refresh_seconds: default_log_refresh_seconds(),
            log_limit: default_log_limit(),
        }
    }
}

/// Entity catalog source; the built-in roster when no path is set
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<TrackerConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: TrackerConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Config for the binary: the file named by `RESPAWN_CONFIG` if it exists,
/// defaults otherwise, then environment overrides.
pub fn load_from_env() -> Result<TrackerConfig> {
    let mut config = match std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from) {
        Some(path) if path.exists() => load_config(&path)?,
        _ => TrackerConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}
