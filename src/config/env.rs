use super::TrackerConfig;
use std::path::PathBuf;

pub const INSTANCE_ENV: &str = "RESPAWN_INSTANCE";
pub const STORAGE_DIR_ENV: &str = "RESPAWN_STORAGE_DIR";
pub const RESERVATION_MINUTES_ENV: &str = "RESPAWN_RESERVATION_MINUTES";

/// Override file/default values from environment variables.
///
/// `lookup` is `std::env::var` in the binary; tests pass a map. Values that
/// fail to parse are ignored.
pub fn apply_env_overrides<F>(config: &mut TrackerConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(INSTANCE_ENV) {
        let v = v.trim();
        if !v.is_empty() {
            config.instance.id = v.to_string();
        }
    }
    if let Some(v) = lookup(STORAGE_DIR_ENV) {
        if !v.trim().is_empty() {
            config.storage.directory = PathBuf::from(v);
        }
    }
    if let Some(v) = lookup(RESERVATION_MINUTES_ENV) {
        if let Ok(n) = v.trim().parse::<i64>() {
            config.reservation.duration_minutes = n;
        }
    }
}
