use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Entity id -> state, one map per instance
pub type StateMap = HashMap<String, EntityState>;

/// Timer state of one entity in one instance
///
/// Timestamps travel as Unix epoch milliseconds. `next_spawn_time == None`
/// means no timer is pending and the entity is eligible now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityState {
    /// Last kill/collect recorded against the entity
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_action_time: Option<DateTime<Utc>>,

    /// When the entity becomes (or became) eligible
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub next_spawn_time: Option<DateTime<Utc>>,
}

/// Display derivation of an [`EntityState`] at a given instant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Availability {
    pub is_eligible_now: bool,
    /// Zero when eligible
    pub time_remaining: Duration,
}

impl EntityState {
    pub fn availability(&self, now: DateTime<Utc>) -> Availability {
        match self.next_spawn_time {
            Some(next) if next > now => Availability {
                is_eligible_now: false,
                time_remaining: next - now,
            },
            _ => Availability {
                is_eligible_now: true,
                time_remaining: Duration::zero(),
            },
        }
    }
}
