use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

mod processor;

pub use processor::{ActionProcessor, DEFAULT_ANONYMOUS_LABEL};

/// What a player did to an entity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[default]
    Kill,
    #[serde(alias = "collected")]
    Collect,
}

impl ActionKind {
    pub const fn label(self) -> &'static str {
        match self {
            ActionKind::Kill => "kill",
            ActionKind::Collect => "collect",
        }
    }

    /// Past-tense verb for log lines
    pub const fn verb(self) -> &'static str {
        match self {
            ActionKind::Kill => "killed",
            ActionKind::Collect => "collected",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for ActionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kill" => Ok(ActionKind::Kill),
            "collect" | "collected" => Ok(ActionKind::Collect),
            _ => Err(()),
        }
    }
}

/// Immutable, append-only log entry produced by [`ActionProcessor`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    /// UUIDv7 identifier (time-ordered)
    pub id: Uuid,

    pub entity_id: String,

    pub entity_name: String,

    /// Who acted; never empty (falls back to the anonymous label)
    pub actor_name: String,

    #[serde(default)]
    pub action_kind: ActionKind,

    /// Unix epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    pub instance_id: String,
}
