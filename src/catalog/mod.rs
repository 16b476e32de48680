use crate::action::ActionKind;
use crate::policy::{DailySchedule, PolicyCategory, ScheduleError, SpawnPolicy};
use anyhow::{Context, Result};
use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;


/// Schedule zone of the built-in roster (America/Sao_Paulo, no DST)
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;

/// Longest respawn delay a catalog file may declare (365 days)
pub const MAX_RESPAWN_MINUTES: i64 = 365 * 24 * 60;

/// What kind of thing an entity is; decides the action recorded against it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Boss,
    Resource,
}

impl EntityKind {
    pub fn action_kind(self) -> ActionKind {
        match self {
            EntityKind::Boss => ActionKind::Kill,
            EntityKind::Resource => ActionKind::Collect,
        }
    }
}

/// Static definition of a trackable entity, shared by every instance
#[derive(Clone, Debug, PartialEq)]
pub struct EntityDefinition {
    /// Globally unique id (e.g., "red-boss-1")
    pub id: String,
    pub name: String,
    /// Display group the board renders together (e.g., "red", "resource")
    pub group: String,
    pub kind: EntityKind,
    pub icon: Option<String>,
    pub policy: SpawnPolicy,
}

impl EntityDefinition {
    pub fn fixed(
        id: &str,
        name: &str,
        group: &str,
        daily_times: DailySchedule,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            group: group.to_string(),
            kind: EntityKind::Boss,
            icon: None,
            policy: SpawnPolicy::FixedSchedule { daily_times },
        }
    }

    pub fn delayed(
        id: &str,
        name: &str,
        group: &str,
        kind: EntityKind,
        respawn_delay: Duration,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            group: group.to_string(),
            kind,
            icon: None,
            policy: SpawnPolicy::DelayBased { respawn_delay },
        }
    }

    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    pub fn category(&self) -> PolicyCategory {
        self.policy.category()
    }
}

/// Catalog construction errors
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogError {
    DuplicateId(String),
    InvalidSchedule { id: String, error: ScheduleError },
    /// Entry has neither `daily_times` nor `respawn_minutes`
    MissingPolicy(String),
    /// Entry has both `daily_times` and `respawn_minutes`
    ConflictingPolicy(String),
    /// `respawn_minutes` not positive or above [`MAX_RESPAWN_MINUTES`]
    InvalidDelay(String),
    InvalidOffset(i32),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::DuplicateId(id) => write!(f, "duplicate entity id '{}'", id),
            CatalogError::InvalidSchedule { id, error } => {
                write!(f, "entity '{}': {}", id, error)
            }
            CatalogError::MissingPolicy(id) => write!(
                f,
                "entity '{}' needs either daily_times or respawn_minutes",
                id
            ),
            CatalogError::ConflictingPolicy(id) => write!(
                f,
                "entity '{}' cannot have both daily_times and respawn_minutes",
                id
            ),
            CatalogError::InvalidDelay(id) => {
                write!(
                    f,
                    "entity '{}' respawn_minutes must be a positive duration of at most {} minutes",
                    id, MAX_RESPAWN_MINUTES
                )
            }
            CatalogError::InvalidOffset(minutes) => {
                write!(f, "utc_offset_minutes {} is out of range", minutes)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Every trackable entity, in board order
#[derive(Clone, Debug)]
pub struct EntityCatalog {
    zone: FixedOffset,
    entities: Vec<EntityDefinition>,
    index: HashMap<String, usize>,
}

impl EntityCatalog {
    /// Build a catalog; ids must be unique
    pub fn new(entities: Vec<EntityDefinition>, zone: FixedOffset) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(entities.len());
        for (position, entity) in entities.iter().enumerate() {
            if index.insert(entity.id.clone(), position).is_some() {
                return Err(CatalogError::DuplicateId(entity.id.clone()));
            }
        }

        Ok(Self {
            zone,
            entities,
            index,
        })
    }

    /// Roster of the original game: fixed red bosses, delayed yellow/cyan
    /// bosses and legendary resources
    pub fn builtin() -> Self {
        let schedule = |marks: &[&str]| {
            DailySchedule::parse(marks).expect("built-in schedules are valid")
        };
        let hour = Duration::hours(1);
        let half_hour = Duration::minutes(30);

        let entities = vec![
            EntityDefinition::fixed(
                "red-boss-1",
                "Red Norte",
                "red",
                schedule(&["04:00", "10:00", "16:00", "22:00"]),
            )
            .with_icon("👹"),
            EntityDefinition::fixed(
                "red-boss-2",
                "Red Sul",
                "red",
                schedule(&["01:00", "07:00", "13:00", "19:00"]),
            )
            .with_icon("🔱"),
            EntityDefinition::delayed("yellow-boss-1", "Amarelo Esquerdo", "yellow", EntityKind::Boss, hour)
                .with_icon("👺"),
            EntityDefinition::delayed("yellow-boss-2", "Amarelo Direito", "yellow", EntityKind::Boss, hour)
                .with_icon("🦁"),
            EntityDefinition::delayed("cyan-boss-1", "Azul 1", "cyan", EntityKind::Boss, half_hour)
                .with_icon("💧"),
            EntityDefinition::delayed("cyan-boss-2", "Azul 2", "cyan", EntityKind::Boss, half_hour)
                .with_icon("🔵"),
            EntityDefinition::delayed("cyan-boss-3", "Azul 3", "cyan", EntityKind::Boss, half_hour)
                .with_icon("❄️"),
            EntityDefinition::delayed("cyan-boss-4", "Azul 4", "cyan", EntityKind::Boss, half_hour)
                .with_icon("🧊"),
            EntityDefinition::delayed("resource-ore", "Minério Lendário", "resource", EntityKind::Resource, hour)
                .with_icon("✨"),
            EntityDefinition::delayed("resource-plant", "Planta Lendária", "resource", EntityKind::Resource, hour)
                .with_icon("🌿"),
        ];

        let zone = FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60)
            .expect("built-in offset is valid");
        Self::new(entities, zone).expect("built-in ids are unique")
    }

    /// Parse a catalog from TOML
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(contents).context("Failed to parse catalog TOML")?;
        Ok(file.into_catalog()?)
    }

    /// Time zone the daily schedules are expressed in
    pub fn zone(&self) -> &FixedOffset {
        &self.zone
    }

    pub fn get(&self, id: &str) -> Option<&EntityDefinition> {
        self.index.get(id).map(|&position| &self.entities[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDefinition> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities grouped by display group, groups in order of first appearance
    pub fn groups(&self) -> Vec<(&str, Vec<&EntityDefinition>)> {
        let mut groups: Vec<(&str, Vec<&EntityDefinition>)> = Vec::new();
        for entity in &self.entities {
            match groups.iter_mut().find(|(name, _)| *name == entity.group) {
                Some((_, members)) => members.push(entity),
                None => groups.push((entity.group.as_str(), vec![entity])),
            }
        }
        groups
    }
}

/// Load a catalog TOML file
pub fn load_catalog(path: &Path) -> Result<EntityCatalog> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
    EntityCatalog::from_toml_str(&contents)
        .with_context(|| format!("Invalid catalog file {}", path.display()))
}

/// On-disk catalog layout
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default = "default_utc_offset_minutes")]
    utc_offset_minutes: i32,
    #[serde(default)]
    entities: Vec<CatalogEntry>,
}

fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    name: String,
    group: String,
    #[serde(default)]
    kind: EntityKind,
    icon: Option<String>,
    daily_times: Option<Vec<String>>,
    respawn_minutes: Option<i64>,
}

impl CatalogFile {
    fn into_catalog(self) -> Result<EntityCatalog, CatalogError> {
        let zone = FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .ok_or(CatalogError::InvalidOffset(self.utc_offset_minutes))?;

        let entities = self
            .entities
            .into_iter()
            .map(CatalogEntry::into_definition)
            .collect::<Result<Vec<_>, _>>()?;

        EntityCatalog::new(entities, zone)
    }
}

impl CatalogEntry {
    fn into_definition(self) -> Result<EntityDefinition, CatalogError> {
        let policy = match (self.daily_times, self.respawn_minutes) {
            (Some(_), Some(_)) => return Err(CatalogError::ConflictingPolicy(self.id)),
            (None, None) => return Err(CatalogError::MissingPolicy(self.id)),
            (Some(marks), None) => {
                let daily_times = DailySchedule::parse(&marks).map_err(|error| {
                    CatalogError::InvalidSchedule {
                        id: self.id.clone(),
                        error,
                    }
                })?;
                SpawnPolicy::FixedSchedule { daily_times }
            }
            (None, Some(minutes)) => {
                let respawn_delay = (1..=MAX_RESPAWN_MINUTES)
                    .contains(&minutes)
                    .then(|| Duration::minutes(minutes));
                match respawn_delay {
                    Some(respawn_delay) => SpawnPolicy::DelayBased { respawn_delay },
                    None => return Err(CatalogError::InvalidDelay(self.id)),
                }
            }
        };

        Ok(EntityDefinition {
            id: self.id,
            name: self.name,
            group: self.group,
            kind: self.kind,
            icon: self.icon,
            policy,
        })
    }
}
