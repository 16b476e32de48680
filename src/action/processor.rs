use crate::action::{ActionKind, ActionRecord};
use crate::catalog::{EntityCatalog, EntityDefinition};
use crate::policy::{next_delay_occurrence, next_fixed_in_zone, SpawnPolicy};
use crate::state::EntityState;
use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_ANONYMOUS_LABEL: &str = "Anonymous";

/// Applies kill/collect actions to resolved entities
#[derive(Clone, Debug)]
pub struct ActionProcessor {
    zone: FixedOffset,
    anonymous_label: String,
}

impl ActionProcessor {
    pub fn new(zone: FixedOffset, anonymous_label: &str) -> Self {
        Self {
            zone,
            anonymous_label: anonymous_label.to_string(),
        }
    }

    /// Processor using the catalog's schedule zone
    pub fn for_catalog(catalog: &EntityCatalog, anonymous_label: &str) -> Self {
        Self::new(*catalog.zone(), anonymous_label)
    }

    /// Record an action against `entity` at `now`.
    ///
    /// Fixed-schedule entities keep following their clock; the action only
    /// stamps `last_action_time`. Delay-based entities restart their timer
    /// unconditionally, even when acted on before they were eligible.
    ///
    /// The action kind comes from the entity's kind, never from the caller.
    /// `entity` must already be resolved against the catalog.
    pub fn apply(
        &self,
        entity: &EntityDefinition,
        prior: Option<&EntityState>,
        actor_name: Option<&str>,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> (EntityState, ActionRecord) {
        let next_spawn_time = match &entity.policy {
            SpawnPolicy::FixedSchedule { daily_times } => {
                Some(next_fixed_in_zone(daily_times, now, &self.zone))
            }
            SpawnPolicy::DelayBased { respawn_delay } => {
                if let Some(pending) = prior.and_then(|p| p.next_spawn_time).filter(|t| *t > now) {
                    debug!(
                        entity_id = %entity.id,
                        eligible_at = %pending,
                        "Out-of-turn action on delay-based entity"
                    );
                }
                next_delay_occurrence(Some(now), *respawn_delay)
            }
        };

        let state = EntityState {
            last_action_time: Some(now),
            next_spawn_time,
        };

        let record = ActionRecord {
            id: Uuid::now_v7(),
            entity_id: entity.id.clone(),
            entity_name: entity.name.clone(),
            actor_name: self.actor_or_anonymous(actor_name),
            action_kind: self.kind_for(entity),
            timestamp: now,
            instance_id: instance_id.to_string(),
        };

        (state, record)
    }

    fn kind_for(&self, entity: &EntityDefinition) -> ActionKind {
        entity.kind.action_kind()
    }

    fn actor_or_anonymous(&self, actor_name: Option<&str>) -> String {
        match actor_name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.anonymous_label.clone(),
        }
    }
}
