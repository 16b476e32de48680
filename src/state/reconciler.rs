use crate::catalog::{EntityCatalog, EntityDefinition};
use crate::policy::{next_fixed_in_zone, SpawnPolicy};
use crate::state::entity::{EntityState, StateMap};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Outcome of [`reconcile`]
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciliation {
    /// Complete state map: exactly one entry per catalog entity
    pub states: StateMap,

    /// Ids whose state differs from the input, in catalog order
    pub dirty: Vec<String>,
}

impl Reconciliation {
    /// True when nothing needs to be written back
    pub fn is_clean(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Changed entries, for minimal-write persistence
    pub fn dirty_states(&self) -> impl Iterator<Item = (&str, &EntityState)> + '_ {
        self.dirty
            .iter()
            .filter_map(|id| self.states.get(id).map(|state| (id.as_str(), state)))
    }
}

/// Derive the authoritative state map from a possibly stale snapshot.
///
/// - Missing entries are synthesized from policy.
/// - Fixed-schedule entries are advanced once their spawn time has passed;
///   a future spawn time is kept even if a fresh calculation would differ.
/// - Delay-based entries are only ever moved by actions.
/// - Entries without a catalog definition are dropped.
///
/// Pure and O(entities); running it twice with the same `now` reports no
/// dirty ids the second time.
pub fn reconcile(catalog: &EntityCatalog, raw: &StateMap, now: DateTime<Utc>) -> Reconciliation {
    let mut states = StateMap::with_capacity(catalog.len());
    let mut dirty = Vec::new();

    for entity in catalog.iter() {
        let stored = raw.get(&entity.id).copied();
        let repaired = repair(catalog, entity, stored, now);

        if stored != Some(repaired) {
            dirty.push(entity.id.clone());
        }
        states.insert(entity.id.clone(), repaired);
    }

    let stale = raw.keys().filter(|id| !catalog.contains(id)).count();
    if stale > 0 {
        debug!(stale, "Dropping state entries with no catalog definition");
    }

    Reconciliation { states, dirty }
}

fn repair(
    catalog: &EntityCatalog,
    entity: &EntityDefinition,
    stored: Option<EntityState>,
    now: DateTime<Utc>,
) -> EntityState {
    match (&entity.policy, stored) {
        (SpawnPolicy::FixedSchedule { daily_times }, stored) => {
            let last_action_time = stored.and_then(|s| s.last_action_time);
            match stored.and_then(|s| s.next_spawn_time) {
                Some(next) if next > now => EntityState {
                    last_action_time,
                    next_spawn_time: Some(next),
                },
                _ => EntityState {
                    last_action_time,
                    next_spawn_time: Some(next_fixed_in_zone(daily_times, now, catalog.zone())),
                },
            }
        }
        (SpawnPolicy::DelayBased { .. }, Some(existing)) => existing,
        (SpawnPolicy::DelayBased { .. }, None) => EntityState::default(),
    }
}
