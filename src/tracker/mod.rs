// Session glue: one instance, one user

use crate::action::{ActionProcessor, ActionRecord};
use crate::catalog::EntityCatalog;
use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::reservation::{Reservation, ReservationStatus, ReservationTracker};
use crate::state::{reconcile, EntityState, StateMap};
use crate::store::{ActionLog, DocumentStore, SessionData, SessionStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;


/// Errors surfaced to the front-end for bad user input
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// Entity id not present in the catalog
    UnknownEntity(String),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::UnknownEntity(id) => write!(f, "Unknown entity '{}'", id),
        }
    }
}

impl std::error::Error for TrackerError {}

/// Tracks one instance for one local user.
///
/// Owns the reconciled state map and wires the pure core (reconcile, action
/// processing, reservations) to the document store, the action log and the
/// local session files. Every operation reads `now` from the clock once.
pub struct InstanceTracker {
    instance_id: String,
    clock: Arc<dyn Clock>,
    catalog: EntityCatalog,
    processor: ActionProcessor,
    documents: DocumentStore,
    actions: ActionLog,
    sessions: SessionStore,
    states: StateMap,
    reservation: ReservationTracker,
    nickname: Option<String>,
    last_refresh: DateTime<Utc>,
    /// Newest action record already reported by `unseen_actions`
    last_seen_action: Option<(DateTime<Utc>, Uuid)>,
}

impl InstanceTracker {
    /// Open the configured instance and reconcile its stored document
    pub fn open(
        config: &TrackerConfig,
        catalog: EntityCatalog,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let storage = &config.storage;
        let documents = DocumentStore::new(&storage.instances_dir())?;
        let db_path = storage.action_db_path();
        let actions = ActionLog::new(&db_path.to_string_lossy())?;
        let sessions = SessionStore::new(&storage.directory)?;

        let instance_id = config.instance.id.clone();
        let session = sessions.load(&instance_id)?;
        let nickname = sessions.load_last_nickname()?;
        let processor = ActionProcessor::for_catalog(&catalog, &config.actions.anonymous_label);
        let now = clock.now();

        let mut tracker = Self {
            instance_id,
            clock,
            catalog,
            processor,
            documents,
            actions,
            sessions,
            states: StateMap::new(),
            reservation: ReservationTracker::with_reservation(
                config.reservation.duration(),
                session.reservation,
            ),
            nickname,
            last_refresh: now,
            last_seen_action: None,
        };

        tracker.last_seen_action = tracker
            .actions
            .recent(&tracker.instance_id, 1)?
            .first()
            .map(|record| (record.timestamp, record.id));

        tracker.reload()?;

        info!(
            instance = %tracker.instance_id,
            entities = tracker.catalog.len(),
            nickname = tracker.nickname.as_deref().unwrap_or("-"),
            "Instance tracker opened"
        );

        Ok(tracker)
    }

    /// Re-read the instance document (picking up other sessions' writes),
    /// reconcile it and persist whatever reconciliation changed.
    ///
    /// Returns the number of entities written back.
    pub fn reload(&mut self) -> Result<usize> {
        let now = self.clock.now();
        let raw = self.documents.load(&self.instance_id)?;
        let reconciliation = reconcile(&self.catalog, &raw, now);

        let written = if reconciliation.is_clean() {
            0
        } else {
            self.documents
                .write_states(&self.instance_id, reconciliation.dirty_states(), now)
                .context("Failed to persist reconciled state")?
        };

        info!(
            instance = %self.instance_id,
            loaded = raw.len(),
            dirty = written,
            "Reloaded instance state"
        );

        self.states = reconciliation.states;
        self.last_refresh = now;
        Ok(written)
    }

    /// Tick: reconcile the in-memory map against the clock and persist any
    /// schedule that rolled over.
    ///
    /// Returns the ids whose timer ran out since the previous tick, in
    /// catalog order.
    pub fn refresh(&mut self) -> Result<Vec<String>> {
        let now = self.clock.now();
        let since = self.last_refresh;

        let spawned: Vec<String> = self
            .catalog
            .iter()
            .filter(|entity| {
                self.states
                    .get(&entity.id)
                    .and_then(|state| state.next_spawn_time)
                    .is_some_and(|next| next > since && next <= now)
            })
            .map(|entity| entity.id.clone())
            .collect();

        let reconciliation = reconcile(&self.catalog, &self.states, now);
        if !reconciliation.is_clean() {
            let written = self
                .documents
                .write_states(&self.instance_id, reconciliation.dirty_states(), now)
                .context("Failed to persist refreshed state")?;
            debug!(instance = %self.instance_id, dirty = written, "Schedules advanced");
        }

        self.states = reconciliation.states;
        self.last_refresh = now;
        Ok(spawned)
    }

    /// Record a kill/collect on `entity_id` by `actor_name`, or by the
    /// session nickname when none is given.
    ///
    /// The new state is written (and taken in memory) before the record is
    /// appended.
    pub fn act(&mut self, entity_id: &str, actor_name: Option<&str>) -> Result<ActionRecord> {
        let entity = self
            .catalog
            .get(entity_id)
            .ok_or_else(|| TrackerError::UnknownEntity(entity_id.to_string()))?;

        let now = self.clock.now();
        let actor_name = actor_name.or(self.nickname.as_deref());
        let (state, record) = self.processor.apply(
            entity,
            self.states.get(entity_id),
            actor_name,
            &self.instance_id,
            now,
        );

        self.documents
            .write_states(&self.instance_id, [(entity_id, &state)], now)
            .with_context(|| format!("Failed to persist action on {}", entity_id))?;
        // Memory follows the document even if the append below fails
        self.states.insert(entity_id.to_string(), state);
        self.actions.append(&record)?;

        info!(
            instance = %self.instance_id,
            entity_id = %record.entity_id,
            actor = %record.actor_name,
            kind = %record.action_kind,
            "Action recorded"
        );

        Ok(record)
    }

    /// Set (or clear, with a blank name) the nickname used for actions and
    /// reservations. Remembered across instances.
    pub fn set_nickname(&mut self, nickname: &str) -> Result<()> {
        let nickname = nickname.trim();
        self.sessions.save_last_nickname(nickname)?;
        self.nickname = (!nickname.is_empty()).then(|| nickname.to_string());
        Ok(())
    }

    /// Reserve the instance for the current nickname
    pub fn reserve(&mut self) -> Result<Reservation> {
        let now = self.clock.now();
        let holder = self.nickname.clone().unwrap_or_default();
        let reservation = self.reservation.reserve(&holder, now)?.clone();
        self.save_session()?;

        info!(
            instance = %self.instance_id,
            holder = %reservation.holder_name,
            expires_at = %reservation.expires_at,
            "Reservation started"
        );
        Ok(reservation)
    }

    /// Reservation status at the current instant. An expired reservation is
    /// cleared, in memory and on disk.
    pub fn reservation_status(&mut self) -> Result<ReservationStatus> {
        let status = self.reservation.status(self.clock.now());
        if status == ReservationStatus::Expired {
            info!(instance = %self.instance_id, "Reservation expired");
            self.save_session()?;
        }
        Ok(status)
    }

    fn save_session(&self) -> Result<()> {
        let session = SessionData {
            reservation: self.reservation.current().cloned(),
        };
        self.sessions.save(&self.instance_id, &session)
    }

    /// Latest action records of this instance, newest first
    pub fn recent_actions(&self, limit: usize) -> Result<Vec<ActionRecord>> {
        self.actions.recent(&self.instance_id, limit)
    }

    /// Action records appended (by any session) since the last call, oldest
    /// first, at most `limit`. Records existing at open count as seen.
    pub fn unseen_actions(&mut self, limit: usize) -> Result<Vec<ActionRecord>> {
        let mut records: Vec<ActionRecord> = self
            .actions
            .recent(&self.instance_id, limit)?
            .into_iter()
            .filter(|record| {
                self.last_seen_action
                    .map_or(true, |seen| (record.timestamp, record.id) > seen)
            })
            .collect();
        records.reverse();

        if let Some(newest) = records.last() {
            self.last_seen_action = Some((newest.timestamp, newest.id));
        }
        Ok(records)
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    pub fn states(&self) -> &StateMap {
        &self.states
    }

    pub fn state(&self, entity_id: &str) -> Option<&EntityState> {
        self.states.get(entity_id)
    }

    pub fn nickname(&self) -> Option<&str> {
        self.nickname.as_deref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
