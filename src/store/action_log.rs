//! Append-only action log in SQLite.
//!
//! Every instance shares one table; reads filter by instance and return the
//! newest entries first.

use crate::action::{ActionKind, ActionRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::Mutex;
use uuid::Uuid;

/// Persists action records in SQLite.
pub struct ActionLog {
    conn: Mutex<Connection>,
}

impl ActionLog {
    /// Opens (or creates) the SQLite database and ensures the table exists.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open action log DB at {}", db_path))?;
        let log = Self {
            conn: Mutex::new(conn),
        };
        log.create_table()?;
        Ok(log)
    }

    fn create_table(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS actions (
                id           TEXT PRIMARY KEY,
                instance_id  TEXT NOT NULL,
                entity_id    TEXT NOT NULL,
                entity_name  TEXT NOT NULL,
                actor_name   TEXT NOT NULL,
                action_kind  TEXT,
                timestamp_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS actions_by_instance
                ON actions (instance_id, timestamp_ms DESC);",
        )
        .context("Failed to create actions table")?;
        Ok(())
    }

    /// Appends a record. Records are never updated or deleted here.
    pub fn append(&self, record: &ActionRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO actions (id, instance_id, entity_id, entity_name, actor_name, action_kind, timestamp_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.to_string(),
                record.instance_id,
                record.entity_id,
                record.entity_name,
                record.actor_name,
                record.action_kind.label(),
                record.timestamp.timestamp_millis(),
            ],
        )
        .context("Failed to insert action record")?;
        Ok(())
    }

    /// Most recent `limit` records of an instance, newest first.
    pub fn recent(&self, instance_id: &str, limit: usize) -> Result<Vec<ActionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, instance_id, entity_id, entity_name, actor_name, action_kind, timestamp_ms
                 FROM actions
                 WHERE instance_id = ?1
                 ORDER BY timestamp_ms DESC, id DESC
                 LIMIT ?2",
            )
            .context("Failed to prepare recent actions query")?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![instance_id, limit], |row| {
                let id: String = row.get(0)?;
                let instance_id: String = row.get(1)?;
                let entity_id: String = row.get(2)?;
                let entity_name: String = row.get(3)?;
                let actor_name: String = row.get(4)?;
                let action_kind: Option<String> = row.get(5)?;
                let timestamp_ms: i64 = row.get(6)?;
                Ok((
                    id,
                    instance_id,
                    entity_id,
                    entity_name,
                    actor_name,
                    action_kind,
                    timestamp_ms,
                ))
            })
            .context("Failed to query actions")?;

        let mut records = Vec::new();
        for row in rows {
            let (id, instance_id, entity_id, entity_name, actor_name, action_kind, timestamp_ms) =
                row.context("Failed to read action row")?;

            let id = Uuid::parse_str(&id)
                .with_context(|| format!("Failed to parse action id {}", id))?;
            let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
                .with_context(|| format!("Action {} has out-of-range timestamp", id))?;
            // Older rows may lack a kind; those were kills
            let action_kind = action_kind
                .and_then(|kind| kind.parse::<ActionKind>().ok())
                .unwrap_or_default();

            records.push(ActionRecord {
                id,
                entity_id,
                entity_name,
                actor_name,
                action_kind,
                timestamp,
                instance_id,
            });
        }
        Ok(records)
    }

    /// Number of records stored for an instance.
    pub fn count(&self, instance_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM actions WHERE instance_id = ?1",
                params![instance_id],
                |row| row.get(0),
            )
            .context("Failed to count actions")?;
        Ok(count as usize)
    }
}
