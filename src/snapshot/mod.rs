use crate::state::{EntityState, StateMap};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{Read, Write};
use tempfile::NamedTempFile;
use std::path::Path;
use tracing::warn;


/// Current instance document schema.
///
/// Version 1 documents are a bare `{ entity_id: state }` object with no
/// envelope; they still load.
pub const SCHEMA_VERSION: u32 = 2;

/// Persisted state of one instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceDocument {
    /// Document format version (for schema evolution)
    pub schema_version: u32,

    pub instance_id: String,

    /// Last write, Unix epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,

    /// Entity id -> state; may contain ids the catalog no longer knows
    pub states: StateMap,
}

impl InstanceDocument {
    pub fn new(instance_id: &str, states: StateMap, updated_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            instance_id: instance_id.to_string(),
            updated_at,
            states,
        }
    }

    /// Decode a document of any known schema version.
    ///
    /// Malformed entries are dropped with a warning instead of failing the
    /// whole document; reconciliation re-creates them from policy.
    pub fn from_json(json: &str, instance_id: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).context("Failed to deserialize instance document JSON")?;

        let Value::Object(mut root) = value else {
            bail!("Instance document must be a JSON object");
        };

        let (schema_version, updated_at, entries) = match root.remove("schemaVersion") {
            Some(version) => {
                let version = version
                    .as_u64()
                    .context("schemaVersion must be a non-negative integer")?;
                if version > SCHEMA_VERSION as u64 {
                    warn!(
                        instance = %instance_id,
                        version,
                        "Instance document is newer than this build, reading known fields"
                    );
                }
                let updated_at = root
                    .get("updatedAt")
                    .and_then(Value::as_i64)
                    .and_then(DateTime::<Utc>::from_timestamp_millis)
                    .unwrap_or_default();
                let entries = match root.remove("states") {
                    Some(Value::Object(entries)) => entries,
                    Some(_) => bail!("Instance document 'states' must be an object"),
                    None => Map::new(),
                };
                (version as u32, updated_at, entries)
            }
            None => (1, DateTime::<Utc>::default(), root),
        };

        let states = decode_entries(instance_id, entries);

        Ok(Self {
            schema_version,
            instance_id: instance_id.to_string(),
            updated_at,
            states,
        })
    }

    /// Save as compressed JSON (gzip)
    ///
    /// Uses atomic write: writes to a uniquely named temp file in the same
    /// directory, fsyncs, then renames. Concurrent writers never share a
    /// temp file and readers never observe a partial document.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize instance document to JSON")?;

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let tmp_file = NamedTempFile::new_in(directory)
            .context("Failed to create temporary instance document")?;

        let mut encoder = GzEncoder::new(tmp_file, Compression::default());
        encoder
            .write_all(json.as_bytes())
            .context("Failed to write compressed instance document")?;

        let tmp_file = encoder
            .finish()
            .context("Failed to finish compression")?;

        tmp_file
            .as_file()
            .sync_all()
            .context("Failed to sync instance document to disk")?;

        tmp_file
            .persist(path)
            .context("Failed to rename temporary instance document")?;

        Ok(())
    }

    /// Load from a `.json.gz` file, or a plain `.json` file
    pub fn load_from_file(path: &Path, instance_id: &str) -> Result<Self> {
        let file = File::open(path).context("Failed to open instance document")?;

        let is_compressed = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "gz")
            .unwrap_or(false);

        let mut json = String::new();
        if is_compressed {
            GzDecoder::new(file)
                .read_to_string(&mut json)
                .context("Failed to decompress instance document")?;
        } else {
            let mut file = file;
            file.read_to_string(&mut json)
                .context("Failed to read instance document")?;
        }

        Self::from_json(&json, instance_id)
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

fn decode_entries(instance_id: &str, entries: Map<String, Value>) -> StateMap {
    let mut states = StateMap::with_capacity(entries.len());
    for (entity_id, raw) in entries {
        match serde_json::from_value::<EntityState>(raw) {
            Ok(state) => {
                states.insert(entity_id, state);
            }
            Err(e) => {
                warn!(
                    instance = %instance_id,
                    entity_id = %entity_id,
                    error = %e,
                    "Dropping malformed entity state"
                );
            }
        }
    }
    states
}
