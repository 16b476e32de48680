use crate::snapshot::InstanceDocument;
use crate::state::{EntityState, StateMap};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One instance document per instance id, under a common directory
pub struct DocumentStore {
    directory: PathBuf,
}

impl DocumentStore {
    /// Opens (or creates) the document directory
    pub fn new(directory: &Path) -> Result<Self> {
        fs::create_dir_all(directory).with_context(|| {
            format!("Failed to create instance directory {}", directory.display())
        })?;
        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    /// Path of an instance's document
    ///
    /// Format: {directory}/{instance}.json.gz
    pub fn document_path(&self, instance_id: &str) -> PathBuf {
        self.directory.join(format!("{}.json.gz", instance_id))
    }

    fn legacy_path(&self, instance_id: &str) -> PathBuf {
        self.directory.join(format!("{}.json", instance_id))
    }

    /// Raw (unreconciled) states of an instance.
    ///
    /// A missing document is an empty map. An unreadable document is moved
    /// aside and also treated as empty, so a corrupt file never blocks the
    /// tracker.
    pub fn load(&self, instance_id: &str) -> Result<StateMap> {
        let path = self.document_path(instance_id);
        let path = if path.exists() {
            path
        } else {
            let legacy = self.legacy_path(instance_id);
            if !legacy.exists() {
                info!(instance = %instance_id, "No instance document yet, starting empty");
                return Ok(StateMap::new());
            }
            legacy
        };

        match InstanceDocument::load_from_file(&path, instance_id) {
            Ok(document) => {
                info!(
                    instance = %instance_id,
                    schema_version = document.schema_version,
                    entities = document.entity_count(),
                    "Loaded instance document"
                );
                Ok(document.states)
            }
            Err(e) => {
                let aside = path.with_extension("corrupt");
                warn!(
                    instance = %instance_id,
                    path = %path.display(),
                    error = %e,
                    "Corrupt instance document, moving aside and starting empty"
                );
                fs::rename(&path, &aside)
                    .context("Failed to move corrupt instance document aside")?;
                Ok(StateMap::new())
            }
        }
    }

    /// Write the given entity states, last-write-wins per entity.
    ///
    /// Re-reads the current document first so entries written by other
    /// sessions since our last load are preserved; only the listed entities
    /// are overwritten. Returns the number of entities written.
    pub fn write_states<'a, I>(
        &self,
        instance_id: &str,
        updates: I,
        now: DateTime<Utc>,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a EntityState)>,
    {
        let mut states = self.load(instance_id)?;

        let mut written = 0;
        for (entity_id, state) in updates {
            states.insert(entity_id.to_string(), *state);
            written += 1;
        }

        if written == 0 {
            return Ok(0);
        }

        InstanceDocument::new(instance_id, states, now)
            .save_to_file(&self.document_path(instance_id))
            .with_context(|| format!("Failed to save instance document for {}", instance_id))?;

        let legacy = self.legacy_path(instance_id);
        if legacy.exists() {
            // Superseded by the compressed document
            fs::remove_file(&legacy).context("Failed to remove legacy instance document")?;
        }

        Ok(written)
    }
}
