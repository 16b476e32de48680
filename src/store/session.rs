use crate::reservation::Reservation;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Per-instance local session data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    #[serde(default)]
    pub reservation: Option<Reservation>,
}

/// Local, per-user data that never leaves the machine: the reservation of
/// each instance and the last nickname (shared by all instances).
pub struct SessionStore {
    directory: PathBuf,
}

impl SessionStore {
    pub fn new(directory: &Path) -> Result<Self> {
        fs::create_dir_all(directory.join("sessions")).with_context(|| {
            format!("Failed to create session directory under {}", directory.display())
        })?;
        Ok(Self {
            directory: directory.to_path_buf(),
        })
    }

    fn session_path(&self, instance_id: &str) -> PathBuf {
        self.directory
            .join("sessions")
            .join(format!("{}.json", instance_id))
    }

    fn nickname_path(&self) -> PathBuf {
        self.directory.join("last_nickname")
    }

    pub fn load(&self, instance_id: &str) -> Result<SessionData> {
        let path = self.session_path(instance_id);
        if !path.exists() {
            return Ok(SessionData::default());
        }

        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        if bytes.is_empty() {
            return Ok(SessionData::default());
        }

        serde_json::from_slice(&bytes).with_context(|| {
            format!(
                "Failed to parse session file {}; delete it to reset",
                path.display()
            )
        })
    }

    pub fn save(&self, instance_id: &str, session: &SessionData) -> Result<()> {
        let json = serde_json::to_vec_pretty(session).context("Failed to serialize session")?;
        fs::write(self.session_path(instance_id), json).context("Failed to write session file")?;
        Ok(())
    }

    pub fn load_last_nickname(&self) -> Result<Option<String>> {
        let path = self.nickname_path();
        if !path.exists() {
            return Ok(None);
        }
        let nickname = fs::read_to_string(&path).context("Failed to read last nickname")?;
        let nickname = nickname.trim();
        Ok((!nickname.is_empty()).then(|| nickname.to_string()))
    }

    pub fn save_last_nickname(&self, nickname: &str) -> Result<()> {
        fs::write(self.nickname_path(), nickname.trim()).context("Failed to write last nickname")?;
        Ok(())
    }
}
