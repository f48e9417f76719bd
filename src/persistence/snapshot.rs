//! JSON snapshot file for cooldown records

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PersistenceError;
use crate::alerts::{CooldownRecord, CooldownStore};

const SCHEMA_VERSION: u32 = 1;

/// On-disk layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownSnapshot {
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
    pub records: Vec<CooldownRecord>,
}

/// Location of the cooldown snapshot
#[derive(Debug, Clone)]
pub struct CooldownSnapshotFile {
    path: PathBuf,
}

impl CooldownSnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the records, replacing the previous snapshot atomically
    pub fn save(&self, records: &[CooldownRecord], saved_at: DateTime<Utc>) -> Result<(), PersistenceError> {
        let snapshot = CooldownSnapshot {
            schema_version: SCHEMA_VERSION,
            saved_at,
            records: records.to_vec(),
        };
        let data = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), records = records.len(), "Cooldown snapshot saved");
        Ok(())
    }

    /// Read the records; a missing file is an empty store
    pub fn load(&self) -> Result<Vec<CooldownRecord>, PersistenceError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let snapshot: CooldownSnapshot = serde_json::from_slice(&data)
            .map_err(|e| PersistenceError::Deserialization(e.to_string()))?;

        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(PersistenceError::SchemaVersion {
                found: snapshot.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        Ok(snapshot.records)
    }

    /// Load the snapshot into `store`, returning how many records were restored
    pub fn restore_into(&self, store: &CooldownStore) -> Result<usize, PersistenceError> {
        let records = self.load()?;
        Ok(store.restore(records))
    }
}
