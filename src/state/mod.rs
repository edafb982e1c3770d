// Copyright 2024-2026 Veritas SPARK Contributors
// SPDX-License-Identifier: Apache-2.0

//! JSON snapshot persistence for rollback and breaker state.
//!
//! Saves and loads a single document for restart recovery. Writes are
//! atomic: serialize to a sibling temp file, fsync, rename.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::breaker::BreakerPhase;
use crate::rollback::{RollbackEvent, RollbackPhase, MAX_HISTORY};

/// Highest snapshot layout this build understands.
pub const SCHEMA_VERSION: u32 = 1;

/// State persistence errors.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to write state file: {0}")]
    Write(String),

    #[error("state file schema version {found} is newer than supported version {supported}")]
    SchemaVersion { found: u32, supported: u32 },
}

/// Persisted control-plane snapshot.
///
/// Limited to what rehydration needs; per-call decisions and performance
/// samples are transient. Unknown fields are ignored on read and missing
/// fields use defaults, so older files load under newer builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub rollback_phase: RollbackPhase,
    #[serde(default)]
    pub rollback_history: Vec<RollbackEvent>,
    #[serde(default)]
    pub breaker_phase: BreakerPhase,
    #[serde(default)]
    pub breaker_opened_at: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            rollback_phase: RollbackPhase::Active,
            rollback_history: Vec::new(),
            breaker_phase: BreakerPhase::Closed,
            breaker_opened_at: None,
            last_updated: Utc::now(),
        }
    }
}

/// Handles saving and loading the control-plane snapshot.
pub struct StateStore {
    path: PathBuf,
    // Serializes concurrent saves.
    write_lock: Mutex<()>,
}

impl StateStore {
    /// Create a store at the given path.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Default state path in the platform temp directory.
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("modelgen-migrate-state.json")
    }

    /// Path this store reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot.
    ///
    /// Missing files and corrupt content both yield defaults (corruption is
    /// logged); only a snapshot written by a newer build fails, so startup
    /// never proceeds against state it cannot interpret.
    pub fn load(&self) -> Result<StateSnapshot, StateError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StateSnapshot::default());
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file unreadable, using defaults");
                return Ok(StateSnapshot::default());
            }
        };

        let snapshot: StateSnapshot = match serde_json::from_reader(BufReader::new(file)) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file corrupt, using defaults");
                return Ok(StateSnapshot::default());
            }
        };

        if snapshot.schema_version > SCHEMA_VERSION {
            return Err(StateError::SchemaVersion {
                found: snapshot.schema_version,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(snapshot)
    }

    /// Atomically write the snapshot.
    ///
    /// History is truncated to the most recent [`MAX_HISTORY`] entries at
    /// save time. Failures are returned for the caller to log as warnings;
    /// they never abort the host operation.
    pub fn save(&self, snapshot: &StateSnapshot) -> Result<(), StateError> {
        let _guard = self.write_lock.lock();

        let mut bounded;
        let snapshot = if snapshot.rollback_history.len() > MAX_HISTORY {
            bounded = snapshot.clone();
            let excess = bounded.rollback_history.len() - MAX_HISTORY;
            bounded.rollback_history.drain(0..excess);
            &bounded
        } else {
            snapshot
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StateError::Write(e.to_string()))?;
        }

        let temp_path = self.path.with_extension("tmp");
        let file = File::create(&temp_path).map_err(|e| StateError::Write(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot)
            .map_err(|e| StateError::Write(e.to_string()))?;
        writer.flush().map_err(|e| StateError::Write(e.to_string()))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| StateError::Write(e.to_string()))?;
        drop(writer);

        fs::rename(&temp_path, &self.path).map_err(|e| StateError::Write(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rollback::RollbackTrigger;

    fn temp_store() -> (StateStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        (store, dir)
    }

    fn sample_event(reason: &str) -> RollbackEvent {
        RollbackEvent {
            id: uuid::Uuid::new_v4().to_string(),
            trigger: RollbackTrigger::ManualEmergency,
            reason: reason.to_string(),
            operator: Some("ops".to_string()),
            scheduled_at: None,
            occurred_at: Utc::now(),
            succeeded: true,
            errors: Vec::new(),
            recovery_steps: Vec::new(),
        }
    }

    #[test]
    fn test_load_missing_returns_defaults() {
        let (store, _dir) = temp_store();
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.schema_version, SCHEMA_VERSION);
        assert_eq!(snapshot.rollback_phase, RollbackPhase::Active);
        assert_eq!(snapshot.breaker_phase, BreakerPhase::Closed);
        assert!(snapshot.rollback_history.is_empty());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let (store, _dir) = temp_store();
        let mut snapshot = StateSnapshot::default();
        snapshot.rollback_phase = RollbackPhase::RolledBack;
        snapshot.breaker_phase = BreakerPhase::Open;
        snapshot.breaker_opened_at = Some(Utc::now());
        snapshot.rollback_history.push(sample_event("INCIDENT-1"));

        store.save(&snapshot).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.rollback_phase, RollbackPhase::RolledBack);
        assert_eq!(loaded.breaker_phase, BreakerPhase::Open);
        assert!(loaded.breaker_opened_at.is_some());
        assert_eq!(loaded.rollback_history.len(), 1);
        assert_eq!(loaded.rollback_history[0].reason, "INCIDENT-1");
    }

    #[test]
    fn test_load_corrupt_returns_defaults() {
        let (store, dir) = temp_store();
        fs::write(dir.path().join("state.json"), "{ not json").unwrap();

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.rollback_phase, RollbackPhase::Active);
    }

    #[test]
    fn test_load_newer_schema_fails() {
        let (store, dir) = temp_store();
        fs::write(
            dir.path().join("state.json"),
            r#"{"schema_version": 99, "rollback_phase": "active"}"#,
        )
        .unwrap();

        assert!(matches!(
            store.load(),
            Err(StateError::SchemaVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_load_ignores_unknown_fields() {
        let (store, dir) = temp_store();
        fs::write(
            dir.path().join("state.json"),
            r#"{"schema_version": 1, "rollback_phase": "rolled_back", "future_field": [1, 2]}"#,
        )
        .unwrap();

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.rollback_phase, RollbackPhase::RolledBack);
        // Missing fields fall back to defaults.
        assert_eq!(snapshot.breaker_phase, BreakerPhase::Closed);
    }

    #[test]
    fn test_save_truncates_history() {
        let (store, _dir) = temp_store();
        let mut snapshot = StateSnapshot::default();
        for i in 0..130 {
            snapshot.rollback_history.push(sample_event(&format!("r{}", i)));
        }

        store.save(&snapshot).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.rollback_history.len(), MAX_HISTORY);
        assert_eq!(loaded.rollback_history.last().unwrap().reason, "r129");
    }

    #[test]
    fn test_save_overwrites_previous() {
        let (store, _dir) = temp_store();
        let mut snapshot = StateSnapshot::default();
        snapshot.rollback_phase = RollbackPhase::RolledBack;
        store.save(&snapshot).unwrap();

        snapshot.rollback_phase = RollbackPhase::Active;
        store.save(&snapshot).unwrap();

        assert_eq!(store.load().unwrap().rollback_phase, RollbackPhase::Active);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("deep").join("state.json"));
        store.save(&StateSnapshot::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let (store, dir) = temp_store();
        store.save(&StateSnapshot::default()).unwrap();
        assert!(!dir.path().join("state.tmp").exists());
    }
}
