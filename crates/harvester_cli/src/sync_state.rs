//! Last-sync bookkeeping between harvest runs.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use engine_logging::{engine_info, engine_warn};
use harvester_core::{HarvestReport, StopReason};
use harvester_engine::{AtomicFileWriter, PersistError};
use serde::{Deserialize, Serialize};

pub(crate) const STATE_FILENAME: &str = ".harvester_state.ron";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub(crate) struct SyncState {
    pub last_sync: Option<DateTime<Utc>>,
}

pub(crate) fn load_sync_state(dir: &Path) -> SyncState {
    let path = dir.join(STATE_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return SyncState::default(),
        Err(err) => {
            engine_warn!("Failed to read sync state from {:?}: {}", path, err);
            return SyncState::default();
        }
    };
    match ron::from_str(&content) {
        Ok(state) => {
            engine_info!("Loaded sync state from {:?}", path);
            state
        }
        Err(err) => {
            engine_warn!("Failed to parse sync state from {:?}: {}", path, err);
            SyncState::default()
        }
    }
}

pub(crate) fn save_sync_state(dir: &Path, state: &SyncState) -> Result<PathBuf, PersistError> {
    let content = ron::ser::to_string_pretty(state, ron::ser::PrettyConfig::new())
        .map_err(|err| PersistError::Serialize {
            what: "sync state".to_string(),
            message: err.to_string(),
        })?;
    AtomicFileWriter::new(dir.to_path_buf()).write(STATE_FILENAME, &content)
}

/// The cutoff the next run may use, or `None` to keep the current one.
///
/// Only a scan that walked the feed down to known ground without losing
/// items may move the cutoff forward.
pub(crate) fn next_cutoff(report: &HarvestReport) -> Option<DateTime<Utc>> {
    let complete = matches!(
        report.stop_reason,
        StopReason::CutoffReached | StopReason::EmptyFeed
    );
    if !complete || !report.failures.is_empty() {
        return None;
    }
    report.files.iter().map(|file| file.updated_at).max()
}
