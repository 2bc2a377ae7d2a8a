//! Durable transfer progress.
//!
//! The store keeps one `HashSet` of committed item IDs per category in
//! memory and writes the whole state as pretty JSON on [`CheckpointStore::save`].
//! Writes go to `<path>.tmp` first and are renamed over the checkpoint, so a
//! reader only ever sees a complete file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::mapping::CategoryMapping;
use crate::session::Session;

/// Version of the on-disk layout.
pub const FORMAT_VERSION: u32 = 1;

/// On-disk layout. Sets are sorted lists so files diff cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Layout version.
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    /// Session metadata.
    #[serde(flatten)]
    pub session: Session,
    /// Committed item IDs per category.
    #[serde(default)]
    pub transferred_items: BTreeMap<String, BTreeSet<String>>,
    /// Items aborted in the latest attempt, with the reason.
    #[serde(default)]
    pub failed_items: BTreeMap<String, BTreeMap<String, String>>,
    /// Category -> container mapping in force for this session.
    #[serde(default)]
    pub category_mapping: CategoryMapping,
    /// Time of the write.
    pub updated_at: DateTime<Utc>,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

/// Single writer of persisted transfer state.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    transferred: HashMap<String, HashSet<String>>,
    failed: BTreeMap<String, BTreeMap<String, String>>,
    mapping: CategoryMapping,
    saves: u64,
}

impl CheckpointStore {
    /// Creates an empty store backed by `path`. Nothing is read yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            transferred: HashMap::new(),
            failed: BTreeMap::new(),
            mapping: CategoryMapping::new(),
            saves: 0,
        }
    }

    /// Checkpoint file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the checkpoint into memory and returns its session.
    ///
    /// Returns `None` when the file is absent or cannot be parsed; the store
    /// is then empty. An unparseable file is moved to `<path>.corrupt`.
    pub fn load(&mut self) -> Option<Session> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!(
                    "Could not read checkpoint {}, starting fresh: {}",
                    self.path.display(),
                    e
                );
                return None;
            }
        };

        match serde_json::from_str::<CheckpointFile>(&content) {
            Ok(file) => Some(self.restore(file)),
            Err(e) => {
                let aside = sidecar_path(&self.path, "corrupt");
                warn!(
                    "Checkpoint {} is unparseable ({}), moving it to {} and starting fresh",
                    self.path.display(),
                    e,
                    aside.display()
                );
                if let Err(rename_err) = fs::rename(&self.path, &aside) {
                    warn!("Could not move corrupt checkpoint aside: {}", rename_err);
                }
                None
            }
        }
    }

    fn restore(&mut self, file: CheckpointFile) -> Session {
        if file.format_version != FORMAT_VERSION {
            warn!(
                "Checkpoint format version {} differs from {}, reading it anyway",
                file.format_version, FORMAT_VERSION
            );
        }
        self.transferred = file
            .transferred_items
            .into_iter()
            .map(|(category, ids)| (category, ids.into_iter().collect()))
            .collect();
        self.failed = file.failed_items;
        self.mapping = file.category_mapping;

        let mut session = file.session;
        session.normalize();
        session
    }

    /// O(1) duplicate check.
    #[must_use]
    pub fn is_transferred(&self, category: &str, item_id: &str) -> bool {
        self.transferred
            .get(category)
            .is_some_and(|ids| ids.contains(item_id))
    }

    /// Records a committed item. Returns `false` if it was already recorded.
    pub fn mark_transferred(&mut self, category: &str, item_id: &str) -> bool {
        if let Some(failed) = self.failed.get_mut(category) {
            failed.remove(item_id);
            if failed.is_empty() {
                self.failed.remove(category);
            }
        }
        self.transferred
            .entry(category.to_string())
            .or_default()
            .insert(item_id.to_string())
    }

    /// Records an aborted item for reporting.
    pub fn mark_failed(&mut self, category: &str, item_id: &str, reason: impl Into<String>) {
        self.failed
            .entry(category.to_string())
            .or_default()
            .insert(item_id.to_string(), reason.into());
    }

    /// Committed IDs for a category, sorted.
    #[must_use]
    pub fn transferred_items(&self, category: &str) -> BTreeSet<String> {
        self.transferred
            .get(category)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of committed items in one category.
    #[must_use]
    pub fn transferred_in(&self, category: &str) -> usize {
        self.transferred.get(category).map_or(0, HashSet::len)
    }

    /// Number of committed items across all categories.
    #[must_use]
    pub fn transferred_count(&self) -> usize {
        self.transferred.values().map(HashSet::len).sum()
    }

    /// Items aborted in the latest attempt.
    #[must_use]
    pub fn failed_items(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.failed
    }

    /// Mapping recorded in the checkpoint.
    #[must_use]
    pub fn mapping(&self) -> &CategoryMapping {
        &self.mapping
    }

    /// Replaces the mapping. Called once per run, before any transfer.
    pub fn set_mapping(&mut self, mapping: CategoryMapping) {
        self.mapping = mapping;
    }

    /// Number of successful saves made by this store.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves
    }

    /// Snapshot of the full persisted state.
    #[must_use]
    pub fn snapshot(&self, session: &Session) -> CheckpointFile {
        CheckpointFile {
            format_version: FORMAT_VERSION,
            session: session.clone(),
            transferred_items: self
                .transferred
                .iter()
                .map(|(category, ids)| (category.clone(), ids.iter().cloned().collect()))
                .collect(),
            failed_items: self.failed.clone(),
            category_mapping: self.mapping.clone(),
            updated_at: Utc::now(),
        }
    }

    /// Atomically persists `session` together with all sets and the mapping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Checkpoint`] if the state cannot be serialized or
    /// written; the previous checkpoint is left untouched in that case.
    pub fn save(&mut self, session: &Session) -> Result<()> {
        let snapshot = self.snapshot(session);
        let content = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| Error::Checkpoint(format!("Failed to serialize checkpoint: {}", e)))?;

        write_atomic(&self.path, content.as_bytes()).map_err(|e| {
            Error::Checkpoint(format!(
                "Failed to write checkpoint '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        self.saves += 1;
        debug!(
            "Checkpoint saved to {} ({} items)",
            self.path.display(),
            self.transferred_count()
        );
        Ok(())
    }
}

/// Reads a checkpoint file without touching it.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_checkpoint(path: &Path) -> Result<CheckpointFile> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Checkpoint(format!(
            "Failed to read checkpoint '{}': {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Checkpoint(format!(
            "Failed to parse checkpoint '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Writes `bytes` to a sibling temp file, syncs it, then renames it over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = sidecar_path(path, "tmp");
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(bytes)?;
    // Ensure data is on disk before it becomes visible under the real name
    tmp_file.sync_all()?;
    drop(tmp_file);

    fs::rename(&tmp_path, path)
}

/// `<path>.<suffix>`, keeping the original extension.
pub(crate) fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
