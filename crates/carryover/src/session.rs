//! Run-level progress metadata.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One logical transfer run, resumable across process restarts.
///
/// Owned by the orchestrator and handed to the checkpoint store by reference
/// on every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque identifier derived from the creation time.
    pub session_id: String,
    /// Number of categories known to this session.
    pub total_categories: usize,
    /// Number of categories fully processed.
    pub completed_categories: usize,
    /// Category being transferred, if any.
    pub current_category: Option<String>,
    /// Names of fully processed categories.
    #[serde(default)]
    pub completed: BTreeSet<String>,
}

impl Session {
    /// Starts a fresh session identified by the current UTC time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string())
    }

    /// Starts a fresh session with a caller-chosen identifier.
    #[must_use]
    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            total_categories: 0,
            completed_categories: 0,
            current_category: None,
            completed: BTreeSet::new(),
        }
    }

    /// Whether `category` has been fully processed.
    #[must_use]
    pub fn is_category_complete(&self, category: &str) -> bool {
        self.completed.contains(category)
    }

    /// Records `category` as complete. Returns `false` if it already was.
    pub fn complete_category(&mut self, category: &str) -> bool {
        if self.current_category.as_deref() == Some(category) {
            self.current_category = None;
        }
        let inserted = self.completed.insert(category.to_string());
        self.completed_categories = self.completed.len();
        inserted
    }

    /// Whether every known category is complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_categories >= self.total_categories
    }

    /// Categories still to process.
    #[must_use]
    pub fn remaining_categories(&self) -> usize {
        self.total_categories.saturating_sub(self.completed_categories)
    }

    /// Restores the count/name invariant after loading older or hand-edited files.
    pub(crate) fn normalize(&mut self) {
        self.completed_categories = self.completed.len();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
