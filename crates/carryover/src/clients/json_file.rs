//! JSON export file source.
//!
//! Expected layout:
//!
//! ```json
//! {
//!   "categories": [
//!     { "name": "INBOX", "items": [ { "id": "m1", "content": "...", "flags": ["\\Seen"] } ] }
//!   ]
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::clients::{Item, Page, SourceClient};
use crate::error::{Error, Result};

/// Configuration for a JSON export source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFileConfig {
    /// Path to the export file.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ExportFile {
    #[serde(default)]
    categories: Vec<ExportCategory>,
}

#[derive(Debug, Deserialize)]
struct ExportCategory {
    name: String,
    #[serde(default)]
    items: Vec<ExportItem>,
}

#[derive(Debug, Deserialize)]
struct ExportItem {
    id: String,
    content: String,
    #[serde(default)]
    flags: BTreeSet<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Source reading every category from one JSON export file.
///
/// The file is read once on [`JsonFileSource::open`]. An item listed in
/// several categories is stored once and served under its single ID.
pub struct JsonFileSource {
    categories: Vec<(String, Vec<String>)>,
    items: HashMap<String, Item>,
}

impl JsonFileSource {
    /// Reads and indexes the export file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is missing or not a valid export.
    pub fn open(config: &JsonFileConfig) -> Result<Self> {
        let file = File::open(&config.path).map_err(|e| {
            Error::Config(format!(
                "Failed to open JSON export '{}': {}",
                config.path.display(),
                e
            ))
        })?;

        let export: ExportFile = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            Error::Config(format!(
                "Failed to parse JSON export '{}': {}",
                config.path.display(),
                e
            ))
        })?;

        let source = Self::from_export(export);
        debug!(
            "Loaded {} categories and {} items from {}",
            source.categories.len(),
            source.items.len(),
            config.path.display()
        );
        Ok(source)
    }

    fn from_export(export: ExportFile) -> Self {
        let mut categories = Vec::with_capacity(export.categories.len());
        let mut items: HashMap<String, Item> = HashMap::new();

        for category in export.categories {
            let mut ids = Vec::with_capacity(category.items.len());
            for raw in category.items {
                ids.push(raw.id.clone());
                if let Some(existing) = items.get(&raw.id) {
                    if existing.content.as_slice() != raw.content.as_bytes() {
                        warn!(
                            "Item '{}' appears with different content in '{}', keeping the first copy",
                            raw.id, category.name
                        );
                    }
                    continue;
                }
                let item = Item::new(raw.id.clone(), raw.content, raw.flags, raw.timestamp);
                items.insert(raw.id, item);
            }
            categories.push((category.name, ids));
        }

        Self { categories, items }
    }

    /// Total number of distinct items in the export.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

#[async_trait]
impl SourceClient for JsonFileSource {
    fn source_type(&self) -> &'static str {
        "json_file"
    }

    async fn list_categories(&self) -> Result<Vec<String>> {
        Ok(self.categories.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn list_item_page(
        &self,
        category: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<Page> {
        let Some((_, ids)) = self.categories.iter().find(|(name, _)| name == category) else {
            return Ok(Page::default());
        };

        let start = match page_token {
            Some(token) => token.parse::<usize>().map_err(|_| {
                Error::Config(format!("Invalid page token '{}' for '{}'", token, category))
            })?,
            None => 0,
        };
        let start = start.min(ids.len());
        let end = (start + page_size.max(1)).min(ids.len());

        Ok(Page {
            ids: ids[start..end].to_vec(),
            next_token: if end < ids.len() {
                Some(end.to_string())
            } else {
                None
            },
        })
    }

    async fn fetch_item(&self, id: &str) -> Result<Item> {
        self.items
            .get(id)
            .cloned()
            .ok_or_else(|| Error::malformed(id, "not present in the export file"))
    }
}

#[cfg(test)]
#[path = "json_file_tests.rs"]
mod tests;
