//! Source and destination collaborators.
//!
//! The engine only talks to the [`SourceClient`] and [`DestinationClient`]
//! traits. Implementations report raw errors; classifying and retrying them
//! is the caller's job.

pub mod directory;
pub mod json_file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::{DestinationConfig, SourceConfig};
use crate::error::Result;

/// Flag set on items that have been read.
pub const FLAG_SEEN: &str = "\\Seen";
/// Flag set on starred / flagged items.
pub const FLAG_FLAGGED: &str = "\\Flagged";

/// Metadata preserved across the transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    /// Flags such as `\Seen` or `\Flagged`.
    #[serde(default)]
    pub flags: BTreeSet<String>,
    /// Original timestamp, when the source knows it.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Content size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// A single transferable unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// Source-assigned identifier, stable across retries and runs.
    pub id: String,
    /// Opaque payload.
    pub content: Vec<u8>,
    /// Preserved metadata.
    pub metadata: ItemMetadata,
}

impl Item {
    /// Creates an item; `metadata.size` is set from the content length.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        content: impl Into<Vec<u8>>,
        flags: BTreeSet<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            metadata: ItemMetadata {
                flags,
                timestamp,
                size: content.len() as u64,
            },
            content,
        }
    }
}

/// One page of item identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Identifiers in source order.
    pub ids: Vec<String>,
    /// Token for the next page; `None` once the category is exhausted.
    pub next_token: Option<String>,
}

/// Where items come from.
///
/// Rate-limit and transient failures must be reported as
/// [`Error::RateLimited`] / [`Error::Transient`], distinct from
/// [`Error::Authentication`] / [`Error::PermissionDenied`].
///
/// [`Error::RateLimited`]: crate::error::Error::RateLimited
/// [`Error::Transient`]: crate::error::Error::Transient
/// [`Error::Authentication`]: crate::error::Error::Authentication
/// [`Error::PermissionDenied`]: crate::error::Error::PermissionDenied
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Get the source type name.
    fn source_type(&self) -> &'static str;

    /// All category names, in source order.
    async fn list_categories(&self) -> Result<Vec<String>>;

    /// One page of item IDs for `category`, starting at `page_token`.
    async fn list_item_page(
        &self,
        category: &str,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<Page>;

    /// Fetches the full item.
    async fn fetch_item(&self, id: &str) -> Result<Item>;
}

/// Where items go.
///
/// Uploading the same item twice must be safe; the destination is not
/// expected to deduplicate.
#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// Get the destination type name.
    fn destination_type(&self) -> &'static str;

    /// Creates `name` if it does not exist yet.
    async fn ensure_container(&self, name: &str) -> Result<()>;

    /// Stores `item` in `container`. `Ok(true)` means durably committed.
    async fn upload_item(&self, container: &str, item: &Item) -> Result<bool>;
}

/// Create a source client from configuration.
///
/// # Errors
///
/// Returns an error if the source cannot be opened.
pub fn create_source(config: &SourceConfig) -> Result<Box<dyn SourceClient>> {
    match config {
        SourceConfig::JsonFile(cfg) => Ok(Box::new(json_file::JsonFileSource::open(cfg)?)),
    }
}

/// Create a destination client from configuration.
///
/// # Errors
///
/// Returns an error if the destination cannot be prepared.
pub fn create_destination(config: &DestinationConfig) -> Result<Box<dyn DestinationClient>> {
    match config {
        DestinationConfig::Directory(cfg) => {
            Ok(Box::new(directory::DirectoryDestination::new(cfg.clone())))
        }
    }
}
