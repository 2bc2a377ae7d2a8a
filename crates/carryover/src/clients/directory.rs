//! Local directory destination.
//!
//! Each container is a directory under the configured root. An item becomes
//! `<id>.eml` with the raw content plus `<id>.meta.json` with its metadata.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::checkpoint::write_atomic;
use crate::clients::{DestinationClient, Item, ItemMetadata};
use crate::error::{Error, Result};

/// Configuration for a directory destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Root directory; created on first use.
    pub path: PathBuf,
}

/// Metadata sidecar written next to every payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    /// Source item identifier, unencoded.
    pub id: String,
    /// Preserved metadata.
    #[serde(flatten)]
    pub metadata: ItemMetadata,
}

/// Destination writing items to the local filesystem.
#[derive(Debug, Clone)]
pub struct DirectoryDestination {
    config: DirectoryConfig,
}

impl DirectoryDestination {
    /// Creates the destination. Nothing touches the disk until the first call.
    #[must_use]
    pub fn new(config: DirectoryConfig) -> Self {
        Self { config }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.path
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf> {
        if container.is_empty()
            || container == "."
            || container == ".."
            || container.contains(['/', '\\'])
        {
            return Err(Error::Config(format!(
                "'{}' cannot be used as a directory name",
                container
            )));
        }
        Ok(self.config.path.join(container))
    }

    /// Path of the payload file for `id` inside `container`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `container` is not a usable directory name.
    pub fn item_path(&self, container: &str, id: &str) -> Result<PathBuf> {
        Ok(self
            .container_dir(container)?
            .join(format!("{}.eml", encode_file_name(id))))
    }
}

#[async_trait]
impl DestinationClient for DirectoryDestination {
    fn destination_type(&self) -> &'static str {
        "directory"
    }

    async fn ensure_container(&self, name: &str) -> Result<()> {
        let dir = self.container_dir(name)?;
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::DestinationUnreachable(format!(
                "Failed to create container directory '{}': {}",
                dir.display(),
                e
            ))
        })
    }

    async fn upload_item(&self, container: &str, item: &Item) -> Result<bool> {
        let dir = self.container_dir(container)?;
        if !dir.is_dir() {
            return Err(Error::rejected(
                &item.id,
                format!("container '{}' does not exist", container),
            ));
        }

        let stem = encode_file_name(&item.id);
        let payload_path = dir.join(format!("{}.eml", stem));
        let meta_path = dir.join(format!("{}.meta.json", stem));
        let meta = serde_json::to_vec_pretty(&MetaFile {
            id: item.id.clone(),
            metadata: item.metadata.clone(),
        })?;

        // Payload first: a sidecar never points at a missing payload
        write_atomic(&payload_path, &item.content)?;
        write_atomic(&meta_path, &meta)?;

        debug!("Stored {} in {}", item.id, payload_path.display());
        Ok(true)
    }
}

/// Percent-encodes every byte outside `[A-Za-z0-9._@+=-]`, plus a leading dot.
#[must_use]
pub fn encode_file_name(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for (i, byte) in id.bytes().enumerate() {
        let safe = byte.is_ascii_alphanumeric()
            || matches!(byte, b'_' | b'@' | b'+' | b'=' | b'-')
            || (byte == b'.' && i > 0);
        if safe {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    if out.is_empty() {
        out.push_str("%00");
    }
    out
}
