// Transfer tool - pedantic lints relaxed for CLI ergonomics
#![allow(clippy::pedantic)]

//! # carryover
//!
//! `carryover` is a CLI tool and library for moving large, categorized
//! collections of items (mail labels, folders) from a source system into a
//! destination system. Runs survive crashes and network failures: every
//! committed item is checkpointed, and a restarted run skips what is already
//! there.
//!
//! ## Pieces
//!
//! | Module | Role |
//! |--------|------|
//! | [`checkpoint`] | Durable per-category sets of transferred item IDs |
//! | [`mapping`] | Category name to container name translation |
//! | [`retry`] | Bounded retry with exponential backoff |
//! | [`fetcher`] | Paginated listing of item IDs |
//! | [`orchestrator`] | The state machine driving a run |
//!
//! ## Quick Start
//!
//! ```bash
//! carryover init --output transfer.yaml
//! carryover plan --config transfer.yaml
//! carryover run --config transfer.yaml
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! source:
//!   type: json_file
//!   path: ./export.json
//!
//! destination:
//!   type: directory
//!   path: ./mail
//!
//! settings:
//!   page_size: 50
//!   checkpoint_path: progress.json
//!   mapping:
//!     overrides:
//!       "[Gmail]/Sent Mail": Sent
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use std::sync::Arc;
//! use carryover::clients::memory::{MemoryDestination, MemorySource};
//! use carryover::{Orchestrator, TransferSettings};
//!
//! # async fn demo() -> carryover::Result<()> {
//! let source = Arc::new(MemorySource::new().with_category("INBOX", &["m1", "m2"]));
//! let destination = Arc::new(MemoryDestination::new());
//! let mut orchestrator = Orchestrator::new(source, destination, TransferSettings::default());
//! let report = orchestrator.run().await?;
//! println!("{} transferred", report.transferred);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod checkpoint;
pub mod clients;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod mapping;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod session;

pub use checkpoint::{CheckpointFile, CheckpointStore};
pub use clients::{DestinationClient, Item, ItemMetadata, Page, SourceClient};
pub use config::{MappingSettings, RetrySettings, TransferConfig, TransferSettings};
pub use error::{Error, ErrorKind, Result};
pub use fetcher::BatchFetcher;
pub use mapping::{CategoryMapper, CategoryMapping};
pub use orchestrator::{
    Orchestrator, TransferEvent, TransferObserver, TransferOutcome, TransferReport, TransferState,
};
pub use progress::ProgressReporter;
pub use retry::{with_retry, RetryPolicy};
pub use session::Session;
