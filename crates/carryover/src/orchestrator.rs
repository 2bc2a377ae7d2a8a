//! Transfer orchestration.
//!
//! [`Orchestrator::run`] drives one session through
//! `Idle -> MappingCategories -> TransferringCategory -> TransferringItem ->
//! CategoryComplete -> SessionComplete`. Every committed item is recorded in
//! the checkpoint before the next one starts (with the default cadence), so a
//! crash at any point loses at most the item in flight.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::checkpoint::{read_checkpoint, CheckpointStore};
use crate::clients::{create_destination, create_source, DestinationClient, SourceClient};
use crate::config::{TransferConfig, TransferSettings};
use crate::error::{Error, ErrorKind, Result};
use crate::fetcher::BatchFetcher;
use crate::mapping::{CategoryMapper, CategoryMapping};
use crate::retry::{with_retry, RetryPolicy};
use crate::session::Session;

/// Where the orchestrator currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    /// Nothing started yet.
    Idle,
    /// Listing source categories and resolving containers.
    MappingCategories,
    /// Listing items of a category.
    TransferringCategory(String),
    /// Fetching and uploading one item.
    TransferringItem {
        /// Category being transferred.
        category: String,
        /// Item in flight.
        item_id: String,
    },
    /// All pages of a category were processed.
    CategoryComplete(String),
    /// Every category is complete.
    SessionComplete,
    /// The run ended with categories left incomplete.
    Incomplete,
    /// Cancelled at an item boundary.
    Interrupted,
    /// Stopped by a session-fatal error.
    Aborted,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::MappingCategories => write!(f, "mapping categories"),
            Self::TransferringCategory(c) => write!(f, "transferring '{}'", c),
            Self::TransferringItem { category, item_id } => {
                write!(f, "transferring {} in '{}'", item_id, category)
            }
            Self::CategoryComplete(c) => write!(f, "'{}' complete", c),
            Self::SessionComplete => write!(f, "session complete"),
            Self::Incomplete => write!(f, "incomplete"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every category is complete.
    Complete,
    /// At least one category could not be listed and stays incomplete.
    Incomplete,
    /// Cancelled; the checkpoint was saved.
    Interrupted,
    /// A session-fatal error stopped the run.
    Aborted,
}

impl TransferOutcome {
    /// Process exit code for the CLI.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Complete => 0,
            Self::Aborted => 1,
            Self::Incomplete | Self::Interrupted => 2,
        }
    }
}

/// An item that was given up on during this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    /// Category it was listed under.
    pub category: String,
    /// Source item identifier.
    pub item_id: String,
    /// Error code, e.g. `CARRY-006`.
    pub code: &'static str,
    /// Error message.
    pub reason: String,
}

/// Summary of one [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub struct TransferReport {
    /// Session the run belonged to.
    pub session_id: String,
    /// How the run ended.
    pub outcome: TransferOutcome,
    /// Items committed during this run.
    pub transferred: u64,
    /// Items skipped because an earlier run committed them.
    pub duplicates_skipped: u64,
    /// Items given up on.
    pub failed: Vec<FailedItem>,
    /// Categories completed during this run.
    pub categories_completed: Vec<String>,
    /// Categories abandoned because listing failed, with the reason.
    pub categories_aborted: Vec<(String, String)>,
    /// Recorded categories no longer present in the source.
    pub vanished_categories: Vec<String>,
    /// Recorded categories excluded by the current configuration.
    pub excluded_categories: Vec<String>,
    /// Checkpoint writes made during this run.
    pub checkpoint_saves: u64,
    /// Wall-clock duration in seconds.
    pub duration_secs: f64,
}

impl TransferReport {
    fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            outcome: TransferOutcome::Aborted,
            transferred: 0,
            duplicates_skipped: 0,
            failed: Vec::new(),
            categories_completed: Vec::new(),
            categories_aborted: Vec::new(),
            vanished_categories: Vec::new(),
            excluded_categories: Vec::new(),
            checkpoint_saves: 0,
            duration_secs: 0.0,
        }
    }

    /// Items committed per second.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.transferred as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Progress notifications emitted while a run is in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// A session was created or loaded.
    SessionStarted {
        /// Session identifier.
        session_id: String,
        /// Whether it was loaded from a checkpoint.
        resumed: bool,
    },
    /// The mapping is final and every container exists.
    MappingResolved {
        /// Categories to consider in this run.
        categories: usize,
    },
    /// A category is about to be listed.
    CategoryStarted {
        /// Source category.
        category: String,
        /// Destination container.
        container: String,
        /// Items an earlier run already committed.
        already_transferred: usize,
    },
    /// One page of IDs was listed.
    PageListed {
        /// Source category.
        category: String,
        /// IDs on the page.
        items: usize,
    },
    /// An item was committed.
    ItemTransferred {
        /// Source category.
        category: String,
        /// Item identifier.
        item_id: String,
    },
    /// An item was already committed and skipped without a remote call.
    ItemSkipped {
        /// Source category.
        category: String,
        /// Item identifier.
        item_id: String,
    },
    /// An item was given up on.
    ItemFailed {
        /// Source category.
        category: String,
        /// Item identifier.
        item_id: String,
        /// Error message.
        reason: String,
    },
    /// A category finished.
    CategoryCompleted {
        /// Source category.
        category: String,
    },
    /// A category was abandoned for this run.
    CategoryAborted {
        /// Source category.
        category: String,
        /// Error message.
        reason: String,
    },
}

/// Receives [`TransferEvent`]s.
pub trait TransferObserver: Send + Sync {
    /// Called synchronously on the transfer task.
    fn on_event(&self, event: &TransferEvent);
}

impl<F> TransferObserver for F
where
    F: Fn(&TransferEvent) + Send + Sync,
{
    fn on_event(&self, event: &TransferEvent) {
        self(event);
    }
}

/// Per-category numbers of a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPlan {
    /// Source category.
    pub category: String,
    /// Destination container.
    pub container: String,
    /// IDs listed by the source.
    pub total_items: usize,
    /// Of those, already committed.
    pub already_transferred: usize,
    /// Whether the checkpoint marks the category complete.
    pub complete: bool,
}

impl CategoryPlan {
    /// Items a run would still transfer.
    #[must_use]
    pub fn pending(&self) -> usize {
        if self.complete {
            0
        } else {
            self.total_items - self.already_transferred
        }
    }
}

/// Result of [`Orchestrator::plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    /// Session recorded in the checkpoint, if any.
    pub session_id: Option<String>,
    /// Categories in source order.
    pub categories: Vec<CategoryPlan>,
    /// Categories skipped by configuration.
    pub excluded: Vec<String>,
    /// Recorded categories no longer present in the source.
    pub vanished: Vec<String>,
}

impl TransferPlan {
    /// Items listed across all categories.
    #[must_use]
    pub fn total_items(&self) -> usize {
        self.categories.iter().map(|c| c.total_items).sum()
    }

    /// Items a run would transfer.
    #[must_use]
    pub fn pending_items(&self) -> usize {
        self.categories.iter().map(CategoryPlan::pending).sum()
    }
}

/// Where a mapping entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOrigin {
    /// Recorded in the checkpoint by an earlier run.
    Recorded,
    /// Configured override.
    Configured,
    /// Derived from the category name.
    Default,
}

impl fmt::Display for MappingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recorded => write!(f, "checkpoint"),
            Self::Configured => write!(f, "override"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// One row of a mapping preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Source category.
    pub category: String,
    /// Destination container.
    pub container: String,
    /// Where the container name came from.
    pub origin: MappingOrigin,
}

/// Result of [`Orchestrator::preview_mapping`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingPreview {
    /// Entries in source order.
    pub entries: Vec<MappingEntry>,
    /// Categories skipped by configuration.
    pub excluded: Vec<String>,
}

struct Discovery {
    categories: Vec<String>,
    excluded: Vec<String>,
    mapping: CategoryMapping,
}

enum CategoryOutcome {
    Complete,
    Aborted,
    Interrupted,
}

/// Drives a transfer session from a source to a destination.
pub struct Orchestrator {
    source: Arc<dyn SourceClient>,
    destination: Arc<dyn DestinationClient>,
    settings: TransferSettings,
    policy: RetryPolicy,
    mapper: CategoryMapper,
    store: CheckpointStore,
    session: Session,
    state: TransferState,
    report: TransferReport,
    observer: Option<Arc<dyn TransferObserver>>,
    cancel: CancellationToken,
    unsaved_commits: usize,
}

impl Orchestrator {
    /// Creates an orchestrator. Nothing is read or written until [`Self::run`].
    #[must_use]
    pub fn new(
        source: Arc<dyn SourceClient>,
        destination: Arc<dyn DestinationClient>,
        settings: TransferSettings,
    ) -> Self {
        let session = Session::new();
        let report = TransferReport::new(&session.session_id);
        Self {
            source,
            destination,
            policy: RetryPolicy::from(&settings.retry),
            mapper: CategoryMapper::new(settings.mapping.clone()),
            store: CheckpointStore::new(settings.checkpoint_path.clone()),
            settings,
            session,
            state: TransferState::Idle,
            report,
            observer: None,
            cancel: CancellationToken::new(),
            unsaved_commits: 0,
        }
    }

    /// Validates `config` and opens its source and destination.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is invalid or a client
    /// cannot be created.
    pub fn from_config(config: &TransferConfig) -> Result<Self> {
        config.validate()?;
        let source: Arc<dyn SourceClient> = Arc::from(create_source(&config.source)?);
        let destination: Arc<dyn DestinationClient> =
            Arc::from(create_destination(&config.destination)?);
        Ok(Self::new(source, destination, config.settings.clone()))
    }

    /// Sets the event observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl TransferObserver + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Uses `token` for cancellation instead of a private one.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run at the next item boundary.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &TransferState {
        &self.state
    }

    /// Report of the latest run, also after it failed.
    #[must_use]
    pub fn report(&self) -> &TransferReport {
        &self.report
    }

    /// Checkpoint store.
    #[must_use]
    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.store
    }

    /// Transfers every pending item, resuming from the checkpoint if present.
    ///
    /// Per-item failures are recorded in the report and do not fail the run.
    ///
    /// # Errors
    ///
    /// Returns session-fatal and configuration errors. The checkpoint is left
    /// exactly as last saved and [`Self::report`] holds the partial counts.
    pub async fn run(&mut self) -> Result<TransferReport> {
        let start = Instant::now();
        let result = self.execute().await;
        self.report.duration_secs = start.elapsed().as_secs_f64();

        match result {
            Ok(outcome) => {
                self.report.outcome = outcome;
                info!(
                    "Session {} {}: {} transferred, {} skipped, {} failed in {:.2}s ({:.1} items/sec)",
                    self.session.session_id,
                    self.state,
                    self.report.transferred,
                    self.report.duplicates_skipped,
                    self.report.failed.len(),
                    self.report.duration_secs,
                    self.report.throughput()
                );
                Ok(self.report.clone())
            }
            Err(e) => {
                self.state = TransferState::Aborted;
                self.report.outcome = TransferOutcome::Aborted;
                error!(
                    code = e.code(),
                    "Session {} aborted after {} items: {}",
                    self.session.session_id,
                    self.report.transferred,
                    e
                );
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<TransferOutcome> {
        self.state = TransferState::Idle;
        self.unsaved_commits = 0;
        let saves_before = self.store.save_count();

        let resumed = match self.store.load() {
            Some(session) => {
                info!(
                    "Resuming session {} ({}/{} categories complete, {} items transferred)",
                    session.session_id,
                    session.completed_categories,
                    session.total_categories,
                    self.store.transferred_count()
                );
                self.session = session;
                true
            }
            None => {
                self.session = Session::new();
                info!("Starting session {}", self.session.session_id);
                false
            }
        };
        self.report = TransferReport::new(&self.session.session_id);
        self.emit(TransferEvent::SessionStarted {
            session_id: self.session.session_id.clone(),
            resumed,
        });

        let outcome = self.transfer_all().await;
        self.report.checkpoint_saves = self.store.save_count() - saves_before;
        outcome
    }

    async fn transfer_all(&mut self) -> Result<TransferOutcome> {
        let categories = self.resolve_mapping().await?;

        for category in &categories {
            if self.cancel.is_cancelled() {
                return self.interrupt();
            }
            if self.session.is_category_complete(category) {
                debug!("Category '{}' already complete, skipping", category);
                continue;
            }
            match self.transfer_category(category).await? {
                CategoryOutcome::Complete | CategoryOutcome::Aborted => {}
                CategoryOutcome::Interrupted => return self.interrupt(),
            }
        }

        let outcome = if self.session.is_complete() {
            self.state = TransferState::SessionComplete;
            TransferOutcome::Complete
        } else {
            warn!(
                "{} of {} categories remain incomplete",
                self.session.remaining_categories(),
                self.session.total_categories
            );
            self.state = TransferState::Incomplete;
            TransferOutcome::Incomplete
        };
        self.save()?;
        Ok(outcome)
    }

    fn interrupt(&mut self) -> Result<TransferOutcome> {
        info!("Transfer interrupted, saving checkpoint");
        self.state = TransferState::Interrupted;
        self.save()?;
        Ok(TransferOutcome::Interrupted)
    }

    async fn discover(&self, recorded: &CategoryMapping) -> Result<Discovery> {
        let source = Arc::clone(&self.source);
        let listed = with_retry(&self.policy, "list categories", || source.list_categories())
            .await?;
        let excluded = listed
            .iter()
            .filter(|c| self.mapper.is_excluded(c))
            .cloned()
            .collect();
        let categories = self.mapper.filter_excluded(listed);
        let mapping = self.mapper.extend(recorded, &categories);
        Ok(Discovery {
            categories,
            excluded,
            mapping,
        })
    }

    async fn resolve_mapping(&mut self) -> Result<Vec<String>> {
        self.state = TransferState::MappingCategories;
        let recorded = self.store.mapping().clone();
        let Discovery {
            categories,
            mapping,
            ..
        } = self.discover(&recorded).await?;

        let present: HashSet<&str> = categories.iter().map(String::as_str).collect();
        for category in mapping.keys() {
            if present.contains(category.as_str()) || self.session.is_category_complete(category) {
                continue;
            }
            if self.mapper.is_excluded(category) {
                info!(
                    "Category '{}' is now excluded by configuration, treating it as complete",
                    category
                );
                self.report.excluded_categories.push(category.clone());
            } else {
                warn!(
                    "Category '{}' is recorded in the checkpoint but no longer exists in the source, treating it as complete",
                    category
                );
                self.report.vanished_categories.push(category.clone());
            }
            self.session.complete_category(category);
        }

        let destination = Arc::clone(&self.destination);
        for category in &categories {
            let container = container_for(&mapping, category)?;
            let operation = format!("create container '{}'", container);
            with_retry(&self.policy, &operation, || {
                destination.ensure_container(container)
            })
            .await?;
        }

        self.session.total_categories = mapping.len();
        info!(
            "Mapped {} categories ({} to transfer)",
            mapping.len(),
            self.session.remaining_categories()
        );
        self.store.set_mapping(mapping);
        self.save()?;
        self.emit(TransferEvent::MappingResolved {
            categories: categories.len(),
        });
        Ok(categories)
    }

    async fn transfer_category(&mut self, category: &str) -> Result<CategoryOutcome> {
        let container = container_for(self.store.mapping(), category)?.to_string();
        let already = self.store.transferred_in(category);

        self.state = TransferState::TransferringCategory(category.to_string());
        self.session.current_category = Some(category.to_string());
        info!(
            "Transferring '{}' -> '{}' ({} already transferred)",
            category, container, already
        );
        self.emit(TransferEvent::CategoryStarted {
            category: category.to_string(),
            container: container.clone(),
            already_transferred: already,
        });
        self.save()?;

        let source = Arc::clone(&self.source);
        let destination = Arc::clone(&self.destination);
        let policy = self.policy.clone();
        let fetcher = BatchFetcher::new(source.as_ref(), &policy, self.settings.page_size);
        let mut cursor = fetcher.cursor(category);

        loop {
            let ids = match cursor.next_page().await {
                Ok(Some(ids)) => ids,
                Ok(None) => break,
                Err(e) if is_scoped_to_category(&e) => {
                    warn!(
                        "Listing '{}' failed, leaving it incomplete for the next run: {}",
                        category, e
                    );
                    self.report
                        .categories_aborted
                        .push((category.to_string(), e.to_string()));
                    self.emit(TransferEvent::CategoryAborted {
                        category: category.to_string(),
                        reason: e.to_string(),
                    });
                    self.save()?;
                    return Ok(CategoryOutcome::Aborted);
                }
                Err(e) => return Err(e),
            };
            self.emit(TransferEvent::PageListed {
                category: category.to_string(),
                items: ids.len(),
            });

            for id in ids {
                if self.cancel.is_cancelled() {
                    return Ok(CategoryOutcome::Interrupted);
                }
                if self.store.is_transferred(category, &id) {
                    debug!("Skipping {} in '{}', already transferred", id, category);
                    self.report.duplicates_skipped += 1;
                    self.emit(TransferEvent::ItemSkipped {
                        category: category.to_string(),
                        item_id: id,
                    });
                    continue;
                }

                self.state = TransferState::TransferringItem {
                    category: category.to_string(),
                    item_id: id.clone(),
                };
                let result =
                    transfer_item(source.as_ref(), destination.as_ref(), &policy, &container, &id)
                        .await;

                match result {
                    Ok(()) => self.commit(category, id)?,
                    Err(e) if e.kind() == ErrorKind::PerItemFatal => {
                        warn!(
                            code = e.code(),
                            "Giving up on {} in '{}': {}", id, category, e
                        );
                        self.store.mark_failed(category, &id, e.to_string());
                        self.report.failed.push(FailedItem {
                            category: category.to_string(),
                            item_id: id.clone(),
                            code: e.code(),
                            reason: e.to_string(),
                        });
                        self.emit(TransferEvent::ItemFailed {
                            category: category.to_string(),
                            item_id: id,
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        self.session.complete_category(category);
        self.state = TransferState::CategoryComplete(category.to_string());
        self.report.categories_completed.push(category.to_string());
        info!(
            "Category '{}' complete ({}/{})",
            category, self.session.completed_categories, self.session.total_categories
        );
        self.emit(TransferEvent::CategoryCompleted {
            category: category.to_string(),
        });
        self.save()?;
        Ok(CategoryOutcome::Complete)
    }

    fn commit(&mut self, category: &str, item_id: String) -> Result<()> {
        self.store.mark_transferred(category, &item_id);
        self.report.transferred += 1;
        debug!("Transferred {} in '{}'", item_id, category);
        self.emit(TransferEvent::ItemTransferred {
            category: category.to_string(),
            item_id,
        });

        self.unsaved_commits += 1;
        if self.unsaved_commits >= self.settings.checkpoint_interval.max(1) {
            self.save()?;
        }
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        self.store.save(&self.session)?;
        self.unsaved_commits = 0;
        Ok(())
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(&event);
        }
    }

    /// Counts pending and already-transferred items without changing anything.
    ///
    /// No item is fetched, no container is created and the checkpoint is
    /// only read.
    ///
    /// # Errors
    ///
    /// Returns session-fatal listing errors.
    pub async fn plan(&self) -> Result<TransferPlan> {
        let recorded = match read_checkpoint(self.store.path()) {
            Ok(file) => Some(file),
            Err(e) => {
                debug!("Planning without checkpoint: {}", e);
                None
            }
        };
        let recorded_mapping = recorded
            .as_ref()
            .map(|f| f.category_mapping.clone())
            .unwrap_or_default();
        let discovery = self.discover(&recorded_mapping).await?;

        let fetcher = BatchFetcher::new(
            self.source.as_ref(),
            &self.policy,
            self.settings.page_size,
        );
        let empty = BTreeSet::new();
        let mut categories = Vec::with_capacity(discovery.categories.len());
        for category in &discovery.categories {
            let done = recorded
                .as_ref()
                .and_then(|f| f.transferred_items.get(category))
                .unwrap_or(&empty);

            let mut cursor = fetcher.cursor(category.as_str());
            let mut total_items = 0;
            let mut already_transferred = 0;
            while let Some(ids) = cursor.next_page().await? {
                total_items += ids.len();
                already_transferred += ids.iter().filter(|id| done.contains(*id)).count();
            }

            categories.push(CategoryPlan {
                category: category.clone(),
                container: container_for(&discovery.mapping, category)?.to_string(),
                total_items,
                already_transferred,
                complete: recorded
                    .as_ref()
                    .is_some_and(|f| f.session.is_category_complete(category)),
            });
        }

        let present: HashSet<&str> = discovery.categories.iter().map(String::as_str).collect();
        let vanished = recorded_mapping
            .keys()
            .filter(|c| !present.contains(c.as_str()) && !self.mapper.is_excluded(c))
            .cloned()
            .collect();

        Ok(TransferPlan {
            session_id: recorded.map(|f| f.session.session_id),
            categories,
            excluded: discovery.excluded,
            vanished,
        })
    }

    /// Resolves the category mapping the next run would use.
    ///
    /// # Errors
    ///
    /// Returns listing errors.
    pub async fn preview_mapping(&self) -> Result<MappingPreview> {
        let recorded = read_checkpoint(self.store.path())
            .map(|f| f.category_mapping)
            .unwrap_or_default();
        let discovery = self.discover(&recorded).await?;

        let mut entries = Vec::with_capacity(discovery.categories.len());
        for category in &discovery.categories {
            let origin = if recorded.contains_key(category) {
                MappingOrigin::Recorded
            } else if self.mapper.override_for(category).is_some() {
                MappingOrigin::Configured
            } else {
                MappingOrigin::Default
            };
            entries.push(MappingEntry {
                category: category.clone(),
                container: container_for(&discovery.mapping, category)?.to_string(),
                origin,
            });
        }

        Ok(MappingPreview {
            entries,
            excluded: discovery.excluded,
        })
    }
}

async fn transfer_item(
    source: &dyn SourceClient,
    destination: &dyn DestinationClient,
    policy: &RetryPolicy,
    container: &str,
    id: &str,
) -> Result<()> {
    let item = with_retry(policy, &format!("fetch {}", id), || source.fetch_item(id)).await?;
    let committed = with_retry(policy, &format!("upload {}", id), || {
        destination.upload_item(container, &item)
    })
    .await?;
    if committed {
        Ok(())
    } else {
        Err(Error::NotCommitted(id.to_string()))
    }
}

fn container_for<'m>(mapping: &'m CategoryMapping, category: &str) -> Result<&'m str> {
    mapping
        .get(category)
        .map(String::as_str)
        .ok_or_else(|| Error::Config(format!("No container mapped for '{}'", category)))
}

/// Listing failures that abandon one category instead of the whole run.
fn is_scoped_to_category(error: &Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::Transient | ErrorKind::PerItemFatal
    )
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
