//! In-memory source and destination with scriptable failures.
//!
//! Used by the test suite and handy for embedding the engine without any
//! remote system.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use crate::clients::{DestinationClient, Item, Page, SourceClient};
use crate::error::{Error, Result};

/// A failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// [`Error::Transient`].
    Transient,
    /// [`Error::RateLimited`].
    RateLimited,
    /// [`Error::Authentication`].
    Authentication,
    /// [`Error::PermissionDenied`].
    PermissionDenied,
    /// [`Error::MalformedItem`].
    Malformed,
    /// [`Error::Rejected`].
    Rejected,
    /// [`Error::DestinationUnreachable`].
    Unreachable,
    /// Upload returns `Ok(false)`.
    NotCommitted,
}

impl Fault {
    fn to_error(self, subject: &str) -> Error {
        match self {
            Self::Transient => {
                Error::Transient(format!("connection reset while handling {subject}"))
            }
            Self::RateLimited => Error::RateLimited(format!("429 while handling {subject}")),
            Self::Authentication => Error::Authentication("token expired".to_string()),
            Self::PermissionDenied => {
                Error::PermissionDenied(format!("access to {subject} denied"))
            }
            Self::Malformed => Error::malformed(subject, "payload could not be decoded"),
            Self::Rejected => Error::rejected(subject, "message too large"),
            Self::Unreachable => Error::DestinationUnreachable("connection refused".to_string()),
            Self::NotCommitted => Error::NotCommitted(subject.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Script {
    fault: Fault,
    /// `None` fails forever.
    remaining: Option<u32>,
}

impl Script {
    /// Consumes one scheduled failure, if any is left.
    fn fire(&mut self) -> Option<Fault> {
        match &mut self.remaining {
            None => Some(self.fault),
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(self.fault)
            }
        }
    }
}

/// Source backed by a fixed list of categories.
#[derive(Debug, Default)]
pub struct MemorySource {
    categories: Vec<(String, Vec<Item>)>,
    fetch_faults: Mutex<HashMap<String, Script>>,
    listing_faults: Mutex<HashMap<String, Script>>,
    fetch_calls: Mutex<Vec<String>>,
}

impl MemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a category whose items carry only their ID as content.
    #[must_use]
    pub fn with_category(mut self, name: &str, ids: &[&str]) -> Self {
        let items = ids
            .iter()
            .map(|id| {
                let content = format!("Subject: {id}\r\n\r\nbody of {id}");
                Item::new(*id, content, BTreeSet::new(), None)
            })
            .collect();
        self.categories.push((name.to_string(), items));
        self
    }

    /// Adds a category with fully specified items.
    #[must_use]
    pub fn with_items(mut self, name: &str, items: Vec<Item>) -> Self {
        self.categories.push((name.to_string(), items));
        self
    }

    /// Makes `fetch_item(id)` fail `times` times (`None` = always).
    pub fn fail_fetch(&self, id: &str, fault: Fault, times: Option<u32>) {
        lock(&self.fetch_faults).insert(
            id.to_string(),
            Script {
                fault,
                remaining: times,
            },
        );
    }

    /// Makes `list_item_page(category, ..)` fail `times` times (`None` = always).
    pub fn fail_listing(&self, category: &str, fault: Fault, times: Option<u32>) {
        lock(&self.listing_faults).insert(
            category.to_string(),
            Script {
                fault,
                remaining: times,
            },
        );
    }

    /// IDs passed to `fetch_item`, in call order, failed calls included.
    #[must_use]
    pub fn fetch_calls(&self) -> Vec<String> {
        lock(&self.fetch_calls).clone()
    }

    fn find(&self, id: &str) -> Option<&Item> {
        self.categories
            .iter()
            .flat_map(|(_, items)| items.iter())
            .find(|item| item.id == id)
    }
}

#[async_trait]
impl SourceClient for MemorySource {
    fn source_type(&self) -> &'static str {
        "memory"
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
        if let Some(fault) = lock(&self.listing_faults)
            .get_mut(category)
            .and_then(Script::fire)
        {
            return Err(fault.to_error(category));
        }

        let items = self
            .categories
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, items)| items.as_slice())
            .unwrap_or_default();

        let start = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::Transient(format!("invalid page token '{token}'")))?,
            None => 0,
        };
        let start = start.min(items.len());
        let end = (start + page_size.max(1)).min(items.len());

        Ok(Page {
            ids: items[start..end].iter().map(|item| item.id.clone()).collect(),
            next_token: (end < items.len()).then(|| end.to_string()),
        })
    }

    async fn fetch_item(&self, id: &str) -> Result<Item> {
        lock(&self.fetch_calls).push(id.to_string());

        if let Some(fault) = lock(&self.fetch_faults).get_mut(id).and_then(Script::fire) {
            return Err(fault.to_error(id));
        }

        self.find(id)
            .cloned()
            .ok_or_else(|| Error::malformed(id, "no such item"))
    }
}

/// Destination that keeps uploaded items in memory.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    containers: Mutex<BTreeMap<String, Vec<Item>>>,
    upload_faults: Mutex<HashMap<String, Script>>,
    container_faults: Mutex<HashMap<String, Script>>,
    crash_after: Mutex<Option<(usize, Fault)>>,
    uploads: Mutex<usize>,
}

impl MemoryDestination {
    /// Creates an empty destination.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes uploads of item `id` fail `times` times (`None` = always).
    pub fn fail_upload(&self, id: &str, fault: Fault, times: Option<u32>) {
        lock(&self.upload_faults).insert(
            id.to_string(),
            Script {
                fault,
                remaining: times,
            },
        );
    }

    /// Makes `ensure_container(name)` fail `times` times (`None` = always).
    pub fn fail_container(&self, name: &str, fault: Fault, times: Option<u32>) {
        lock(&self.container_faults).insert(
            name.to_string(),
            Script {
                fault,
                remaining: times,
            },
        );
    }

    /// After `committed` successful uploads, every further upload fails with `fault`.
    pub fn crash_after(&self, committed: usize, fault: Fault) {
        *lock(&self.crash_after) = Some((committed, fault));
    }

    /// Clears [`Self::crash_after`].
    pub fn recover(&self) {
        *lock(&self.crash_after) = None;
    }

    /// Number of committed uploads, duplicates included.
    #[must_use]
    pub fn upload_count(&self) -> usize {
        *lock(&self.uploads)
    }

    /// Item IDs stored in `container`, in upload order.
    #[must_use]
    pub fn item_ids(&self, container: &str) -> Vec<String> {
        lock(&self.containers)
            .get(container)
            .map(|items| items.iter().map(|item| item.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Stored copy of an item.
    #[must_use]
    pub fn item(&self, container: &str, id: &str) -> Option<Item> {
        lock(&self.containers)
            .get(container)
            .and_then(|items| items.iter().find(|item| item.id == id).cloned())
    }

    /// Names of existing containers.
    #[must_use]
    pub fn container_names(&self) -> Vec<String> {
        lock(&self.containers).keys().cloned().collect()
    }
}

#[async_trait]
impl DestinationClient for MemoryDestination {
    fn destination_type(&self) -> &'static str {
        "memory"
    }

    async fn ensure_container(&self, name: &str) -> Result<()> {
        if let Some(fault) = lock(&self.container_faults)
            .get_mut(name)
            .and_then(Script::fire)
        {
            return Err(fault.to_error(name));
        }
        lock(&self.containers).entry(name.to_string()).or_default();
        Ok(())
    }

    async fn upload_item(&self, container: &str, item: &Item) -> Result<bool> {
        if let Some((limit, fault)) = *lock(&self.crash_after) {
            if *lock(&self.uploads) >= limit {
                return Err(fault.to_error(&item.id));
            }
        }

        if let Some(fault) = lock(&self.upload_faults)
            .get_mut(&item.id)
            .and_then(Script::fire)
        {
            if fault == Fault::NotCommitted {
                return Ok(false);
            }
            return Err(fault.to_error(&item.id));
        }

        let mut containers = lock(&self.containers);
        let Some(items) = containers.get_mut(container) else {
            return Err(Error::rejected(
                &item.id,
                format!("container '{container}' does not exist"),
            ));
        };
        items.push(item.clone());
        *lock(&self.uploads) += 1;
        Ok(true)
    }
}

/// Poison-tolerant lock.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_pages() {
        let source = MemorySource::new().with_category("INBOX", &["m1", "m2", "m3"]);

        let first = source.list_item_page("INBOX", None, 2).await.unwrap();
        let second = source
            .list_item_page("INBOX", first.next_token.as_deref(), 2)
            .await
            .unwrap();

        assert_eq!(first.ids, vec!["m1", "m2"]);
        assert_eq!(first.next_token.as_deref(), Some("2"));
        assert_eq!(second.ids, vec!["m3"]);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn test_memory_source_unknown_category_is_empty() {
        let source = MemorySource::new();

        let page = source.list_item_page("nope", None, 10).await.unwrap();

        assert!(page.ids.is_empty());
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_scripted_fetch_failure_runs_out() {
        let source = MemorySource::new().with_category("INBOX", &["m1"]);
        source.fail_fetch("m1", Fault::Transient, Some(1));

        assert!(matches!(
            source.fetch_item("m1").await,
            Err(Error::Transient(_))
        ));
        assert!(source.fetch_item("m1").await.is_ok());
        assert_eq!(source.fetch_calls(), vec!["m1", "m1"]);
    }

    #[tokio::test]
    async fn test_memory_destination_requires_container() {
        let destination = MemoryDestination::new();
        let item = Item::new("m1", b"x".to_vec(), BTreeSet::new(), None);

        assert!(destination.upload_item("INBOX", &item).await.is_err());

        destination.ensure_container("INBOX").await.unwrap();
        assert!(destination.upload_item("INBOX", &item).await.unwrap());
        assert_eq!(destination.item_ids("INBOX"), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_crash_after_and_recover() {
        let destination = MemoryDestination::new();
        destination.ensure_container("INBOX").await.unwrap();
        destination.crash_after(1, Fault::Unreachable);
        let a = Item::new("a", b"x".to_vec(), BTreeSet::new(), None);
        let b = Item::new("b", b"x".to_vec(), BTreeSet::new(), None);

        assert!(destination.upload_item("INBOX", &a).await.unwrap());
        assert!(matches!(
            destination.upload_item("INBOX", &b).await,
            Err(Error::DestinationUnreachable(_))
        ));

        destination.recover();
        assert!(destination.upload_item("INBOX", &b).await.unwrap());
        assert_eq!(destination.upload_count(), 2);
    }
}
