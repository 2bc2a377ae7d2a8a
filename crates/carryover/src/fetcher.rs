//! Paginated listing of item identifiers.

use tracing::debug;

use crate::clients::{Page, SourceClient};
use crate::error::Result;
use crate::retry::{with_retry, RetryPolicy};

/// Lists item IDs from a source one page at a time, with retries.
pub struct BatchFetcher<'a> {
    source: &'a dyn SourceClient,
    policy: &'a RetryPolicy,
    page_size: usize,
}

impl<'a> BatchFetcher<'a> {
    /// Creates a fetcher requesting `page_size` IDs per call.
    #[must_use]
    pub fn new(source: &'a dyn SourceClient, policy: &'a RetryPolicy, page_size: usize) -> Self {
        Self {
            source,
            policy,
            page_size: page_size.max(1),
        }
    }

    /// Configured page size.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetches one page. Listing calls are retried like any remote call.
    ///
    /// # Errors
    ///
    /// Returns the source error if it is not retryable, or
    /// [`Error::RetriesExhausted`](crate::error::Error::RetriesExhausted).
    pub async fn fetch_batch(&self, category: &str, page_token: Option<&str>) -> Result<Page> {
        let operation = format!("list '{}'", category);
        let page = with_retry(self.policy, &operation, || {
            self.source
                .list_item_page(category, page_token, self.page_size)
        })
        .await?;
        debug!(
            "Listed {} IDs from '{}' (more: {})",
            page.ids.len(),
            category,
            page.next_token.is_some()
        );
        Ok(page)
    }

    /// Cursor over every page of `category`.
    #[must_use]
    pub fn cursor(&self, category: impl Into<String>) -> CategoryCursor<'_, 'a> {
        CategoryCursor {
            fetcher: self,
            category: category.into(),
            next_token: None,
            exhausted: false,
            pages: 0,
        }
    }
}

/// Lazy page cursor over a single category.
///
/// A failed [`CategoryCursor::next_page`] leaves the cursor where it was, so
/// calling it again retries the same page.
pub struct CategoryCursor<'f, 'a> {
    fetcher: &'f BatchFetcher<'a>,
    category: String,
    next_token: Option<String>,
    exhausted: bool,
    pages: usize,
}

impl CategoryCursor<'_, '_> {
    /// Next page of IDs, or `None` once the category is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates [`BatchFetcher::fetch_batch`] errors.
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>> {
        if self.exhausted {
            return Ok(None);
        }
        let page = self
            .fetcher
            .fetch_batch(&self.category, self.next_token.as_deref())
            .await?;
        self.pages += 1;
        self.exhausted = page.next_token.is_none();
        self.next_token = page.next_token;
        Ok(Some(page.ids))
    }

    /// Starts over from the first page.
    pub fn restart(&mut self) {
        self.next_token = None;
        self.exhausted = false;
        self.pages = 0;
    }

    /// Category this cursor walks.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Pages returned so far.
    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::memory::{Fault, MemorySource};
    use crate::error::Error;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("m{}", i)).collect()
    }

    fn source_with(n: usize) -> MemorySource {
        let ids = ids(n);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        MemorySource::new().with_category("INBOX", &refs)
    }

    #[tokio::test]
    async fn test_cursor_walks_all_pages_in_order() {
        let source = source_with(5);
        let policy = RetryPolicy::no_retry();
        let fetcher = BatchFetcher::new(&source, &policy, 2);
        let mut cursor = fetcher.cursor("INBOX");

        let mut seen = Vec::new();
        while let Some(page) = cursor.next_page().await.unwrap() {
            assert!(page.len() <= 2);
            seen.extend(page);
        }

        assert_eq!(seen, ids(5));
        assert_eq!(cursor.pages_fetched(), 3);
        assert!(cursor.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cursor_restart() {
        let source = source_with(3);
        let policy = RetryPolicy::no_retry();
        let fetcher = BatchFetcher::new(&source, &policy, 10);
        let mut cursor = fetcher.cursor("INBOX");

        let first = cursor.next_page().await.unwrap().unwrap();
        assert!(cursor.next_page().await.unwrap().is_none());

        cursor.restart();
        assert_eq!(cursor.next_page().await.unwrap().unwrap(), first);
    }

    #[tokio::test]
    async fn test_empty_category_yields_one_empty_page() {
        let source = MemorySource::new().with_category("Empty", &[]);
        let policy = RetryPolicy::no_retry();
        let fetcher = BatchFetcher::new(&source, &policy, 10);
        let mut cursor = fetcher.cursor("Empty");

        assert_eq!(cursor.next_page().await.unwrap(), Some(vec![]));
        assert_eq!(cursor.next_page().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_is_retried() {
        let source = source_with(3);
        source.fail_listing("INBOX", Fault::RateLimited, Some(2));
        let policy = RetryPolicy::default();
        let fetcher = BatchFetcher::new(&source, &policy, 10);

        let page = fetcher.fetch_batch("INBOX", None).await.unwrap();

        assert_eq!(page.ids.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_page_can_be_requested_again() {
        let source = source_with(3);
        source.fail_listing("INBOX", Fault::PermissionDenied, Some(1));
        let policy = RetryPolicy::default();
        let fetcher = BatchFetcher::new(&source, &policy, 10);
        let mut cursor = fetcher.cursor("INBOX");

        assert!(matches!(
            cursor.next_page().await,
            Err(Error::PermissionDenied(_))
        ));
        assert_eq!(cursor.next_page().await.unwrap().unwrap().len(), 3);
    }

    #[test]
    fn test_zero_page_size_is_clamped() {
        let source = MemorySource::new();
        let policy = RetryPolicy::no_retry();

        assert_eq!(BatchFetcher::new(&source, &policy, 0).page_size(), 1);
    }
}
