//! The document backend seam.
//!
//! The editor never talks to a concrete service; it is handed an
//! `Arc<dyn DocumentBackend>`. Calls are not assumed idempotent, so nothing in
//! this crate retries them.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use hanji_blocks::{Document, Patch, Target};
use hanji_search::{CompoundFilter, FilterContext, Matcher, SortDirection};
use hanji_types::Page;

use crate::error::RemoteError;

// ============================================================================
// Query types
// ============================================================================

/// Sort key for page queries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", content = "name", rename_all = "snake_case")]
pub enum PageSortKey {
    Title,
    Created,
    Modified,
    /// Sort by a property's display text.
    Property(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSort {
    pub key: PageSortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

/// One `query_pages` request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub filter: Option<CompoundFilter>,
    /// Applied in order: the first key is primary.
    #[serde(default)]
    pub sorts: Vec<PageSort>,
    pub page_size: usize,
    /// Opaque continuation token from the previous batch.
    #[serde(default)]
    pub cursor: Option<String>,
}

/// One page of results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageBatch {
    pub items: Vec<Page>,
    /// `None` when there is nothing more to fetch.
    pub next_cursor: Option<String>,
}

// ============================================================================
// Trait
// ============================================================================

/// Remote document/CRM service.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Persist one patch. Not idempotent.
    async fn apply_patch(&self, target: Target, patch: &Patch) -> Result<(), RemoteError>;

    /// Fetch one batch of pages.
    async fn query_pages(&self, query: PageQuery) -> Result<PageBatch, RemoteError>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// Backend that keeps its own copy of a [`Document`] in memory.
///
/// Failures can be scripted (`fail_next`, `fail_always`) to exercise rollback.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    doc: Mutex<Document>,
    calls: Mutex<Vec<(Target, Patch)>>,
    scripted: Mutex<VecDeque<RemoteError>>,
    always: Mutex<Option<RemoteError>>,
    latency: Option<Duration>,
}

impl MemoryBackend {
    pub fn new(doc: Document) -> Self {
        Self {
            doc: Mutex::new(doc),
            ..Self::default()
        }
    }

    /// Delay every call by `latency` (tokio time, so paused tests stay instant).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next `apply_patch` with `err`. Queued failures are used in order.
    pub fn fail_next(&self, err: RemoteError) {
        self.scripted.lock().push_back(err);
    }

    /// Fail every `apply_patch` with `err` until cleared with `None`.
    pub fn fail_always(&self, err: Option<RemoteError>) {
        *self.always.lock() = err;
    }

    /// Every `apply_patch` call received, in order (failed ones included).
    pub fn calls(&self) -> Vec<(Target, Patch)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Copy of the backend's committed document.
    pub fn snapshot(&self) -> Document {
        self.doc.lock().clone()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn apply_patch(&self, target: Target, patch: &Patch) -> Result<(), RemoteError> {
        self.calls.lock().push((target, patch.clone()));
        self.delay().await;

        let scripted = self.scripted.lock().pop_front();
        if let Some(err) = scripted.or_else(|| self.always.lock().clone()) {
            tracing::debug!(%target, op = patch.name(), %err, "memory backend failing patch");
            return Err(err);
        }

        self.doc
            .lock()
            .apply(&target, patch)
            .map(|_| ())
            .map_err(|e| RemoteError::Rejected(e.to_string()))
    }

    async fn query_pages(&self, query: PageQuery) -> Result<PageBatch, RemoteError> {
        self.delay().await;

        let offset = match &query.cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| RemoteError::Rejected(format!("invalid cursor '{cursor}'")))?,
            None => 0,
        };
        if query.page_size == 0 {
            return Err(RemoteError::Rejected("page_size must be positive".into()));
        }

        let ctx = FilterContext::now();
        let mut pages: Vec<Page> = {
            let doc = self.doc.lock();
            doc.pages()
                .filter(|p| query.filter.as_ref().is_none_or(|f| f.matches(*p, &ctx)))
                .cloned()
                .collect()
        };
        sort_pages(&mut pages, &query.sorts);

        let items: Vec<Page> = pages.iter().skip(offset).take(query.page_size).cloned().collect();
        let end = offset + items.len();
        let next_cursor = (end < pages.len()).then(|| end.to_string());
        Ok(PageBatch { items, next_cursor })
    }
}

/// Stable multi-key sort: apply keys from least to most significant.
fn sort_pages(pages: &mut [Page], sorts: &[PageSort]) {
    for sort in sorts.iter().rev() {
        let key = |p: &Page| -> SortValue {
            match &sort.key {
                PageSortKey::Title => SortValue::Text(p.title.to_lowercase()),
                PageSortKey::Created => SortValue::Number(p.created_at),
                PageSortKey::Modified => SortValue::Number(p.modified_at),
                PageSortKey::Property(name) => {
                    SortValue::Text(
                        p.property(name)
                            .map(|v| v.display().to_lowercase())
                            .unwrap_or_default(),
                    )
                }
            }
        };
        match sort.direction {
            SortDirection::Ascending => pages.sort_by(|a, b| key(a).cmp(&key(b))),
            SortDirection::Descending => pages.sort_by(|a, b| key(b).cmp(&key(a))),
        }
    }
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Number(u64),
    Text(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanji_search::{FilterCondition, FilterGroup};
    use hanji_types::PropertyValue;

    fn backend(n: usize) -> MemoryBackend {
        let mut doc = Document::new();
        for i in 0..n {
            let status = if i % 2 == 0 { "open" } else { "closed" };
            doc.insert_page(
                Page::new(format!("Inquiry {i:02}"))
                    .with_property("status", PropertyValue::Select(Some(status.into()))),
            )
            .unwrap();
        }
        MemoryBackend::new(doc)
    }

    #[tokio::test]
    async fn test_query_pages_paginates() {
        let backend = backend(5);
        let mut query = PageQuery {
            filter: None,
            sorts: vec![PageSort {
                key: PageSortKey::Title,
                direction: SortDirection::Ascending,
            }],
            page_size: 2,
            cursor: None,
        };
        let mut seen = Vec::new();
        loop {
            let batch = backend.query_pages(query.clone()).await.unwrap();
            seen.extend(batch.items.into_iter().map(|p| p.title));
            match batch.next_cursor {
                Some(cursor) => query.cursor = Some(cursor),
                None => break,
            }
        }
        assert_eq!(
            seen,
            vec!["Inquiry 00", "Inquiry 01", "Inquiry 02", "Inquiry 03", "Inquiry 04"]
        );
    }

    #[tokio::test]
    async fn test_query_pages_filters_and_sorts() {
        let backend = backend(6);
        let query = PageQuery {
            filter: Some(FilterGroup::all(vec![FilterCondition::equals("status", "open")]).into()),
            sorts: vec![PageSort {
                key: PageSortKey::Title,
                direction: SortDirection::Descending,
            }],
            page_size: 10,
            cursor: None,
        };
        let batch = backend.query_pages(query).await.unwrap();
        let titles: Vec<_> = batch.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Inquiry 04", "Inquiry 02", "Inquiry 00"]);
        assert_eq!(batch.next_cursor, None);
    }

    #[tokio::test]
    async fn test_bad_cursor_rejected() {
        let backend = backend(1);
        let query = PageQuery {
            filter: None,
            sorts: vec![],
            page_size: 1,
            cursor: Some("nope".into()),
        };
        assert!(matches!(backend.query_pages(query).await, Err(RemoteError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_scripted_failure_then_success() {
        let backend = backend(1);
        let page = backend.snapshot().pages().next().unwrap().id;
        let patch = Patch::Title { title: "Renamed".into() };

        backend.fail_next(RemoteError::Unreachable("offline".into()));
        assert!(backend.apply_patch(Target::Page(page), &patch).await.is_err());
        assert_eq!(backend.snapshot().page(&page).unwrap().title, "Inquiry 00");

        backend.apply_patch(Target::Page(page), &patch).await.unwrap();
        assert_eq!(backend.snapshot().page(&page).unwrap().title, "Renamed");
        assert_eq!(backend.call_count(), 2);
    }
}
