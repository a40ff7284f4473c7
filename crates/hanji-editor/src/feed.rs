//! Incrementally loaded page lists.
//!
//! A [`PageFeed`] walks a `query_pages` cursor one batch at a time. Views call
//! [`PageFeed::load_more`] when their list reports the end was reached and
//! stop once the feed is exhausted.

use std::sync::Arc;

use tracing::debug;

use hanji_search::CompoundFilter;
use hanji_types::Page;

use crate::backend::{DocumentBackend, PageQuery, PageSort};
use crate::error::Result;

/// Default number of pages fetched per batch.
pub const DEFAULT_PAGE_SIZE: usize = 50;

pub struct PageFeed {
    backend: Arc<dyn DocumentBackend>,
    query: PageQuery,
    items: Vec<Page>,
    exhausted: bool,
}

impl std::fmt::Debug for PageFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageFeed")
            .field("query", &self.query)
            .field("items", &self.items.len())
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl PageFeed {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        filter: Option<CompoundFilter>,
        sorts: Vec<PageSort>,
        page_size: usize,
    ) -> Self {
        Self {
            backend,
            query: PageQuery {
                filter,
                sorts,
                page_size: page_size.max(1),
                cursor: None,
            },
            items: Vec::new(),
            exhausted: false,
        }
    }

    /// Fetch the next batch. Returns how many pages were added (0 once exhausted).
    ///
    /// On error nothing changes and the same batch can be requested again.
    pub async fn load_more(&mut self) -> Result<usize> {
        if self.exhausted {
            return Ok(0);
        }
        let batch = self.backend.query_pages(self.query.clone()).await?;
        let added = batch.items.len();
        self.items.extend(batch.items);
        self.exhausted = batch.next_cursor.is_none();
        self.query.cursor = batch.next_cursor;
        debug!(added, total = self.items.len(), exhausted = self.exhausted, "page feed advanced");
        Ok(added)
    }

    /// Start over, for example after the filter changed.
    pub fn reset(&mut self, filter: Option<CompoundFilter>) {
        self.query.filter = filter;
        self.query.cursor = None;
        self.items.clear();
        self.exhausted = false;
    }

    pub fn items(&self) -> &[Page] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, PageSortKey};
    use hanji_blocks::Document;
    use hanji_search::{FilterCondition, FilterGroup, SortDirection};
    use hanji_types::PropertyValue;
    use hanji_view::{Footer, ItemHeight, VirtualList};
    use pretty_assertions::assert_eq;

    fn backend(n: usize) -> Arc<MemoryBackend> {
        let mut doc = Document::new();
        for i in 0..n {
            let stage = if i % 5 == 0 { "won" } else { "lead" };
            doc.insert_page(
                Page::new(format!("Deal {i:03}"))
                    .with_property("stage", PropertyValue::Select(Some(stage.into()))),
            )
            .unwrap();
        }
        Arc::new(MemoryBackend::new(doc))
    }

    fn by_title() -> Vec<PageSort> {
        vec![PageSort {
            key: PageSortKey::Title,
            direction: SortDirection::Ascending,
        }]
    }

    #[tokio::test]
    async fn test_scrolling_drives_pagination() {
        let mut feed = PageFeed::new(backend(25), None, by_title(), 10);
        feed.load_more().await.unwrap();

        let mut list =
            VirtualList::new(feed.len(), 100.0, ItemHeight::Fixed(20.0)).with_end_threshold(0.0);
        let mut loads = 1;
        let mut fired = list.scroll_to(list.max_scroll());
        while fired {
            feed.load_more().await.unwrap();
            loads += 1;
            if feed.is_exhausted() {
                list.set_all_loaded(true);
            }
            let top = list.scroll_top();
            fired = list.set_len(feed.len());
            assert_eq!(list.scroll_top(), top);
            if !fired {
                fired = list.scroll_to(list.max_scroll());
            }
        }

        assert_eq!(loads, 3);
        assert_eq!(feed.len(), 25);
        assert_eq!(list.footer(), Some(Footer::AllLoaded));
        let titles: Vec<_> = feed.items().iter().map(|p| p.title.clone()).collect();
        let expected: Vec<_> = (0..25).map(|i| format!("Deal {i:03}")).collect();
        assert_eq!(titles, expected);
    }

    #[tokio::test]
    async fn test_exhausted_feed_stops_fetching() {
        let mut feed = PageFeed::new(backend(3), None, by_title(), 10);
        assert_eq!(feed.load_more().await.unwrap(), 3);
        assert!(feed.is_exhausted());
        assert_eq!(feed.load_more().await.unwrap(), 0);
        assert_eq!(feed.len(), 3);
    }

    #[tokio::test]
    async fn test_reset_applies_new_filter() {
        let mut feed = PageFeed::new(backend(10), None, by_title(), 4);
        feed.load_more().await.unwrap();
        assert_eq!(feed.len(), 4);

        feed.reset(Some(FilterGroup::all(vec![FilterCondition::equals("stage", "won")]).into()));
        assert!(feed.is_empty());
        feed.load_more().await.unwrap();
        let titles: Vec<_> = feed.items().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Deal 000", "Deal 005"]);
        assert!(feed.is_exhausted());
    }
}
