//! Debounced query evaluation.
//!
//! ```text
//!   set_query("se")  set_query("seo")  set_query("seoul")
//!        │                │                  │
//!        └── quiet timer restarts on every keystroke ──┘
//!                                                      │ debounce elapsed
//!                                                      ▼
//!                                          search() once → results watch
//! ```
//!
//! Only the latest query is ever evaluated. Subscribers see results through a
//! `tokio::sync::watch` channel, so a slow reader just skips to the newest.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::corpus::SearchDocument;
use crate::pipeline::{RankedItem, SearchOptions, search};

/// Default quiet period before a query runs.
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Latest evaluated results.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<RankedItem>,
    /// Number of evaluations run so far.
    pub evaluations: u64,
}

/// Runs [`search`] over a fixed corpus once typing pauses.
pub struct DebouncedSearch {
    queries: watch::Sender<String>,
    results: watch::Receiver<SearchResults>,
    task: JoinHandle<()>,
}

impl DebouncedSearch {
    /// Spawn the evaluation task on the current tokio runtime.
    pub fn spawn(
        corpus: Arc<Vec<SearchDocument>>,
        options: SearchOptions,
        debounce: Duration,
    ) -> Self {
        let (queries, mut query_rx) = watch::channel(String::new());
        let (results_tx, results) = watch::channel(SearchResults::default());

        let task = tokio::spawn(async move {
            let mut evaluations = 0u64;
            loop {
                if query_rx.changed().await.is_err() {
                    return;
                }
                // Wait out the quiet period, restarting on every new keystroke.
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(debounce) => break,
                        changed = query_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                    }
                }

                let query = query_rx.borrow_and_update().clone();
                let hits: Vec<RankedItem> = search(&query, &corpus, &options)
                    .into_iter()
                    .map(RankedItem::from)
                    .collect();
                evaluations += 1;
                tracing::debug!(%query, hits = hits.len(), evaluations, "debounced search ran");
                results_tx.send_replace(SearchResults {
                    query,
                    hits,
                    evaluations,
                });
            }
        });

        Self {
            queries,
            results,
            task,
        }
    }

    /// Record a keystroke. Evaluation happens after the debounce window.
    pub fn set_query(&self, query: impl Into<String>) {
        self.queries.send_replace(query.into());
    }

    /// Subscribe to result updates.
    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.results.clone()
    }

    /// Most recent results (possibly for an older query).
    pub fn latest(&self) -> SearchResults {
        self.results.borrow().clone()
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.task.abort();
    }
}
