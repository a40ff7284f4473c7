//! Editing layer for Hanji.
//!
//! Everything that changes a [`hanji_blocks::Document`] goes through here:
//!
//! - [`OptimisticController`] applies edits immediately, debounces autosave,
//!   and rolls back when the backend refuses.
//! - [`DragEngine`] turns drag gestures into reorder and move patches,
//!   refusing drops that would nest a block inside itself.
//! - [`PageFeed`] pages through `query_pages` results for long lists.
//!
//! The backend is a trait object ([`DocumentBackend`]); [`MemoryBackend`]
//! serves tests and the CLI. User-facing failures are published on the
//! [`NoticeBus`] carried by the explicit [`EditorContext`].

pub mod backend;
pub mod drag;
pub mod error;
pub mod feed;
pub mod notices;
pub mod optimistic;

pub use backend::{DocumentBackend, MemoryBackend, PageBatch, PageQuery, PageSort, PageSortKey};
pub use drag::{DragEngine, DragSession, DragState, DropKind, DropOutcome, DropTarget};
pub use error::{EditError, RemoteError, Result};
pub use feed::{DEFAULT_PAGE_SIZE, PageFeed};
pub use notices::{EditorContext, Notice, NoticeBus, NoticeSubscription, matches_subject};
pub use optimistic::{
    EditorConfig, MutationStatus, OptimisticController, PendingMutation, SharedDocument,
};
