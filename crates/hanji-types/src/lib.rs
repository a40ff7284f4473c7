//! Shared block, page, and identity types for Hanji.
//!
//! This crate is the leaf of the workspace: typed IDs, the block and page
//! records as the document backend describes them, and the explicit UI
//! context (locale + message catalog). It has **no internal hanji
//! dependencies**.
//!
//! # Ownership Overview
//!
//! ```text
//! Page (PageId)
//!     └── properties: name → PropertyValue (typed)
//!     └── children: ordered top-level BlockIds
//!
//! Block (BlockId)
//!     └── parent: ParentRef::Page | ParentRef::Block   (by id, never embedded)
//!     └── children: ordered BlockIds
//!     └── kind + content (shape checked by BlockKind::accepts)
//! ```

pub mod block;
pub mod context;
pub mod ids;
pub mod page;

// Re-export primary types at crate root for convenience.
pub use block::{
    Block, BlockContent, BlockKind, MAX_TREE_DEPTH, ParentRef, TextSpan, spans_text,
};
pub use context::{Locale, Message};
pub use ids::{BlockId, HexPrefix, MutationId, PageId, PrefixError, resolve_prefix};
pub use page::{Page, PropertyMap, PropertyType, PropertyValue};

/// Current time as Unix milliseconds. Used by constructors throughout the workspace.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
