//! Error types for document operations.

use thiserror::Error;

use hanji_types::{BlockId, BlockKind, PageId, ParentRef};

/// Errors that can occur while reading or mutating a [`Document`](crate::Document).
///
/// Every mutation validates before it writes, so an `Err` always means the
/// document is unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    /// Block not found in document.
    #[error("block not found: {0:?}")]
    BlockNotFound(BlockId),

    /// Page not found in document.
    #[error("page not found: {0:?}")]
    PageNotFound(PageId),

    /// Referenced parent (page or block) does not exist.
    #[error("parent not found: {0}")]
    ParentNotFound(ParentRef),

    /// Duplicate block ID.
    #[error("block already exists: {0:?}")]
    DuplicateBlock(BlockId),

    /// Duplicate page ID.
    #[error("page already exists: {0:?}")]
    DuplicatePage(PageId),

    /// The move would make a block its own ancestor.
    #[error("moving {block:?} under {target} would create a cycle")]
    Cycle { block: BlockId, target: ParentRef },

    /// A proposed child order is not a permutation of the current children.
    #[error("order for {parent} is not a permutation of its children")]
    NotAPermutation { parent: ParentRef },

    /// The change would nest a block deeper than the document allows.
    #[error("placing {block:?} reaches depth {depth}, limit is {max}")]
    TooDeep {
        block: BlockId,
        depth: usize,
        max: usize,
    },

    /// Payload shape doesn't fit the block's type tag.
    #[error("content shape does not fit block type '{kind}'")]
    ContentMismatch { kind: BlockKind },

    /// Blocks of this kind cannot own children.
    #[error("block type '{kind}' cannot have children")]
    ChildrenNotAllowed { kind: BlockKind },

    /// Patch does not apply to this kind of target.
    #[error("patch '{patch}' does not apply to {target}")]
    WrongTarget { patch: &'static str, target: String },

    /// Malformed subtree or tree corruption.
    #[error("invalid tree: {0}")]
    InvalidTree(String),
}
