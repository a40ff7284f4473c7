//! Error types for editing operations.

use thiserror::Error;

use hanji_blocks::{DocumentError, Target};
use hanji_types::{BlockId, MutationId, ParentRef};

/// Failure reported by the document backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The backend answered and refused the change.
    #[error("rejected by backend: {0}")]
    Rejected(String),

    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),
}

/// Errors surfaced by the editing layer.
///
/// `Validation` and `CycleRejected` are raised before anything is applied.
/// The remote variants arrive after rollback has already happened.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    /// Malformed edit: too long, wrong shape for the block type, not a permutation, etc.
    #[error("invalid edit: {0}")]
    Validation(String),

    /// Text exceeds the configured maximum length (a validation error).
    #[error("edit is too long: {len} characters, limit is {max}")]
    TooLong { len: usize, max: usize },

    /// Target does not exist (any more).
    #[error("{0} not found")]
    NotFound(Target),

    /// The backend refused the change; the optimistic value was reverted.
    #[error("save rejected: {0}")]
    RemoteRejected(String),

    /// The backend was unreachable; the optimistic value was reverted.
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Re-parenting would make a block its own descendant.
    #[error("moving {block:?} under {target} would create a cycle")]
    CycleRejected { block: BlockId, target: ParentRef },

    /// The mutation is no longer pending (committed, cancelled, or coalesced away).
    #[error("mutation {0} is not pending")]
    NotPending(MutationId),
}

impl From<RemoteError> for EditError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Rejected(reason) => EditError::RemoteRejected(reason),
            RemoteError::Unreachable(reason) => EditError::NetworkUnreachable(reason),
        }
    }
}

impl From<DocumentError> for EditError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Cycle { block, target } => EditError::CycleRejected { block, target },
            DocumentError::BlockNotFound(id) => EditError::NotFound(Target::Block(id)),
            DocumentError::PageNotFound(id) => EditError::NotFound(Target::Page(id)),
            DocumentError::ParentNotFound(parent) => EditError::NotFound(parent.into()),
            other => EditError::Validation(other.to_string()),
        }
    }
}

impl EditError {
    /// Whether this error came back from the backend (and therefore caused a rollback).
    pub fn is_remote(&self) -> bool {
        matches!(self, EditError::RemoteRejected(_) | EditError::NetworkUnreachable(_))
    }

    /// Whether the edit was refused locally before anything was applied.
    pub fn is_validation(&self) -> bool {
        matches!(self, EditError::Validation(_) | EditError::TooLong { .. })
    }
}

/// Result type for editing operations.
pub type Result<T> = std::result::Result<T, EditError>;
