//! Block tree store for Hanji.
//!
//! [`Document`] holds pages and their block forests and is the only place the
//! tree is written. Every change is expressed as a [`Patch`] against a
//! [`Target`]; applying a patch yields its inverse, which is what the editor
//! keeps as a rollback snapshot.
//!
//! # Tree Shape
//!
//! ```text
//! Page ─ children: [A, B]
//!        A ─ children: [A1]      A1.parent = Block(A)
//!        B                       B.parent  = Page
//! ```
//!
//! Both sides of every edge are kept in step, and moves that would make a
//! block its own ancestor are refused.

mod document;
mod error;
mod patch;

pub use document::{Document, DocumentSnapshot, FlatBlock, RemovedSubtree, is_permutation};
pub use error::DocumentError;
pub use patch::{Patch, PatchField, Target};

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
