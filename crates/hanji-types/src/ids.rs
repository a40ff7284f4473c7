//! Typed identifiers for blocks, pages, and pending mutations.
//!
//! All ID types wrap UUIDv7 (time-ordered, globally unique). They serialize
//! transparently as UUID strings, which is what the document backend hands
//! us. `short()` exists for people reading output; lookups always use the
//! full value or [`resolve_prefix`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// A block identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(uuid::Uuid);

/// A page identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(uuid::Uuid);

/// A pending mutation identifier (UUIDv7).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationId(uuid::Uuid);

// ── Typed ID plumbing ───────────────────────────────────────────────────────

macro_rules! typed_id {
    ($T:ident, $label:literal) => {
        impl $T {
            /// Fresh UUIDv7; later calls sort after earlier ones.
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// Leading 8 hex digits, for display.
            pub fn short(&self) -> String {
                let mut hex = self.to_hex();
                hex.truncate(8);
                hex
            }

            /// Lowercase hex without hyphens.
            pub fn to_hex(&self) -> String {
                self.0.simple().to_string()
            }

            /// Accepts hyphenated or bare-hex UUIDs.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                s.parse::<uuid::Uuid>().map(Self)
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(raw: uuid::Uuid) -> Self {
                Self(raw)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $T {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, uuid::Error> {
                Self::parse(s)
            }
        }

        impl HexPrefix for $T {
            fn has_hex_prefix(&self, prefix: &str) -> bool {
                self.to_hex().starts_with(&prefix.to_ascii_lowercase())
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.short())
            }
        }
    };
}

typed_id!(BlockId, "BlockId");
typed_id!(PageId, "PageId");
typed_id!(MutationId, "MutationId");

// ── Command-line lookup ─────────────────────────────────────────────────────

/// Matching an ID against a typed hex prefix.
pub trait HexPrefix {
    fn has_hex_prefix(&self, prefix: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum PrefixError {
    #[error("nothing matches '{0}'")]
    NoMatch(String),
    #[error("'{prefix}' is ambiguous ({} candidates)", candidates.len())]
    Ambiguous {
        prefix: String,
        candidates: Vec<String>,
    },
}

/// Find the one ID in `ids` that `query` names.
///
/// A complete UUID that is present wins outright. Anything else is treated as
/// a hex prefix and must match exactly one ID.
pub fn resolve_prefix<T>(ids: impl IntoIterator<Item = T>, query: &str) -> Result<T, PrefixError>
where
    T: Copy + fmt::Display + std::str::FromStr + PartialEq + HexPrefix,
{
    let ids: Vec<T> = ids.into_iter().collect();
    if let Ok(exact) = query.parse::<T>()
        && ids.contains(&exact)
    {
        return Ok(exact);
    }

    let mut hits = ids.into_iter().filter(|id| id.has_hex_prefix(query));
    match (hits.next(), hits.next()) {
        (None, _) => Err(PrefixError::NoMatch(query.to_string())),
        (Some(only), None) => Ok(only),
        (Some(first), Some(second)) => Err(PrefixError::Ambiguous {
            prefix: query.to_string(),
            candidates: [first, second]
                .into_iter()
                .chain(hits)
                .map(|id| id.to_string())
                .collect(),
        }),
    }
}
