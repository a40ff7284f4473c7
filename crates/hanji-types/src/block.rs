//! Block types: the typed content node and its tree edges.
//!
//! A block never embeds its parent or its children; ownership is by ID.
//! The [`Block::parent`] edge points up at a page or another block, and
//! [`Block::children`] carries the ordered child IDs. Keeping both directions
//! consistent is the document store's job (see `hanji-blocks`).
//!
//! ## Type tags vs payloads
//!
//! `BlockKind` is the closed tag set the editor knows how to render. Tags the
//! backend sends that we don't recognize survive as [`BlockKind::Unsupported`]
//! so the renderer can show a placeholder instead of failing.
//!
//! `BlockContent` is the payload shape. Several kinds share a shape (every
//! heading, paragraph, quote, and list item is rich text), so the pairing is
//! checked by [`BlockKind::accepts`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{BlockId, PageId};

/// Deepest nesting a document accepts: a block's depth (0 for top-level
/// blocks) must stay below this.
///
/// Real pages rarely nest past a dozen levels (toggle → list → list → ...).
/// Inserts and moves that would go deeper are refused.
pub const MAX_TREE_DEPTH: usize = 256;

/// What a block *is*.
///
/// Serialized as its tag string. Parsing never fails: unknown tags become
/// [`BlockKind::Unsupported`] carrying the raw tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum BlockKind {
    #[strum(serialize = "paragraph", serialize = "text")]
    Paragraph,
    #[strum(serialize = "heading_1", serialize = "heading-1", serialize = "h1")]
    Heading1,
    #[strum(serialize = "heading_2", serialize = "heading-2", serialize = "h2")]
    Heading2,
    #[strum(serialize = "heading_3", serialize = "heading-3", serialize = "h3")]
    Heading3,
    #[strum(serialize = "to_do", serialize = "to-do", serialize = "todo")]
    ToDo,
    Code,
    Quote,
    #[strum(serialize = "bulleted_list_item", serialize = "list-item", serialize = "list_item")]
    BulletedListItem,
    #[strum(serialize = "numbered_list_item")]
    NumberedListItem,
    Image,
    Table,
    Callout,
    Toggle,
    #[strum(serialize = "column_list")]
    ColumnList,
    Column,
    Divider,
    /// A tag this build doesn't know. Rendered as a placeholder.
    #[strum(default)]
    Unsupported(String),
}

impl BlockKind {
    /// Parse from string (case-insensitive). Unknown tags map to `Unsupported`.
    pub fn parse(s: &str) -> Self {
        <Self as FromStr>::from_str(s).unwrap_or_else(|_| BlockKind::Unsupported(s.to_string()))
    }

    /// Convert to the canonical tag string.
    pub fn as_str(&self) -> &str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading1 => "heading_1",
            BlockKind::Heading2 => "heading_2",
            BlockKind::Heading3 => "heading_3",
            BlockKind::ToDo => "to_do",
            BlockKind::Code => "code",
            BlockKind::Quote => "quote",
            BlockKind::BulletedListItem => "bulleted_list_item",
            BlockKind::NumberedListItem => "numbered_list_item",
            BlockKind::Image => "image",
            BlockKind::Table => "table",
            BlockKind::Callout => "callout",
            BlockKind::Toggle => "toggle",
            BlockKind::ColumnList => "column_list",
            BlockKind::Column => "column",
            BlockKind::Divider => "divider",
            BlockKind::Unsupported(tag) => tag,
        }
    }

    /// Heading level (1–3) for heading kinds.
    pub fn heading_level(&self) -> Option<u8> {
        match self {
            BlockKind::Heading1 => Some(1),
            BlockKind::Heading2 => Some(2),
            BlockKind::Heading3 => Some(3),
            _ => None,
        }
    }

    /// Whether blocks of this kind may own children.
    pub fn can_have_children(&self) -> bool {
        !matches!(
            self,
            BlockKind::Divider | BlockKind::Image | BlockKind::Code | BlockKind::Table
        )
    }

    /// Check that a payload shape fits this kind.
    pub fn accepts(&self, content: &BlockContent) -> bool {
        match self {
            BlockKind::Paragraph
            | BlockKind::Heading1
            | BlockKind::Heading2
            | BlockKind::Heading3
            | BlockKind::Quote
            | BlockKind::BulletedListItem
            | BlockKind::NumberedListItem => matches!(content, BlockContent::Text { .. }),
            BlockKind::ToDo => matches!(content, BlockContent::Todo { .. }),
            BlockKind::Code => matches!(content, BlockContent::Code { .. }),
            BlockKind::Image => matches!(content, BlockContent::Image { .. }),
            BlockKind::Table => matches!(content, BlockContent::Table { .. }),
            BlockKind::Callout => matches!(content, BlockContent::Callout { .. }),
            BlockKind::Toggle => matches!(content, BlockContent::Toggle { .. }),
            BlockKind::ColumnList | BlockKind::Column | BlockKind::Divider => {
                matches!(content, BlockContent::Empty)
            }
            BlockKind::Unsupported(_) => true,
        }
    }

    /// Check if this kind is known to this build.
    pub fn is_supported(&self) -> bool {
        !matches!(self, BlockKind::Unsupported(_))
    }
}

impl From<String> for BlockKind {
    fn from(s: String) -> Self {
        BlockKind::parse(&s)
    }
}

impl From<BlockKind> for String {
    fn from(kind: BlockKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A run of rich text with uniform annotations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strikethrough: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl TextSpan {
    /// A plain, unannotated span.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Helper for `#[serde(skip_serializing_if)]` on bool fields.
fn is_false(v: &bool) -> bool {
    !v
}

/// Concatenate spans into plain text.
pub fn spans_text(spans: &[TextSpan]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

/// Type-specific payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum BlockContent {
    /// Rich text (paragraphs, headings, quotes, list items).
    Text { spans: Vec<TextSpan> },
    /// Checklist item.
    Todo {
        spans: Vec<TextSpan>,
        #[serde(default)]
        checked: bool,
    },
    /// Source code with an optional language tag.
    Code {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    Image {
        url: String,
        #[serde(default)]
        caption: Vec<TextSpan>,
    },
    /// Table rows as plain cell text. The first row is the header when `has_header`.
    Table {
        rows: Vec<Vec<String>>,
        #[serde(default)]
        has_header: bool,
    },
    Callout {
        spans: Vec<TextSpan>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        icon: Option<String>,
    },
    Toggle {
        spans: Vec<TextSpan>,
        #[serde(default)]
        open: bool,
    },
    /// No payload (dividers, column containers).
    Empty,
    /// Payload of a block type we don't understand, kept verbatim.
    Opaque { raw: serde_json::Value },
}

impl BlockContent {
    /// Rich text content from a plain string.
    pub fn text(text: impl Into<String>) -> Self {
        BlockContent::Text {
            spans: vec![TextSpan::plain(text)],
        }
    }

    /// Extract the plain-text representation (for search indexing and length checks).
    pub fn plain_text(&self) -> String {
        match self {
            BlockContent::Text { spans }
            | BlockContent::Todo { spans, .. }
            | BlockContent::Callout { spans, .. }
            | BlockContent::Toggle { spans, .. } => spans_text(spans),
            BlockContent::Code { text, .. } => text.clone(),
            BlockContent::Image { caption, .. } => spans_text(caption),
            BlockContent::Table { rows, .. } => rows
                .iter()
                .map(|row| row.join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
            BlockContent::Empty | BlockContent::Opaque { .. } => String::new(),
        }
    }

    /// Rich text spans, if this payload has them.
    pub fn spans(&self) -> Option<&[TextSpan]> {
        match self {
            BlockContent::Text { spans }
            | BlockContent::Todo { spans, .. }
            | BlockContent::Callout { spans, .. }
            | BlockContent::Toggle { spans, .. } => Some(spans),
            BlockContent::Image { caption, .. } => Some(caption),
            _ => None,
        }
    }
}

/// The owner of a block: a page (top-level) or another block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ParentRef {
    Page(PageId),
    Block(BlockId),
}

impl ParentRef {
    /// The block ID if this parent is a block.
    pub fn as_block(&self) -> Option<BlockId> {
        match self {
            ParentRef::Block(id) => Some(*id),
            ParentRef::Page(_) => None,
        }
    }
}

impl std::fmt::Display for ParentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParentRef::Page(id) => write!(f, "page:{}", id.short()),
            ParentRef::Block(id) => write!(f, "block:{}", id.short()),
        }
    }
}

/// A single typed content node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub content: BlockContent,
    /// Owning page or block (None only while detached).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
    /// Ordered child IDs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BlockId>,
    /// Unix millis.
    pub created_at: u64,
    /// Unix millis, never decreases.
    pub modified_at: u64,
}

impl Block {
    /// Create a detached block with a fresh ID.
    pub fn new(kind: BlockKind, content: BlockContent) -> Self {
        let now = crate::now_millis();
        Self {
            id: BlockId::new(),
            kind,
            content,
            parent: None,
            children: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::new(BlockKind::Paragraph, BlockContent::text(text))
    }

    /// Heading block; levels outside 1–3 clamp to the nearest level.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        let kind = match level {
            0 | 1 => BlockKind::Heading1,
            2 => BlockKind::Heading2,
            _ => BlockKind::Heading3,
        };
        Self::new(kind, BlockContent::text(text))
    }

    pub fn todo(text: impl Into<String>, checked: bool) -> Self {
        Self::new(
            BlockKind::ToDo,
            BlockContent::Todo {
                spans: vec![TextSpan::plain(text)],
                checked,
            },
        )
    }

    pub fn code(text: impl Into<String>, language: Option<&str>) -> Self {
        Self::new(
            BlockKind::Code,
            BlockContent::Code {
                text: text.into(),
                language: language.map(str::to_string),
            },
        )
    }

    pub fn toggle(text: impl Into<String>) -> Self {
        Self::new(
            BlockKind::Toggle,
            BlockContent::Toggle {
                spans: vec![TextSpan::plain(text)],
                open: true,
            },
        )
    }

    pub fn divider() -> Self {
        Self::new(BlockKind::Divider, BlockContent::Empty)
    }

    /// Plain text of this block's own payload (children excluded).
    pub fn plain_text(&self) -> String {
        self.content.plain_text()
    }

    /// Advance `modified_at`, never moving it backwards.
    pub fn touch(&mut self, now: u64) {
        self.modified_at = self.modified_at.max(now);
    }

    /// Check if this block sits directly under a page.
    pub fn is_top_level(&self) -> bool {
        matches!(self.parent, Some(ParentRef::Page(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_kind_parse_aliases() {
        assert_eq!(BlockKind::parse("heading-1"), BlockKind::Heading1);
        assert_eq!(BlockKind::parse("HEADING_2"), BlockKind::Heading2);
        assert_eq!(BlockKind::parse("to-do"), BlockKind::ToDo);
        assert_eq!(BlockKind::parse("list-item"), BlockKind::BulletedListItem);
    }

    #[test]
    fn test_block_kind_unknown_tag_is_preserved() {
        let kind = BlockKind::parse("synced_block");
        assert_eq!(kind, BlockKind::Unsupported("synced_block".into()));
        assert_eq!(kind.as_str(), "synced_block");
        assert!(!kind.is_supported());
    }

    #[test]
    fn test_block_kind_serde_as_string() {
        let json = serde_json::to_string(&BlockKind::NumberedListItem).unwrap();
        assert_eq!(json, "\"numbered_list_item\"");
        let back: BlockKind = serde_json::from_str("\"embed\"").unwrap();
        assert_eq!(back, BlockKind::Unsupported("embed".into()));
    }

    #[test]
    fn test_accepts_matches_shapes() {
        assert!(BlockKind::Heading1.accepts(&BlockContent::text("x")));
        assert!(!BlockKind::ToDo.accepts(&BlockContent::text("x")));
        assert!(BlockKind::Divider.accepts(&BlockContent::Empty));
        assert!(BlockKind::Unsupported("x".into()).accepts(&BlockContent::Empty));
    }

    #[test]
    fn test_plain_text_extraction() {
        let table = BlockContent::Table {
            rows: vec![vec!["a".into(), "b".into()], vec!["c".into(), "d".into()]],
            has_header: true,
        };
        assert_eq!(table.plain_text(), "a b\nc d");

        let todo = Block::todo("buy tickets", false);
        assert_eq!(todo.plain_text(), "buy tickets");
        assert_eq!(Block::divider().plain_text(), "");
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut block = Block::paragraph("x");
        let before = block.modified_at;
        block.touch(before + 10);
        assert_eq!(block.modified_at, before + 10);
        block.touch(before);
        assert_eq!(block.modified_at, before + 10);
    }

    #[test]
    fn test_block_json_uses_type_field() {
        let block = Block::heading(2, "Itinerary");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "heading_2");
        assert_eq!(value["content"]["shape"], "text");
    }
}
