//! Block rendering dispatch.
//!
//! A block's type tag picks a [`BlockRenderer`]. Overrides registered on a
//! [`RendererRegistry`] win; everything else goes through the built-in table,
//! an exhaustive `match` over [`BlockKind`] whose default arm is the fallback
//! placeholder. Adding a block type means adding a `BlockKind` variant and the
//! compiler will point here.
//!
//! Output is a framework-neutral [`Rendered`] node plus a plain-text line
//! form for terminals.

use std::collections::HashMap;
use std::sync::Arc;

use hanji_blocks::Document;
use hanji_types::{Block, BlockContent, BlockId, BlockKind, Locale, Message, PageId, TextSpan};
use serde::Serialize;

/// Explicit render inputs. Nothing is read from ambient state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderContext {
    pub locale: Locale,
    /// ASCII-only glyphs (bullets, toggles, callout icons).
    pub ascii: bool,
    /// Append the short block id to every line.
    pub show_ids: bool,
}

/// How a rendered block is edited in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    RichText,
    /// Monospace plain text.
    Code,
    /// Check state plus rich text.
    Checkbox,
    /// Open state plus rich text.
    Toggle,
    /// Image caption only.
    Caption,
    /// Table cells.
    Cells,
    ReadOnly,
}

/// Position of a row in a flattened listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowInfo {
    pub depth: usize,
    /// 1-based position within a run of numbered list items.
    pub ordinal: usize,
}

/// Output of rendering one block.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rendered {
    pub id: BlockId,
    pub kind: BlockKind,
    /// Plain text of the payload (empty for containers and dividers).
    pub text: String,
    pub edit_mode: EditMode,
    pub depth: usize,
    /// Rendered by the fallback placeholder.
    pub fallback: bool,
    /// Terminal form, already indented.
    pub lines: Vec<String>,
}

/// A rendering strategy for one block type.
pub trait BlockRenderer: Send + Sync {
    fn render(&self, block: &Block, row: RowInfo, ctx: &RenderContext) -> Rendered;
}

/// Type tag → renderer, with the built-in table behind it.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    overrides: HashMap<String, Arc<dyn BlockRenderer>>,
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a type tag to `renderer`. Works for tags this build doesn't know.
    pub fn register(&mut self, tag: impl Into<String>, renderer: Arc<dyn BlockRenderer>) {
        let tag = tag.into();
        tracing::debug!(%tag, "registered block renderer override");
        self.overrides.insert(tag, renderer);
    }

    pub fn render(&self, block: &Block, row: RowInfo, ctx: &RenderContext) -> Rendered {
        match self.overrides.get(block.kind.as_str()) {
            Some(renderer) => renderer.render(block, row, ctx),
            None => render_builtin(block, row, ctx),
        }
    }

    /// Render every visible block of a page in document order.
    pub fn render_page(
        &self,
        doc: &Document,
        page: &PageId,
        ctx: &RenderContext,
    ) -> hanji_blocks::Result<Vec<Rendered>> {
        let rows = page_rows(doc, page)?;
        Ok(rows
            .iter()
            .filter_map(|(id, row)| doc.block(id).map(|b| self.render(b, *row, ctx)))
            .collect())
    }
}

/// Flattened page rows (closed toggles collapsed) with list ordinals.
pub fn page_rows(doc: &Document, page: &PageId) -> hanji_blocks::Result<Vec<(BlockId, RowInfo)>> {
    let flat = doc.flatten(page, true)?;
    // counters[d] = ordinal of the current numbered run at depth d
    let mut counters: Vec<usize> = Vec::new();
    let mut rows = Vec::with_capacity(flat.len());

    for entry in flat {
        counters.truncate(entry.depth + 1);
        counters.resize(entry.depth + 1, 0);
        let numbered = doc
            .block(&entry.id)
            .is_some_and(|b| b.kind == BlockKind::NumberedListItem);
        counters[entry.depth] = if numbered { counters[entry.depth] + 1 } else { 0 };
        rows.push((
            entry.id,
            RowInfo {
                depth: entry.depth,
                ordinal: counters[entry.depth],
            },
        ));
    }
    Ok(rows)
}

/// Render with the built-in table only.
pub fn render_block(block: &Block, ctx: &RenderContext) -> Rendered {
    render_builtin(block, RowInfo::default(), ctx)
}

fn render_builtin(block: &Block, row: RowInfo, ctx: &RenderContext) -> Rendered {
    if !block.kind.accepts(&block.content) {
        tracing::warn!(
            id = %block.id.short(),
            kind = %block.kind,
            "content does not fit block type, using fallback"
        );
        return fallback(block, row, ctx);
    }

    let text = block.plain_text();
    let body = if text.is_empty() {
        ctx.locale.text(Message::EmptyBlock).to_string()
    } else {
        styled(block.content.spans(), &text)
    };

    let (edit_mode, lines): (EditMode, Vec<String>) = match &block.kind {
        BlockKind::Paragraph => (EditMode::RichText, vec![body]),
        BlockKind::Heading1 | BlockKind::Heading2 | BlockKind::Heading3 => {
            let level = block.kind.heading_level().unwrap_or(1) as usize;
            (EditMode::RichText, vec![format!("{} {body}", "#".repeat(level))])
        }
        BlockKind::ToDo => {
            let checked = matches!(block.content, BlockContent::Todo { checked: true, .. });
            let mark = if checked { "[x]" } else { "[ ]" };
            (EditMode::Checkbox, vec![format!("{mark} {body}")])
        }
        BlockKind::Code => {
            let language = match &block.content {
                BlockContent::Code { language, .. } => language.clone().unwrap_or_default(),
                _ => String::new(),
            };
            let mut lines = vec![format!("```{language}")];
            lines.extend(text.lines().map(str::to_string));
            lines.push("```".to_string());
            (EditMode::Code, lines)
        }
        BlockKind::Quote => (EditMode::RichText, vec![format!("> {body}")]),
        BlockKind::BulletedListItem => {
            let bullet = if ctx.ascii { "-" } else { "•" };
            (EditMode::RichText, vec![format!("{bullet} {body}")])
        }
        BlockKind::NumberedListItem => {
            (EditMode::RichText, vec![format!("{}. {body}", row.ordinal.max(1))])
        }
        BlockKind::Image => {
            let (url, caption) = match &block.content {
                BlockContent::Image { url, caption } => {
                    (url.as_str(), hanji_types::spans_text(caption))
                }
                _ => ("", String::new()),
            };
            let line = if caption.is_empty() {
                format!("[image: {url}]")
            } else {
                format!("[image: {url}] {caption}")
            };
            (EditMode::Caption, vec![line])
        }
        BlockKind::Table => {
            let (rows, has_header) = match &block.content {
                BlockContent::Table { rows, has_header } => (rows.as_slice(), *has_header),
                _ => (&[][..], false),
            };
            let mut lines = Vec::with_capacity(rows.len() + 1);
            for (i, cells) in rows.iter().enumerate() {
                lines.push(format!("| {} |", cells.join(" | ")));
                if i == 0 && has_header {
                    let rule: Vec<&str> = cells.iter().map(|_| "---").collect();
                    lines.push(format!("| {} |", rule.join(" | ")));
                }
            }
            (EditMode::Cells, lines)
        }
        BlockKind::Callout => {
            let icon = match &block.content {
                BlockContent::Callout { icon: Some(icon), .. } if !ctx.ascii => icon.clone(),
                _ if ctx.ascii => "(!)".to_string(),
                _ => "💡".to_string(),
            };
            (EditMode::RichText, vec![format!("{icon} {body}")])
        }
        BlockKind::Toggle => {
            let open = matches!(block.content, BlockContent::Toggle { open: true, .. });
            let glyph = match (open, ctx.ascii) {
                (true, false) => "▾",
                (false, false) => "▸",
                (true, true) => "v",
                (false, true) => ">",
            };
            (EditMode::Toggle, vec![format!("{glyph} {body}")])
        }
        BlockKind::ColumnList | BlockKind::Column => (EditMode::ReadOnly, Vec::new()),
        BlockKind::Divider => (EditMode::ReadOnly, vec!["---".to_string()]),
        BlockKind::Unsupported(_) => return fallback(block, row, ctx),
    };

    finish(block, row, ctx, text, edit_mode, false, lines)
}

/// Placeholder for blocks this build can't render: raw type tag and id, never an error.
fn fallback(block: &Block, row: RowInfo, ctx: &RenderContext) -> Rendered {
    let label = ctx.locale.text(Message::UnsupportedBlock);
    let line = format!("[{label}: {} {}]", block.kind.as_str(), block.id.short());
    let ctx = RenderContext {
        show_ids: false,
        ..ctx.clone()
    };
    finish(block, row, &ctx, String::new(), EditMode::ReadOnly, true, vec![line])
}

fn finish(
    block: &Block,
    row: RowInfo,
    ctx: &RenderContext,
    text: String,
    edit_mode: EditMode,
    fallback: bool,
    lines: Vec<String>,
) -> Rendered {
    let indent = "  ".repeat(row.depth);
    let suffix = if ctx.show_ids {
        format!("  ({})", block.id.short())
    } else {
        String::new()
    };
    let last = lines.len().saturating_sub(1);
    let lines = lines
        .into_iter()
        .enumerate()
        .map(|(i, l)| {
            if i == last {
                format!("{indent}{l}{suffix}")
            } else {
                format!("{indent}{l}")
            }
        })
        .collect();

    Rendered {
        id: block.id,
        kind: block.kind.clone(),
        text,
        edit_mode,
        depth: row.depth,
        fallback,
        lines,
    }
}

/// Markdown-ish inline styling for terminal output.
fn styled(spans: Option<&[TextSpan]>, plain: &str) -> String {
    let Some(spans) = spans else {
        return plain.to_string();
    };
    spans
        .iter()
        .map(|s| {
            let mut t = s.text.clone();
            if s.code {
                t = format!("`{t}`");
            }
            if s.bold {
                t = format!("**{t}**");
            }
            if s.italic {
                t = format!("*{t}*");
            }
            if s.strikethrough {
                t = format!("~~{t}~~");
            }
            if let Some(link) = &s.link {
                t = format!("[{t}]({link})");
            }
            t
        })
        .collect()
}
