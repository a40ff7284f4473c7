//! Hanji command-line front end.
//!
//! Works on a JSON document snapshot (pages and blocks as flat lists).
//!
//! ## Usage
//!
//! ```bash
//! hanji check notes.json
//! hanji render notes.json --page 0190 --scroll 10 --viewport 20
//! hanji search notes.json "partnership" --sort modified --desc --where status:equals:open
//! hanji filter notes.json --where status:equals:open --where priority:is_empty --any
//! hanji move notes.json 3f2a 9b1c --inside
//! ```
//!
//! IDs may be given as any unambiguous hex prefix.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use parking_lot::RwLock;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hanji_blocks::{Document, DocumentSnapshot};
use hanji_editor::{DragEngine, DropKind, EditorContext, MemoryBackend, OptimisticController};
use hanji_search::{
    CorpusScope, FilterCondition, FilterGroup, RankedItem, SearchId, SortDirection, SortKey,
    apply_filter, build_corpus, infer_schema, search,
};
use hanji_types::{BlockId, Locale, Page, PageId, ParentRef, resolve_prefix};
use hanji_view::{ItemHeight, RenderContext, RendererRegistry, VirtualList};

use crate::config::HanjiConfig;

#[derive(Parser, Debug)]
#[command(name = "hanji")]
#[command(about = "Inspect, search, and rearrange Hanji block documents")]
struct Args {
    /// Config file (RON). Defaults to ~/.config/hanji/config.ron
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Language for user-facing messages (en, ko)
    #[arg(long, global = true)]
    locale: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify the block tree invariants
    Check { doc: PathBuf },

    /// Render one page through the virtualized window
    Render {
        doc: PathBuf,
        /// Page id prefix (defaults to the first page)
        #[arg(long)]
        page: Option<String>,
        /// First visible row offset
        #[arg(long, default_value_t = 0.0)]
        scroll: f64,
        /// Viewport height in rows
        #[arg(long, default_value_t = 20.0)]
        viewport: f64,
        /// ASCII-only glyphs
        #[arg(long)]
        ascii: bool,
        /// Show short block ids
        #[arg(long)]
        ids: bool,
    },

    /// Fuzzy-search pages (and blocks with --blocks)
    Search {
        doc: PathBuf,
        query: String,
        /// relevance | title | created | modified
        #[arg(long, default_value = "relevance")]
        sort: String,
        /// Reverse the sort
        #[arg(long)]
        desc: bool,
        /// Maximum results (overrides config)
        #[arg(long)]
        max: Option<usize>,
        /// Filter condition, property:operator[:value] (repeatable, all must match)
        #[arg(long = "where")]
        conditions: Vec<String>,
        /// Index blocks as well as pages
        #[arg(long)]
        blocks: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List pages matching property conditions
    Filter {
        doc: PathBuf,
        /// property:operator[:value] (repeatable)
        #[arg(long = "where", required = true)]
        conditions: Vec<String>,
        /// Match any condition instead of all
        #[arg(long)]
        any: bool,
    },

    /// Drag a block onto another block (or into a container) and save
    Move {
        doc: PathBuf,
        dragged: String,
        target: String,
        /// Drop inside the target instead of taking its place
        #[arg(long, conflicts_with = "zone")]
        inside: bool,
        /// Treat the target as a container (page or block) and append to it
        #[arg(long)]
        zone: bool,
        /// Write the result here instead of over the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut config = HanjiConfig::load(args.config.as_deref()).context("loading config")?;
    if let Some(locale) = &args.locale {
        config.locale =
            Locale::from_str(locale).with_context(|| format!("unknown locale '{locale}'"))?;
    }

    match args.command {
        Command::Check { doc } => cmd_check(&doc),
        Command::Render {
            doc,
            page,
            scroll,
            viewport,
            ascii,
            ids,
        } => {
            let ctx = RenderContext {
                locale: config.locale,
                ascii,
                show_ids: ids,
            };
            cmd_render(&config, &doc, page.as_deref(), scroll, viewport, &ctx)
        }
        Command::Search {
            doc,
            query,
            sort,
            desc,
            max,
            conditions,
            blocks,
            json,
        } => {
            let search = SearchArgs {
                query,
                sort,
                desc,
                max,
                conditions,
                blocks,
                json,
            };
            cmd_search(&config, &doc, &search)
        }
        Command::Filter { doc, conditions, any } => cmd_filter(&doc, &conditions, any),
        Command::Move {
            doc,
            dragged,
            target,
            inside,
            zone,
            output,
        } => {
            let placement = if zone {
                Placement::Zone
            } else if inside {
                Placement::Onto(DropKind::Inside)
            } else {
                Placement::Onto(DropKind::Sibling)
            };
            let output = output.unwrap_or_else(|| doc.clone());
            cmd_move(&config, &doc, &dragged, &target, placement, &output).await
        }
    }
}

// ============================================================================
// Document I/O
// ============================================================================

fn load_document(path: &Path) -> Result<Document> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot: DocumentSnapshot =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    Document::from_snapshot(snapshot).with_context(|| format!("loading {}", path.display()))
}

fn write_document(path: &Path, doc: &Document) -> Result<()> {
    let json = serde_json::to_string_pretty(&doc.to_snapshot())?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

fn all_blocks(doc: &Document) -> Vec<BlockId> {
    doc.pages()
        .flat_map(|p| doc.flatten(&p.id, false).unwrap_or_default())
        .map(|f| f.id)
        .collect()
}

fn resolve_block(doc: &Document, prefix: &str) -> Result<BlockId> {
    Ok(resolve_prefix(all_blocks(doc), prefix)?)
}

fn resolve_page(doc: &Document, prefix: &str) -> Result<PageId> {
    Ok(resolve_prefix(doc.pages().map(|p| p.id), prefix)?)
}

fn describe(doc: &Document, id: &SearchId) -> String {
    match id {
        SearchId::Page(pid) => format!("page  {}", pid.short()),
        SearchId::Block(bid) => {
            let page = doc.page_of(bid).map(|p| p.short()).unwrap_or_default();
            format!("block {} (page {page})", bid.short())
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_check(path: &Path) -> Result<ExitCode> {
    // from_snapshot already validates; re-check so the report names the failure.
    let doc = load_document(path)?;
    doc.check_invariants()?;
    println!(
        "ok: {} pages, {} blocks",
        doc.page_count(),
        doc.block_count()
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_render(
    config: &HanjiConfig,
    path: &Path,
    page: Option<&str>,
    scroll: f64,
    viewport: f64,
    ctx: &RenderContext,
) -> Result<ExitCode> {
    let doc = load_document(path)?;
    let page_id = match page {
        Some(prefix) => resolve_page(&doc, prefix)?,
        None => match doc.pages().next() {
            Some(p) => p.id,
            None => bail!("document has no pages"),
        },
    };
    let title = doc.page(&page_id).map(|p| p.title.clone()).unwrap_or_default();
    let rows = RendererRegistry::new().render_page(&doc, &page_id, ctx)?;

    let view = &config.view;
    let mut list = VirtualList::new(rows.len(), viewport, ItemHeight::Estimated(view.item_height))
        .with_overscan(view.overscan)
        .with_end_threshold(view.end_threshold);
    for (i, row) in rows.iter().enumerate() {
        list.measure(i, row.lines.len() as f64 * view.item_height);
    }
    list.set_all_loaded(true);
    list.scroll_to(scroll);

    let range = list.visible_range();
    let shown = range.map_or_else(
        || "empty".to_string(),
        |r| format!("blocks {}-{} of {}", r.start + 1, r.end + 1, rows.len()),
    );
    println!("─── {title} ─── {shown}");
    for (_, row) in list.window(&rows) {
        for line in &row.lines {
            println!("{line}");
        }
    }
    let at_end = range.is_some_and(|r| r.end + 1 == rows.len());
    if let Some(footer) = list.footer().filter(|_| at_end) {
        println!("─── {} ───", ctx.locale.text(footer.message()));
    }
    Ok(ExitCode::SUCCESS)
}

struct SearchArgs {
    query: String,
    sort: String,
    desc: bool,
    max: Option<usize>,
    conditions: Vec<String>,
    blocks: bool,
    json: bool,
}

fn parse_group(doc: &Document, conditions: &[String], any: bool) -> Result<FilterGroup> {
    let conditions = conditions
        .iter()
        .map(|c| FilterCondition::parse(c))
        .collect::<Result<Vec<_>, _>>()?;
    let group = if any {
        FilterGroup::any(conditions)
    } else {
        FilterGroup::all(conditions)
    };
    group.validate(&infer_schema(doc.pages()))?;
    Ok(group)
}

fn cmd_search(config: &HanjiConfig, path: &Path, args: &SearchArgs) -> Result<ExitCode> {
    let doc = load_document(path)?;

    let mut options = config.search.options();
    options.sort = SortKey::from_str(&args.sort)
        .with_context(|| format!("unknown sort key '{}'", args.sort))?;
    options.direction = if args.desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    if let Some(max) = args.max {
        options.max_results = max;
    }
    if !args.conditions.is_empty() {
        options.filter = Some(parse_group(&doc, &args.conditions, false)?.into());
    }

    let corpus = build_corpus(
        &doc,
        CorpusScope {
            pages: true,
            blocks: args.blocks,
        },
    );
    let hits = search(&args.query, &corpus, &options);

    if args.json {
        let ranked: Vec<RankedItem> = hits.into_iter().map(RankedItem::from).collect();
        println!("{}", serde_json::to_string_pretty(&ranked)?);
        return Ok(ExitCode::SUCCESS);
    }
    if hits.is_empty() {
        println!("no matches");
        return Ok(ExitCode::SUCCESS);
    }
    for hit in &hits {
        println!("{:.3}  {}  {}", hit.score, describe(&doc, &hit.item.id), hit.item.title);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_filter(path: &Path, conditions: &[String], any: bool) -> Result<ExitCode> {
    let doc = load_document(path)?;
    let group = parse_group(&doc, conditions, any)?;

    let pages: Vec<Page> = doc.pages().cloned().collect();
    let matched = apply_filter(&pages, &group);
    for page in &matched {
        let props: Vec<String> = page
            .properties
            .iter()
            .map(|(name, value)| format!("{name}={}", value.display()))
            .collect();
        println!("{}  {}  {}", page.id.short(), page.title, props.join(" "));
    }
    println!("─── {} of {} pages ───", matched.len(), pages.len());
    Ok(ExitCode::SUCCESS)
}

enum Placement {
    Onto(DropKind),
    Zone,
}

async fn cmd_move(
    config: &HanjiConfig,
    path: &Path,
    dragged: &str,
    target: &str,
    placement: Placement,
    output: &Path,
) -> Result<ExitCode> {
    let doc = load_document(path)?;
    let dragged = resolve_block(&doc, dragged)?;

    let backend = Arc::new(MemoryBackend::new(doc.clone()));
    let ctx = EditorContext::new(config.locale);
    let mut notices = ctx.notices.subscribe(">");
    let controller = OptimisticController::new(
        Arc::new(RwLock::new(doc)),
        backend.clone(),
        ctx,
        config.editor.clone(),
    );
    let mut engine = DragEngine::new(controller.clone());

    let result = match placement {
        Placement::Onto(kind) => {
            let target = resolve_block(&controller.document().read(), target)?;
            engine.reorder(dragged, target, kind).await
        }
        Placement::Zone => {
            let parent = {
                let doc = controller.document();
                let doc = doc.read();
                match resolve_block(&doc, target) {
                    Ok(block) => ParentRef::Block(block),
                    Err(_) => ParentRef::Page(resolve_page(&doc, target)?),
                }
            };
            engine.start(dragged)?;
            engine.over_zone(parent, None)?;
            engine.drop().await
        }
    };

    while let Some(notice) = notices.try_recv() {
        eprintln!("{}", notice.text);
    }
    let outcome = result?;
    tracing::info!(?outcome, "move finished");

    write_document(output, &backend.snapshot())?;
    println!("{outcome:?}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanji_types::{Block, PropertyValue};
    use pretty_assertions::assert_eq;

    fn sample() -> (Document, PageId, Vec<BlockId>) {
        let mut doc = Document::new();
        let page = doc
            .insert_page(
                Page::new("Roadmap")
                    .with_property("status", PropertyValue::Select(Some("open".into()))),
            )
            .unwrap();
        let root = ParentRef::Page(page);
        let blocks = ["alpha", "beta", "gamma"]
            .into_iter()
            .map(|text| doc.insert_block(root, None, Block::paragraph(text)).unwrap())
            .collect();
        (doc, page, blocks)
    }

    #[tokio::test]
    async fn test_move_writes_committed_order() {
        let (doc, page, blocks) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_document(&path, &doc).unwrap();

        let code = cmd_move(
            &HanjiConfig::default(),
            &path,
            &blocks[2].to_hex(),
            &blocks[0].to_hex(),
            Placement::Onto(DropKind::Sibling),
            &path,
        )
        .await
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let moved = load_document(&path).unwrap();
        assert_eq!(
            moved.children_of(&ParentRef::Page(page)).unwrap(),
            &[blocks[2], blocks[0], blocks[1]]
        );
    }

    #[tokio::test]
    async fn test_zone_move_appends_into_block() {
        let (doc, _, blocks) = sample();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.json");
        write_document(&input, &doc).unwrap();

        cmd_move(
            &HanjiConfig::default(),
            &input,
            &blocks[2].to_hex(),
            &blocks[0].to_hex(),
            Placement::Zone,
            &output,
        )
        .await
        .unwrap();

        let moved = load_document(&output).unwrap();
        assert_eq!(moved.children_of(&ParentRef::Block(blocks[0])).unwrap(), &[blocks[2]]);
        // Input untouched.
        let original = load_document(&input).unwrap();
        assert_eq!(
            original.block(&blocks[2]).unwrap().parent,
            doc.block(&blocks[2]).unwrap().parent
        );
    }

    #[test]
    fn test_filter_conditions_are_validated_against_schema() {
        let (doc, _, _) = sample();
        assert!(parse_group(&doc, &["status:equals:open".to_string()], false).is_ok());
        assert!(parse_group(&doc, &["status:gt:3".to_string()], false).is_err());
        assert!(parse_group(&doc, &["status".to_string()], false).is_err());
    }

    #[test]
    fn test_missing_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_document(&dir.path().join("missing.json")).is_err());
    }
}
