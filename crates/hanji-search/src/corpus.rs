//! Search corpus: pages and blocks reduced to title + body text.

use hanji_blocks::Document;
use hanji_types::{BlockId, PageId, PropertyMap, PropertyValue};
use serde::{Deserialize, Serialize};

use crate::filter::PropertySource;
use crate::fuzzy::Searchable;

/// What a search result points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum SearchId {
    Page(PageId),
    Block(BlockId),
}

/// One searchable item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: SearchId,
    pub title: String,
    pub body: String,
    /// Properties of the owning page (blocks inherit their page's).
    #[serde(default)]
    pub properties: PropertyMap,
    pub created_at: u64,
    pub modified_at: u64,
}

impl SearchDocument {
    /// A bare item with only a title, mostly for tests and ad-hoc corpora.
    pub fn titled(id: SearchId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: String::new(),
            properties: PropertyMap::new(),
            created_at: 0,
            modified_at: 0,
        }
    }
}

impl Searchable for SearchDocument {
    fn title(&self) -> &str {
        &self.title
    }

    fn body(&self) -> &str {
        &self.body
    }
}

impl PropertySource for SearchDocument {
    fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// Which nodes to index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CorpusScope {
    pub pages: bool,
    pub blocks: bool,
}

impl Default for CorpusScope {
    fn default() -> Self {
        Self {
            pages: true,
            blocks: false,
        }
    }
}

/// Build a corpus from a document.
///
/// Pages index their title and the text of every block on them. Blocks
/// index their own text; headings put it in the title field.
pub fn build_corpus(doc: &Document, scope: CorpusScope) -> Vec<SearchDocument> {
    let mut corpus = Vec::new();

    for page in doc.pages() {
        if scope.pages {
            corpus.push(SearchDocument {
                id: SearchId::Page(page.id),
                title: page.title.clone(),
                body: doc.page_text(&page.id),
                properties: page.properties.clone(),
                created_at: page.created_at,
                modified_at: page.modified_at,
            });
        }

        if scope.blocks {
            let flat = doc.flatten(&page.id, false).unwrap_or_default();
            for entry in flat {
                let Some(block) = doc.block(&entry.id) else {
                    continue;
                };
                let text = block.plain_text();
                if text.trim().is_empty() {
                    continue;
                }
                let (title, body) = if block.kind.heading_level().is_some() {
                    (text, String::new())
                } else {
                    (String::new(), text)
                };
                corpus.push(SearchDocument {
                    id: SearchId::Block(block.id),
                    title,
                    body,
                    properties: page.properties.clone(),
                    created_at: block.created_at,
                    modified_at: block.modified_at,
                });
            }
        }
    }

    tracing::debug!(items = corpus.len(), "built search corpus");
    corpus
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanji_types::{Block, Page, ParentRef};

    #[test]
    fn test_pages_index_block_text() {
        let mut doc = Document::new();
        let page = doc.insert_page(Page::new("Seoul trip")).unwrap();
        doc.insert_block(ParentRef::Page(page), None, Block::paragraph("Book the clinic"))
            .unwrap();

        let corpus = build_corpus(&doc, CorpusScope::default());
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus[0].title, "Seoul trip");
        assert_eq!(corpus[0].body, "Book the clinic");
    }

    #[test]
    fn test_blocks_skip_empty_and_title_headings() {
        let mut doc = Document::new();
        let page = doc
            .insert_page(Page::new("p").with_property("status", PropertyValue::Text("open".into())))
            .unwrap();
        let heading = doc
            .insert_block(ParentRef::Page(page), None, Block::heading(2, "Arrival"))
            .unwrap();
        doc.insert_block(ParentRef::Page(page), None, Block::divider())
            .unwrap();
        doc.insert_block(ParentRef::Page(page), None, Block::paragraph("Taxi from ICN"))
            .unwrap();

        let corpus = build_corpus(
            &doc,
            CorpusScope {
                pages: false,
                blocks: true,
            },
        );
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus[0].id, SearchId::Block(heading));
        assert_eq!(corpus[0].title, "Arrival");
        assert_eq!(corpus[1].body, "Taxi from ICN");
        assert!(corpus[1].property("status").is_some());
    }
}
