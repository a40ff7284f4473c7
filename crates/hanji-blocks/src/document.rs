//! Document: pages plus the block forest hanging off them.
//!
//! Blocks are stored flat, indexed by ID. Tree shape lives in two places that
//! must agree: each block's `parent` edge and each parent's ordered
//! `children` list. Every mutation here updates both sides or neither.
//!
//! Invariants (checked by [`Document::check_invariants`]):
//! - every block's parent exists and lists the block exactly once
//! - every listed child exists and points back at the listing parent
//! - following `parent` edges from any block reaches a page (no cycles)
//! - no block sits at depth [`MAX_TREE_DEPTH`] or deeper

use std::collections::{BTreeMap, HashMap, HashSet};

use hanji_types::{
    Block, BlockContent, BlockId, MAX_TREE_DEPTH, Page, PageId, ParentRef, PropertyValue,
    now_millis,
};
use serde::{Deserialize, Serialize};

use crate::{DocumentError, Result};

/// A block as it appears in a flattened, depth-annotated listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatBlock {
    pub id: BlockId,
    /// 0 for top-level blocks.
    pub depth: usize,
}

/// A subtree detached by [`Document::remove_block`].
///
/// Carries everything needed to put it back exactly where it was.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovedSubtree {
    pub parent: ParentRef,
    pub index: usize,
    /// Root first, then descendants in pre-order.
    pub blocks: Vec<Block>,
}

/// Serializable form of a document (pages and blocks as flat lists).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub pages: Vec<Page>,
    pub blocks: Vec<Block>,
}

/// Pages and blocks with tree invariants enforced on every write.
#[derive(Clone, Debug, Default)]
pub struct Document {
    /// Pages indexed by ID (UUIDv7 keys keep creation order).
    pages: BTreeMap<PageId, Page>,

    /// Blocks indexed by ID.
    blocks: HashMap<BlockId, Block>,

    /// Document version (bumped on any mutation).
    version: u64,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a snapshot, rejecting any tree inconsistency.
    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Result<Self> {
        let mut doc = Self::new();
        for page in snapshot.pages {
            if doc.pages.insert(page.id, page.clone()).is_some() {
                return Err(DocumentError::DuplicatePage(page.id));
            }
        }
        for block in snapshot.blocks {
            let id = block.id;
            if doc.blocks.insert(id, block).is_some() {
                return Err(DocumentError::DuplicateBlock(id));
            }
        }
        doc.check_invariants()?;
        Ok(doc)
    }

    /// Export as a serializable snapshot (pages in ID order, blocks in tree pre-order).
    pub fn to_snapshot(&self) -> DocumentSnapshot {
        let pages: Vec<Page> = self.pages.values().cloned().collect();
        let blocks = self
            .pages
            .values()
            .flat_map(|p| p.children.iter())
            .flat_map(|root| self.subtree(root))
            .filter_map(|id| self.blocks.get(&id).cloned())
            .collect();
        DocumentSnapshot { pages, blocks }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the current version.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn page(&self, id: &PageId) -> Option<&Page> {
        self.pages.get(id)
    }

    /// Pages in ID (creation) order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.values()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the document has no pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Ordered children of a page or block.
    pub fn children_of(&self, parent: &ParentRef) -> Result<&[BlockId]> {
        match parent {
            ParentRef::Page(id) => self
                .pages
                .get(id)
                .map(|p| p.children.as_slice())
                .ok_or(DocumentError::ParentNotFound(*parent)),
            ParentRef::Block(id) => self
                .blocks
                .get(id)
                .map(|b| b.children.as_slice())
                .ok_or(DocumentError::ParentNotFound(*parent)),
        }
    }

    /// Parent and position of a block within its parent's child list.
    pub fn position_of(&self, id: &BlockId) -> Result<(ParentRef, usize)> {
        let block = self.blocks.get(id).ok_or(DocumentError::BlockNotFound(*id))?;
        let parent = block
            .parent
            .ok_or_else(|| DocumentError::InvalidTree(format!("block {id:?} is detached")))?;
        let index = self
            .children_of(&parent)?
            .iter()
            .position(|c| c == id)
            .ok_or_else(|| {
                DocumentError::InvalidTree(format!("{parent} does not list child {id:?}"))
            })?;
        Ok((parent, index))
    }

    // =========================================================================
    // Tree Queries
    // =========================================================================

    /// Ancestor blocks of a block, nearest first (pages excluded).
    ///
    /// A walk longer than the block count can only be a cycle; it stops
    /// there, so a corrupt tree yields a list that never reaches a page.
    pub fn ancestors(&self, id: &BlockId) -> Vec<BlockId> {
        let mut ancestors = Vec::new();
        let mut current = self.blocks.get(id).and_then(|b| b.parent);

        while let Some(ParentRef::Block(pid)) = current {
            if ancestors.len() > self.blocks.len() {
                tracing::warn!(block = ?id, "parent chain loops, stopping walk");
                break;
            }
            ancestors.push(pid);
            current = self.blocks.get(&pid).and_then(|b| b.parent);
        }

        ancestors
    }

    /// The page a block ultimately belongs to.
    pub fn page_of(&self, id: &BlockId) -> Option<PageId> {
        let top = self.ancestors(id).last().copied().unwrap_or(*id);
        match self.blocks.get(&top)?.parent? {
            ParentRef::Page(pid) => Some(pid),
            ParentRef::Block(_) => None,
        }
    }

    /// Depth of a block (0 for top-level blocks).
    pub fn depth(&self, id: &BlockId) -> usize {
        self.ancestors(id).len()
    }

    /// Whether `node` is `root` or lies anywhere beneath it.
    pub fn is_within(&self, node: &BlockId, root: &BlockId) -> bool {
        node == root || self.ancestors(node).contains(root)
    }

    /// Levels below `root` inside its own subtree (0 for a leaf).
    pub fn height(&self, root: &BlockId) -> usize {
        let mut height = 0;
        let mut stack = vec![(*root, 0)];
        while let Some((id, level)) = stack.pop() {
            let Some(block) = self.blocks.get(&id) else {
                continue;
            };
            height = height.max(level);
            if level <= self.blocks.len() {
                stack.extend(block.children.iter().map(|c| (*c, level + 1)));
            }
        }
        height
    }

    /// Depth a block placed directly under `parent` would have.
    pub fn depth_under(&self, parent: &ParentRef) -> usize {
        match parent {
            ParentRef::Page(_) => 0,
            ParentRef::Block(id) => self.depth(id) + 1,
        }
    }

    /// Whether placing `block` under `target` would create a cycle.
    pub fn would_cycle(&self, block: &BlockId, target: &ParentRef) -> bool {
        match target {
            ParentRef::Page(_) => false,
            ParentRef::Block(tid) => self.is_within(tid, block),
        }
    }

    /// A block and all its descendants, pre-order.
    pub fn subtree(&self, root: &BlockId) -> Vec<BlockId> {
        let mut out = Vec::new();
        let mut stack = vec![*root];
        while let Some(id) = stack.pop() {
            let Some(block) = self.blocks.get(&id) else {
                continue;
            };
            out.push(id);
            stack.extend(block.children.iter().rev().copied());
        }
        out
    }

    /// Flatten a page into render order with depths.
    ///
    /// Children of closed toggles are skipped when `respect_toggles` is set.
    pub fn flatten(&self, page: &PageId, respect_toggles: bool) -> Result<Vec<FlatBlock>> {
        let page = self.pages.get(page).ok_or(DocumentError::PageNotFound(*page))?;
        let mut out = Vec::new();
        let mut stack: Vec<(BlockId, usize)> =
            page.children.iter().rev().map(|id| (*id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            let Some(block) = self.blocks.get(&id) else {
                continue;
            };
            out.push(FlatBlock { id, depth });
            let hidden = respect_toggles
                && matches!(block.content, BlockContent::Toggle { open: false, .. });
            if !hidden && depth < MAX_TREE_DEPTH {
                stack.extend(block.children.iter().rev().map(|c| (*c, depth + 1)));
            }
        }
        Ok(out)
    }

    /// Plain text of every block on a page, in document order, one line per block.
    pub fn page_text(&self, page: &PageId) -> String {
        self.flatten(page, false)
            .unwrap_or_default()
            .iter()
            .filter_map(|f| self.blocks.get(&f.id))
            .map(|b| b.plain_text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    // =========================================================================
    // Page Operations
    // =========================================================================

    /// Insert an empty page.
    pub fn insert_page(&mut self, mut page: Page) -> Result<PageId> {
        if self.pages.contains_key(&page.id) {
            return Err(DocumentError::DuplicatePage(page.id));
        }
        if !page.children.is_empty() {
            return Err(DocumentError::InvalidTree(
                "pages must be inserted empty; add blocks afterwards".into(),
            ));
        }
        page.touch(now_millis());
        let id = page.id;
        self.pages.insert(id, page);
        self.version += 1;
        Ok(id)
    }

    /// Set a page title, returning the previous one.
    pub fn set_title(&mut self, id: &PageId, title: impl Into<String>) -> Result<String> {
        let page = self.pages.get_mut(id).ok_or(DocumentError::PageNotFound(*id))?;
        let old = std::mem::replace(&mut page.title, title.into());
        page.touch(now_millis());
        self.version += 1;
        Ok(old)
    }

    /// Set or clear a page property, returning the previous value.
    pub fn set_property(
        &mut self,
        id: &PageId,
        name: &str,
        value: Option<PropertyValue>,
    ) -> Result<Option<PropertyValue>> {
        let page = self.pages.get_mut(id).ok_or(DocumentError::PageNotFound(*id))?;
        let old = match value {
            Some(v) => page.properties.insert(name.to_string(), v),
            None => page.properties.remove(name),
        };
        page.touch(now_millis());
        self.version += 1;
        Ok(old)
    }

    // =========================================================================
    // Block Operations
    // =========================================================================

    /// Insert a single new block under `parent` at `index` (None or past the end appends).
    pub fn insert_block(
        &mut self,
        parent: ParentRef,
        index: Option<usize>,
        block: Block,
    ) -> Result<BlockId> {
        let id = block.id;
        let mut block = block;
        block.children.clear();
        self.insert_subtree(parent, index, vec![block])?;
        Ok(id)
    }

    /// Insert a subtree (root first) under `parent`.
    ///
    /// Non-root blocks must already name their parent inside the subtree, and
    /// every listed child must be part of it.
    pub fn insert_subtree(
        &mut self,
        parent: ParentRef,
        index: Option<usize>,
        mut blocks: Vec<Block>,
    ) -> Result<()> {
        let Some(root) = blocks.first_mut() else {
            return Err(DocumentError::InvalidTree("empty subtree".into()));
        };
        root.parent = Some(parent);
        let root_id = root.id;

        self.ensure_parent_accepts(&parent)?;

        let ids: HashSet<BlockId> = blocks.iter().map(|b| b.id).collect();
        if ids.len() != blocks.len() {
            return Err(DocumentError::InvalidTree("subtree repeats a block id".into()));
        }
        for block in &blocks {
            if self.blocks.contains_key(&block.id) {
                return Err(DocumentError::DuplicateBlock(block.id));
            }
            if !block.kind.accepts(&block.content) {
                return Err(DocumentError::ContentMismatch { kind: block.kind.clone() });
            }
            if !block.children.is_empty() && !block.kind.can_have_children() {
                return Err(DocumentError::ChildrenNotAllowed { kind: block.kind.clone() });
            }
            for child in &block.children {
                if !ids.contains(child) {
                    return Err(DocumentError::InvalidTree(format!(
                        "child {child:?} of {:?} is outside the subtree",
                        block.id
                    )));
                }
            }
            if block.id != root_id {
                let owner = block.parent.and_then(|p| p.as_block());
                let listed = owner
                    .and_then(|o| blocks.iter().find(|b| b.id == o))
                    .is_some_and(|o| o.children.contains(&block.id));
                if !listed {
                    return Err(DocumentError::InvalidTree(format!(
                        "{:?} is not listed by its parent inside the subtree",
                        block.id
                    )));
                }
            }
        }

        let by_id: HashMap<BlockId, &Block> = blocks.iter().map(|b| (b.id, b)).collect();
        let mut reached = HashSet::new();
        let mut height = 0;
        let mut stack = vec![(root_id, 0)];
        while let Some((id, level)) = stack.pop() {
            if !reached.insert(id) {
                return Err(DocumentError::InvalidTree(format!(
                    "{id:?} is listed more than once inside the subtree"
                )));
            }
            height = height.max(level);
            if let Some(block) = by_id.get(&id) {
                stack.extend(block.children.iter().map(|c| (*c, level + 1)));
            }
        }
        if reached.len() != blocks.len() {
            return Err(DocumentError::InvalidTree(
                "subtree holds blocks its root does not reach".into(),
            ));
        }
        self.ensure_depth(root_id, self.depth_under(&parent) + height)?;

        let now = now_millis();
        let siblings = self.children_mut(&parent)?;
        let at = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, root_id);
        self.touch_parent(&parent, now);

        for mut block in blocks {
            block.touch(now);
            self.blocks.insert(block.id, block);
        }
        self.version += 1;
        Ok(())
    }

    /// Remove a block and its whole subtree.
    pub fn remove_block(&mut self, id: &BlockId) -> Result<RemovedSubtree> {
        let (parent, index) = self.position_of(id)?;
        let ids = self.subtree(id);

        self.children_mut(&parent)?.remove(index);
        self.touch_parent(&parent, now_millis());

        let blocks = ids
            .iter()
            .filter_map(|bid| self.blocks.remove(bid))
            .collect();
        self.version += 1;
        Ok(RemovedSubtree {
            parent,
            index,
            blocks,
        })
    }

    /// Replace a block's content, returning the previous content.
    pub fn set_content(&mut self, id: &BlockId, content: BlockContent) -> Result<BlockContent> {
        let block = self.blocks.get_mut(id).ok_or(DocumentError::BlockNotFound(*id))?;
        if !block.kind.accepts(&content) {
            return Err(DocumentError::ContentMismatch { kind: block.kind.clone() });
        }
        let old = std::mem::replace(&mut block.content, content);
        block.touch(now_millis());
        self.version += 1;
        Ok(old)
    }

    /// Replace a parent's child order with a permutation of itself.
    pub fn reorder_children(
        &mut self,
        parent: &ParentRef,
        order: Vec<BlockId>,
    ) -> Result<Vec<BlockId>> {
        let current = self.children_of(parent)?;
        if !is_permutation(current, &order) {
            return Err(DocumentError::NotAPermutation { parent: *parent });
        }
        let old = std::mem::replace(self.children_mut(parent)?, order);
        self.touch_parent(parent, now_millis());
        self.version += 1;
        Ok(old)
    }

    /// Move a block under `to` at `index`, returning its previous position.
    ///
    /// `index` is interpreted after the block has been removed from its old
    /// list, so a same-parent move is a plain array move. Indices past the end
    /// append.
    pub fn move_block(
        &mut self,
        id: &BlockId,
        to: ParentRef,
        index: usize,
    ) -> Result<(ParentRef, usize)> {
        let (from, from_index) = self.position_of(id)?;
        if self.would_cycle(id, &to) {
            return Err(DocumentError::Cycle { block: *id, target: to });
        }
        self.ensure_parent_accepts(&to)?;
        self.ensure_depth(*id, self.depth_under(&to) + self.height(id))?;

        let now = now_millis();
        self.children_mut(&from)?.remove(from_index);
        let dest = self.children_mut(&to)?;
        let at = index.min(dest.len());
        dest.insert(at, *id);

        if let Some(block) = self.blocks.get_mut(id) {
            block.parent = Some(to);
            block.touch(now);
        }
        self.touch_parent(&from, now);
        self.touch_parent(&to, now);
        self.version += 1;
        Ok((from, from_index))
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    /// Verify the tree invariants listed in the module docs.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen: HashSet<BlockId> = HashSet::new();

        let listed = self
            .pages
            .values()
            .map(|p| (ParentRef::Page(p.id), &p.children))
            .chain(
                self.blocks
                    .values()
                    .map(|b| (ParentRef::Block(b.id), &b.children)),
            );

        for (parent, children) in listed {
            for child in children {
                let block = self.blocks.get(child).ok_or_else(|| {
                    DocumentError::InvalidTree(format!("{parent} lists missing child {child:?}"))
                })?;
                if block.parent != Some(parent) {
                    return Err(DocumentError::InvalidTree(format!(
                        "{child:?} is listed by {parent} but points elsewhere"
                    )));
                }
                if !seen.insert(*child) {
                    return Err(DocumentError::InvalidTree(format!(
                        "{child:?} is listed more than once"
                    )));
                }
            }
        }

        for block in self.blocks.values() {
            if !seen.contains(&block.id) {
                return Err(DocumentError::InvalidTree(format!(
                    "{:?} is not listed by any parent",
                    block.id
                )));
            }
            if self.page_of(&block.id).is_none() {
                return Err(DocumentError::InvalidTree(format!(
                    "{:?} does not reach a page (cycle or dangling parent)",
                    block.id
                )));
            }
            self.ensure_depth(block.id, self.depth(&block.id))?;
        }
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn children_mut(&mut self, parent: &ParentRef) -> Result<&mut Vec<BlockId>> {
        match parent {
            ParentRef::Page(id) => self
                .pages
                .get_mut(id)
                .map(|p| &mut p.children)
                .ok_or(DocumentError::ParentNotFound(*parent)),
            ParentRef::Block(id) => self
                .blocks
                .get_mut(id)
                .map(|b| &mut b.children)
                .ok_or(DocumentError::ParentNotFound(*parent)),
        }
    }

    fn ensure_parent_accepts(&self, parent: &ParentRef) -> Result<()> {
        match parent {
            ParentRef::Page(id) => {
                if !self.pages.contains_key(id) {
                    return Err(DocumentError::ParentNotFound(*parent));
                }
            }
            ParentRef::Block(id) => {
                let block = self
                    .blocks
                    .get(id)
                    .ok_or(DocumentError::ParentNotFound(*parent))?;
                if !block.kind.can_have_children() {
                    return Err(DocumentError::ChildrenNotAllowed { kind: block.kind.clone() });
                }
            }
        }
        Ok(())
    }

    /// `depth` is the deepest level the change would reach.
    fn ensure_depth(&self, block: BlockId, depth: usize) -> Result<()> {
        if depth >= MAX_TREE_DEPTH {
            return Err(DocumentError::TooDeep {
                block,
                depth,
                max: MAX_TREE_DEPTH,
            });
        }
        Ok(())
    }

    fn touch_parent(&mut self, parent: &ParentRef, now: u64) {
        match parent {
            ParentRef::Page(id) => {
                if let Some(p) = self.pages.get_mut(id) {
                    p.touch(now);
                }
            }
            ParentRef::Block(id) => {
                if let Some(b) = self.blocks.get_mut(id) {
                    b.touch(now);
                }
            }
        }
    }
}

/// Same elements, same length, each exactly once.
pub fn is_permutation(current: &[BlockId], proposed: &[BlockId]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }
    let a: HashSet<&BlockId> = current.iter().collect();
    let b: HashSet<&BlockId> = proposed.iter().collect();
    a.len() == current.len() && a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanji_types::BlockKind;
    use pretty_assertions::assert_eq;

    fn page_with_blocks(n: usize) -> (Document, PageId, Vec<BlockId>) {
        let mut doc = Document::new();
        let page = doc.insert_page(Page::new("Itinerary")).unwrap();
        let ids = (0..n)
            .map(|i| {
                doc.insert_block(ParentRef::Page(page), None, Block::paragraph(format!("b{i}")))
                    .unwrap()
            })
            .collect();
        (doc, page, ids)
    }

    #[test]
    fn test_insert_appends_and_links_both_sides() {
        let (doc, page, ids) = page_with_blocks(3);
        assert_eq!(doc.children_of(&ParentRef::Page(page)).unwrap(), ids.as_slice());
        for id in &ids {
            assert_eq!(doc.block(id).unwrap().parent, Some(ParentRef::Page(page)));
        }
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_insert_at_index() {
        let (mut doc, page, ids) = page_with_blocks(2);
        let mid = doc
            .insert_block(ParentRef::Page(page), Some(1), Block::paragraph("mid"))
            .unwrap();
        assert_eq!(
            doc.children_of(&ParentRef::Page(page)).unwrap(),
            &[ids[0], mid, ids[1]]
        );
    }

    #[test]
    fn test_insert_rejects_mismatched_content() {
        let (mut doc, page, _) = page_with_blocks(0);
        let mut bad = Block::paragraph("x");
        bad.kind = BlockKind::ToDo;
        let err = doc.insert_block(ParentRef::Page(page), None, bad).unwrap_err();
        assert!(matches!(err, DocumentError::ContentMismatch { .. }));
        assert_eq!(doc.block_count(), 0);
    }

    #[test]
    fn test_insert_under_divider_rejected() {
        let (mut doc, page, _) = page_with_blocks(0);
        let divider = doc
            .insert_block(ParentRef::Page(page), None, Block::divider())
            .unwrap();
        let err = doc
            .insert_block(ParentRef::Block(divider), None, Block::paragraph("x"))
            .unwrap_err();
        assert!(matches!(err, DocumentError::ChildrenNotAllowed { .. }));
    }

    #[test]
    fn test_remove_takes_subtree_and_unlinks() {
        let (mut doc, page, ids) = page_with_blocks(2);
        let child = doc
            .insert_block(ParentRef::Block(ids[0]), None, Block::paragraph("child"))
            .unwrap();

        let removed = doc.remove_block(&ids[0]).unwrap();
        assert_eq!(removed.parent, ParentRef::Page(page));
        assert_eq!(removed.index, 0);
        assert_eq!(removed.blocks.len(), 2);
        assert!(doc.block(&child).is_none());
        assert_eq!(doc.children_of(&ParentRef::Page(page)).unwrap(), &[ids[1]]);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_reinsert_removed_subtree_restores_tree() {
        let (mut doc, page, ids) = page_with_blocks(3);
        doc.insert_block(ParentRef::Block(ids[1]), None, Block::paragraph("child"))
            .unwrap();
        let before = doc.to_snapshot().blocks;

        let removed = doc.remove_block(&ids[1]).unwrap();
        doc.insert_subtree(removed.parent, Some(removed.index), removed.blocks)
            .unwrap();

        let after = doc.to_snapshot().blocks;
        let ids_before: Vec<_> = before.iter().map(|b| b.id).collect();
        let ids_after: Vec<_> = after.iter().map(|b| b.id).collect();
        assert_eq!(ids_before, ids_after);
        assert_eq!(doc.children_of(&ParentRef::Page(page)).unwrap(), ids.as_slice());
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let (mut doc, page, ids) = page_with_blocks(3);
        let parent = ParentRef::Page(page);

        let err = doc
            .reorder_children(&parent, vec![ids[0], ids[0], ids[1]])
            .unwrap_err();
        assert_eq!(err, DocumentError::NotAPermutation { parent });

        let err = doc.reorder_children(&parent, vec![ids[0]]).unwrap_err();
        assert_eq!(err, DocumentError::NotAPermutation { parent });

        let old = doc
            .reorder_children(&parent, vec![ids[2], ids[0], ids[1]])
            .unwrap();
        assert_eq!(old, ids);
        assert_eq!(doc.children_of(&parent).unwrap(), &[ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn test_move_same_parent_is_array_move() {
        let (mut doc, page, ids) = page_with_blocks(4);
        let parent = ParentRef::Page(page);
        let prev = doc.move_block(&ids[0], parent, 2).unwrap();
        assert_eq!(prev, (parent, 0));
        assert_eq!(
            doc.children_of(&parent).unwrap(),
            &[ids[1], ids[2], ids[0], ids[3]]
        );
    }

    #[test]
    fn test_move_reparents() {
        let (mut doc, page, ids) = page_with_blocks(3);
        doc.move_block(&ids[2], ParentRef::Block(ids[0]), 0).unwrap();
        assert_eq!(doc.block(&ids[2]).unwrap().parent, Some(ParentRef::Block(ids[0])));
        assert_eq!(doc.children_of(&ParentRef::Block(ids[0])).unwrap(), &[ids[2]]);
        assert_eq!(doc.children_of(&ParentRef::Page(page)).unwrap(), &[ids[0], ids[1]]);
        assert_eq!(doc.depth(&ids[2]), 1);
        assert_eq!(doc.page_of(&ids[2]), Some(page));
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_move_under_descendant_is_cycle() {
        let (mut doc, _, ids) = page_with_blocks(1);
        let a = ids[0];
        let b = doc
            .insert_block(ParentRef::Block(a), None, Block::paragraph("b"))
            .unwrap();
        let c = doc
            .insert_block(ParentRef::Block(b), None, Block::paragraph("c"))
            .unwrap();
        let version = doc.version();

        for target in [a, b, c] {
            let err = doc.move_block(&a, ParentRef::Block(target), 0).unwrap_err();
            assert!(matches!(err, DocumentError::Cycle { .. }));
        }
        assert_eq!(doc.version(), version);
        doc.check_invariants().unwrap();
    }

    /// A page holding one chain of `len` nested paragraphs, outermost first.
    fn nested_chain(len: usize) -> (Document, PageId, Vec<BlockId>) {
        let (mut doc, page, _) = page_with_blocks(0);
        let mut parent = ParentRef::Page(page);
        let ids = (0..len)
            .map(|i| {
                let id = doc
                    .insert_block(parent, None, Block::paragraph(format!("level {i}")))
                    .unwrap();
                parent = ParentRef::Block(id);
                id
            })
            .collect();
        (doc, page, ids)
    }

    #[test]
    fn test_insert_past_depth_limit_is_refused() {
        let (mut doc, _, chain) = nested_chain(MAX_TREE_DEPTH);
        let deepest = *chain.last().unwrap();
        assert_eq!(doc.depth(&deepest), MAX_TREE_DEPTH - 1);
        doc.check_invariants().unwrap();

        let count = doc.block_count();
        let err = doc
            .insert_block(ParentRef::Block(deepest), None, Block::paragraph("one more"))
            .unwrap_err();
        assert!(matches!(
            err,
            DocumentError::TooDeep { depth, max, .. }
                if depth == MAX_TREE_DEPTH && max == MAX_TREE_DEPTH
        ));
        assert_eq!(doc.block_count(), count);
    }

    #[test]
    fn test_cycle_is_caught_at_full_depth() {
        let (mut doc, page, chain) = nested_chain(MAX_TREE_DEPTH);
        let (root, deepest) = (chain[0], *chain.last().unwrap());

        assert!(doc.is_within(&deepest, &root));
        assert!(doc.would_cycle(&root, &ParentRef::Block(deepest)));
        let err = doc.move_block(&root, ParentRef::Block(deepest), 0).unwrap_err();
        assert!(matches!(err, DocumentError::Cycle { .. }));
        assert_eq!(doc.page_of(&root), Some(page));
        assert_eq!(doc.page_of(&deepest), Some(page));
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_move_counts_the_moved_subtree_depth() {
        let (mut doc, page, chain) = nested_chain(MAX_TREE_DEPTH - 1);
        let deepest = *chain.last().unwrap();
        let branch = doc
            .insert_block(ParentRef::Page(page), None, Block::paragraph("branch"))
            .unwrap();
        let leaf = doc
            .insert_block(ParentRef::Block(branch), None, Block::paragraph("leaf"))
            .unwrap();

        let err = doc.move_block(&branch, ParentRef::Block(deepest), 0).unwrap_err();
        assert!(matches!(err, DocumentError::TooDeep { depth, .. } if depth == MAX_TREE_DEPTH));
        assert_eq!(doc.block(&branch).unwrap().parent, Some(ParentRef::Page(page)));

        // The leaf alone still fits.
        doc.move_block(&leaf, ParentRef::Block(deepest), 0).unwrap();
        assert_eq!(doc.depth(&leaf), MAX_TREE_DEPTH - 1);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_from_snapshot_reports_overly_deep_tree() {
        let mut page = Page::new("deep");
        let mut blocks: Vec<Block> = (0..300).map(|i| Block::paragraph(format!("{i}"))).collect();
        page.children.push(blocks[0].id);
        for i in 0..blocks.len() {
            blocks[i].parent = Some(match i {
                0 => ParentRef::Page(page.id),
                _ => ParentRef::Block(blocks[i - 1].id),
            });
            if let Some(next) = blocks.get(i + 1).map(|b| b.id) {
                blocks[i].children.push(next);
            }
        }

        let err = Document::from_snapshot(DocumentSnapshot {
            pages: vec![page],
            blocks,
        })
        .unwrap_err();
        assert!(matches!(err, DocumentError::TooDeep { depth, .. } if depth >= MAX_TREE_DEPTH));
    }

    #[test]
    fn test_from_snapshot_rejects_parent_loop() {
        let page = Page::new("looped");
        let mut a = Block::paragraph("a");
        let mut b = Block::paragraph("b");
        a.parent = Some(ParentRef::Block(b.id));
        b.parent = Some(ParentRef::Block(a.id));
        a.children.push(b.id);
        b.children.push(a.id);

        let err = Document::from_snapshot(DocumentSnapshot {
            pages: vec![page],
            blocks: vec![a, b],
        })
        .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidTree(_)));
    }

    #[test]
    fn test_insert_subtree_rejects_looping_children() {
        let (mut doc, page, _) = page_with_blocks(0);
        let mut root = Block::paragraph("root");
        let mut child = Block::paragraph("child");
        child.parent = Some(ParentRef::Block(root.id));
        root.children.push(child.id);
        child.children.push(child.id);

        let err = doc
            .insert_subtree(ParentRef::Page(page), None, vec![root, child])
            .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidTree(_)));
        assert_eq!(doc.block_count(), 0);
    }

    #[test]
    fn test_flatten_respects_closed_toggles() {
        let (mut doc, page, _) = page_with_blocks(0);
        let toggle = doc
            .insert_block(ParentRef::Page(page), None, Block::toggle("FAQ"))
            .unwrap();
        doc.insert_block(ParentRef::Block(toggle), None, Block::paragraph("answer"))
            .unwrap();

        assert_eq!(doc.flatten(&page, true).unwrap().len(), 2);

        doc.set_content(
            &toggle,
            BlockContent::Toggle {
                spans: vec![hanji_types::TextSpan::plain("FAQ")],
                open: false,
            },
        )
        .unwrap();
        let flat = doc.flatten(&page, true).unwrap();
        assert_eq!(flat, vec![FlatBlock { id: toggle, depth: 0 }]);
        assert_eq!(doc.flatten(&page, false).unwrap().len(), 2);
    }

    #[test]
    fn test_snapshot_roundtrip_validates() {
        let (doc, _, ids) = page_with_blocks(2);
        let snap = doc.to_snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let back: DocumentSnapshot = serde_json::from_str(&json).unwrap();
        let rebuilt = Document::from_snapshot(back).unwrap();
        assert_eq!(rebuilt.block_count(), 2);
        assert!(rebuilt.block(&ids[1]).is_some());
    }

    #[test]
    fn test_from_snapshot_rejects_dangling_child() {
        let mut page = Page::new("broken");
        page.children.push(BlockId::new());
        let err = Document::from_snapshot(DocumentSnapshot {
            pages: vec![page],
            blocks: vec![],
        })
        .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidTree(_)));
    }

    #[test]
    fn test_page_text_concatenates_blocks() {
        let (doc, page, _) = page_with_blocks(2);
        assert_eq!(doc.page_text(&page), "b0\nb1");
    }
}
