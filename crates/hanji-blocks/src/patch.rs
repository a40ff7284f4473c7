//! Patches: typed, invertible change sets relative to a target.
//!
//! A [`Patch`] is what travels to the backend. Applying one to a
//! [`Document`] returns its inverse, computed from the state the patch
//! replaced; applying the inverse restores that state exactly.

use std::fmt;

use hanji_types::{Block, BlockContent, BlockId, PageId, ParentRef, PropertyValue};
use serde::{Deserialize, Serialize};

use crate::{Document, DocumentError, Result};

/// What a patch (or an edit) applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Target {
    Page(PageId),
    Block(BlockId),
}

impl Target {
    /// The same node viewed as a parent of blocks.
    pub fn as_parent(&self) -> ParentRef {
        match self {
            Target::Page(id) => ParentRef::Page(*id),
            Target::Block(id) => ParentRef::Block(*id),
        }
    }
}

impl From<ParentRef> for Target {
    fn from(parent: ParentRef) -> Self {
        match parent {
            ParentRef::Page(id) => Target::Page(id),
            ParentRef::Block(id) => Target::Block(id),
        }
    }
}

impl From<BlockId> for Target {
    fn from(id: BlockId) -> Self {
        Target::Block(id)
    }
}

impl From<PageId> for Target {
    fn from(id: PageId) -> Self {
        Target::Page(id)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_parent().fmt(f)
    }
}

/// A change to one target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Patch {
    /// Replace a block's payload. Target: block.
    Content { content: BlockContent },
    /// Replace a page title. Target: page.
    Title { title: String },
    /// Set (`Some`) or clear (`None`) a page property. Target: page.
    Property {
        name: String,
        value: Option<PropertyValue>,
    },
    /// Permute a parent's children. Target: the parent.
    Reorder { order: Vec<BlockId> },
    /// Re-home a block. Target: the moving block.
    ///
    /// `index` counts positions in `to` after the block has left its old list.
    Move { to: ParentRef, index: usize },
    /// Insert a subtree, root first. Target: the new parent.
    Insert { index: usize, blocks: Vec<Block> },
    /// Remove a child and its subtree. Target: the parent.
    Remove { block: BlockId },
}

/// The part of a target an edit touches.
///
/// Edits to the same target and field coalesce into a single pending
/// mutation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PatchField {
    Content,
    Title,
    Property(String),
    Order,
    Position,
}

impl Patch {
    /// Short operation name, for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Patch::Content { .. } => "content",
            Patch::Title { .. } => "title",
            Patch::Property { .. } => "property",
            Patch::Reorder { .. } => "reorder",
            Patch::Move { .. } => "move",
            Patch::Insert { .. } => "insert",
            Patch::Remove { .. } => "remove",
        }
    }

    /// The field this patch overwrites, or `None` for inserts and removes,
    /// which never coalesce.
    pub fn field(&self) -> Option<PatchField> {
        match self {
            Patch::Content { .. } => Some(PatchField::Content),
            Patch::Title { .. } => Some(PatchField::Title),
            Patch::Property { name, .. } => Some(PatchField::Property(name.clone())),
            Patch::Reorder { .. } => Some(PatchField::Order),
            Patch::Move { .. } => Some(PatchField::Position),
            Patch::Insert { .. } | Patch::Remove { .. } => None,
        }
    }

    /// Length in characters of the user-entered text this patch carries.
    pub fn text_len(&self) -> usize {
        match self {
            Patch::Content { content } => content.plain_text().chars().count(),
            Patch::Title { title } => title.chars().count(),
            Patch::Property { value, .. } => value
                .as_ref()
                .and_then(|v| v.as_text())
                .map_or(0, |t| t.chars().count()),
            _ => 0,
        }
    }
}

impl Document {
    /// Apply `patch` to `target`, returning the inverse patch.
    ///
    /// On `Err` the document is unchanged.
    pub fn apply(&mut self, target: &Target, patch: &Patch) -> Result<Patch> {
        let wrong = || DocumentError::WrongTarget {
            patch: patch.name(),
            target: target.to_string(),
        };

        match (patch, target) {
            (Patch::Content { content }, Target::Block(id)) => {
                let old = self.set_content(id, content.clone())?;
                Ok(Patch::Content { content: old })
            }
            (Patch::Title { title }, Target::Page(id)) => {
                let old = self.set_title(id, title.clone())?;
                Ok(Patch::Title { title: old })
            }
            (Patch::Property { name, value }, Target::Page(id)) => {
                let old = self.set_property(id, name, value.clone())?;
                Ok(Patch::Property {
                    name: name.clone(),
                    value: old,
                })
            }
            (Patch::Reorder { order }, _) => {
                let old = self.reorder_children(&target.as_parent(), order.clone())?;
                Ok(Patch::Reorder { order: old })
            }
            (Patch::Move { to, index }, Target::Block(id)) => {
                let (from, from_index) = self.move_block(id, *to, *index)?;
                Ok(Patch::Move {
                    to: from,
                    index: from_index,
                })
            }
            (Patch::Insert { index, blocks }, _) => {
                let root = blocks
                    .first()
                    .map(|b| b.id)
                    .ok_or_else(|| DocumentError::InvalidTree("empty subtree".into()))?;
                self.insert_subtree(target.as_parent(), Some(*index), blocks.clone())?;
                Ok(Patch::Remove { block: root })
            }
            (Patch::Remove { block }, _) => {
                let (parent, _) = self.position_of(block)?;
                if parent != target.as_parent() {
                    return Err(DocumentError::InvalidTree(format!(
                        "{block:?} is not a child of {target}"
                    )));
                }
                let removed = self.remove_block(block)?;
                Ok(Patch::Insert {
                    index: removed.index,
                    blocks: removed.blocks,
                })
            }
            _ => Err(wrong()),
        }
    }

    /// Compute the inverse of `patch` without applying it.
    pub fn inverse(&self, target: &Target, patch: &Patch) -> Result<Patch> {
        let mut scratch = self.clone();
        scratch.apply(target, patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hanji_types::Page;
    use pretty_assertions::assert_eq;

    fn fixture() -> (Document, PageId, Vec<BlockId>) {
        let mut doc = Document::new();
        let page = doc.insert_page(Page::new("Notes")).unwrap();
        let ids = ["a", "b", "c"]
            .iter()
            .map(|t| {
                doc.insert_block(ParentRef::Page(page), None, Block::paragraph(*t))
                    .unwrap()
            })
            .collect();
        (doc, page, ids)
    }

    fn shape(doc: &Document) -> Vec<(BlockId, Option<ParentRef>, String)> {
        doc.to_snapshot()
            .blocks
            .into_iter()
            .map(|b| (b.id, b.parent, b.plain_text()))
            .collect()
    }

    #[test]
    fn test_content_inverse_restores() {
        let (mut doc, _, ids) = fixture();
        let target = Target::Block(ids[0]);
        let inverse = doc
            .apply(&target, &Patch::Content { content: BlockContent::text("A!") })
            .unwrap();
        assert_eq!(doc.block(&ids[0]).unwrap().plain_text(), "A!");
        doc.apply(&target, &inverse).unwrap();
        assert_eq!(doc.block(&ids[0]).unwrap().plain_text(), "a");
    }

    #[test]
    fn test_property_clear_inverse_sets_back() {
        let (mut doc, page, _) = fixture();
        let target = Target::Page(page);
        doc.apply(
            &target,
            &Patch::Property {
                name: "Status".into(),
                value: Some(PropertyValue::Select(Some("Draft".into()))),
            },
        )
        .unwrap();
        let inverse = doc
            .apply(
                &target,
                &Patch::Property {
                    name: "Status".into(),
                    value: None,
                },
            )
            .unwrap();
        assert!(doc.page(&page).unwrap().property("Status").is_none());
        doc.apply(&target, &inverse).unwrap();
        assert_eq!(
            doc.page(&page).unwrap().property("Status"),
            Some(&PropertyValue::Select(Some("Draft".into())))
        );
    }

    #[test]
    fn test_move_inverse_restores_position() {
        let (mut doc, page, ids) = fixture();
        let before = shape(&doc);
        let inverse = doc
            .apply(
                &Target::Block(ids[2]),
                &Patch::Move {
                    to: ParentRef::Block(ids[0]),
                    index: 0,
                },
            )
            .unwrap();
        assert_eq!(
            inverse,
            Patch::Move {
                to: ParentRef::Page(page),
                index: 2
            }
        );
        doc.apply(&Target::Block(ids[2]), &inverse).unwrap();
        assert_eq!(shape(&doc), before);
    }

    #[test]
    fn test_remove_then_insert_roundtrip() {
        let (mut doc, page, ids) = fixture();
        doc.insert_block(ParentRef::Block(ids[1]), None, Block::paragraph("b.1"))
            .unwrap();
        let before = shape(&doc);

        let target = Target::Page(page);
        let inverse = doc.apply(&target, &Patch::Remove { block: ids[1] }).unwrap();
        assert_eq!(doc.block_count(), 2);
        let again = doc.apply(&target, &inverse).unwrap();
        assert_eq!(again, Patch::Remove { block: ids[1] });
        assert_eq!(shape(&doc), before);
        doc.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_from_wrong_parent_rejected() {
        let (mut doc, _, ids) = fixture();
        let err = doc
            .apply(&Target::Block(ids[0]), &Patch::Remove { block: ids[1] })
            .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidTree(_)));
        assert_eq!(doc.block_count(), 3);
    }

    #[test]
    fn test_wrong_target_kind() {
        let (mut doc, _, ids) = fixture();
        let err = doc
            .apply(&Target::Block(ids[0]), &Patch::Title { title: "x".into() })
            .unwrap_err();
        assert!(matches!(err, DocumentError::WrongTarget { patch: "title", .. }));
    }

    #[test]
    fn test_inverse_does_not_mutate() {
        let (doc, page, ids) = fixture();
        let version = doc.version();
        let inverse = doc
            .inverse(
                &Target::Page(page),
                &Patch::Reorder {
                    order: vec![ids[2], ids[1], ids[0]],
                },
            )
            .unwrap();
        assert_eq!(inverse, Patch::Reorder { order: ids.clone() });
        assert_eq!(doc.version(), version);
    }

    #[test]
    fn test_field_slots() {
        assert_eq!(
            Patch::Title { title: "t".into() }.field(),
            Some(PatchField::Title)
        );
        assert_eq!(
            Patch::Property {
                name: "Tags".into(),
                value: None
            }
            .field(),
            Some(PatchField::Property("Tags".into()))
        );
        assert_eq!(Patch::Remove { block: BlockId::new() }.field(), None);
    }

    #[test]
    fn test_patch_json_shape() {
        let patch = Patch::Move {
            to: ParentRef::Page(PageId::new()),
            index: 3,
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json["op"], "move");
        assert_eq!(json["to"]["type"], "page");
        assert_eq!(json["index"], 3);
    }
}
