//! Drag-to-reorder gestures over the block tree.
//!
//! ```text
//!            start              over*             drop
//!  Idle ───────────► Dragging ────────► Dragging ──────► Dropped(outcome)
//!   ▲                   │                                     │
//!   │                   └──── cancel ───► Cancelled           │
//!   └─────────────────── start (new gesture) ◄────────────────┘
//! ```
//!
//! The engine never writes the tree itself. A successful drop becomes one
//! patch submitted through the [`OptimisticController`], so a backend refusal
//! rolls the tree back like any other edit.

use serde::{Deserialize, Serialize};
use tracing::debug;

use hanji_blocks::{Patch, Target};
use hanji_types::{BlockId, ParentRef};

use crate::error::{EditError, Result};
use crate::optimistic::OptimisticController;

/// How the pointer relates to the block it is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropKind {
    /// Take the target's place in its list.
    Sibling,
    /// Become the target's last child.
    Inside,
}

/// Where the dragged block would land if released now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropTarget {
    /// A position in the list the block came from.
    Sibling { parent: ParentRef, index: usize },
    /// A list owned by another parent. `None` appends.
    Zone {
        parent: ParentRef,
        index: Option<usize>,
    },
}

/// What a finished drop did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropOutcome {
    NoOp,
    Reordered {
        parent: ParentRef,
        from: usize,
        to: usize,
    },
    Reparented {
        from: ParentRef,
        to: ParentRef,
        index: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragSession {
    pub dragged: BlockId,
    pub origin: ParentRef,
    pub origin_index: usize,
    pub over: Option<DropTarget>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
    Dropped(DropOutcome),
    Cancelled,
}

/// Drives one drag gesture at a time.
#[derive(Debug)]
pub struct DragEngine {
    controller: OptimisticController,
    state: DragState,
}

impl DragEngine {
    pub fn new(controller: OptimisticController) -> Self {
        Self {
            controller,
            state: DragState::Idle,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    /// Pick up a block.
    pub fn start(&mut self, dragged: BlockId) -> Result<()> {
        if self.is_dragging() {
            return Err(EditError::Validation("a drag is already in progress".into()));
        }
        let (origin, origin_index) = self.controller.document().read().position_of(&dragged)?;
        debug!(block = %dragged, %origin, origin_index, "drag started");
        self.state = DragState::Dragging(DragSession {
            dragged,
            origin,
            origin_index,
            over: None,
        });
        Ok(())
    }

    /// The pointer moved over `target`.
    pub fn over(&mut self, target: BlockId, kind: DropKind) -> Result<DropTarget> {
        let (parent, index) = self.controller.document().read().position_of(&target)?;
        let session = self.session_mut()?;
        let drop = match kind {
            DropKind::Sibling if parent == session.origin => DropTarget::Sibling { parent, index },
            DropKind::Sibling => DropTarget::Zone {
                parent,
                index: Some(index),
            },
            DropKind::Inside => DropTarget::Zone {
                parent: ParentRef::Block(target),
                index: None,
            },
        };
        session.over = Some(drop);
        Ok(drop)
    }

    /// The pointer moved over a container's drop zone (for example an empty
    /// list or the gap after its last row). `None` means the end of the list.
    ///
    /// On the list the block came from, `index` names a gap between rows as
    /// they are shown, with the dragged block still in place. The gaps on
    /// either side of it leave the order unchanged.
    pub fn over_zone(&mut self, parent: ParentRef, index: Option<usize>) -> Result<DropTarget> {
        let dragged = self.session_mut()?.dragged;
        let (len, from) = {
            let doc = self.controller.document();
            let doc = doc.read();
            let children = doc.children_of(&parent)?;
            (children.len(), children.iter().position(|id| *id == dragged))
        };
        let drop = match from {
            Some(from) => {
                let gap = index.unwrap_or(len).min(len);
                DropTarget::Sibling {
                    parent,
                    index: if gap > from { gap - 1 } else { gap },
                }
            }
            None => DropTarget::Zone { parent, index },
        };
        self.session_mut()?.over = Some(drop);
        Ok(drop)
    }

    /// The pointer left every drop target.
    pub fn leave(&mut self) -> Result<()> {
        self.session_mut()?.over = None;
        Ok(())
    }

    /// Release the block over its current target.
    ///
    /// Releasing over nothing cancels. A drop that would nest the block inside
    /// itself is refused before anything is applied or sent.
    #[allow(clippy::should_implement_trait)]
    pub async fn drop(&mut self) -> Result<DropOutcome> {
        let session = self.session_mut()?.clone();
        let Some(over) = session.over else {
            debug!(block = %session.dragged, "released over nothing");
            self.state = DragState::Cancelled;
            return Ok(DropOutcome::NoOp);
        };

        match self.submit(&session, over).await {
            Ok(outcome) => {
                debug!(block = %session.dragged, ?outcome, "drop applied");
                self.state = DragState::Dropped(outcome);
                Ok(outcome)
            }
            Err(err) => {
                self.state = DragState::Idle;
                Err(err)
            }
        }
    }

    /// Abandon the gesture without touching the tree.
    pub fn cancel(&mut self) {
        if self.is_dragging() {
            self.state = DragState::Cancelled;
        }
    }

    /// Run a whole gesture: pick up `dragged`, hover `target`, release.
    pub async fn reorder(
        &mut self,
        dragged: BlockId,
        target: BlockId,
        kind: DropKind,
    ) -> Result<DropOutcome> {
        self.start(dragged)?;
        if let Err(err) = self.over(target, kind) {
            self.cancel();
            return Err(err);
        }
        self.drop().await
    }

    fn session_mut(&mut self) -> Result<&mut DragSession> {
        match &mut self.state {
            DragState::Dragging(session) => Ok(session),
            _ => Err(EditError::Validation("no drag in progress".into())),
        }
    }

    async fn submit(&self, session: &DragSession, over: DropTarget) -> Result<DropOutcome> {
        match over {
            DropTarget::Sibling { parent, index } => {
                let mut order = self.controller.document().read().children_of(&parent)?.to_vec();
                let from = order
                    .iter()
                    .position(|id| *id == session.dragged)
                    .ok_or(EditError::NotFound(Target::Block(session.dragged)))?;
                if index == from {
                    return Ok(DropOutcome::NoOp);
                }
                let moved = order.remove(from);
                let to = index.min(order.len());
                order.insert(to, moved);
                self.controller.submit(Target::from(parent), Patch::Reorder { order }).await?;
                Ok(DropOutcome::Reordered { parent, from, to })
            }
            DropTarget::Zone { parent, index } => {
                let index = {
                    let doc = self.controller.document();
                    let doc = doc.read();
                    if doc.would_cycle(&session.dragged, &parent) {
                        None
                    } else {
                        Some(index.unwrap_or(doc.children_of(&parent)?.len()))
                    }
                };
                let Some(index) = index else {
                    let err = EditError::CycleRejected {
                        block: session.dragged,
                        target: parent,
                    };
                    self.controller
                        .context()
                        .notify(Some(Target::Block(session.dragged)), &err);
                    return Err(err);
                };
                self.controller
                    .submit(Target::Block(session.dragged), Patch::Move { to: parent, index })
                    .await?;
                Ok(DropOutcome::Reparented {
                    from: session.origin,
                    to: parent,
                    index,
                })
            }
        }
    }
}
