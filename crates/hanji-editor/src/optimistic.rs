//! Optimistic edits with debounced autosave and rollback.
//!
//! Every edit is applied to the shared [`Document`] before the backend hears
//! about it. The controller remembers the inverse of the first edit in each
//! editing slot (target plus field) and restores it if the backend refuses.
//!
//! # Mutation Lifecycle
//!
//! ```text
//! begin_edit ──► Pending ──(debounce elapses / commit / save)──► Committing
//!                  │  ▲                                              │
//!                  │  └── begin_edit on the same slot (coalesce)     ├─ ok ──► Committed
//!                  │                                                 └─ err ─► RolledBack
//!                  └── cancel / close_editor ───────────────────────────────► RolledBack
//! ```
//!
//! Only the latest value of a slot is ever sent: a burst of keystrokes inside
//! one debounce window produces exactly one backend call.
//!
//! # Overlapping Sends
//!
//! Every change to a slot, debounced or submitted, gets a generation when it
//! is applied. A failed send reverts only if nothing newer is visible on its
//! slot (pending, in flight, or committed). Otherwise its rollback patch is
//! handed to the first change applied after it, whose own snapshot shows the
//! value that just failed.
//!
//! # Locking
//!
//! The session table is always locked before the document, and neither lock
//! is held across an `.await`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use hanji_blocks::{Document, Patch, PatchField, Target};
use hanji_types::MutationId;

use crate::backend::DocumentBackend;
use crate::error::{EditError, Result};
use crate::notices::EditorContext;

/// The document as seen by every view of this editor.
pub type SharedDocument = Arc<RwLock<Document>>;

// ============================================================================
// Configuration
// ============================================================================

/// Autosave and validation settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Quiet period after the last keystroke before a save is sent.
    pub autosave_debounce_ms: u64,
    /// Longest block text or property text accepted, in characters.
    pub max_text_len: usize,
    /// Longest page title accepted, in characters.
    pub max_title_len: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: 1000,
            max_text_len: 2000,
            max_title_len: 200,
        }
    }
}

impl EditorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

// ============================================================================
// Mutation records
// ============================================================================

/// Where a mutation is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationStatus {
    Pending,
    Committing,
    Committed,
    RolledBack,
}

/// An optimistic change and the snapshot needed to undo it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingMutation {
    pub id: MutationId,
    pub target: Target,
    /// Patch restoring the value from before the first coalesced edit.
    pub previous: Patch,
    /// The latest value, which is what gets sent.
    pub proposed: Patch,
    pub status: MutationStatus,
}

impl PendingMutation {
    fn new(target: Target, previous: Patch, proposed: Patch) -> Self {
        Self {
            id: MutationId::new(),
            target,
            previous,
            proposed,
            status: MutationStatus::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }

    fn slot(&self) -> Option<EditSlot> {
        self.proposed.field().map(|field| EditSlot {
            target: self.target,
            field,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct EditSlot {
    target: Target,
    field: PatchField,
}

struct Session {
    record: PendingMutation,
    /// Generation of the edit that opened this session.
    started: u64,
    /// Generation of the most recent edit folded into this session.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// A send waiting on the backend.
struct Flight {
    started: u64,
    generation: u64,
    previous: Patch,
}

#[derive(Default)]
struct Slots {
    pending: HashMap<EditSlot, Session>,
    in_flight: HashMap<EditSlot, Vec<Flight>>,
    /// Generation of the last successful commit per slot.
    committed: HashMap<EditSlot, u64>,
}

impl Slots {
    fn launch(&mut self, slot: &EditSlot, started: u64, generation: u64, previous: &Patch) {
        self.in_flight.entry(slot.clone()).or_default().push(Flight {
            started,
            generation,
            previous: previous.clone(),
        });
    }

    /// Take a pending session off the table and mark it as sending.
    fn launch_session(
        &mut self,
        slot: &EditSlot,
        check: impl Fn(&Session) -> bool,
    ) -> Option<Session> {
        let session = self.take(slot, check)?;
        self.launch(slot, session.started, session.generation, &session.record.previous);
        Some(session)
    }

    /// Remove a finished send. Returns its rollback patch, which may have
    /// been rebased while it was in flight.
    fn land(&mut self, slot: &EditSlot, generation: u64) -> Option<Patch> {
        let flights = self.in_flight.get_mut(slot)?;
        let at = flights.iter().position(|f| f.generation == generation)?;
        let flight = flights.remove(at);
        if flights.is_empty() {
            self.in_flight.remove(slot);
        }
        Some(flight.previous)
    }

    /// Whether a change newer than `generation` is visible on `slot`.
    fn superseded(&self, slot: &EditSlot, generation: u64) -> bool {
        self.committed.get(slot).is_some_and(|&last| last > generation)
            || self.pending.get(slot).is_some_and(|s| s.generation > generation)
            || self
                .in_flight
                .get(slot)
                .is_some_and(|flights| flights.iter().any(|f| f.generation > generation))
    }

    /// Give `previous` to the first change applied after `generation`.
    fn rebase(&mut self, slot: &EditSlot, generation: u64, previous: &Patch) -> bool {
        let flight = self.in_flight.get_mut(slot).and_then(|flights| {
            flights
                .iter_mut()
                .filter(|f| f.started > generation)
                .min_by_key(|f| f.started)
        });
        let session = self.pending.get_mut(slot).filter(|s| s.started > generation);
        let heir = match (flight, session) {
            (Some(f), Some(s)) if s.started < f.started => &mut s.record.previous,
            (Some(f), _) => &mut f.previous,
            (None, Some(s)) => &mut s.record.previous,
            (None, None) => return false,
        };
        *heir = previous.clone();
        true
    }

    fn take(&mut self, slot: &EditSlot, check: impl Fn(&Session) -> bool) -> Option<Session> {
        if self.pending.get(slot).is_some_and(check) {
            self.pending.remove(slot)
        } else {
            None
        }
    }

    fn take_target(&mut self, target: &Target) -> Vec<(EditSlot, Session)> {
        let slots: Vec<EditSlot> =
            self.pending.keys().filter(|s| &s.target == target).cloned().collect();
        slots
            .into_iter()
            .filter_map(|slot| self.pending.remove(&slot).map(|session| (slot, session)))
            .collect()
    }
}

// ============================================================================
// Controller
// ============================================================================

struct Inner {
    doc: SharedDocument,
    backend: Arc<dyn DocumentBackend>,
    ctx: EditorContext,
    config: EditorConfig,
    slots: Mutex<Slots>,
    generation: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for session in self.slots.get_mut().pending.values_mut() {
            if let Some(timer) = session.timer.take() {
                timer.abort();
            }
        }
    }
}

/// Applies edits locally at once and persists them in the background.
///
/// Cheap to clone; clones share sessions and the document. Methods that
/// schedule autosaves spawn onto the current tokio runtime.
#[derive(Clone)]
pub struct OptimisticController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for OptimisticController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimisticController")
            .field("config", &self.inner.config)
            .field("pending", &self.inner.slots.lock().pending.len())
            .finish_non_exhaustive()
    }
}

impl OptimisticController {
    pub fn new(
        doc: SharedDocument,
        backend: Arc<dyn DocumentBackend>,
        ctx: EditorContext,
        config: EditorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                doc,
                backend,
                ctx,
                config,
                slots: Mutex::new(Slots::default()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn document(&self) -> SharedDocument {
        Arc::clone(&self.inner.doc)
    }

    pub fn context(&self) -> &EditorContext {
        &self.inner.ctx
    }

    pub fn config(&self) -> &EditorConfig {
        &self.inner.config
    }

    /// Snapshot of every mutation still waiting for its autosave.
    pub fn pending(&self) -> Vec<PendingMutation> {
        self.inner
            .slots
            .lock()
            .pending
            .values()
            .map(|s| s.record.clone())
            .collect()
    }

    pub fn has_pending(&self, target: &Target) -> bool {
        self.inner.slots.lock().pending.keys().any(|s| &s.target == target)
    }

    /// Check length limits. Nothing is applied.
    pub fn validate(&self, patch: &Patch) -> Result<()> {
        let config = &self.inner.config;
        let (len, max) = match patch {
            Patch::Title { .. } => (patch.text_len(), config.max_title_len),
            Patch::Insert { blocks, .. } => (
                blocks
                    .iter()
                    .map(|b| b.plain_text().chars().count())
                    .max()
                    .unwrap_or(0),
                config.max_text_len,
            ),
            _ => (patch.text_len(), config.max_text_len),
        };
        if len > max {
            return Err(EditError::TooLong { len, max });
        }
        Ok(())
    }

    /// Apply an edit locally and schedule its autosave.
    ///
    /// A second edit to the same slot while the first is still pending is
    /// folded into it: the record keeps its id and original rollback
    /// snapshot, the proposed value is replaced, and the debounce restarts.
    pub fn begin_edit(&self, target: Target, proposed: Patch) -> Result<PendingMutation> {
        let field = proposed.field().ok_or_else(|| {
            EditError::Validation(format!("'{}' edits are structural, use submit", proposed.name()))
        })?;
        self.validate(&proposed)
            .inspect_err(|err| self.inner.ctx.notify(Some(target), err))?;
        let slot = EditSlot { target, field };

        let mut slots = self.inner.slots.lock();
        let inverse = self.inner.doc.write().apply(&target, &proposed)?;
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let timer = self.spawn_autosave(slot.clone(), generation);

        let record = match slots.pending.get_mut(&slot) {
            Some(session) => {
                if let Some(stale) = session.timer.replace(timer) {
                    stale.abort();
                }
                session.generation = generation;
                session.record.proposed = proposed;
                debug!(
                    id = %session.record.id,
                    %target,
                    op = session.record.proposed.name(),
                    "edit coalesced"
                );
                session.record.clone()
            }
            None => {
                let record = PendingMutation::new(target, inverse, proposed);
                debug!(id = %record.id, %target, op = record.proposed.name(), "edit pending");
                slots.pending.insert(
                    slot,
                    Session {
                        record: record.clone(),
                        started: generation,
                        generation,
                        timer: Some(timer),
                    },
                );
                record
            }
        };
        Ok(record)
    }

    /// Send a pending mutation now instead of waiting for the debounce.
    pub async fn commit(&self, pending: &PendingMutation) -> Result<PendingMutation> {
        let not_pending = || EditError::NotPending(pending.id);
        let slot = pending.slot().ok_or_else(not_pending)?;
        let session = self
            .inner
            .slots
            .lock()
            .launch_session(&slot, |s| s.record.id == pending.id)
            .ok_or_else(not_pending)?;
        if let Some(timer) = session.timer {
            timer.abort();
        }
        self.send(Some(&slot), session.generation, session.record).await
    }

    /// Drop a pending mutation and restore the value from before it.
    pub fn cancel(&self, pending: &PendingMutation) -> Result<PendingMutation> {
        let not_pending = || EditError::NotPending(pending.id);
        let slot = pending.slot().ok_or_else(not_pending)?;
        let mut slots = self.inner.slots.lock();
        let session = slots
            .take(&slot, |s| s.record.id == pending.id)
            .ok_or_else(not_pending)?;
        Ok(self.discard(session))
    }

    /// Flush every pending mutation of `target` immediately.
    ///
    /// All slots are sent even if one fails; the first failure is returned.
    pub async fn save(&self, target: &Target) -> Result<Vec<PendingMutation>> {
        let sessions = {
            let mut slots = self.inner.slots.lock();
            let sessions = slots.take_target(target);
            for (slot, session) in &sessions {
                slots.launch(slot, session.started, session.generation, &session.record.previous);
            }
            sessions
        };
        if sessions.is_empty() {
            return Ok(Vec::new());
        }
        info!(%target, count = sessions.len(), "saving pending edits");

        let sends = sessions.into_iter().map(|(slot, mut session)| {
            if let Some(timer) = session.timer.take() {
                timer.abort();
            }
            async move { self.send(Some(&slot), session.generation, session.record).await }
        });
        futures::future::join_all(sends).await.into_iter().collect()
    }

    /// The editor for `target` went away: revert its unsaved edits.
    ///
    /// Returns the reverted records. No autosave fires for them afterwards.
    pub fn close_editor(&self, target: &Target) -> Vec<PendingMutation> {
        let mut slots = self.inner.slots.lock();
        let sessions = slots.take_target(target);
        if !sessions.is_empty() {
            info!(%target, count = sessions.len(), "editor closed, reverting unsaved edits");
        }
        sessions.into_iter().map(|(_, session)| self.discard(session)).collect()
    }

    /// Apply a one-shot change and send it immediately.
    ///
    /// Used for structural edits (insert, remove, drag results). The change
    /// is visible before the call returns and reverted if the backend
    /// refuses. Reorders and moves share slots with other sends to the same
    /// target, so a late failure never undoes a newer order.
    pub async fn submit(&self, target: Target, patch: Patch) -> Result<PendingMutation> {
        self.validate(&patch)
            .inspect_err(|err| self.inner.ctx.notify(Some(target), err))?;
        let (record, slot, generation) = {
            let mut slots = self.inner.slots.lock();
            let inverse = self.inner.doc.write().apply(&target, &patch)?;
            let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
            let record = PendingMutation::new(target, inverse, patch);
            let slot = record.slot();
            if let Some(slot) = &slot {
                slots.launch(slot, generation, generation, &record.previous);
            }
            (record, slot, generation)
        };
        debug!(id = %record.id, %target, op = record.proposed.name(), generation, "submitting");
        self.send(slot.as_ref(), generation, record).await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn spawn_autosave(&self, slot: EditSlot, generation: u64) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let debounce = self.inner.config.debounce();
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let controller = OptimisticController { inner };
            let session = controller
                .inner
                .slots
                .lock()
                .launch_session(&slot, |s| s.generation == generation);
            // Superseded, cancelled, or already committed by hand.
            let Some(session) = session else {
                return;
            };
            // Errors were already logged and published as notices.
            let _ = controller.send(Some(&slot), generation, session.record).await;
        })
    }

    async fn send(
        &self,
        slot: Option<&EditSlot>,
        generation: u64,
        mut record: PendingMutation,
    ) -> Result<PendingMutation> {
        record.status = MutationStatus::Committing;
        match self.inner.backend.apply_patch(record.target, &record.proposed).await {
            Ok(()) => {
                if let Some(slot) = slot {
                    let mut slots = self.inner.slots.lock();
                    slots.land(slot, generation);
                    let last = slots.committed.entry(slot.clone()).or_default();
                    *last = (*last).max(generation);
                }
                record.status = MutationStatus::Committed;
                info!(
                    id = %record.id,
                    target = %record.target,
                    op = record.proposed.name(),
                    "edit committed"
                );
                Ok(record)
            }
            Err(remote) => {
                let err = EditError::from(remote);
                warn!(
                    id = %record.id,
                    target = %record.target,
                    op = record.proposed.name(),
                    %err,
                    "edit failed, rolling back"
                );
                self.roll_back(slot, generation, &mut record);
                record.status = MutationStatus::RolledBack;
                self.inner.ctx.notify(Some(record.target), &err);
                Err(err)
            }
        }
    }

    /// Undo a failed send without clobbering newer changes of the same slot.
    fn roll_back(&self, slot: Option<&EditSlot>, generation: u64, record: &mut PendingMutation) {
        let mut slots = self.inner.slots.lock();
        if let Some(slot) = slot {
            if let Some(previous) = slots.land(slot, generation) {
                record.previous = previous;
            }
            if slots.rebase(slot, generation, &record.previous) {
                debug!(id = %record.id, "rebased newer change onto failed send");
            }
            if slots.superseded(slot, generation) {
                debug!(id = %record.id, "newer change is visible, skipping rollback");
                return;
            }
        }
        self.revert(record);
    }

    fn discard(&self, mut session: Session) -> PendingMutation {
        if let Some(timer) = session.timer.take() {
            timer.abort();
        }
        self.revert(&session.record);
        session.record.status = MutationStatus::RolledBack;
        debug!(id = %session.record.id, target = %session.record.target, "edit reverted");
        session.record
    }

    fn revert(&self, record: &PendingMutation) {
        if let Err(err) = self.inner.doc.write().apply(&record.target, &record.previous) {
            warn!(id = %record.id, target = %record.target, %err, "rollback could not be applied");
        }
    }
}
