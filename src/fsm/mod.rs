//! Per-slot operation state machine.
//!
//! ```text
//!            arm                 expected event
//!   Idle ───────────▶ Armed ─────────────────────▶ Correct ──▶ Idle
//!                      │  ▲
//!        wrong event   │  │ wrong slot retracted / retry
//!                      ▼  │
//!                     Wrong ───── expected event ─▶ Correct ──▶ Idle
//!                      │
//!   Armed/Wrong ── timeout ──▶ TimedOut ──▶ Idle
//! ```
//!
//! `Idle` is the absence of a [`PendingOperation`] for a slot.  The
//! [`OperationTable`] owns every live operation, keyed by its expected
//! slot, which is what enforces "at most one operation per slot".
//!
//! Classification is pure: [`OperationTable::classify_placed`] and
//! [`OperationTable::classify_removed`] only *decide*; the service applies
//! the decision (inventory, indicators, notifications, timers).

pub mod swap;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use heapless::Vec as HVec;

use crate::cabinet::{DrawerId, MAX_SLOTS_PER_DRAWER, SlotIndex, SlotRef};
use crate::error::CoordinatorError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    Load,
    Unload,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Unload => "unload",
        }
    }
}

/// Unique, time-derived operation id: `load-<armed ms>-<seq>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId {
    pub kind: OperationKind,
    pub armed_at_ms: i64,
    pub seq: u64,
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.kind.as_str(), self.armed_at_ms, self.seq)
    }
}

/// What a timer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerTarget {
    Operation(OperationId),
    Swap(u64),
}

/// A timeout delivered through the serialized input stream.
///
/// `epoch` increments every time the owner restarts its clock, so a fire
/// from a superseded timer is recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeoutTag {
    pub target: TimerTarget,
    pub epoch: u32,
}

impl TimeoutTag {
    pub fn new(target: TimerTarget) -> Self {
        Self { target, epoch: 0 }
    }

    /// Same owner, fresh clock.
    pub fn next(self) -> Self {
        Self {
            target: self.target,
            epoch: self.epoch.wrapping_add(1),
        }
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Observable state of a slot's operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    Idle,
    Armed,
    Wrong,
    Correct,
    TimedOut,
}

/// Slots where an incorrect action was seen and not yet undone.
pub type WrongSlots = HVec<SlotIndex, MAX_SLOTS_PER_DRAWER>;

/// The unit of coordination: one armed load or unload.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub id: OperationId,
    pub kind: OperationKind,
    /// Drawer plus expected slot.
    pub slot: SlotRef,
    pub barcode: String,
    pub name: String,
    pub wrong_slots: WrongSlots,
    pub armed_at: DateTime<Utc>,
    pub timer: TimeoutTag,
}

impl PendingOperation {
    pub fn new(
        kind: OperationKind,
        slot: SlotRef,
        barcode: String,
        name: String,
        armed_at: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        let id = OperationId {
            kind,
            armed_at_ms: armed_at.timestamp_millis(),
            seq,
        };
        Self {
            id,
            kind,
            slot,
            barcode,
            name,
            wrong_slots: HVec::new(),
            armed_at,
            timer: TimeoutTag::new(TimerTarget::Operation(id)),
        }
    }

    pub fn state(&self) -> OpState {
        if self.wrong_slots.is_empty() {
            OpState::Armed
        } else {
            OpState::Wrong
        }
    }

    pub fn drawer(&self) -> &DrawerId {
        &self.slot.drawer
    }

    pub fn expected(&self) -> SlotIndex {
        self.slot.slot
    }

    pub fn is_wrong(&self, slot: SlotIndex) -> bool {
        self.wrong_slots.contains(&slot)
    }

    /// Record a wrong slot.  Returns `false` if it was already marked.
    pub fn mark_wrong(&mut self, slot: SlotIndex) -> bool {
        if self.is_wrong(slot) {
            return false;
        }
        // Capacity equals the slot bound, so a valid index always fits.
        let _ = self.wrong_slots.push(slot);
        true
    }

    /// Clear a wrong-slot mark.  Returns `false` if it was not marked.
    pub fn clear_wrong(&mut self, slot: SlotIndex) -> bool {
        match self.wrong_slots.iter().position(|s| *s == slot) {
            Some(i) => {
                self.wrong_slots.swap_remove(i);
                true
            }
            None => false,
        }
    }

    /// Restart the clock; returns the tag to arm.
    pub fn restart_timer(&mut self) -> TimeoutTag {
        self.timer = self.timer.next();
        self.timer
    }
}

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

/// Decision for a `placed` sensor event.  Keys are expected slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacedVerdict {
    /// Load completed at its expected slot.
    Correct(SlotRef),
    /// Load in this drawer, bottle went elsewhere.
    Wrong { key: SlotRef, already_marked: bool },
    /// A bottle wrongly lifted during an unload was put back.
    UnloadReturned(SlotRef),
    /// Nothing armed cares (manual interaction).
    Ignored,
}

/// Decision for a `removed` sensor event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovedVerdict {
    /// Wrongly placed load bottle was taken back out.
    WrongRetracted(SlotRef),
    /// Unload completed at its expected slot.
    Correct(SlotRef),
    /// Unload in this drawer, a different bottle was lifted.
    Wrong { key: SlotRef, already_marked: bool },
    Ignored,
}

// ---------------------------------------------------------------------------
// Operation table
// ---------------------------------------------------------------------------

/// Every live operation, keyed by expected slot.
#[derive(Debug, Default)]
pub struct OperationTable {
    ops: BTreeMap<SlotRef, PendingOperation>,
}

impl OperationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `op`.  Rejects a second operation on the same slot.
    pub fn insert(&mut self, op: PendingOperation) -> Result<(), CoordinatorError> {
        if self.ops.contains_key(&op.slot) {
            return Err(CoordinatorError::SlotBusy(op.slot));
        }
        self.ops.insert(op.slot.clone(), op);
        Ok(())
    }

    pub fn get(&self, slot: &SlotRef) -> Option<&PendingOperation> {
        self.ops.get(slot)
    }

    pub fn get_mut(&mut self, slot: &SlotRef) -> Option<&mut PendingOperation> {
        self.ops.get_mut(slot)
    }

    pub fn remove(&mut self, slot: &SlotRef) -> Option<PendingOperation> {
        self.ops.remove(slot)
    }

    pub fn contains(&self, slot: &SlotRef) -> bool {
        self.ops.contains_key(slot)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingOperation> {
        self.ops.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PendingOperation> {
        self.ops.values_mut()
    }

    /// Expected slot of the operation with `id`.
    pub fn key_of(&self, id: &OperationId) -> Option<SlotRef> {
        self.ops.values().find(|op| op.id == *id).map(|op| op.slot.clone())
    }

    /// Expected slots of every operation matching `pred`.
    pub fn keys_where(&self, pred: impl Fn(&PendingOperation) -> bool) -> Vec<SlotRef> {
        self.ops
            .values()
            .filter(|op| pred(op))
            .map(|op| op.slot.clone())
            .collect()
    }

    /// Oldest operation of `kind` in `drawer`.
    fn oldest_in(&self, drawer: &DrawerId, kind: OperationKind) -> Option<&PendingOperation> {
        self.ops
            .values()
            .filter(|op| op.kind == kind && op.drawer() == drawer)
            .min_by_key(|op| (op.armed_at, op.id.seq))
    }

    /// Classify a `placed` event at `(drawer, slot)`.
    pub fn classify_placed(&self, drawer: &DrawerId, slot: SlotIndex) -> PlacedVerdict {
        let here = SlotRef::new(drawer.clone(), slot);
        if let Some(op) = self.ops.get(&here) {
            if op.kind == OperationKind::Load {
                return PlacedVerdict::Correct(here);
            }
        }
        if let Some(op) = self.ops.values().find(|op| {
            op.kind == OperationKind::Unload && op.drawer() == drawer && op.is_wrong(slot)
        }) {
            return PlacedVerdict::UnloadReturned(op.slot.clone());
        }
        match self.oldest_in(drawer, OperationKind::Load) {
            Some(op) => PlacedVerdict::Wrong {
                key: op.slot.clone(),
                already_marked: op.is_wrong(slot),
            },
            None => PlacedVerdict::Ignored,
        }
    }

    /// Classify a `removed` event at `(drawer, slot)`.  Checked in order:
    /// retraction of a wrong load placement, correct unload, wrong unload.
    pub fn classify_removed(&self, drawer: &DrawerId, slot: SlotIndex) -> RemovedVerdict {
        if let Some(op) = self.ops.values().find(|op| {
            op.kind == OperationKind::Load && op.drawer() == drawer && op.is_wrong(slot)
        }) {
            return RemovedVerdict::WrongRetracted(op.slot.clone());
        }
        let here = SlotRef::new(drawer.clone(), slot);
        if let Some(op) = self.ops.get(&here) {
            if op.kind == OperationKind::Unload {
                return RemovedVerdict::Correct(here);
            }
        }
        match self.oldest_in(drawer, OperationKind::Unload) {
            Some(op) => RemovedVerdict::Wrong {
                key: op.slot.clone(),
                already_marked: op.is_wrong(slot),
            },
            None => RemovedVerdict::Ignored,
        }
    }

    /// The slot the drawer's mismatch detector should watch: the oldest
    /// pending load in `drawer`, or 0.
    pub fn drawer_expectation(&self, drawer: &DrawerId) -> SlotIndex {
        self.oldest_in(drawer, OperationKind::Load)
            .map_or(0, PendingOperation::expected)
    }
}
