//! Two-bottle swap session.
//!
//! ```text
//!   Removing ──(2nd bottle lifted)──▶ Placing ──(both targets filled)──▶ done
//! ```
//!
//! While removing, each lift captures the bottle by value.  Once two are
//! held, bottle 0 must land at bottle 1's origin and vice versa.  A session
//! abandoned after one leg landed leaves the other target *stranded*: its
//! record still names the bottle that now sits elsewhere.  Like the
//! operation table, this type only holds state and answers questions; the
//! service drives indicators, inventory and notifications.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use heapless::Vec as HVec;

use crate::cabinet::{Bottle, SlotRef};

use super::{TimeoutTag, TimerTarget};

/// A bottle taken out of its slot during the removal phase.
#[derive(Debug, Clone, PartialEq)]
pub struct LiftedBottle {
    pub origin: SlotRef,
    pub bottle: Bottle,
}

/// Where a lifted bottle must go.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapTarget {
    pub slot: SlotRef,
    pub bottle: Bottle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPhase {
    Removing,
    Placing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapRemovedVerdict {
    /// A wrongly placed bottle was taken back out.
    WrongRetracted,
    /// New bottle lifted from an occupied slot.
    Lift,
    /// Repeat event for an already lifted slot.
    Duplicate,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapPlacedVerdict {
    /// Bottle landed on a pending target.
    Target,
    /// Repeat event for a target that already landed.
    Landed,
    /// A lifted bottle was put back during the removal phase.
    Returned,
    Wrong { already_marked: bool },
    Ignored,
}

#[derive(Debug)]
pub struct SwapSession {
    pub id: u64,
    pub started_at: DateTime<Utc>,
    pub timer: TimeoutTag,
    removed: HVec<LiftedBottle, 2>,
    targets: HVec<SwapTarget, 2>,
    landed: HVec<SlotRef, 2>,
    wrong: BTreeSet<SlotRef>,
    touched: BTreeSet<SlotRef>,
}

impl SwapSession {
    pub fn new(id: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            started_at,
            timer: TimeoutTag::new(TimerTarget::Swap(id)),
            removed: HVec::new(),
            targets: HVec::new(),
            landed: HVec::new(),
            wrong: BTreeSet::new(),
            touched: BTreeSet::new(),
        }
    }

    pub fn phase(&self) -> SwapPhase {
        if self.removed.len() < 2 {
            SwapPhase::Removing
        } else {
            SwapPhase::Placing
        }
    }

    pub fn removed(&self) -> &[LiftedBottle] {
        &self.removed
    }

    /// Unfulfilled targets, in fill order.
    pub fn targets(&self) -> &[SwapTarget] {
        &self.targets
    }

    pub fn target_at(&self, slot: &SlotRef) -> Option<&SwapTarget> {
        self.targets.iter().find(|t| t.slot == *slot)
    }

    /// Targets already filled, in landing order.
    pub fn landed(&self) -> &[SlotRef] {
        &self.landed
    }

    /// Pending targets whose record is stale because the other leg landed.
    pub fn stranded(&self) -> impl Iterator<Item = &SlotRef> {
        let partial = !self.landed.is_empty();
        self.targets.iter().filter(move |_| partial).map(|t| &t.slot)
    }

    pub fn wrong_slots(&self) -> impl Iterator<Item = &SlotRef> {
        self.wrong.iter()
    }

    /// Every slot whose indicator the session changed.
    pub fn touched(&self) -> impl Iterator<Item = &SlotRef> {
        self.touched.iter()
    }

    pub fn touches(&self, slot: &SlotRef) -> bool {
        self.touched.contains(slot)
    }

    pub fn is_complete(&self) -> bool {
        self.phase() == SwapPhase::Placing && self.targets.is_empty()
    }

    pub fn classify_removed(&self, slot: &SlotRef, occupied: bool) -> SwapRemovedVerdict {
        if self.wrong.contains(slot) {
            return SwapRemovedVerdict::WrongRetracted;
        }
        if self.removed.iter().any(|l| l.origin == *slot) {
            return SwapRemovedVerdict::Duplicate;
        }
        if self.phase() == SwapPhase::Removing && occupied {
            SwapRemovedVerdict::Lift
        } else {
            SwapRemovedVerdict::Ignored
        }
    }

    pub fn classify_placed(&self, slot: &SlotRef) -> SwapPlacedVerdict {
        match self.phase() {
            SwapPhase::Removing => {
                if self.removed.iter().any(|l| l.origin == *slot) {
                    SwapPlacedVerdict::Returned
                } else {
                    SwapPlacedVerdict::Ignored
                }
            }
            SwapPhase::Placing => {
                if self.target_at(slot).is_some() {
                    SwapPlacedVerdict::Target
                } else if self.landed.contains(slot) {
                    SwapPlacedVerdict::Landed
                } else if self.targets.is_empty() {
                    SwapPlacedVerdict::Ignored
                } else {
                    SwapPlacedVerdict::Wrong {
                        already_marked: self.wrong.contains(slot),
                    }
                }
            }
        }
    }

    /// Record a lift.  Returns `true` when this completes the removal
    /// phase and the targets have been derived.
    pub fn record_lift(&mut self, origin: SlotRef, bottle: Bottle) -> bool {
        self.touched.insert(origin.clone());
        if self.removed.push(LiftedBottle { origin, bottle }).is_err() {
            return false;
        }
        if self.removed.len() < 2 {
            return false;
        }
        let (a, b) = (&self.removed[0], &self.removed[1]);
        let pair = [
            SwapTarget {
                slot: b.origin.clone(),
                bottle: a.bottle.clone(),
            },
            SwapTarget {
                slot: a.origin.clone(),
                bottle: b.bottle.clone(),
            },
        ];
        self.targets.clear();
        for t in pair {
            let _ = self.targets.push(t);
        }
        true
    }

    /// Undo a lift during the removal phase.
    pub fn unrecord_lift(&mut self, origin: &SlotRef) -> Option<LiftedBottle> {
        let i = self.removed.iter().position(|l| l.origin == *origin)?;
        Some(self.removed.remove(i))
    }

    /// Mark a target as filled.  Returns it, or `None` if `slot` is not
    /// a pending target.
    pub fn fulfil(&mut self, slot: &SlotRef) -> Option<SwapTarget> {
        let i = self.targets.iter().position(|t| t.slot == *slot)?;
        let target = self.targets.remove(i);
        let _ = self.landed.push(target.slot.clone());
        Some(target)
    }

    pub fn mark_wrong(&mut self, slot: SlotRef) -> bool {
        self.touched.insert(slot.clone());
        self.wrong.insert(slot)
    }

    pub fn clear_wrong(&mut self, slot: &SlotRef) -> bool {
        self.wrong.remove(slot)
    }

    pub fn touch(&mut self, slot: SlotRef) {
        self.touched.insert(slot);
    }
}
