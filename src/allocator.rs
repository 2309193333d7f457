//! Position allocator.
//!
//! Picks a free slot for an incoming bottle.  Search order:
//!
//! 1. the preferred drawer (if it is sensor-equipped), ascending index;
//! 2. every other sensor-equipped drawer in configured priority order,
//!    ascending index within each.
//!
//! The allocator knows nothing about wine types; the caller maps a
//! type to a preferred drawer.  Slots armed by a pending operation are
//! skipped through the `reserved` predicate so two loads never share a
//! target.

use crate::cabinet::{DrawerId, SlotIndex, SlotRef};
use crate::config::CabinetConfig;
use crate::inventory::SlotView;

pub struct PositionAllocator {
    drawers: Vec<DrawerId>,
    slots_per_drawer: SlotIndex,
}

impl PositionAllocator {
    pub fn new(config: &CabinetConfig) -> Self {
        Self {
            drawers: config.functional_drawers.clone(),
            slots_per_drawer: config.slots_per_drawer,
        }
    }

    /// First free slot honouring `preferred`, or `None` when every
    /// sensor-equipped slot is taken.
    pub fn allocate(
        &self,
        view: &impl SlotView,
        preferred: Option<&DrawerId>,
        reserved: impl Fn(&SlotRef) -> bool,
    ) -> Option<SlotRef> {
        let preferred = preferred.filter(|d| self.drawers.contains(d));
        let order = preferred
            .into_iter()
            .chain(self.drawers.iter().filter(|d| Some(*d) != preferred));

        for drawer in order {
            for slot in 1..=self.slots_per_drawer {
                let candidate = SlotRef::new(drawer.clone(), slot);
                if !view.is_occupied(&candidate) && !reserved(&candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}
