//! Ordered device-command emission.
//!
//! Handlers collect what they want to say into an [`Emission`] and flush
//! it once.  Flushing always runs in the same order:
//!
//! 1. indicator batches, one `set_leds` per drawer;
//! 2. drawer expectations;
//! 3. observer notifications.
//!
//! So by the time an observer hears "expect a bottle here" the slot is
//! already lit.

use std::collections::BTreeMap;

use crate::cabinet::{DrawerId, SlotIndex, SlotRef};
use crate::indicator::{Indicator, LedCommand};

use super::events::Notification;
use super::ports::CabinetIo;

#[derive(Debug, Default)]
pub struct Emission {
    leds: BTreeMap<DrawerId, Vec<LedCommand>>,
    expectations: Vec<(DrawerId, SlotIndex)>,
    notifications: Vec<Notification>,
}

impl Emission {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an indicator change.  A later change for the same slot
    /// replaces the earlier one.
    pub fn led(&mut self, slot: &SlotRef, indicator: Indicator) -> &mut Self {
        let batch = self.leds.entry(slot.drawer.clone()).or_default();
        let cmd = indicator.at(slot.slot);
        match batch.iter_mut().find(|c| c.position == slot.slot) {
            Some(existing) => *existing = cmd,
            None => batch.push(cmd),
        }
        self
    }

    pub fn expect(&mut self, drawer: &DrawerId, position: SlotIndex) -> &mut Self {
        self.expectations.retain(|(d, _)| d != drawer);
        self.expectations.push((drawer.clone(), position));
        self
    }

    pub fn notify(&mut self, notification: Notification) -> &mut Self {
        self.notifications.push(notification);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty() && self.expectations.is_empty() && self.notifications.is_empty()
    }

    pub fn flush(self, io: &mut impl CabinetIo) {
        for (drawer, batch) in &self.leds {
            io.set_leds(drawer, batch);
        }
        for (drawer, position) in &self.expectations {
            io.expect_bottle(drawer, *position);
        }
        for n in &self.notifications {
            io.emit(n);
        }
    }
}
