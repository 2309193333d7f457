//! Swap session handling for [`Coordinator`].

use core::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::cabinet::SlotRef;
use crate::error::{CoordinatorError, Result};
use crate::fsm::TimeoutTag;
use crate::fsm::swap::{SwapPlacedVerdict, SwapRemovedVerdict, SwapSession};
use crate::indicator::Indicator;
use crate::inventory::{SlotState, SlotView};

use super::commands::SensorAction;
use super::emitter::Emission;
use super::events::Notification;
use super::ports::{CabinetIo, InventoryBackend, TimerPort};
use super::service::Coordinator;

impl<B: InventoryBackend> Coordinator<B> {
    /// Open a swap session.  Refused while another swap or any per-slot
    /// operation is live.
    pub fn start_swap(
        &mut self,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.swap.is_some() {
            return Err(CoordinatorError::SwapActive);
        }
        if !self.operations.is_empty() {
            return Err(CoordinatorError::OperationsPending(self.operations.len()));
        }
        let id = self.next_seq();
        let session = SwapSession::new(id, now);
        timers.arm(
            session.timer,
            Duration::from_millis(self.config.swap_timeout_ms),
        );
        self.swap = Some(session);
        io.emit(&Notification::SwapStarted {});
        info!("SWAP {}: started", id);
        Ok(())
    }

    /// Drop the session without reporting to observers.
    pub fn cancel_swap(
        &mut self,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        let Some(session) = self.swap.take() else {
            debug!("Cancel swap: no session");
            return;
        };
        timers.cancel(&session.timer);
        let mut out = clear_touched(&session);
        self.vacate_stranded(&session, &mut out, now);
        out.flush(io);
        info!("SWAP {}: cancelled", session.id);
    }

    pub(super) fn swap_timeout(
        &mut self,
        id: u64,
        tag: TimeoutTag,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        if self.swap.as_ref().is_none_or(|s| s.id != id || s.timer != tag) {
            debug!("Stale swap timeout {} ignored", id);
            return;
        }
        let Some(session) = self.swap.take() else {
            return;
        };
        timers.cancel(&session.timer);
        let mut out = clear_touched(&session);
        self.vacate_stranded(&session, &mut out, now);
        out.notify(Notification::SwapCompleted {
            success: false,
            error: Some("Timeout".into()),
        });
        out.flush(io);
        info!("SWAP {}: timed out", id);
    }

    /// A session ending with one leg landed leaves the other target's
    /// record naming a bottle that now sits at the landed slot.  That slot
    /// is physically empty (its bottle is still in hand), so it is vacated.
    fn vacate_stranded(&mut self, session: &SwapSession, out: &mut Emission, now: DateTime<Utc>) {
        for slot in session.stranded() {
            match self.inventory.vacate(slot, now) {
                Ok(()) => info!("SWAP {}: stranded {} vacated", session.id, slot),
                Err(e) => {
                    warn!("SWAP {}: vacating stranded {} failed: {}", session.id, slot, e);
                    let e = CoordinatorError::Persistence(e);
                    out.notify(Notification::SwapError {
                        error: e.to_string(),
                        code: Some(e.code()),
                        drawer: Some(slot.drawer.clone()),
                        wrong_position: None,
                        expected_positions: vec![slot.clone()],
                    });
                }
            }
        }
    }

    pub(super) fn swap_on_removed(&mut self, slot: &SlotRef, io: &mut impl CabinetIo) {
        let occupied = self.inventory.is_occupied(slot);
        let Some(session) = self.swap.as_mut() else {
            return;
        };
        match session.classify_removed(slot, occupied) {
            SwapRemovedVerdict::WrongRetracted => {
                session.clear_wrong(slot);
                let expected = session
                    .targets()
                    .iter()
                    .find(|t| t.slot.drawer == slot.drawer)
                    .or_else(|| session.targets().first())
                    .map(|t| t.slot.clone());
                let mut out = Emission::new();
                out.led(slot, Indicator::Off);
                if let Some(target) = &expected {
                    out.led(target, Indicator::PlaceHere);
                }
                out.notify(Notification::WrongBottleRemoved {
                    drawer: slot.drawer.clone(),
                    position: slot.slot,
                    expected_position: expected.map_or(0, |t| t.slot),
                });
                out.flush(io);
                info!("SWAP {}: wrong bottle at {} retracted", session.id, slot);
            }
            SwapRemovedVerdict::Lift => {
                let SlotState::Occupied(bottle) = self.inventory.get(slot) else {
                    return;
                };
                let ready = session.record_lift(slot.clone(), bottle.clone());

                let mut out = Emission::new();
                out.led(slot, Indicator::Staged)
                    .notify(Notification::SwapBottleEvent {
                        event: SensorAction::Removed,
                        drawer: slot.drawer.clone(),
                        position: slot.slot,
                        barcode: bottle.barcode.clone(),
                        wine_name: bottle.name.clone(),
                    });
                if ready {
                    if let Some(first) = session.targets().first() {
                        out.led(&first.slot, Indicator::PlaceHere);
                    }
                    info!("SWAP {}: both bottles lifted, placing", session.id);
                } else {
                    info!("SWAP {}: lifted {} from {}", session.id, bottle.barcode, slot);
                }
                out.flush(io);
            }
            SwapRemovedVerdict::Duplicate => debug!("SWAP: repeat removal at {}", slot),
            SwapRemovedVerdict::Ignored => debug!("SWAP: removal at {} ignored", slot),
        }
    }

    pub(super) fn swap_on_placed(
        &mut self,
        slot: &SlotRef,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        let Some(session) = self.swap.as_mut() else {
            return;
        };
        match session.classify_placed(slot) {
            SwapPlacedVerdict::Target => self.swap_leg_landed(slot, io, timers, now),
            SwapPlacedVerdict::Landed => debug!("SWAP: repeat placement at landed {}", slot),
            SwapPlacedVerdict::Returned => {
                let Some(lifted) = session.unrecord_lift(slot) else {
                    return;
                };
                let mut out = Emission::new();
                out.led(slot, Indicator::Occupied)
                    .notify(Notification::SwapBottleEvent {
                        event: SensorAction::Placed,
                        drawer: slot.drawer.clone(),
                        position: slot.slot,
                        barcode: lifted.bottle.barcode.clone(),
                        wine_name: lifted.bottle.name.clone(),
                    });
                out.flush(io);
                info!("SWAP {}: {} put back at {}", session.id, lifted.bottle.barcode, slot);
            }
            SwapPlacedVerdict::Wrong { already_marked } => {
                session.mark_wrong(slot.clone());
                if already_marked {
                    return;
                }
                let expected: Vec<SlotRef> =
                    session.targets().iter().map(|t| t.slot.clone()).collect();
                let mut out = Emission::new();
                out.led(slot, Indicator::Wrong);
                for t in &expected {
                    out.led(t, Indicator::PlaceHere);
                }
                out.notify(Notification::SwapError {
                    error: "wrong_swap_position".into(),
                    code: None,
                    drawer: Some(slot.drawer.clone()),
                    wrong_position: Some(slot.slot),
                    expected_positions: expected,
                });
                out.flush(io);
                info!("SWAP {}: wrong placement at {}", session.id, slot);
            }
            SwapPlacedVerdict::Ignored => debug!("SWAP: placement at {} ignored", slot),
        }
    }

    /// Commit a bottle that reached its target, keeping the weight and
    /// fill captured when it was lifted.
    fn swap_leg_landed(
        &mut self,
        slot: &SlotRef,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        let Some(target) = self.swap.as_ref().and_then(|s| s.target_at(slot)).cloned() else {
            return;
        };
        if let Err(e) = self.inventory.occupy(slot, &target.bottle, now) {
            warn!("SWAP: commit at {} failed: {}", slot, e);
            let e = CoordinatorError::Persistence(e);
            io.emit(&Notification::SwapError {
                error: e.to_string(),
                code: Some(e.code()),
                drawer: Some(slot.drawer.clone()),
                wrong_position: None,
                expected_positions: vec![slot.clone()],
            });
            return;
        }
        let Some(session) = self.swap.as_mut() else {
            return;
        };
        session.fulfil(slot);

        let mut out = Emission::new();
        out.led(slot, Indicator::Occupied)
            .notify(Notification::SwapBottleEvent {
                event: SensorAction::Placed,
                drawer: slot.drawer.clone(),
                position: slot.slot,
                barcode: target.bottle.barcode.clone(),
                wine_name: target.bottle.name.clone(),
            });
        info!("SWAP {}: {} landed at {}", session.id, target.bottle.barcode, slot);

        if !session.is_complete() {
            if let Some(next) = session.targets().first() {
                out.led(&next.slot, Indicator::PlaceHere);
            }
            out.flush(io);
            return;
        }

        let Some(session) = self.swap.take() else {
            return;
        };
        timers.cancel(&session.timer);
        let mut done = clear_touched(&session);
        done.notify(Notification::SwapCompleted {
            success: true,
            error: None,
        });
        out.flush(io);
        done.flush(io);
        info!("SWAP {}: completed", session.id);
    }
}

/// Turn off every indicator the session changed.
fn clear_touched(session: &SwapSession) -> Emission {
    let mut out = Emission::new();
    for slot in session.touched() {
        out.led(slot, Indicator::Off);
    }
    out
}
