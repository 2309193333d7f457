//! Operation coordinator: the hexagonal core.
//!
//! [`Coordinator`] owns the inventory, the allocator, the operation table
//! and the swap session.  It is driven by one input at a time; every
//! handler receives the outbound ports and the current time as
//! parameters, so the core never touches the bus, the file system or the
//! clock directly.
//!
//! ```text
//!   AppCommand  ──▶ ┌──────────────────────────┐ ──▶ DevicePort (set_leds, expect_bottle)
//!   DeviceEvent ──▶ │       Coordinator         │ ──▶ EventSink  (notifications)
//!   TimeoutTag  ──▶ │ ops · swap · inventory    │ ──▶ TimerPort  (arm / cancel)
//!                   └──────────────────────────┘
//! ```
//!
//! Every successful transition cancels the operation's timer before it
//! touches inventory, and every timeout is checked against the live
//! operation's tag, so a fire racing a completion is a no-op.

use core::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::allocator::PositionAllocator;
use crate::cabinet::{Bottle, DrawerId, SlotIndex, SlotRef};
use crate::catalog::Catalog;
use crate::config::CabinetConfig;
use crate::error::{CoordinatorError, Result};
use crate::fsm::swap::SwapSession;
use crate::fsm::{
    OperationId, OperationKind, OperationTable, PendingOperation, PlacedVerdict, RemovedVerdict,
    TimeoutTag, TimerTarget,
};
use crate::indicator::Indicator;
use crate::inventory::{InventoryStore, SlotState, SlotView, fill_percent};
use crate::scanner::ScanFilter;

use super::commands::{AppCommand, DeviceEvent, SensorAction, UnloadRequest};
use super::emitter::Emission;
use super::events::{Notification, OperationReport};
use super::ports::{CabinetIo, InventoryBackend, StorageError, TimerPort};

// ───────────────────────────────────────────────────────────────
// Coordinator
// ───────────────────────────────────────────────────────────────

pub struct Coordinator<B: InventoryBackend> {
    pub(super) config: CabinetConfig,
    pub(super) inventory: InventoryStore<B>,
    allocator: PositionAllocator,
    catalog: Catalog,
    pub(super) operations: OperationTable,
    pub(super) swap: Option<SwapSession>,
    scanner: ScanFilter,
    pub(super) seq: u64,
}

impl<B: InventoryBackend> Coordinator<B> {
    pub fn new(config: CabinetConfig, inventory: InventoryStore<B>, catalog: Catalog) -> Self {
        let allocator = PositionAllocator::new(&config);
        let scanner = ScanFilter::new(&config);
        Self {
            config,
            inventory,
            allocator,
            catalog,
            operations: OperationTable::new(),
            swap: None,
            scanner,
            seq: 0,
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn config(&self) -> &CabinetConfig {
        &self.config
    }

    pub fn inventory(&self) -> &InventoryStore<B> {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut InventoryStore<B> {
        &mut self.inventory
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    pub fn swap(&self) -> Option<&SwapSession> {
        self.swap.as_ref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub(super) fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.config.operation_timeout_ms)
    }

    pub(super) fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Apply one observer command.  Rejections are reported to observers,
    /// never returned.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        match cmd {
            AppCommand::StartLoad { barcode, name } => {
                if let Err(e) = self.arm_load(&barcode, name.as_deref(), io, timers, now) {
                    warn!("Load {} rejected: {}", barcode, e);
                    io.emit(&Notification::LoadError {
                        error: e.to_string(),
                        code: e.code(),
                    });
                }
            }
            AppCommand::StartUnload {
                barcode,
                name,
                drawer,
                position,
                drawer_id,
            } => {
                let manual = match (drawer_id, position) {
                    (Some(d), Some(p)) => Some(SlotRef::new(d, p)),
                    _ => None,
                };
                let req = UnloadRequest {
                    barcode,
                    name,
                    drawer_hint: drawer,
                    manual,
                };
                if let Err(e) = self.arm_unload(&req, io, timers, now) {
                    warn!("Unload {} rejected: {}", req.barcode, e);
                    io.emit(&Notification::UnloadError {
                        error: e.to_string(),
                        code: e.code(),
                    });
                }
            }
            AppCommand::StartSwap {} => {
                if let Err(e) = self.start_swap(io, timers, now) {
                    warn!("Swap rejected: {}", e);
                    io.emit(&Notification::SwapError {
                        error: e.to_string(),
                        code: Some(e.code()),
                        drawer: None,
                        wrong_position: None,
                        expected_positions: Vec::new(),
                    });
                }
            }
            AppCommand::CancelSwap {} => self.cancel_swap(io, timers, now),
            AppCommand::CancelLoad { barcode } => {
                self.cancel_matching(io, timers, |op| {
                    op.kind == OperationKind::Load
                        && barcode.as_deref().is_none_or(|b| b == op.barcode)
                });
            }
            AppCommand::CancelUnload {} => {
                self.cancel_matching(io, timers, |op| op.kind == OperationKind::Unload);
            }
            AppCommand::RetryPlacement { drawer, position } => {
                self.retry_placement(drawer.as_ref(), position, io, timers);
            }
        }
    }

    /// Apply one drawer event.
    pub fn handle_device_event(
        &mut self,
        drawer: &DrawerId,
        event: DeviceEvent,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        let position = event.position();
        if !self.config.is_functional(drawer) {
            debug!("Event from sensorless {} ignored", drawer);
            return;
        }
        if !self.config.is_valid_slot(position) {
            debug!("Event for invalid {} #{} ignored", drawer, position);
            return;
        }
        let slot = SlotRef::new(drawer.clone(), position);

        if self.swap.is_some() {
            match event {
                DeviceEvent::BottleEvent {
                    event: SensorAction::Placed,
                    ..
                } => self.swap_on_placed(&slot, io, timers, now),
                DeviceEvent::WrongPlacement { .. } => {
                    debug!("SWAP: wrong_placement at {} ignored", slot)
                }
                DeviceEvent::BottleEvent {
                    event: SensorAction::Removed,
                    ..
                } => self.swap_on_removed(&slot, io),
            }
            return;
        }

        match event {
            DeviceEvent::BottleEvent {
                event: SensorAction::Placed,
                weight,
                ..
            } => self.on_placed(&slot, Some(weight), io, timers, now),
            DeviceEvent::BottleEvent {
                event: SensorAction::Removed,
                ..
            } => self.on_removed(&slot, io, timers, now),
            DeviceEvent::WrongPlacement { .. } => self.on_placed(&slot, None, io, timers, now),
        }
    }

    /// Deliver a fired timer.  Tags that no longer match live state are
    /// dropped.
    pub fn handle_timeout(
        &mut self,
        tag: TimeoutTag,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        match tag.target {
            TimerTarget::Operation(id) => {
                let Some(key) = self.operations.key_of(&id) else {
                    debug!("Timeout for finished {} ignored", id);
                    return;
                };
                if self.operations.get(&key).is_none_or(|op| op.timer != tag) {
                    debug!("Stale timeout for {} ignored", id);
                    return;
                }
                if let Some(op) = self.operations.remove(&key) {
                    self.expire(op, io);
                }
            }
            TimerTarget::Swap(id) => self.swap_timeout(id, tag, io, timers, now),
        }
    }

    /// Feed a raw scanner read.  Accepted scans are announced with
    /// catalog data attached.
    pub fn handle_scan(&mut self, raw: &str, io: &mut impl CabinetIo, now: DateTime<Utc>) {
        let Some(barcode) = self.scanner.accept(raw, now) else {
            return;
        };
        let info = self.catalog.lookup(&barcode);
        let name = info.map(|w| w.name.clone());
        let wine_type = info.map(|_| self.catalog.wine_type(&barcode));
        info!("Scanned {}", barcode);
        io.emit(&Notification::BarcodeScanned {
            barcode,
            name,
            wine_type,
        });
    }

    // ── Arming ────────────────────────────────────────────────

    /// Allocate a slot for `barcode` and arm a load there.
    pub fn arm_load(
        &mut self,
        barcode: &str,
        name: Option<&str>,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) -> Result<OperationId> {
        if self.swap.is_some() {
            return Err(CoordinatorError::SwapActive);
        }
        let wine_type = self.catalog.wine_type(barcode);
        let preferred = self.config.preferred_drawer(wine_type);
        let operations = &self.operations;
        let slot = self
            .allocator
            .allocate(&self.inventory, preferred, |s| operations.contains(s))
            .ok_or(CoordinatorError::NoCapacity)?;
        let name = self.display_name(barcode, name);
        self.arm(OperationKind::Load, slot, barcode, name, io, timers, now)
    }

    /// Arm a load at an explicit slot.
    pub fn arm_load_at(
        &mut self,
        slot: SlotRef,
        barcode: &str,
        name: Option<&str>,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) -> Result<OperationId> {
        if self.swap.is_some() {
            return Err(CoordinatorError::SwapActive);
        }
        self.check_target(&slot)?;
        if self.inventory.is_occupied(&slot) {
            return Err(CoordinatorError::SlotOccupied(slot));
        }
        let name = self.display_name(barcode, name);
        self.arm(OperationKind::Load, slot, barcode, name, io, timers, now)
    }

    /// Resolve where `req.barcode` sits and arm its removal.
    pub fn arm_unload(
        &mut self,
        req: &UnloadRequest,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) -> Result<OperationId> {
        if self.swap.is_some() {
            return Err(CoordinatorError::SwapActive);
        }
        let slot = self.locate(req)?;
        self.check_target(&slot)?;

        let stored = match self.inventory.get(&slot) {
            SlotState::Occupied(b) => b.name,
            SlotState::Empty => String::new(),
        };
        let name = match req.name.as_deref() {
            Some(n) => n.to_owned(),
            None if !stored.is_empty() => stored,
            None => self.display_name(&req.barcode, None),
        };
        self.arm(OperationKind::Unload, slot, &req.barcode, name, io, timers, now)
    }

    fn locate(&self, req: &UnloadRequest) -> Result<SlotRef> {
        if let Some(slot) = &req.manual {
            if !self.config.is_valid_slot(slot.slot) {
                return Err(CoordinatorError::InvalidSlot(slot.clone()));
            }
            return match self.inventory.barcode_at(slot) {
                Some(b) if b == req.barcode => Ok(slot.clone()),
                _ => Err(CoordinatorError::NotFound {
                    barcode: req.barcode.clone(),
                    drawer: Some(slot.drawer.clone()),
                }),
            };
        }
        if let Some(drawer) = &req.drawer_hint {
            return self
                .inventory
                .find_in(&req.barcode, [drawer])
                .ok_or_else(|| CoordinatorError::NotFound {
                    barcode: req.barcode.clone(),
                    drawer: Some(drawer.clone()),
                });
        }
        let functional = &self.config.functional_drawers;
        self.inventory
            .find_in(&req.barcode, functional.iter())
            .or_else(|| {
                self.inventory.find_in(
                    &req.barcode,
                    self.inventory.drawers().filter(|d| !functional.contains(d)),
                )
            })
            .ok_or_else(|| CoordinatorError::NotFound {
                barcode: req.barcode.clone(),
                drawer: None,
            })
    }

    /// Common target checks: sensors present, index in range, not armed.
    fn check_target(&self, slot: &SlotRef) -> Result<()> {
        if !self.config.is_functional(&slot.drawer) {
            return Err(CoordinatorError::UnsupportedLocation(slot.clone()));
        }
        if !self.config.is_valid_slot(slot.slot) {
            return Err(CoordinatorError::InvalidSlot(slot.clone()));
        }
        if self.operations.contains(slot) {
            return Err(CoordinatorError::SlotBusy(slot.clone()));
        }
        Ok(())
    }

    fn display_name(&self, barcode: &str, name: Option<&str>) -> String {
        name.map(str::to_owned)
            .or_else(|| self.catalog.lookup(barcode).map(|w| w.name.clone()))
            .unwrap_or_else(|| barcode.to_owned())
    }

    #[allow(clippy::too_many_arguments)]
    fn arm(
        &mut self,
        kind: OperationKind,
        slot: SlotRef,
        barcode: &str,
        name: String,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) -> Result<OperationId> {
        let seq = self.next_seq();
        let op = PendingOperation::new(kind, slot.clone(), barcode.to_owned(), name, now, seq);
        let (id, tag) = (op.id, op.timer);
        let wine_name = op.name.clone();
        self.operations.insert(op)?;

        let mut out = Emission::new();
        match kind {
            OperationKind::Load => {
                out.led(&slot, Indicator::PlaceHere)
                    .expect(&slot.drawer, self.operations.drawer_expectation(&slot.drawer))
                    .notify(Notification::ExpectBottle {
                        drawer: slot.drawer.clone(),
                        position: slot.slot,
                        wine_name,
                    });
            }
            OperationKind::Unload => {
                out.led(&slot, Indicator::RemoveHere)
                    .notify(Notification::ExpectRemoval {
                        drawer: slot.drawer.clone(),
                        position: slot.slot,
                        wine_name,
                    });
            }
        }
        out.flush(io);
        timers.arm(tag, self.op_timeout());
        info!("OP {} {}: Idle -> Armed ({})", id, slot, barcode);
        Ok(id)
    }

    // ── Placed / removed classification ───────────────────────

    fn on_placed(
        &mut self,
        slot: &SlotRef,
        weight: Option<f32>,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        match self.operations.classify_placed(&slot.drawer, slot.slot) {
            PlacedVerdict::Correct(key) => match weight {
                Some(w) => self.complete_load(&key, w, io, timers, now),
                None => debug!("Mismatch signal at armed {} ignored", key),
            },
            PlacedVerdict::Wrong {
                key,
                already_marked,
            } => self.wrong_placement(&key, slot.slot, already_marked, io, timers),
            PlacedVerdict::UnloadReturned(key) => self.unload_bottle_returned(&key, slot.slot, io),
            PlacedVerdict::Ignored => debug!("Unmanaged placement at {} ignored", slot),
        }
    }

    fn on_removed(
        &mut self,
        slot: &SlotRef,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        match self.operations.classify_removed(&slot.drawer, slot.slot) {
            RemovedVerdict::WrongRetracted(key) => self.wrong_retracted(&key, slot.slot, io, timers),
            RemovedVerdict::Correct(key) => self.complete_unload(&key, io, timers, now),
            RemovedVerdict::Wrong {
                key,
                already_marked,
            } => self.wrong_removal(&key, slot.slot, already_marked, io, timers),
            RemovedVerdict::Ignored => debug!("Unmanaged removal at {} ignored", slot),
        }
    }

    fn complete_load(
        &mut self,
        key: &SlotRef,
        weight: f32,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        let Some(op) = self.operations.remove(key) else {
            return;
        };
        timers.cancel(&op.timer);

        let bottle = Bottle {
            barcode: op.barcode.clone(),
            name: op.name.clone(),
            weight_grams: weight,
            fill_percent: fill_percent(weight, self.config.empty_weight_g, self.config.full_weight_g),
            wine_type: self.catalog.wine_type(&op.barcode),
        };
        if let Err(e) = self.inventory.occupy(key, &bottle, now) {
            self.reinstate(op, e, io, timers);
            return;
        }

        let mut out = Emission::new();
        for w in &op.wrong_slots {
            out.led(&SlotRef::new(key.drawer.clone(), *w), Indicator::Off);
        }
        out.led(key, Indicator::Occupied)
            .expect(&key.drawer, self.operations.drawer_expectation(&key.drawer))
            .notify(Notification::BottlePlaced(OperationReport::placed(key, &bottle)));
        out.flush(io);

        self.scanner.reset();
        info!("OP {} {}: {:?} -> Correct", op.id, key, op.state());
    }

    fn complete_unload(
        &mut self,
        key: &SlotRef,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        now: DateTime<Utc>,
    ) {
        let Some(op) = self.operations.remove(key) else {
            return;
        };
        timers.cancel(&op.timer);

        if let Err(e) = self.inventory.vacate(key, now) {
            self.reinstate(op, e, io, timers);
            return;
        }

        let mut out = Emission::new();
        for w in &op.wrong_slots {
            out.led(&SlotRef::new(key.drawer.clone(), *w), Indicator::Off);
        }
        out.led(key, Indicator::Off)
            .notify(Notification::BottleUnloaded(OperationReport::unloaded(
                key, &op.barcode, &op.name,
            )));
        out.flush(io);

        self.scanner.reset();
        info!("OP {} {}: {:?} -> Correct", op.id, key, op.state());
    }

    /// Put an operation back after its commit failed: re-armed, with a
    /// fresh timer, and the failure reported.
    fn reinstate(
        &mut self,
        mut op: PendingOperation,
        err: StorageError,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
    ) {
        let kind = op.kind;
        let tag = op.restart_timer();
        let id = op.id;
        warn!("OP {} {}: commit failed, staying armed: {}", id, op.slot, err);
        if self.operations.insert(op).is_ok() {
            timers.arm(tag, self.op_timeout());
        }
        let e = CoordinatorError::Persistence(err);
        let n = match kind {
            OperationKind::Load => Notification::LoadError {
                error: e.to_string(),
                code: e.code(),
            },
            OperationKind::Unload => Notification::UnloadError {
                error: e.to_string(),
                code: e.code(),
            },
        };
        io.emit(&n);
    }

    fn wrong_placement(
        &mut self,
        key: &SlotRef,
        wrong: SlotIndex,
        already_marked: bool,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
    ) {
        let timeout = self.op_timeout();
        let Some(op) = self.operations.get_mut(key) else {
            return;
        };
        let prev = op.state();
        op.mark_wrong(wrong);
        timers.cancel(&op.timer);
        timers.arm(op.restart_timer(), timeout);
        if already_marked {
            debug!("OP {} {}: repeat mismatch at #{}", op.id, key, wrong);
            return;
        }

        let mut out = Emission::new();
        out.led(&SlotRef::new(key.drawer.clone(), wrong), Indicator::Wrong)
            .led(key, Indicator::PlaceHere)
            .notify(Notification::PlacementError {
                error: "placement_wrong_spot",
                drawer: key.drawer.clone(),
                wrong_position: wrong,
                correct_position: key.slot,
                wine_name: op.name.clone(),
            });
        info!("OP {} {}: {:?} -> Wrong (#{})", op.id, key, prev, wrong);
        out.flush(io);
    }

    fn wrong_retracted(
        &mut self,
        key: &SlotRef,
        wrong: SlotIndex,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
    ) {
        let timeout = self.op_timeout();
        let Some(op) = self.operations.get_mut(key) else {
            return;
        };
        op.clear_wrong(wrong);
        timers.cancel(&op.timer);
        timers.arm(op.restart_timer(), timeout);

        let mut out = Emission::new();
        out.led(&SlotRef::new(key.drawer.clone(), wrong), Indicator::Off)
            .led(key, Indicator::PlaceHere)
            .notify(Notification::WrongBottleRemoved {
                drawer: key.drawer.clone(),
                position: wrong,
                expected_position: key.slot,
            });
        info!("OP {} {}: #{} retracted, now {:?}", op.id, key, wrong, op.state());
        out.flush(io);
    }

    fn wrong_removal(
        &mut self,
        key: &SlotRef,
        wrong: SlotIndex,
        already_marked: bool,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
    ) {
        let timeout = self.op_timeout();
        let Some(op) = self.operations.get_mut(key) else {
            return;
        };
        let prev = op.state();
        op.mark_wrong(wrong);
        timers.cancel(&op.timer);
        timers.arm(op.restart_timer(), timeout);
        if already_marked {
            return;
        }

        let mut out = Emission::new();
        out.led(&SlotRef::new(key.drawer.clone(), wrong), Indicator::Wrong)
            .led(key, Indicator::RemoveHere)
            .notify(Notification::UnloadIncorrect {
                drawer: key.drawer.clone(),
                wrong_position: wrong,
                correct_position: key.slot,
                wine_name: op.name.clone(),
            });
        info!("OP {} {}: {:?} -> Wrong (#{} lifted)", op.id, key, prev, wrong);
        out.flush(io);
    }

    fn unload_bottle_returned(&mut self, key: &SlotRef, returned: SlotIndex, io: &mut impl CabinetIo) {
        let Some(op) = self.operations.get_mut(key) else {
            return;
        };
        op.clear_wrong(returned);

        let mut out = Emission::new();
        out.led(&SlotRef::new(key.drawer.clone(), returned), Indicator::Occupied)
            .notify(Notification::WrongBottleReturned {
                drawer: key.drawer.clone(),
                position: returned,
                expected_position: key.slot,
            });
        info!("OP {} {}: #{} returned, now {:?}", op.id, key, returned, op.state());
        out.flush(io);
    }

    // ── Timeout / cancel / retry ──────────────────────────────

    /// Timed-out operation: indicators cleared, failure reported.
    /// Inventory is untouched.
    fn expire(&mut self, op: PendingOperation, io: &mut impl CabinetIo) {
        let mut out = self.teardown(&op);
        let report = match op.kind {
            OperationKind::Load => Notification::BottlePlaced(OperationReport::failed(
                &op.slot, &op.barcode, &op.name, "Timeout", true,
            )),
            OperationKind::Unload => Notification::BottleUnloaded(OperationReport::failed(
                &op.slot, &op.barcode, &op.name, "Timeout", false,
            )),
        };
        out.notify(report);
        out.flush(io);
        info!("OP {} {}: {:?} -> TimedOut", op.id, op.slot, op.state());
    }

    /// Indicator and expectation cleanup for a removed operation.
    fn teardown(&self, op: &PendingOperation) -> Emission {
        let mut out = Emission::new();
        out.led(&op.slot, Indicator::Off);
        for w in &op.wrong_slots {
            out.led(&SlotRef::new(op.drawer().clone(), *w), Indicator::Off);
        }
        if op.kind == OperationKind::Load {
            out.expect(op.drawer(), self.operations.drawer_expectation(op.drawer()));
        }
        out
    }

    /// Cancel every operation matching `pred`.  Silent towards observers.
    pub fn cancel_matching(
        &mut self,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
        pred: impl Fn(&PendingOperation) -> bool,
    ) -> usize {
        let keys = self.operations.keys_where(pred);
        for key in &keys {
            if let Some(op) = self.operations.remove(key) {
                timers.cancel(&op.timer);
                self.teardown(&op).flush(io);
                info!("OP {} {}: {:?} -> Idle (cancelled)", op.id, key, op.state());
            }
        }
        if keys.is_empty() {
            debug!("Cancel matched no pending operation");
        }
        keys.len()
    }

    pub fn cancel_operation(
        &mut self,
        id: &OperationId,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
    ) -> bool {
        self.cancel_matching(io, timers, |op| op.id == *id) > 0
    }

    pub fn cancel_drawer(
        &mut self,
        drawer: &DrawerId,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
    ) -> usize {
        self.cancel_matching(io, timers, |op| op.drawer() == drawer)
    }

    /// Clear wrong-placement marks on pending loads and re-arm them.
    /// `drawer` / `position` narrow which loads and marks are affected.
    pub fn retry_placement(
        &mut self,
        drawer: Option<&DrawerId>,
        position: Option<SlotIndex>,
        io: &mut impl CabinetIo,
        timers: &mut impl TimerPort,
    ) {
        let timeout = self.op_timeout();
        let mut out = Emission::new();
        let mut retried = 0;
        for op in self.operations.iter_mut() {
            if op.kind != OperationKind::Load || drawer.is_some_and(|d| d != op.drawer()) {
                continue;
            }
            let cleared: Vec<SlotIndex> = op
                .wrong_slots
                .iter()
                .copied()
                .filter(|w| position.is_none_or(|p| p == *w))
                .collect();
            if cleared.is_empty() {
                continue;
            }
            for w in cleared {
                op.clear_wrong(w);
                out.led(&SlotRef::new(op.drawer().clone(), w), Indicator::Off);
            }
            timers.cancel(&op.timer);
            timers.arm(op.restart_timer(), timeout);
            out.led(&op.slot, Indicator::PlaceHere)
                .notify(Notification::RetryReady {
                    drawer: op.drawer().clone(),
                    expected_position: op.expected(),
                });
            info!("OP {} {}: retry, now {:?}", op.id, op.slot, op.state());
            retried += 1;
        }
        if retried == 0 {
            debug!("Retry matched no wrong placement");
        }
        out.flush(io);
    }
}
