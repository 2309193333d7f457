//! Mock cabinet adapters for integration tests.
//!
//! Records every device command, notification and timer request so tests
//! can assert on the full history without a broker or real timers.

use std::collections::HashMap;
use std::time::Duration;

use cellarkeeper::Coordinator;
use cellarkeeper::adapters::store::MemoryBackend;
use cellarkeeper::app::commands::{AppCommand, DeviceEvent, SensorAction};
use cellarkeeper::app::events::Notification;
use cellarkeeper::app::ports::{DevicePort, EventSink, TimerPort};
use cellarkeeper::cabinet::{Bottle, DrawerId, SlotIndex, SlotRef, WineType};
use cellarkeeper::catalog::{Catalog, WineInfo};
use cellarkeeper::config::CabinetConfig;
use cellarkeeper::fsm::{TimeoutTag, TimerTarget};
use cellarkeeper::indicator::{Indicator, LedCommand};
use cellarkeeper::inventory::{InventoryStore, fill_percent};
use chrono::{DateTime, Utc};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum IoCall {
    SetLeds { drawer: DrawerId, leds: Vec<LedCommand> },
    Expect { drawer: DrawerId, position: SlotIndex },
    Notify(Notification),
}

// ── MockCabinet ───────────────────────────────────────────────

#[derive(Default)]
pub struct MockCabinet {
    pub calls: Vec<IoCall>,
}

#[allow(dead_code)]
impl MockCabinet {
    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.calls.iter().filter_map(|c| match c {
            IoCall::Notify(n) => Some(n),
            _ => None,
        })
    }

    pub fn count(&self, action: &str) -> usize {
        self.notifications().filter(|n| n.action() == action).count()
    }

    pub fn last_notification(&self) -> Option<&Notification> {
        self.notifications().last()
    }

    /// Most recent indicator sent for `slot`.
    pub fn led(&self, slot: &SlotRef) -> Option<LedCommand> {
        self.calls.iter().rev().find_map(|c| match c {
            IoCall::SetLeds { drawer, leds } if *drawer == slot.drawer => {
                leds.iter().find(|l| l.position == slot.slot).copied()
            }
            _ => None,
        })
    }

    pub fn shows(&self, slot: &SlotRef, indicator: Indicator) -> bool {
        self.led(slot) == Some(indicator.at(slot.slot))
    }

    /// Most recent expectation sent to `drawer`.
    pub fn expectation(&self, drawer: &str) -> Option<SlotIndex> {
        self.calls.iter().rev().find_map(|c| match c {
            IoCall::Expect { drawer: d, position } if d.as_str() == drawer => Some(*position),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl DevicePort for MockCabinet {
    fn set_leds(&mut self, drawer: &DrawerId, leds: &[LedCommand]) {
        self.calls.push(IoCall::SetLeds {
            drawer: drawer.clone(),
            leds: leds.to_vec(),
        });
    }

    fn expect_bottle(&mut self, drawer: &DrawerId, position: SlotIndex) {
        self.calls.push(IoCall::Expect {
            drawer: drawer.clone(),
            position,
        });
    }
}

impl EventSink for MockCabinet {
    fn emit(&mut self, notification: &Notification) {
        self.calls.push(IoCall::Notify(notification.clone()));
    }
}

// ── MockTimers ────────────────────────────────────────────────

/// Keeps the latest armed tag per owner, like the runtime does.
#[derive(Default)]
pub struct MockTimers {
    pub armed: HashMap<TimerTarget, (TimeoutTag, Duration)>,
    pub cancelled: Vec<TimeoutTag>,
}

#[allow(dead_code)]
impl MockTimers {
    pub fn live(&self) -> usize {
        self.armed.len()
    }

    pub fn tags(&self) -> Vec<TimeoutTag> {
        self.armed.values().map(|(t, _)| *t).collect()
    }
}

impl TimerPort for MockTimers {
    fn arm(&mut self, tag: TimeoutTag, after: Duration) {
        self.armed.insert(tag.target, (tag, after));
    }

    fn cancel(&mut self, tag: &TimeoutTag) {
        if self.armed.get(&tag.target).is_some_and(|(t, _)| t == tag) {
            self.armed.remove(&tag.target);
        }
        self.cancelled.push(*tag);
    }
}

// ── Harness ───────────────────────────────────────────────────

pub const RED: &str = "8410415520628";
pub const WHITE: &str = "8410451008115";
pub const ROSE: &str = "3760040433638";

pub fn catalog() -> Catalog {
    let mut c = Catalog::empty();
    for (barcode, name, kind) in [
        (RED, "Señorío de los Llanos", "Tinto"),
        (WHITE, "Martín Códax", "Blanco"),
        (ROSE, "Minuty", "Rosé"),
    ] {
        c.insert(
            barcode,
            WineInfo {
                name: name.into(),
                wine_type: kind.into(),
                region: None,
                vintage: None,
            },
        );
    }
    c
}

pub struct Harness {
    pub coord: Coordinator<MemoryBackend>,
    pub io: MockCabinet,
    pub timers: MockTimers,
    pub now: DateTime<Utc>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryBackend::new())
    }

    pub fn with_store(backend: MemoryBackend) -> Self {
        let store = InventoryStore::open(backend).unwrap();
        Self {
            coord: Coordinator::new(CabinetConfig::default(), store, catalog()),
            io: MockCabinet::default(),
            timers: MockTimers::default(),
            now: DateTime::parse_from_rfc3339("2025-10-28T18:15:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    /// Put a bottle straight into inventory.
    pub fn stock(&mut self, drawer: &str, slot: SlotIndex, barcode: &str, weight: f32) {
        let bottle = Bottle {
            barcode: barcode.into(),
            name: format!("Wine {barcode}"),
            weight_grams: weight,
            fill_percent: fill_percent(weight, 300.0, 700.0),
            wine_type: WineType::Unknown,
        };
        self.coord
            .inventory_mut()
            .occupy(&SlotRef::new(drawer, slot), &bottle, self.now)
            .unwrap();
    }

    pub fn command(&mut self, cmd: AppCommand) {
        self.coord
            .handle_command(cmd, &mut self.io, &mut self.timers, self.now);
    }

    pub fn device(&mut self, drawer: &str, event: DeviceEvent) {
        self.coord.handle_device_event(
            &DrawerId::from(drawer),
            event,
            &mut self.io,
            &mut self.timers,
            self.now,
        );
    }

    pub fn place(&mut self, drawer: &str, slot: SlotIndex, weight: f32) {
        self.device(
            drawer,
            DeviceEvent::BottleEvent {
                event: SensorAction::Placed,
                position: slot,
                weight,
            },
        );
    }

    pub fn remove(&mut self, drawer: &str, slot: SlotIndex) {
        self.device(
            drawer,
            DeviceEvent::BottleEvent {
                event: SensorAction::Removed,
                position: slot,
                weight: 0.0,
            },
        );
    }

    pub fn load(&mut self, barcode: &str) {
        self.command(AppCommand::StartLoad {
            barcode: barcode.into(),
            name: None,
        });
    }

    pub fn unload(&mut self, barcode: &str) {
        self.command(AppCommand::StartUnload {
            barcode: barcode.into(),
            name: None,
            drawer: None,
            position: None,
            drawer_id: None,
        });
    }

    /// Fire every armed timer, as if the window elapsed.
    pub fn fire_all(&mut self) {
        for tag in self.timers.tags() {
            self.timers.armed.remove(&tag.target);
            self.coord.handle_timeout(tag, &mut self.io, &mut self.timers, self.now);
        }
    }

    pub fn fire(&mut self, tag: TimeoutTag) {
        self.coord.handle_timeout(tag, &mut self.io, &mut self.timers, self.now);
    }

    pub fn occupied(&self, drawer: &str, slot: SlotIndex) -> bool {
        use cellarkeeper::inventory::SlotView;
        self.coord.inventory().is_occupied(&SlotRef::new(drawer, slot))
    }
}
