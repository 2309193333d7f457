//! Log-based adapter.
//!
//! Implements [`EventSink`] and [`DevicePort`] by writing one line per
//! message to the `log` facade.  Used for dry runs without a broker and
//! alongside a real adapter when a trace of the session is wanted.

use log::info;

use crate::app::events::{Notification, OperationReport};
use crate::app::ports::{DevicePort, EventSink};
use crate::cabinet::{DrawerId, SlotIndex};
use crate::indicator::{LedCommand, hex};

/// Adapter that logs every notification and device command.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn outcome(r: &OperationReport) -> String {
    match &r.error {
        None => format!(
            "ok {} #{} {} ({})",
            r.drawer, r.position, r.barcode, r.wine_name
        ),
        Some(e) => format!("FAILED {} #{} {}: {}", r.drawer, r.position, r.barcode, e),
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, n: &Notification) {
        match n {
            Notification::ExpectBottle {
                drawer,
                position,
                wine_name,
            } => info!("LOAD | place {} at {} #{}", wine_name, drawer, position),
            Notification::ExpectRemoval {
                drawer,
                position,
                wine_name,
            } => info!("UNLOAD | remove {} from {} #{}", wine_name, drawer, position),
            Notification::BottlePlaced(r) => {
                info!(
                    "LOAD | {} | {}g {}%",
                    outcome(r),
                    r.weight.unwrap_or(0.0),
                    r.fill_percentage.unwrap_or(0)
                );
            }
            Notification::BottleUnloaded(r) => info!("UNLOAD | {}", outcome(r)),
            Notification::PlacementError {
                drawer,
                wrong_position,
                correct_position,
                ..
            } => info!(
                "LOAD | wrong slot {} #{}, expected #{}",
                drawer, wrong_position, correct_position
            ),
            Notification::UnloadIncorrect {
                drawer,
                wrong_position,
                correct_position,
                ..
            } => info!(
                "UNLOAD | wrong bottle {} #{}, expected #{}",
                drawer, wrong_position, correct_position
            ),
            Notification::WrongBottleRemoved {
                drawer, position, ..
            }
            | Notification::WrongBottleReturned {
                drawer, position, ..
            } => info!("{} | {} #{}", n.action(), drawer, position),
            Notification::RetryReady {
                drawer,
                expected_position,
            } => info!("RETRY | {} #{}", drawer, expected_position),
            Notification::SwapStarted {} => info!("SWAP | started"),
            Notification::SwapBottleEvent {
                event,
                drawer,
                position,
                barcode,
                ..
            } => info!("SWAP | {:?} {} at {} #{}", event, barcode, drawer, position),
            Notification::SwapError {
                error,
                drawer,
                wrong_position,
                ..
            } => info!("SWAP | error {} ({:?} #{:?})", error, drawer, wrong_position),
            Notification::SwapCompleted { success, error } => {
                info!("SWAP | completed success={} {:?}", success, error)
            }
            Notification::LoadError { error, code } => info!("LOAD | rejected [{}] {}", code, error),
            Notification::UnloadError { error, code } => {
                info!("UNLOAD | rejected [{}] {}", code, error)
            }
            Notification::BarcodeScanned { barcode, name, .. } => {
                info!("SCAN | {} {}", barcode, name.as_deref().unwrap_or("(unknown)"))
            }
        }
    }
}

impl DevicePort for LogEventSink {
    fn set_leds(&mut self, drawer: &DrawerId, leds: &[LedCommand]) {
        for l in leds {
            info!(
                "LED | {} #{} {}{}",
                drawer,
                l.position,
                hex(l.color),
                if l.blink { " blink" } else { "" }
            );
        }
    }

    fn expect_bottle(&mut self, drawer: &DrawerId, position: SlotIndex) {
        info!("EXPECT | {} #{}", drawer, position);
    }
}
