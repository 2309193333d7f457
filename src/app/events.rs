//! Outbound messages from the coordinator.
//!
//! [`Notification`]s go to observers through the
//! [`EventSink`](super::ports::EventSink) port; [`DeviceCommand`]s go to a
//! drawer controller through the [`DevicePort`](super::ports::DevicePort).
//! Both serialize to the envelope's `action` + `data` pair.

use serde::Serialize;

use crate::cabinet::{Bottle, DrawerId, SlotIndex, SlotRef, WineType};
use crate::indicator::LedCommand;

use super::commands::SensorAction;

/// Outcome of a load or unload, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport {
    pub success: bool,
    pub drawer: DrawerId,
    pub position: SlotIndex,
    pub barcode: String,
    pub wine_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_percentage: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether an observer UI should close its modal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_screen: Option<bool>,
}

impl OperationReport {
    /// Successful load, carrying the measured weight and fill.
    pub fn placed(slot: &SlotRef, bottle: &Bottle) -> Self {
        Self {
            success: true,
            drawer: slot.drawer.clone(),
            position: slot.slot,
            barcode: bottle.barcode.clone(),
            wine_name: bottle.name.clone(),
            weight: Some(bottle.weight_grams),
            fill_percentage: Some(bottle.fill_percent),
            error: None,
            close_screen: None,
        }
    }

    pub fn unloaded(slot: &SlotRef, barcode: &str, wine_name: &str) -> Self {
        Self {
            success: true,
            drawer: slot.drawer.clone(),
            position: slot.slot,
            barcode: barcode.to_owned(),
            wine_name: wine_name.to_owned(),
            weight: None,
            fill_percentage: None,
            error: None,
            close_screen: None,
        }
    }

    pub fn failed(
        slot: &SlotRef,
        barcode: &str,
        wine_name: &str,
        error: &str,
        close_screen: bool,
    ) -> Self {
        Self {
            success: false,
            error: Some(error.to_owned()),
            close_screen: Some(close_screen),
            ..Self::unloaded(slot, barcode, wine_name)
        }
    }
}

/// Structured notifications emitted to observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum Notification {
    /// A load is armed; the slot is blinking.
    ExpectBottle {
        drawer: DrawerId,
        position: SlotIndex,
        wine_name: String,
    },

    /// An unload is armed; the slot is lit.
    ExpectRemoval {
        drawer: DrawerId,
        position: SlotIndex,
        wine_name: String,
    },

    BottlePlaced(OperationReport),

    BottleUnloaded(OperationReport),

    /// A load's bottle landed in the wrong slot.
    PlacementError {
        error: &'static str,
        drawer: DrawerId,
        wrong_position: SlotIndex,
        correct_position: SlotIndex,
        wine_name: String,
    },

    /// The wrongly placed bottle was taken back out.
    WrongBottleRemoved {
        drawer: DrawerId,
        position: SlotIndex,
        expected_position: SlotIndex,
    },

    /// An unload lifted the wrong bottle.
    UnloadIncorrect {
        drawer: DrawerId,
        wrong_position: SlotIndex,
        correct_position: SlotIndex,
        wine_name: String,
    },

    /// The wrongly lifted bottle was put back.
    WrongBottleReturned {
        drawer: DrawerId,
        position: SlotIndex,
        expected_position: SlotIndex,
    },

    RetryReady {
        drawer: DrawerId,
        expected_position: SlotIndex,
    },

    SwapStarted {},

    /// A bottle moved during a swap.
    #[serde(rename = "bottle_event")]
    SwapBottleEvent {
        event: SensorAction,
        drawer: DrawerId,
        position: SlotIndex,
        barcode: String,
        wine_name: String,
    },

    SwapError {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<&'static str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        drawer: Option<DrawerId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        wrong_position: Option<SlotIndex>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        expected_positions: Vec<SlotRef>,
    },

    SwapCompleted {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    LoadError {
        error: String,
        code: &'static str,
    },

    UnloadError {
        error: String,
        code: &'static str,
    },

    BarcodeScanned {
        barcode: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        wine_type: Option<WineType>,
    },
}

impl Notification {
    /// The wire `action` tag.
    pub fn action(&self) -> &'static str {
        match self {
            Self::ExpectBottle { .. } => "expect_bottle",
            Self::ExpectRemoval { .. } => "expect_removal",
            Self::BottlePlaced(_) => "bottle_placed",
            Self::BottleUnloaded(_) => "bottle_unloaded",
            Self::PlacementError { .. } => "placement_error",
            Self::WrongBottleRemoved { .. } => "wrong_bottle_removed",
            Self::UnloadIncorrect { .. } => "unload_incorrect",
            Self::WrongBottleReturned { .. } => "wrong_bottle_returned",
            Self::RetryReady { .. } => "retry_ready",
            Self::SwapStarted {} => "swap_started",
            Self::SwapBottleEvent { .. } => "bottle_event",
            Self::SwapError { .. } => "swap_error",
            Self::SwapCompleted { .. } => "swap_completed",
            Self::LoadError { .. } => "load_error",
            Self::UnloadError { .. } => "unload_error",
            Self::BarcodeScanned { .. } => "barcode_scanned",
        }
    }
}

/// Commands sent to a drawer controller on its command topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum DeviceCommand {
    SetLeds { positions: Vec<LedCommand> },

    /// Arm the drawer's mismatch detector; `0` disarms.
    ExpectBottle { position: SlotIndex },
}
