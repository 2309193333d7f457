//! Inbound messages to the coordinator.
//!
//! Two closed variant sets, one per channel: [`AppCommand`] from the
//! observer/UI side and [`DeviceEvent`] from a drawer controller.  The
//! serde representation matches the envelope's `action` + `data` pair so
//! [`bus::codec`](crate::bus::codec) can decode straight into them.

use serde::{Deserialize, Serialize};

use crate::cabinet::{DrawerId, SlotIndex, SlotRef};

/// Commands that observers can send to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum AppCommand {
    /// Allocate a slot and arm a load.  `name` overrides the catalog name.
    StartLoad {
        barcode: String,
        #[serde(default)]
        name: Option<String>,
    },

    /// Locate a bottle and arm its removal.  `drawer_id` + `position`
    /// select the slot manually; `drawer` alone narrows the lookup.
    StartUnload {
        barcode: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        drawer: Option<DrawerId>,
        #[serde(default)]
        position: Option<SlotIndex>,
        #[serde(default)]
        drawer_id: Option<DrawerId>,
    },

    StartSwap {},

    CancelSwap {},

    /// Cancel pending loads for `barcode`, or every load when absent.
    CancelLoad {
        #[serde(default)]
        barcode: Option<String>,
    },

    CancelUnload {},

    /// Clear wrong-placement marks and re-arm the expected slot.
    RetryPlacement {
        #[serde(default)]
        drawer: Option<DrawerId>,
        #[serde(default)]
        position: Option<SlotIndex>,
    },
}

/// Parameters of an unload request after the wire shape is unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnloadRequest {
    pub barcode: String,
    pub name: Option<String>,
    /// Restrict the inventory lookup to this drawer.
    pub drawer_hint: Option<DrawerId>,
    /// Skip the lookup and use this slot.
    pub manual: Option<SlotRef>,
}

impl UnloadRequest {
    pub fn by_barcode(barcode: impl Into<String>) -> Self {
        Self {
            barcode: barcode.into(),
            name: None,
            drawer_hint: None,
            manual: None,
        }
    }
}

/// Weight sensor transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorAction {
    Placed,
    Removed,
}

/// Events reported by a drawer controller on its status topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// Weight change settled at `position`.
    BottleEvent {
        event: SensorAction,
        position: SlotIndex,
        #[serde(default)]
        weight: f32,
    },

    /// The drawer's own detector saw a bottle somewhere other than the
    /// armed slot, before weighing finished.
    WrongPlacement {
        position: SlotIndex,
        #[serde(default)]
        expected_position: SlotIndex,
    },
}

impl DeviceEvent {
    pub fn position(&self) -> SlotIndex {
        match self {
            Self::BottleEvent { position, .. } | Self::WrongPlacement { position, .. } => {
                *position
            }
        }
    }
}
