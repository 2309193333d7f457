//! Cabinet addressing and bottle value types.
//!
//! A cabinet is a set of drawers, each holding a fixed number of slots.
//! Slots are addressed by `(drawer, slot)` where `slot` is 1-based.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on slots per drawer.  Sizes the fixed-capacity slot sets
/// carried by pending operations.
pub const MAX_SLOTS_PER_DRAWER: usize = 16;

/// 1-based slot position within a drawer.  `0` is reserved on the wire
/// to mean "no expectation".
pub type SlotIndex = u8;

// ---------------------------------------------------------------------------
// Drawer identity
// ---------------------------------------------------------------------------

/// Drawer identifier as used on the bus, e.g. `drawer_3`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawerId(String);

impl DrawerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DrawerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for DrawerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Slot reference
// ---------------------------------------------------------------------------

/// A fully qualified slot address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub drawer: DrawerId,
    #[serde(rename = "position")]
    pub slot: SlotIndex,
}

impl SlotRef {
    pub fn new(drawer: impl Into<DrawerId>, slot: SlotIndex) -> Self {
        Self {
            drawer: drawer.into(),
            slot,
        }
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.drawer, self.slot)
    }
}

// ---------------------------------------------------------------------------
// Wine type
// ---------------------------------------------------------------------------

/// Coarse wine classification used to pick a preferred drawer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum WineType {
    Red,
    White,
    Rose,
    #[default]
    Unknown,
}

impl WineType {
    /// Normalise a free-text catalog type ("Tinto", "Rosé", "Blanco", ...).
    /// Rosé wins over red when both words appear.
    pub fn from_label(label: &str) -> Self {
        let l = label.to_lowercase();
        if l.contains("rose") || l.contains("rosé") || l.contains("rosado") {
            Self::Rose
        } else if l.contains("white") || l.contains("blanco") {
            Self::White
        } else if l.contains("red") || l.contains("tinto") {
            Self::Red
        } else {
            Self::Unknown
        }
    }
}

// ---------------------------------------------------------------------------
// Bottle
// ---------------------------------------------------------------------------

/// A bottle as known to the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottle {
    pub barcode: String,
    pub name: String,
    pub weight_grams: f32,
    /// Derived from `weight_grams`, always 0–100.
    pub fill_percent: u8,
    #[serde(default)]
    pub wine_type: WineType,
}
