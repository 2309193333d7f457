//! Inventory store.
//!
//! The in-memory [`InventoryDocument`] is authoritative.  Every mutation
//! is applied to a working copy, `total_bottles` is recomputed from
//! scratch, the copy is persisted through the [`InventoryBackend`], and
//! only then does it replace the live document.  A failed write leaves
//! the live document untouched and is reported to the caller, so the
//! coordinator never announces a state that storage does not hold.
//!
//! Persisted layout:
//!
//! ```json
//! { "drawers": { "drawer_3": { "positions": { "1": { "occupied": true, ... } } } },
//!   "total_bottles": 1, "last_updated": "2025-10-28T18:15:00Z" }
//! ```
//!
//! Unknown drawer-level and top-level keys (zone, mode, temperature, ...)
//! are carried through untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::app::ports::{InventoryBackend, StorageError};
use crate::cabinet::{Bottle, DrawerId, SlotIndex, SlotRef, WineType};

// ---------------------------------------------------------------------------
// Fill percentage
// ---------------------------------------------------------------------------

/// Estimate remaining content (0–100) from a weight reading.
///
/// * `weight <= empty` → 0
/// * `weight >= full` → 100 (heavier bottles saturate)
/// * otherwise linear, rounded, and kept inside 1–99 so a partial bottle
///   never reads as empty or full.
pub fn fill_percent(weight: f32, empty: f32, full: f32) -> u8 {
    if !weight.is_finite() || weight <= empty {
        return 0;
    }
    if weight >= full {
        return 100;
    }
    let pct = (weight - empty) / (full - empty) * 100.0;
    pct.round().clamp(1.0, 99.0) as u8
}

// ---------------------------------------------------------------------------
// Persisted document
// ---------------------------------------------------------------------------

/// One slot as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    #[serde(default)]
    pub occupied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_percentage: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wine_type: Option<WineType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawerRecord {
    #[serde(default)]
    pub positions: BTreeMap<SlotIndex, PositionRecord>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryDocument {
    #[serde(default)]
    pub drawers: BTreeMap<DrawerId, DrawerRecord>,
    #[serde(default)]
    pub total_bottles: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl InventoryDocument {
    fn record(&self, slot: &SlotRef) -> Option<&PositionRecord> {
        self.drawers.get(&slot.drawer)?.positions.get(&slot.slot)
    }

    /// Count of occupied slots, derived from the positions themselves.
    pub fn count_occupied(&self) -> u32 {
        self.drawers
            .values()
            .flat_map(|d| d.positions.values())
            .filter(|p| p.occupied)
            .count() as u32
    }
}

// ---------------------------------------------------------------------------
// Slot state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SlotState {
    Empty,
    Occupied(Bottle),
}

impl SlotState {
    pub fn is_occupied(&self) -> bool {
        matches!(self, Self::Occupied(_))
    }
}

/// Read-only occupancy view.  Lets the allocator run against the store
/// or against a plain set in tests.
pub trait SlotView {
    fn is_occupied(&self, slot: &SlotRef) -> bool;
}

// ---------------------------------------------------------------------------
// InventoryStore
// ---------------------------------------------------------------------------

pub struct InventoryStore<B: InventoryBackend> {
    doc: InventoryDocument,
    backend: B,
}

impl<B: InventoryBackend> InventoryStore<B> {
    /// Load the persisted document (or start empty on first run).
    ///
    /// A stored `total_bottles` that disagrees with the positions is
    /// corrected in memory; the fix reaches disk with the next write.
    pub fn open(mut backend: B) -> Result<Self, StorageError> {
        let mut doc = backend.load()?.unwrap_or_default();
        let counted = doc.count_occupied();
        if doc.total_bottles != counted {
            info!(
                "Inventory: total_bottles {} disagrees with positions, using {}",
                doc.total_bottles, counted
            );
            doc.total_bottles = counted;
        }
        info!("Inventory: loaded, {} bottle(s)", counted);
        Ok(Self { doc, backend })
    }

    pub fn get(&self, slot: &SlotRef) -> SlotState {
        match self.doc.record(slot) {
            Some(p) if p.occupied => SlotState::Occupied(Bottle {
                barcode: p.barcode.clone().unwrap_or_default(),
                name: p.name.clone().unwrap_or_default(),
                weight_grams: p.weight.unwrap_or(0.0),
                fill_percent: p.fill_percentage.unwrap_or(0),
                wine_type: p.wine_type.unwrap_or_default(),
            }),
            _ => SlotState::Empty,
        }
    }

    /// Barcode held by `slot`, if occupied.
    pub fn barcode_at(&self, slot: &SlotRef) -> Option<&str> {
        self.doc
            .record(slot)
            .filter(|p| p.occupied)
            .and_then(|p| p.barcode.as_deref())
    }

    /// Place `bottle` in `slot`, recompute the total and persist.
    pub fn occupy(
        &mut self,
        slot: &SlotRef,
        bottle: &Bottle,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        let record = PositionRecord {
            occupied: true,
            barcode: Some(bottle.barcode.clone()),
            name: Some(bottle.name.clone()),
            weight: Some(bottle.weight_grams),
            fill_percentage: Some(bottle.fill_percent),
            wine_type: Some(bottle.wine_type),
            placed_date: Some(stamp.clone()),
        };
        self.commit(slot, record, stamp)?;
        info!(
            "Inventory: {} <- {} ({}g, {}%)",
            slot, bottle.barcode, bottle.weight_grams, bottle.fill_percent
        );
        Ok(())
    }

    /// Mark `slot` empty, recompute the total and persist.
    pub fn vacate(&mut self, slot: &SlotRef, now: DateTime<Utc>) -> Result<(), StorageError> {
        let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.commit(slot, PositionRecord::default(), stamp)?;
        info!("Inventory: {} vacated", slot);
        Ok(())
    }

    pub fn total_occupied(&self) -> u32 {
        self.doc.total_bottles
    }

    /// Locate `barcode` in the given drawers, in order, ascending slot
    /// index within each.
    pub fn find_in<'a>(
        &self,
        barcode: &str,
        drawers: impl IntoIterator<Item = &'a DrawerId>,
    ) -> Option<SlotRef> {
        drawers.into_iter().find_map(|drawer| {
            self.doc.drawers.get(drawer).and_then(|d| {
                d.positions
                    .iter()
                    .find(|(_, p)| p.occupied && p.barcode.as_deref() == Some(barcode))
                    .map(|(slot, _)| SlotRef::new(drawer.clone(), *slot))
            })
        })
    }

    /// Every drawer present in the document.
    pub fn drawers(&self) -> impl Iterator<Item = &DrawerId> {
        self.doc.drawers.keys()
    }

    pub fn document(&self) -> &InventoryDocument {
        &self.doc
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn commit(
        &mut self,
        slot: &SlotRef,
        record: PositionRecord,
        stamp: String,
    ) -> Result<(), StorageError> {
        let mut next = self.doc.clone();
        next.drawers
            .entry(slot.drawer.clone())
            .or_default()
            .positions
            .insert(slot.slot, record);
        next.total_bottles = next.count_occupied();
        next.last_updated = Some(stamp);

        if let Err(e) = self.backend.persist(&next) {
            error!("Inventory: write for {} failed: {}", slot, e);
            return Err(e);
        }
        self.doc = next;
        Ok(())
    }
}

impl<B: InventoryBackend> SlotView for InventoryStore<B> {
    fn is_occupied(&self, slot: &SlotRef) -> bool {
        self.doc.record(slot).is_some_and(|p| p.occupied)
    }
}
