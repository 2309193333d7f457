//! Unified error types for the coordinator.
//!
//! Every rejected or failed operation funnels into [`CoordinatorError`],
//! keeping the dispatch layer's error reporting uniform.  Each variant
//! carries enough context (slot, barcode) for an observer to render a
//! precise message, and a stable [`code`](CoordinatorError::code) for
//! machine consumers.

use core::fmt;

use crate::app::ports::StorageError;
use crate::cabinet::{DrawerId, SlotRef};

// ---------------------------------------------------------------------------
// Top-level coordinator error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    /// Every sensor-equipped slot is occupied or armed.
    NoCapacity,
    /// Barcode not present where it was looked for.
    NotFound { barcode: String, drawer: Option<DrawerId> },
    /// The resolved drawer has no weight sensors.
    UnsupportedLocation(SlotRef),
    /// The slot is already armed by another operation.
    SlotBusy(SlotRef),
    /// The slot is occupied, so it cannot receive a bottle.
    SlotOccupied(SlotRef),
    /// A slot index outside `1..=slots_per_drawer`.
    InvalidSlot(SlotRef),
    /// A swap session is running; per-slot operations are refused.
    SwapActive,
    /// Per-slot operations are pending; a swap cannot start.
    OperationsPending(usize),
    /// The durable inventory write failed.
    Persistence(StorageError),
}

impl CoordinatorError {
    /// Stable snake_case identifier sent to observers alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoCapacity => "no_capacity",
            Self::NotFound { .. } => "not_found",
            Self::UnsupportedLocation(_) => "unsupported_location",
            Self::SlotBusy(_) => "slot_busy",
            Self::SlotOccupied(_) => "slot_occupied",
            Self::InvalidSlot(_) => "invalid_slot",
            Self::SwapActive => "swap_active",
            Self::OperationsPending(_) => "operations_pending",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCapacity => write!(f, "No empty positions available"),
            Self::NotFound {
                barcode,
                drawer: Some(d),
            } => write!(f, "Bottle {barcode} not found in {d}"),
            Self::NotFound {
                barcode,
                drawer: None,
            } => write!(f, "Bottle {barcode} not found in inventory"),
            Self::UnsupportedLocation(slot) => {
                write!(f, "Drawer {} has no weight sensors", slot.drawer)
            }
            Self::SlotBusy(slot) => write!(f, "{slot} already has an operation in progress"),
            Self::SlotOccupied(slot) => write!(f, "{slot} is already occupied"),
            Self::InvalidSlot(slot) => write!(f, "{slot} is not a valid position"),
            Self::SwapActive => write!(f, "A swap is in progress"),
            Self::OperationsPending(n) => write!(f, "{n} load/unload operation(s) pending"),
            Self::Persistence(e) => write!(f, "inventory write failed: {e}"),
        }
    }
}

impl std::error::Error for CoordinatorError {}

impl From<StorageError> for CoordinatorError {
    fn from(e: StorageError) -> Self {
        Self::Persistence(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Coordinator-wide `Result` alias.
pub type Result<T> = core::result::Result<T, CoordinatorError>;
