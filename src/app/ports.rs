//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Coordinator (domain)
//! ```
//!
//! Driven adapters (drawer LEDs, observer notifications, timers, durable
//! storage) implement these traits.  The [`Coordinator`](super::service::Coordinator)
//! consumes them via generics, so the domain core never touches the bus,
//! the file system or the clock directly.

use core::fmt;
use core::time::Duration;

use crate::cabinet::{DrawerId, SlotIndex};
use crate::fsm::TimeoutTag;
use crate::indicator::LedCommand;
use crate::inventory::InventoryDocument;

use super::events::Notification;

// ───────────────────────────────────────────────────────────────
// Device port (driven adapter: domain → drawer controller)
// ───────────────────────────────────────────────────────────────

/// Write-side port to a drawer controller.  Fire-and-forget: the
/// coordinator never waits on, or inspects, the outcome.
pub trait DevicePort {
    /// Set the indicator of every listed slot in `drawer`.
    fn set_leds(&mut self, drawer: &DrawerId, leds: &[LedCommand]);

    /// Arm the drawer's own mismatch detection for `position`.
    /// `0` disarms.
    fn expect_bottle(&mut self, drawer: &DrawerId, position: SlotIndex);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → observers)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`Notification`]s through this port.
/// Adapters decide where they go (bus status topic, log, UI socket).
pub trait EventSink {
    fn emit(&mut self, notification: &Notification);
}

/// Both outbound ports at once.  Lets a single adapter value be passed
/// where the coordinator needs to command drawers and notify observers
/// without a double mutable borrow.
pub trait CabinetIo: DevicePort + EventSink {}

impl<T: DevicePort + EventSink> CabinetIo for T {}

// ───────────────────────────────────────────────────────────────
// Timer port (driven adapter: domain → runtime timers)
// ───────────────────────────────────────────────────────────────

/// Schedules tagged timeouts.  When a timer fires, the runtime feeds
/// `Input::Timeout(tag)` back through the serialized input channel;
/// the coordinator discards any tag that no longer matches live state.
pub trait TimerPort {
    fn arm(&mut self, tag: TimeoutTag, after: Duration);

    fn cancel(&mut self, tag: &TimeoutTag);
}

// ───────────────────────────────────────────────────────────────
// Inventory backend (driven adapter: domain ↔ durable storage)
// ───────────────────────────────────────────────────────────────

/// Durable storage for the whole inventory document.
///
/// Writes MUST be atomic: a crash mid-write must leave either the old
/// or the new document, never a torn one.
pub trait InventoryBackend {
    /// Load the stored document.  `Ok(None)` on first start.
    fn load(&mut self) -> Result<Option<InventoryDocument>, StorageError>;

    /// Replace the stored document.
    fn persist(&mut self, doc: &InventoryDocument) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

/// Errors from [`InventoryBackend`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Stored document failed deserialization.
    Corrupted(String),
    /// Generic I/O error from the storage backend.
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted(msg) => write!(f, "inventory corrupted: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl std::error::Error for StorageError {}
