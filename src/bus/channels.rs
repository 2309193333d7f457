//! Serialized coordinator input.
//!
//! Every source that can change coordinator state (bus subscriber,
//! barcode reader thread, fired timers) posts an [`Input`] into one
//! `embassy-sync` bounded channel.  The runtime drains it on a single
//! task, so handlers never run concurrently.
//!
//! ```text
//!  bus subscriber ──┐
//!  barcode reader ──┼──▶ INPUTS ──▶ Runtime ──▶ Coordinator
//!  timer tasks ─────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::commands::{AppCommand, DeviceEvent};
use crate::cabinet::DrawerId;
use crate::fsm::TimeoutTag;

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Command(AppCommand),
    Device { drawer: DrawerId, event: DeviceEvent },
    Timeout(TimeoutTag),
    /// Raw read from the barcode scanner, not yet validated.
    BarcodeScanned(String),
    /// Stop the runtime after draining this message.
    Shutdown,
}

/// Channel depth for coordinator inputs.
pub const INPUT_DEPTH: usize = 32;

pub type InputChannel = Channel<CriticalSectionRawMutex, Input, INPUT_DEPTH>;

/// Process-wide input channel: all producers → runtime.
pub static INPUTS: InputChannel = Channel::new();

/// Non-blocking post for producers that must not stall (bus callbacks,
/// the scanner thread).  Returns `false` (and logs) when the channel is full.
pub fn post(channel: &InputChannel, input: Input) -> bool {
    match channel.try_send(input) {
        Ok(()) => true,
        Err(_) => {
            warn!("Inputs: channel full, dropping message");
            false
        }
    }
}
