//! Application core: pure domain logic, zero I/O.
//!
//! This module holds the coordination rules for the cabinet: arming
//! loads and unloads, classifying sensor events, recovering from wrong
//! physical actions, and running swap sessions.  All interaction with
//! drawers, observers, timers and storage goes through the **port
//! traits** in [`ports`], so the whole layer is testable with mock
//! adapters.

pub mod commands;
pub mod emitter;
pub mod events;
pub mod ports;
pub mod service;
mod swap;
