//! Wine cabinet operation coordinator.
//!
//! Turns load, unload and swap requests into drawer LED and expectation
//! commands, classifies the weight-sensor events that come back, recovers
//! from wrong physical actions, enforces timeouts and keeps a durable
//! inventory.  Transport, storage and timers are reached through the
//! port traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod allocator;
pub mod app;
pub mod bus;
pub mod cabinet;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fsm;
pub mod indicator;
pub mod inventory;
pub mod runtime;
pub mod scanner;

pub use app::service::Coordinator;
pub use error::CoordinatorError;
