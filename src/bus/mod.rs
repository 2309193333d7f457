//! Pub/sub message plumbing.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  topic + payload ──▶ topics::route ──▶ codec::decode     │
//! │                                          │               │
//! │                                          ▼               │
//! │                      channels::INPUTS (serialized)       │
//! │                                          │               │
//! │  codec::encode ◀── adapters::bus ◀── Coordinator         │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod codec;
pub mod topics;
