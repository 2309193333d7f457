//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                   |
//! |------------|--------------------|-------------------------------|
//! | `bus`      | DevicePort         | drawer command topics         |
//! |            | EventSink          | system status topic           |
//! | `log_sink` | DevicePort         | `log` facade (dry run)        |
//! |            | EventSink          |                               |
//! | `store`    | InventoryBackend   | JSON file / in-memory         |

pub mod bus;
pub mod log_sink;
pub mod store;
