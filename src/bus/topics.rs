//! Topic layout and inbound routing.
//!
//! ```text
//!   {prefix}/system/command   observers ──▶ coordinator
//!   {prefix}/system/status    coordinator ──▶ observers
//!   {prefix}/{drawer}/status  drawer ──▶ coordinator
//!   {prefix}/{drawer}/command coordinator ──▶ drawer
//! ```

use log::{debug, warn};

use crate::cabinet::DrawerId;

use super::channels::Input;
use super::codec::{self, CodecError};

const SYSTEM: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

/// Where an inbound topic points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundTopic {
    SystemCommand,
    DrawerStatus(DrawerId),
}

impl Topics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn system_command(&self) -> String {
        format!("{}/{}/command", self.prefix, SYSTEM)
    }

    pub fn system_status(&self) -> String {
        format!("{}/{}/status", self.prefix, SYSTEM)
    }

    pub fn drawer_command(&self, drawer: &DrawerId) -> String {
        format!("{}/{}/command", self.prefix, drawer)
    }

    pub fn drawer_status(&self, drawer: &DrawerId) -> String {
        format!("{}/{}/status", self.prefix, drawer)
    }

    /// Filters a pub/sub client should subscribe to.
    pub fn subscriptions(&self) -> [String; 2] {
        [self.system_command(), format!("{}/+/status", self.prefix)]
    }

    pub fn parse(&self, topic: &str) -> Option<InboundTopic> {
        let rest = topic.strip_prefix(self.prefix.as_str())?.strip_prefix('/')?;
        let (node, leaf) = rest.split_once('/')?;
        match (node, leaf) {
            (SYSTEM, "command") => Some(InboundTopic::SystemCommand),
            (SYSTEM, _) => None,
            (drawer, "status") if !drawer.is_empty() && !drawer.contains('/') => {
                Some(InboundTopic::DrawerStatus(DrawerId::new(drawer)))
            }
            _ => None,
        }
    }

    /// Map a raw bus message onto a coordinator input.
    ///
    /// `Ok(None)` for topics we do not consume and for heartbeats.
    pub fn route_inbound(&self, topic: &str, payload: &[u8]) -> Result<Option<Input>, CodecError> {
        match self.parse(topic) {
            Some(InboundTopic::SystemCommand) => codec::decode_command(payload)
                .map(Input::Command)
                .map(Some),
            Some(InboundTopic::DrawerStatus(drawer)) => Ok(codec::decode_device_event(payload)?
                .map(|event| Input::Device { drawer, event })),
            None => {
                debug!("Bus: ignoring topic {}", topic);
                Ok(None)
            }
        }
    }

    /// [`route_inbound`](Self::route_inbound) with decode errors logged
    /// and swallowed.
    pub fn route_or_log(&self, topic: &str, payload: &[u8]) -> Option<Input> {
        match self.route_inbound(topic, payload) {
            Ok(input) => input,
            Err(e) => {
                warn!("Bus: dropping message on {}: {}", topic, e);
                None
            }
        }
    }
}
