//! Pub/sub adapter.
//!
//! Implements [`DevicePort`] and [`EventSink`] on top of anything that
//! can publish `(topic, payload)`.  The concrete client (MQTT, a test
//! recorder, a closure) plugs in through [`BusPublisher`].  Publishing is
//! fire-and-forget: failures are logged, never returned to the core.

use core::fmt;

use chrono::Utc;
use log::{debug, warn};
use serde::Serialize;

use crate::app::events::{DeviceCommand, Notification};
use crate::app::ports::{DevicePort, EventSink};
use crate::bus::codec;
use crate::bus::topics::Topics;
use crate::cabinet::{DrawerId, SlotIndex};
use crate::indicator::LedCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    NotConnected,
    Rejected(String),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Rejected(e) => write!(f, "publish rejected: {}", e),
        }
    }
}

impl std::error::Error for PublishError {}

/// Outbound half of a pub/sub client.
pub trait BusPublisher {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

impl<F> BusPublisher for F
where
    F: FnMut(&str, &[u8]) -> Result<(), PublishError>,
{
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        self(topic, payload)
    }
}

pub struct BusAdapter<P: BusPublisher> {
    publisher: P,
    topics: Topics,
}

impl<P: BusPublisher> BusAdapter<P> {
    pub fn new(publisher: P, topics: Topics) -> Self {
        Self { publisher, topics }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    fn send<T: Serialize>(&mut self, topic: &str, msg: &T) {
        let payload = match codec::encode(msg, Utc::now()) {
            Ok(p) => p,
            Err(e) => {
                warn!("Bus: {} not sent: {}", topic, e);
                return;
            }
        };
        match self.publisher.publish(topic, &payload) {
            Ok(()) => debug!("Bus: -> {} ({} bytes)", topic, payload.len()),
            Err(e) => warn!("Bus: publish to {} failed: {}", topic, e),
        }
    }
}

impl<P: BusPublisher> DevicePort for BusAdapter<P> {
    fn set_leds(&mut self, drawer: &DrawerId, leds: &[LedCommand]) {
        let topic = self.topics.drawer_command(drawer);
        self.send(
            &topic,
            &DeviceCommand::SetLeds {
                positions: leds.to_vec(),
            },
        );
    }

    fn expect_bottle(&mut self, drawer: &DrawerId, position: SlotIndex) {
        let topic = self.topics.drawer_command(drawer);
        self.send(&topic, &DeviceCommand::ExpectBottle { position });
    }
}

impl<P: BusPublisher> EventSink for BusAdapter<P> {
    fn emit(&mut self, notification: &Notification) {
        let topic = self.topics.system_status();
        self.send(&topic, notification);
    }
}
