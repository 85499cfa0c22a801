use std::fmt;

use crate::bus::McPacket;
use crate::error::{Result, SimError};
use crate::types::RoutingKey;

/// A single-bit signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinValue {
    #[default]
    Low,
    High,
}

impl PinValue {
    pub fn to_char(&self) -> char {
        match self {
            PinValue::Low => '0',
            PinValue::High => '1',
        }
    }

    pub fn from_bool(value: bool) -> Self {
        if value {
            PinValue::High
        } else {
            PinValue::Low
        }
    }

    pub fn to_bool(&self) -> bool {
        matches!(self, PinValue::High)
    }

    /// Interprets a packet payload, accepting only 0 and 1.
    pub fn from_payload(payload: u32) -> Option<Self> {
        match payload {
            0 => Some(PinValue::Low),
            1 => Some(PinValue::High),
            _ => None,
        }
    }

    pub fn to_payload(&self) -> u32 {
        self.to_bool() as u32
    }
}

impl fmt::Display for PinValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Input latch holding the most recent payload seen on one routing key.
///
/// Payloads are stored exactly as received; range checking happens when a
/// tick reads the latch through [`InputPin::level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPin {
    name: &'static str,
    key: RoutingKey,
    last_payload: u32,
}

impl InputPin {
    pub fn new(name: &'static str, key: RoutingKey) -> Self {
        InputPin {
            name,
            key,
            last_payload: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> RoutingKey {
        self.key
    }

    /// Stores the payload if the packet's key matches. Returns whether it did.
    pub fn latch(&mut self, packet: &McPacket) -> bool {
        if packet.key == self.key {
            self.last_payload = packet.payload;
            true
        } else {
            false
        }
    }

    pub fn raw(&self) -> u32 {
        self.last_payload
    }

    /// Current level, failing if the stored payload is not a single bit.
    pub fn level(&self, node: &str) -> Result<PinValue> {
        PinValue::from_payload(self.last_payload).ok_or_else(|| SimError::PayloadOutOfRange {
            node: node.to_string(),
            key: self.key,
            payload: self.last_payload,
        })
    }
}
