//! Error types for the circuit simulator.

use crate::types::{NodeId, RoutingKey};
use thiserror::Error;

/// Errors raised while loading configuration, building circuits or running nodes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Configuration region is shorter than the block it must hold
    #[error("{kind} configuration region too short: need {needed} bytes, got {actual}")]
    RegionTooShort {
        kind: &'static str,
        needed: usize,
        actual: usize,
    },

    /// Lookup table has bits set above bit 3
    #[error("lookup table {0:#x} has bits outside the low 4")]
    LutOutOfRange(u32),

    /// A tick tried to consume a payload that is not a single bit
    #[error("node {node} received payload {payload} on key {key}, expected 0 or 1")]
    PayloadOutOfRange {
        node: String,
        key: RoutingKey,
        payload: u32,
    },

    /// Write or read outside a node's region
    #[error("access at byte {offset} is outside a region of {len} bytes")]
    RegionOutOfBounds { offset: usize, len: usize },

    /// Region lock was poisoned by a panicking writer
    #[error("configuration region lock poisoned")]
    RegionPoisoned,

    /// Routing entry whose key has bits outside its mask
    #[error("routing entry key {key:#010x} has bits outside mask {mask:#010x}")]
    InvalidRoutingEntry { key: u32, mask: u32 },

    /// Route references a node that does not exist
    #[error("route targets unknown node {0}")]
    UnknownNode(NodeId),

    /// Lifecycle operation called in the wrong scheduler state
    #[error("node {node} cannot {action} while {state}")]
    InvalidState {
        node: String,
        action: &'static str,
        state: &'static str,
    },

    /// Netlist references a component that was never added
    #[error("component not found: {0}")]
    ComponentNotFound(String),

    /// Two components share a name
    #[error("component already exists: {0}")]
    DuplicateComponent(String),

    /// Netlist references a pin the component does not have
    #[error("component {component} has no {pin} pin")]
    PinNotFound { component: String, pin: String },

    /// An input pin was connected twice
    #[error("input {pin} of {component} is already connected")]
    PinAlreadyConnected { component: String, pin: String },

    /// JSON circuit description names an unregistered component type
    #[error("unknown component type: {0}")]
    UnknownComponentType(String),

    /// Component property missing or of the wrong shape
    #[error("invalid property {property} for {component}: {reason}")]
    InvalidProperty {
        component: String,
        property: String,
        reason: String,
    },

    /// Stimulus pattern contains characters other than 0 and 1
    #[error("stimulus pattern for {component} contains {found:?}, expected only 0 and 1")]
    InvalidPattern { component: String, found: char },

    /// Circuit description could not be read
    #[error("failed to read circuit file '{path}': {reason}")]
    Io { path: String, reason: String },

    /// Circuit description could not be parsed
    #[error("failed to parse circuit description: {0}")]
    Json(String),

    /// Real-time tick period or settle window cannot drive a run
    #[error("invalid timing: {0}")]
    InvalidTiming(String),

    /// A real-time node task ended abnormally
    #[error("node task failed: {0}")]
    TaskFailed(String),
}

impl SimError {
    /// Whether the error was raised while loading configuration, before any tick ran.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::RegionTooShort { .. }
                | Self::LutOutOfRange(_)
                | Self::InvalidRoutingEntry { .. }
                | Self::UnknownNode(_)
                | Self::ComponentNotFound(_)
                | Self::DuplicateComponent(_)
                | Self::PinNotFound { .. }
                | Self::PinAlreadyConnected { .. }
                | Self::UnknownComponentType(_)
                | Self::InvalidProperty { .. }
                | Self::InvalidPattern { .. }
                | Self::Io { .. }
                | Self::Json(_)
                | Self::InvalidTiming(_)
        )
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Json(err.to_string())
    }
}

/// Result type for simulator operations
pub type Result<T> = std::result::Result<T, SimError>;
