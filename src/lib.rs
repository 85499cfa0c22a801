//! # Rusty Circuit Library
//!
//! A digital circuit simulator in which every gate, stimulus source and probe
//! is an independent node advancing in lock-step ticks and exchanging one-bit
//! signals over a keyed multicast bus.
//!
//! This library provides:
//! - Lookup-table gates, stimulus players and probe recorders configured from
//!   packed binary blocks
//! - A deterministic lock-step runner and a real-time runner with one tokio
//!   task per node
//! - A netlist builder and JSON circuit descriptions
//! - Plain-text and terminal waveform output

pub mod bus;
pub mod circuit;
pub mod component;
pub mod components;
pub mod config;
pub mod console;
pub mod error;
pub mod pin;
pub mod region;
pub mod runtime;
pub mod scheduler;
pub mod system_config;
pub mod types;

// Re-export commonly used items for easier importing
pub use bus::{McPacket, Publisher, RoutingEntry, RoutingTable};
pub use circuit::{Circuit, CircuitResults};
pub use component::{Component, TickAction};
pub use error::{Result, SimError};
pub use pin::PinValue;
pub use runtime::{LockstepRunner, RealtimeRunner, RunReport};
pub use scheduler::{NodeState, StatusFlag};
pub use types::{Lut, NodeId, RoutingKey};
