//! Per-node tick scheduling.
//!
//! A [`Node`] wraps one component with the lifecycle every kernel shares:
//!
//! ```text
//! Idle -> WaitingForSync -> Running -> Terminated
//!                              \-----> Faulted
//! ```
//!
//! The tick counter starts at 1 and increases by one per tick. Only the
//! component decides when to stop; once it does, or once a callback fails,
//! no further callbacks reach it. The state is published through a
//! [`StatusFlag`] the host can read from any thread.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::bus::{McPacket, Publisher};
use crate::component::{Component, TickAction};
use crate::config::NodeKind;
use crate::error::{Result, SimError};
use crate::types::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    Idle = 0,
    WaitingForSync = 1,
    Running = 2,
    Terminated = 3,
    Faulted = 4,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Idle => "idle",
            NodeState::WaitingForSync => "waiting for sync",
            NodeState::Running => "running",
            NodeState::Terminated => "terminated",
            NodeState::Faulted => "faulted",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, NodeState::Terminated | NodeState::Faulted)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => NodeState::Idle,
            1 => NodeState::WaitingForSync,
            2 => NodeState::Running,
            3 => NodeState::Terminated,
            _ => NodeState::Faulted,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared view of a node's lifecycle state. Serves as the completion signal.
#[derive(Debug, Clone)]
pub struct StatusFlag {
    state: Arc<AtomicU8>,
}

impl StatusFlag {
    fn new() -> Self {
        StatusFlag {
            state: Arc::new(AtomicU8::new(NodeState::Idle as u8)),
        }
    }

    pub fn get(&self) -> NodeState {
        NodeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: NodeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.get().is_finished()
    }
}

/// A component under the control of a tick scheduler.
pub struct Node {
    id: NodeId,
    component: Box<dyn Component>,
    status: StatusFlag,
    ticks: u32,
    fault: Option<SimError>,
}

impl Node {
    pub fn new(id: NodeId, component: Box<dyn Component>) -> Self {
        Node {
            id,
            component,
            status: StatusFlag::new(),
            ticks: 0,
            fault: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.component.name()
    }

    pub fn kind(&self) -> NodeKind {
        self.component.kind()
    }

    pub fn state(&self) -> NodeState {
        self.status.get()
    }

    pub fn status(&self) -> StatusFlag {
        self.status.clone()
    }

    /// Ticks handled so far, including the one that requested exit.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn fault(&self) -> Option<&SimError> {
        self.fault.as_ref()
    }

    fn expect_state(&self, expected: NodeState, action: &'static str) -> Result<()> {
        let state = self.state();
        if state != expected {
            return Err(SimError::InvalidState {
                node: self.name().to_string(),
                action,
                state: state.as_str(),
            });
        }
        Ok(())
    }

    /// Registers the node's callbacks and parks it at the sync barrier.
    pub fn arm(&mut self) -> Result<()> {
        self.expect_state(NodeState::Idle, "arm")?;
        self.status.set(NodeState::WaitingForSync);
        debug!(node = %self.id, name = self.name(), "waiting for sync");
        Ok(())
    }

    /// Sync release: the node starts taking ticks.
    pub fn release(&mut self) -> Result<()> {
        self.expect_state(NodeState::WaitingForSync, "start")?;
        self.status.set(NodeState::Running);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state() == NodeState::Running
    }

    /// Delivers an inbound packet. Dropped unless the node is running.
    pub fn deliver(&mut self, packet: McPacket) {
        if self.is_running() {
            trace!(node = %self.id, %packet, "deliver");
            self.component.on_packet(packet);
        }
    }

    /// Advances the counter and runs the tick handler.
    pub fn tick(&mut self, bus: &mut dyn Publisher) -> Result<TickAction> {
        self.expect_state(NodeState::Running, "tick")?;
        self.ticks += 1;
        let result = self.component.on_tick(self.ticks, bus);
        match result {
            Ok(TickAction::Exit) => {
                self.terminate();
                Ok(TickAction::Exit)
            }
            Ok(action) => Ok(action),
            Err(err) => {
                self.set_fault(err.clone());
                Err(err)
            }
        }
    }

    /// Runs the compute phase following a settle window for the current tick.
    pub fn settle(&mut self) -> Result<()> {
        self.expect_state(NodeState::Running, "settle")?;
        if let Err(err) = self.component.on_settle(self.ticks) {
            self.set_fault(err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn terminate(&mut self) {
        debug!(node = %self.id, name = self.name(), ticks = self.ticks, "terminated");
        self.status.set(NodeState::Terminated);
    }

    fn set_fault(&mut self, err: SimError) {
        error!(node = %self.id, name = self.name(), tick = self.ticks, error = %err, "node faulted");
        self.status.set(NodeState::Faulted);
        self.fault = Some(err);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .field("ticks", &self.ticks)
            .finish()
    }
}
