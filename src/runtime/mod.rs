//! # Runners
//!
//! Two ways to drive a set of nodes:
//!
//! - [`LockstepRunner`]: deterministic, virtual time. Every tick is split into
//!   explicit deliver, tick and settle phases executed for all nodes in turn.
//! - [`RealtimeRunner`]: one tokio task per node on a wall-clock tick period,
//!   with a timed settle window.
//!
//! Both release every node through a single synchronization point and report
//! the final state of each node once all of them have finished.

pub mod lockstep;
pub mod realtime;

pub use lockstep::LockstepRunner;
pub use realtime::RealtimeRunner;

use crate::config::NodeKind;
use crate::error::SimError;
use crate::scheduler::{Node, NodeState};
use crate::types::NodeId;

/// Final state of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub state: NodeState,
    pub ticks: u32,
    pub fault: Option<SimError>,
}

impl NodeReport {
    fn from_node(node: &Node) -> Self {
        NodeReport {
            id: node.id(),
            name: node.name().to_string(),
            kind: node.kind(),
            state: node.state(),
            ticks: node.ticks(),
            fault: node.fault().cloned(),
        }
    }
}

/// Outcome of a run, one entry per node in node order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub nodes: Vec<NodeReport>,
}

impl RunReport {
    pub(crate) fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        RunReport {
            nodes: nodes.into_iter().map(NodeReport::from_node).collect(),
        }
    }

    /// True when every node terminated normally.
    pub fn is_clean(&self) -> bool {
        self.nodes
            .iter()
            .all(|node| node.state == NodeState::Terminated)
    }

    pub fn faults(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|node| node.fault.is_some())
    }

    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|node| node.name == name)
    }
}
