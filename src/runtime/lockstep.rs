//! Deterministic lock-step runner.
//!
//! Each call to [`LockstepRunner::step`] advances every running node by one
//! tick in three phases:
//!
//! 1. **deliver**: each node's inbox is drained into `on_packet`. These are
//!    the packets published during the previous tick (or injected since).
//! 2. **tick**: each node's tick handler runs; published packets are routed
//!    into the listeners' inboxes but not yet delivered.
//! 3. **settle**: nodes whose handler asked to settle receive their inbox,
//!    which now holds this tick's packets, and then run their compute phase.
//!
//! A gate therefore reacts to its inputs one tick after they were sent, while
//! a probe records values sent in the same tick.

use std::collections::VecDeque;

use tracing::{debug, trace};

use crate::bus::{McPacket, Outbox, RoutingTable};
use crate::component::{Component, TickAction};
use crate::error::{Result, SimError};
use crate::runtime::RunReport;
use crate::scheduler::Node;
use crate::types::NodeId;

fn route_into(table: &RoutingTable, inboxes: &mut [VecDeque<McPacket>], packet: McPacket) {
    for node in table.route(packet.key) {
        inboxes[node.index()].push_back(packet);
    }
}

pub struct LockstepRunner {
    nodes: Vec<Node>,
    table: RoutingTable,
    inboxes: Vec<VecDeque<McPacket>>,
    released: bool,
    tick: u32,
}

impl LockstepRunner {
    /// Wraps each component in a node (ids follow vector order) and parks
    /// them all at the sync barrier.
    pub fn new(components: Vec<Box<dyn Component>>, table: RoutingTable) -> Result<Self> {
        table.validate(components.len())?;
        let mut nodes = Vec::with_capacity(components.len());
        for (index, component) in components.into_iter().enumerate() {
            let mut node = Node::new(NodeId::new(index), component);
            node.arm()?;
            nodes.push(node);
        }
        let inboxes = vec![VecDeque::new(); nodes.len()];
        Ok(LockstepRunner {
            nodes,
            table,
            inboxes,
            released: false,
            tick: 0,
        })
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Last tick executed; 0 before the first step.
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Sync release: every node starts running.
    pub fn release(&mut self) -> Result<()> {
        for node in &mut self.nodes {
            node.release()?;
        }
        self.released = true;
        debug!(nodes = self.nodes.len(), "sync released");
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.nodes.iter().all(|node| node.state().is_finished())
    }

    /// Routes a packet from outside the circuit; it is delivered in the
    /// deliver phase of the next step.
    pub fn inject(&mut self, packet: McPacket) {
        route_into(&self.table, &mut self.inboxes, packet);
    }

    /// Advances all running nodes by one tick. Returns whether any node is
    /// still running afterwards.
    pub fn step(&mut self) -> Result<bool> {
        if !self.released {
            return Err(SimError::InvalidState {
                node: "lockstep runner".to_string(),
                action: "step",
                state: "waiting for sync",
            });
        }
        if self.is_finished() {
            return Ok(false);
        }
        self.tick += 1;
        trace!(tick = self.tick, "lockstep tick");

        for (node, inbox) in self.nodes.iter_mut().zip(self.inboxes.iter_mut()) {
            if node.is_running() {
                while let Some(packet) = inbox.pop_front() {
                    node.deliver(packet);
                }
            } else {
                inbox.clear();
            }
        }

        let mut outbox = Outbox::new();
        let mut settling = Vec::new();
        for (index, node) in self.nodes.iter_mut().enumerate() {
            if !node.is_running() {
                continue;
            }
            // Faults are recorded on the node; the rest of the circuit carries on.
            match node.tick(&mut outbox) {
                Ok(TickAction::Settle) => settling.push(index),
                Ok(TickAction::Continue) | Ok(TickAction::Exit) | Err(_) => {}
            }
            for packet in outbox.drain() {
                route_into(&self.table, &mut self.inboxes, packet);
            }
        }

        for index in settling {
            let node = &mut self.nodes[index];
            while let Some(packet) = self.inboxes[index].pop_front() {
                node.deliver(packet);
            }
            // Same as the tick phase: a failed settle leaves the node Faulted.
            if let Err(err) = node.settle() {
                trace!(node = %node.id(), error = %err, "settle failed");
            }
        }

        Ok(!self.is_finished())
    }

    /// Steps at most `ticks` times. Returns whether any node is still running.
    pub fn run_for(&mut self, ticks: u32) -> Result<bool> {
        let mut running = !self.is_finished();
        for _ in 0..ticks {
            running = self.step()?;
            if !running {
                break;
            }
        }
        Ok(running)
    }

    /// Releases the nodes if needed and steps until every node has finished.
    pub fn run(&mut self) -> Result<RunReport> {
        if !self.released {
            self.release()?;
        }
        while self.step()? {}
        debug!(ticks = self.tick, "lockstep run finished");
        Ok(self.report())
    }

    pub fn report(&self) -> RunReport {
        RunReport::from_nodes(&self.nodes)
    }
}
