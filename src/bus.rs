//! # Multicast event bus
//!
//! Packets carry a 32-bit routing key and a one-word payload. A
//! [`RoutingTable`] maps keys to the set of nodes listening on them; the
//! fabrics below deliver each published packet into the FIFO inbox of every
//! listener, so successive packets from one sender reach a listener in the
//! order they were sent. Delivery is fire-and-forget: no acknowledgment, no
//! backpressure, and a packet with no matching route is dropped.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::{Result, SimError};
use crate::types::{NodeId, RoutingKey};

/// Multicast packet with payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct McPacket {
    pub key: RoutingKey,
    pub payload: u32,
}

impl McPacket {
    pub fn new(key: RoutingKey, payload: u32) -> Self {
        McPacket { key, payload }
    }
}

impl fmt::Display for McPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.payload)
    }
}

/// Outbound side of the bus as seen by a component.
pub trait Publisher {
    fn publish(&mut self, packet: McPacket);
}

/// Publisher that buffers packets for the caller to route.
#[derive(Debug, Default)]
pub struct Outbox {
    packets: Vec<McPacket>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, McPacket> {
        self.packets.drain(..)
    }

    pub fn packets(&self) -> &[McPacket] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

impl Publisher for Outbox {
    fn publish(&mut self, packet: McPacket) {
        self.packets.push(packet);
    }
}

/// One key/mask routing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEntry {
    pub key: u32,
    pub mask: u32,
    pub route: Vec<NodeId>,
}

impl RoutingEntry {
    /// Builds an entry, rejecting keys with bits outside the mask since such
    /// an entry could never match.
    pub fn new(key: u32, mask: u32, route: Vec<NodeId>) -> Result<Self> {
        if key & !mask != 0 {
            return Err(SimError::InvalidRoutingEntry { key, mask });
        }
        Ok(RoutingEntry { key, mask, route })
    }

    /// Entry matching exactly one key.
    pub fn exact(key: RoutingKey, route: Vec<NodeId>) -> Self {
        RoutingEntry {
            key: key.value(),
            mask: 0xFFFF_FFFF,
            route,
        }
    }

    pub fn matches(&self, key: RoutingKey) -> bool {
        key.value() & self.mask == self.key
    }
}

/// Ordered multicast routing table; the first matching entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    entries: Vec<RoutingEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: RoutingEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Nodes that should receive a packet with `key`.
    pub fn route(&self, key: RoutingKey) -> &[NodeId] {
        match self.entries.iter().find(|entry| entry.matches(key)) {
            Some(entry) => &entry.route,
            None => {
                trace!(%key, "no route for packet, dropping");
                &[]
            }
        }
    }

    /// Checks every route target is below `node_count`.
    pub fn validate(&self, node_count: usize) -> Result<()> {
        for entry in &self.entries {
            if let Some(node) = entry.route.iter().find(|n| n.index() >= node_count) {
                return Err(SimError::UnknownNode(*node));
            }
        }
        Ok(())
    }
}

/// Fabric that forwards packets into per-node tokio channels.
#[derive(Debug)]
pub struct ChannelFabric {
    table: RoutingTable,
    inboxes: Vec<mpsc::UnboundedSender<McPacket>>,
}

impl ChannelFabric {
    /// Creates the fabric and one receiving end per node, in node order.
    pub fn new(
        table: RoutingTable,
        node_count: usize,
    ) -> Result<(Arc<Self>, Vec<mpsc::UnboundedReceiver<McPacket>>)> {
        table.validate(node_count)?;
        let (inboxes, receivers) = (0..node_count).map(|_| mpsc::unbounded_channel()).unzip();
        Ok((Arc::new(ChannelFabric { table, inboxes }), receivers))
    }

    /// Routes and sends a packet. Listeners that have already exited are skipped.
    pub fn send(&self, packet: McPacket) {
        for node in self.table.route(packet.key) {
            if self.inboxes[node.index()].send(packet).is_err() {
                trace!(node = %node, %packet, "listener gone, dropping packet");
            }
        }
    }
}

/// Per-node handle for publishing onto a [`ChannelFabric`].
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    fabric: Arc<ChannelFabric>,
}

impl ChannelPublisher {
    pub fn new(fabric: Arc<ChannelFabric>) -> Self {
        ChannelPublisher { fabric }
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&mut self, packet: McPacket) {
        self.fabric.send(packet);
    }
}
