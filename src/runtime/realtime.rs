//! Wall-clock runner: one tokio task per node.
//!
//! Each task is the node's single execution context. Packets arrive on an
//! unbounded channel and are handed to the component between ticks, so the
//! packet and tick callbacks never overlap. A settling node keeps draining
//! its channel until the settle window closes and only then computes; ticks
//! that fall due meanwhile wait.

use std::sync::Arc;

use tokio::sync::{mpsc, Barrier};
use tokio::task::JoinSet;
use tokio::time::{interval_at, timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::bus::{ChannelFabric, ChannelPublisher, McPacket, RoutingTable};
use crate::component::{Component, TickAction};
use crate::config::TimingConfig;
use crate::error::{Result, SimError};
use crate::runtime::RunReport;
use crate::scheduler::{Node, StatusFlag};
use crate::types::NodeId;

pub struct RealtimeRunner {
    nodes: Vec<Node>,
    inboxes: Vec<mpsc::UnboundedReceiver<McPacket>>,
    fabric: Arc<ChannelFabric>,
    timing: TimingConfig,
}

impl RealtimeRunner {
    pub fn new(
        components: Vec<Box<dyn Component>>,
        table: RoutingTable,
        timing: TimingConfig,
    ) -> Result<Self> {
        timing.validate()?;
        let (fabric, inboxes) = ChannelFabric::new(table, components.len())?;
        let mut nodes = Vec::with_capacity(components.len());
        for (index, component) in components.into_iter().enumerate() {
            let mut node = Node::new(NodeId::new(index), component);
            node.arm()?;
            nodes.push(node);
        }
        Ok(RealtimeRunner {
            nodes,
            inboxes,
            fabric,
            timing,
        })
    }

    /// Status flags the host can poll while the run is in progress.
    pub fn statuses(&self) -> Vec<StatusFlag> {
        self.nodes.iter().map(Node::status).collect()
    }

    /// Publisher for injecting packets from outside the circuit.
    pub fn publisher(&self) -> ChannelPublisher {
        ChannelPublisher::new(self.fabric.clone())
    }

    /// Spawns every node, releases them together once all are waiting, and
    /// resolves when every node has finished.
    pub async fn run(self) -> Result<RunReport> {
        let RealtimeRunner {
            nodes,
            inboxes,
            fabric,
            timing,
        } = self;

        let barrier = Arc::new(Barrier::new(nodes.len() + 1));
        let mut tasks = JoinSet::new();
        for (node, inbox) in nodes.into_iter().zip(inboxes) {
            let bus = ChannelPublisher::new(fabric.clone());
            tasks.spawn(run_node(node, inbox, bus, barrier.clone(), timing));
        }

        barrier.wait().await;
        info!(nodes = tasks.len(), ?timing, "sync released");

        let mut finished = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let node = joined.map_err(|e| SimError::TaskFailed(e.to_string()))?;
            finished.push(node);
        }
        finished.sort_by_key(Node::id);
        Ok(RunReport::from_nodes(&finished))
    }
}

async fn run_node(
    mut node: Node,
    mut inbox: mpsc::UnboundedReceiver<McPacket>,
    mut bus: ChannelPublisher,
    barrier: Arc<Barrier>,
    timing: TimingConfig,
) -> Node {
    barrier.wait().await;
    if let Err(err) = node.release() {
        error!(node = %node.id(), error = %err, "failed to start");
        return node;
    }
    debug!(node = %node.id(), name = node.name(), "running");

    let mut ticker = interval_at(Instant::now() + timing.tick_period, timing.tick_period);
    // A late tick shifts the schedule rather than firing a burst of catch-up ticks.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = ticker.tick() => {
                while let Ok(packet) = inbox.try_recv() {
                    node.deliver(packet);
                }
                match node.tick(&mut bus) {
                    Ok(TickAction::Continue) => {}
                    Ok(TickAction::Settle) => {
                        let deadline = Instant::now() + timing.settle_interval;
                        while let Ok(Some(packet)) = timeout_at(deadline, inbox.recv()).await {
                            node.deliver(packet);
                        }
                        if node.settle().is_err() {
                            break;
                        }
                    }
                    Ok(TickAction::Exit) | Err(_) => break,
                }
            }
            Some(packet) = inbox.recv() => node.deliver(packet),
        }
    }
    node
}
