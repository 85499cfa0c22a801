use crate::bus::{McPacket, Publisher};
use crate::config::NodeKind;
use crate::error::Result;

/// What the scheduler should do after a tick handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Tick complete.
    Continue,
    /// Deliver this tick's arriving packets, then call [`Component::on_settle`].
    Settle,
    /// Stop the node. No further callbacks fire.
    Exit,
}

/// A simulated circuit element driven by a tick scheduler.
///
/// `on_packet`, `on_tick` and `on_settle` are never invoked concurrently:
/// every runner drives a component from a single execution context.
pub trait Component: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> NodeKind;

    /// Called once per arriving packet.
    fn on_packet(&mut self, packet: McPacket);

    /// Called once per tick. `tick` starts at 1 and increases by one each call.
    fn on_tick(&mut self, tick: u32, bus: &mut dyn Publisher) -> Result<TickAction>;

    /// Compute phase that follows a settle window.
    fn on_settle(&mut self, _tick: u32) -> Result<()> {
        Ok(())
    }
}
