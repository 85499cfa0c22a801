use crate::bus::{McPacket, Publisher};
use crate::component::{Component, TickAction};
use crate::config::{NodeKind, StimulusConfig};
use crate::error::Result;
use crate::types::packed_bit;

/// Replays a host-supplied bit sequence, one bit per tick.
#[derive(Debug, Clone)]
pub struct StimulusPlayer {
    name: String,
    config: StimulusConfig,
}

impl StimulusPlayer {
    pub fn new(name: String, config: StimulusConfig) -> Self {
        StimulusPlayer { name, config }
    }

    pub fn config(&self) -> &StimulusConfig {
        &self.config
    }

    /// Bit played at 0-based step `t`.
    pub fn bit(&self, t: u32) -> u32 {
        packed_bit(&self.config.stimulus, t as usize) as u32
    }
}

impl Component for StimulusPlayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Stimulus
    }

    fn on_packet(&mut self, _packet: McPacket) {}

    fn on_tick(&mut self, tick: u32, bus: &mut dyn Publisher) -> Result<TickAction> {
        let t = tick - 1;
        if t >= self.config.sim_length {
            return Ok(TickAction::Exit);
        }

        bus.publish(McPacket::new(self.config.output_key, self.bit(t)));
        Ok(TickAction::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Outbox;
    use crate::types::RoutingKey;

    fn player(sim_length: u32, stimulus: Vec<u8>) -> StimulusPlayer {
        StimulusPlayer::new(
            "S".to_string(),
            StimulusConfig {
                sim_length,
                output_key: RoutingKey::new(1),
                stimulus,
            },
        )
    }

    fn play(player: &mut StimulusPlayer) -> Vec<u32> {
        let mut outbox = Outbox::new();
        let mut tick = 1;
        while player.on_tick(tick, &mut outbox).unwrap() == TickAction::Continue {
            tick += 1;
        }
        outbox.drain().map(|p| p.payload).collect()
    }

    #[test]
    fn test_plays_lsb_first_across_bytes() {
        let mut p = player(12, vec![0b1000_0101, 0b0000_1010]);
        assert_eq!(play(&mut p), vec![1, 0, 1, 0, 0, 0, 0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_zero_length_plays_nothing() {
        let mut p = player(0, vec![]);
        assert!(play(&mut p).is_empty());
    }

    #[test]
    fn test_single_tick() {
        let mut p = player(1, vec![0b1]);
        let mut outbox = Outbox::new();
        assert_eq!(p.on_tick(1, &mut outbox).unwrap(), TickAction::Continue);
        assert_eq!(p.on_tick(2, &mut outbox).unwrap(), TickAction::Exit);
        assert_eq!(outbox.packets(), &[McPacket::new(RoutingKey::new(1), 1)]);
    }

    #[test]
    fn test_inbound_packets_have_no_effect() {
        let mut p = player(2, vec![0b10]);
        p.on_packet(McPacket::new(RoutingKey::new(1), 1));
        assert_eq!(play(&mut p), vec![0, 1]);
    }
}
