use tracing::trace;

use crate::bus::{McPacket, Publisher};
use crate::component::{Component, TickAction};
use crate::config::{GateConfig, NodeKind};
use crate::error::Result;
use crate::pin::InputPin;

/// Two-input, one-output gate evaluated through a 4-entry lookup table.
///
/// Each tick the gate publishes the table entry selected by the most recent
/// values seen on its two inputs. Runs for `sim_length` ticks and exits on
/// the first tick past that bound.
#[derive(Debug, Clone)]
pub struct LutGate {
    name: String,
    config: GateConfig,
    input_a: InputPin,
    input_b: InputPin,
}

impl LutGate {
    pub fn new(name: String, config: GateConfig) -> Self {
        LutGate {
            name,
            input_a: InputPin::new("a", config.input_a_key),
            input_b: InputPin::new("b", config.input_b_key),
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn input_a(&self) -> &InputPin {
        &self.input_a
    }

    pub fn input_b(&self) -> &InputPin {
        &self.input_b
    }

    /// Output for the inputs currently latched.
    pub fn output(&self) -> Result<u32> {
        let a = self.input_a.level(&self.name)?.to_bool();
        let b = self.input_b.level(&self.name)?.to_bool();
        Ok(self.config.lut.evaluate(a, b) as u32)
    }
}

impl Component for LutGate {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Gate
    }

    fn on_packet(&mut self, packet: McPacket) {
        // Both inputs may listen on the same key.
        let a = self.input_a.latch(&packet);
        let b = self.input_b.latch(&packet);
        if !(a || b) {
            trace!(gate = %self.name, %packet, "ignoring packet");
        }
    }

    fn on_tick(&mut self, tick: u32, bus: &mut dyn Publisher) -> Result<TickAction> {
        // 1-based tick: the last active tick is sim_length itself.
        if tick > self.config.sim_length {
            return Ok(TickAction::Exit);
        }

        let output = self.output()?;
        bus.publish(McPacket::new(self.config.output_key, output));
        Ok(TickAction::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Outbox;
    use crate::error::SimError;
    use crate::types::{Lut, RoutingKey};

    const A: RoutingKey = RoutingKey::new(10);
    const B: RoutingKey = RoutingKey::new(11);
    const OUT: RoutingKey = RoutingKey::new(12);

    fn gate(lut: Lut, sim_length: u32) -> LutGate {
        LutGate::new(
            "G".to_string(),
            GateConfig {
                sim_length,
                input_a_key: A,
                input_b_key: B,
                output_key: OUT,
                lut,
            },
        )
    }

    #[test]
    fn test_exhaustive_lut_evaluation() {
        for raw in 0..16u32 {
            let lut = Lut::new(raw).unwrap();
            for a in 0..2u32 {
                for b in 0..2u32 {
                    let mut g = gate(lut, 1);
                    g.on_packet(McPacket::new(A, a));
                    g.on_packet(McPacket::new(B, b));

                    let mut outbox = Outbox::new();
                    assert_eq!(g.on_tick(1, &mut outbox).unwrap(), TickAction::Continue);
                    let expected = (raw >> (a | (b << 1))) & 1;
                    assert_eq!(
                        outbox.packets(),
                        &[McPacket::new(OUT, expected)],
                        "lut {:#06b} a={} b={}",
                        raw,
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn test_runs_exactly_sim_length_ticks() {
        let mut g = gate(Lut::OR, 3);
        let mut outbox = Outbox::new();
        for tick in 1..=3 {
            assert_eq!(g.on_tick(tick, &mut outbox).unwrap(), TickAction::Continue);
        }
        assert_eq!(g.on_tick(4, &mut outbox).unwrap(), TickAction::Exit);
        assert_eq!(outbox.len(), 3);
    }

    #[test]
    fn test_zero_length_exits_on_first_tick() {
        let mut g = gate(Lut::OR, 0);
        let mut outbox = Outbox::new();
        assert_eq!(g.on_tick(1, &mut outbox).unwrap(), TickAction::Exit);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let mut g = gate(Lut::AND, 1);
        g.on_packet(McPacket::new(A, 1));
        g.on_packet(McPacket::new(RoutingKey::new(99), 0));
        assert_eq!(g.input_a().raw(), 1);
        assert_eq!(g.input_b().raw(), 0);
    }

    #[test]
    fn test_shared_input_key_updates_both() {
        let mut g = LutGate::new(
            "NAND_SELF".to_string(),
            GateConfig {
                sim_length: 1,
                input_a_key: A,
                input_b_key: A,
                output_key: OUT,
                lut: Lut::NAND,
            },
        );
        g.on_packet(McPacket::new(A, 1));
        assert_eq!(g.output().unwrap(), 0);
    }

    #[test]
    fn test_out_of_range_payload_faults_tick() {
        let mut g = gate(Lut::AND, 2);
        g.on_packet(McPacket::new(B, 5));
        let mut outbox = Outbox::new();
        assert!(matches!(
            g.on_tick(1, &mut outbox),
            Err(SimError::PayloadOutOfRange { payload: 5, .. })
        ));
        assert!(outbox.is_empty());
    }
}
