use tracing::trace;

use crate::bus::{McPacket, Publisher};
use crate::component::{Component, TickAction};
use crate::config::{NodeKind, ProbeConfig, PACKED_DATA_OFFSET};
use crate::error::Result;
use crate::pin::InputPin;
use crate::region::ConfigRegion;

/// Records the value of one signal into the host's region once per tick.
///
/// The recording is written in place so the host can read it back after the
/// probe has terminated. Recording happens in the settle phase, after the
/// packets published during the same tick have been delivered.
#[derive(Debug, Clone)]
pub struct ProbeRecorder {
    name: String,
    config: ProbeConfig,
    input: InputPin,
    region: ConfigRegion,
}

impl ProbeRecorder {
    /// Builds the recorder and zero-fills its recording, since the host's
    /// allocation leaves the bytes undefined.
    pub fn new(name: String, config: ProbeConfig, region: ConfigRegion) -> Result<Self> {
        region.zero(PACKED_DATA_OFFSET, config.recording_len())?;
        Ok(ProbeRecorder {
            name,
            input: InputPin::new("in", config.input_key),
            config,
            region,
        })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn input(&self) -> &InputPin {
        &self.input
    }

    /// Copy of the recorded bytes.
    pub fn recording(&self) -> Result<Vec<u8>> {
        self.region
            .read(PACKED_DATA_OFFSET, self.config.recording_len())
    }
}

impl Component for ProbeRecorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Probe
    }

    fn on_packet(&mut self, packet: McPacket) {
        if !self.input.latch(&packet) {
            trace!(probe = %self.name, %packet, "ignoring packet");
        }
    }

    fn on_tick(&mut self, tick: u32, _bus: &mut dyn Publisher) -> Result<TickAction> {
        if tick - 1 >= self.config.sim_length {
            return Ok(TickAction::Exit);
        }
        Ok(TickAction::Settle)
    }

    fn on_settle(&mut self, tick: u32) -> Result<()> {
        let t = (tick - 1) as usize;
        let value = self.input.level(&self.name)?.to_payload() as u8;
        self.region
            .or_byte(PACKED_DATA_OFFSET + t / 8, value << (t % 8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Outbox;
    use crate::error::SimError;
    use crate::region::ALLOCATION_FILL;
    use crate::types::RoutingKey;

    const IN: RoutingKey = RoutingKey::new(3);

    fn probe(sim_length: u32) -> (ProbeRecorder, ConfigRegion) {
        let config = ProbeConfig {
            sim_length,
            input_key: IN,
        };
        let region = ConfigRegion::alloc(ProbeConfig::region_size(sim_length));
        region.write(0, &config.encode()).unwrap();
        let probe = ProbeRecorder::new("P".to_string(), config, region.clone()).unwrap();
        (probe, region)
    }

    #[test]
    fn test_recording_is_zero_filled() {
        let (p, region) = probe(12);
        assert_eq!(p.recording().unwrap(), vec![0, 0]);
        // Header untouched.
        assert_eq!(region.read(0, 4).unwrap(), 12u32.to_le_bytes().to_vec());
    }

    #[test]
    fn test_zero_fill_leaves_bytes_past_recording() {
        let config = ProbeConfig {
            sim_length: 8,
            input_key: IN,
        };
        let region = ConfigRegion::alloc(ProbeConfig::region_size(8) + 1);
        region.write(0, &config.encode()).unwrap();
        ProbeRecorder::new("P".to_string(), config, region.clone()).unwrap();
        assert_eq!(region.read(8, 2).unwrap(), vec![0, ALLOCATION_FILL]);
    }

    #[test]
    fn test_records_latched_value_per_tick() {
        let (mut p, _) = probe(10);
        let mut outbox = Outbox::new();
        let inputs = [1, 1, 0, 1, 0, 0, 0, 0, 1, 1];
        for (i, value) in inputs.iter().enumerate() {
            let tick = i as u32 + 1;
            assert_eq!(p.on_tick(tick, &mut outbox).unwrap(), TickAction::Settle);
            p.on_packet(McPacket::new(IN, *value));
            p.on_settle(tick).unwrap();
        }
        assert_eq!(p.on_tick(11, &mut outbox).unwrap(), TickAction::Exit);
        assert_eq!(p.recording().unwrap(), vec![0b0000_1011, 0b11]);
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_holds_last_value_between_packets() {
        let (mut p, _) = probe(4);
        let mut outbox = Outbox::new();
        p.on_packet(McPacket::new(IN, 1));
        for tick in 1..=4 {
            p.on_tick(tick, &mut outbox).unwrap();
            p.on_settle(tick).unwrap();
        }
        assert_eq!(p.recording().unwrap(), vec![0b1111]);
    }

    #[test]
    fn test_ignores_other_keys() {
        let (mut p, _) = probe(1);
        p.on_packet(McPacket::new(RoutingKey::new(4), 1));
        let mut outbox = Outbox::new();
        p.on_tick(1, &mut outbox).unwrap();
        p.on_settle(1).unwrap();
        assert_eq!(p.recording().unwrap(), vec![0]);
    }

    #[test]
    fn test_zero_length_exits_immediately() {
        let (mut p, _) = probe(0);
        let mut outbox = Outbox::new();
        assert_eq!(p.on_tick(1, &mut outbox).unwrap(), TickAction::Exit);
        assert!(p.recording().unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_payload_faults_settle() {
        let (mut p, _) = probe(2);
        p.on_packet(McPacket::new(IN, 2));
        let mut outbox = Outbox::new();
        p.on_tick(1, &mut outbox).unwrap();
        assert!(matches!(
            p.on_settle(1),
            Err(SimError::PayloadOutOfRange { payload: 2, .. })
        ));
        assert_eq!(p.recording().unwrap(), vec![0]);
    }
}
