//! # Node configuration blocks
//!
//! Binary layout of the configuration each node reads from its region.
//! Every block starts with little-endian, word-aligned `u32` fields; stimulus
//! and probe blocks continue with a bit-packed byte array of
//! `ceil(sim_length / 8)` bytes at offset 8.
//!
//! ```text
//! gate:     sim_length | input_a_key | input_b_key | output_key | lut
//! stimulus: sim_length | output_key  | stimulus[..]
//! probe:    sim_length | input_key   | recording[..]
//! ```
//!
//! `decode` validates sizes and field ranges so a malformed block is rejected
//! before the node runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{Result, SimError};
use crate::region::ConfigRegion;
use crate::types::{packed_len, Lut, RoutingKey};

/// Byte offset of the stimulus/recording array in stimulus and probe blocks.
pub const PACKED_DATA_OFFSET: usize = 8;

const WORD: usize = 4;

fn read_word(bytes: &[u8], index: usize) -> u32 {
    let start = index * WORD;
    u32::from_le_bytes([
        bytes[start],
        bytes[start + 1],
        bytes[start + 2],
        bytes[start + 3],
    ])
}

fn check_len(kind: &'static str, needed: usize, actual: usize) -> Result<()> {
    if actual < needed {
        return Err(SimError::RegionTooShort {
            kind,
            needed,
            actual,
        });
    }
    Ok(())
}

/// Which kernel a region is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Gate,
    Stimulus,
    Probe,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Gate => "gate",
            NodeKind::Stimulus => "stimulus",
            NodeKind::Probe => "probe",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    pub sim_length: u32,
    pub input_a_key: RoutingKey,
    pub input_b_key: RoutingKey,
    pub output_key: RoutingKey,
    pub lut: Lut,
}

impl GateConfig {
    pub const SIZE: usize = 5 * WORD;

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::SIZE);
        for word in [
            self.sim_length,
            self.input_a_key.value(),
            self.input_b_key.value(),
            self.output_key.value(),
            self.lut.value(),
        ] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        check_len("gate", Self::SIZE, bytes.len())?;
        Ok(GateConfig {
            sim_length: read_word(bytes, 0),
            input_a_key: RoutingKey::new(read_word(bytes, 1)),
            input_b_key: RoutingKey::new(read_word(bytes, 2)),
            output_key: RoutingKey::new(read_word(bytes, 3)),
            lut: Lut::new(read_word(bytes, 4))?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StimulusConfig {
    pub sim_length: u32,
    pub output_key: RoutingKey,
    /// LSB-first packed sequence, one bit per tick.
    pub stimulus: Vec<u8>,
}

impl StimulusConfig {
    pub fn region_size(sim_length: u32) -> usize {
        PACKED_DATA_OFFSET + packed_len(sim_length)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::region_size(self.sim_length));
        bytes.extend_from_slice(&self.sim_length.to_le_bytes());
        bytes.extend_from_slice(&self.output_key.value().to_le_bytes());
        bytes.extend_from_slice(&self.stimulus);
        bytes
    }

    /// Decodes the header and copies exactly `ceil(sim_length / 8)` stimulus
    /// bytes; trailing bytes in the region are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        check_len("stimulus", PACKED_DATA_OFFSET, bytes.len())?;
        let sim_length = read_word(bytes, 0);
        let needed = Self::region_size(sim_length);
        check_len("stimulus", needed, bytes.len())?;
        Ok(StimulusConfig {
            sim_length,
            output_key: RoutingKey::new(read_word(bytes, 1)),
            stimulus: bytes[PACKED_DATA_OFFSET..needed].to_vec(),
        })
    }
}

/// Probe header. The recording itself stays in the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    pub sim_length: u32,
    pub input_key: RoutingKey,
}

impl ProbeConfig {
    pub fn region_size(sim_length: u32) -> usize {
        PACKED_DATA_OFFSET + packed_len(sim_length)
    }

    pub fn recording_len(&self) -> usize {
        packed_len(self.sim_length)
    }

    /// Encodes the header only; the host leaves the recording bytes as allocated.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(PACKED_DATA_OFFSET);
        bytes.extend_from_slice(&self.sim_length.to_le_bytes());
        bytes.extend_from_slice(&self.input_key.value().to_le_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        check_len("probe", PACKED_DATA_OFFSET, bytes.len())?;
        let sim_length = read_word(bytes, 0);
        check_len("probe", Self::region_size(sim_length), bytes.len())?;
        Ok(ProbeConfig {
            sim_length,
            input_key: RoutingKey::new(read_word(bytes, 1)),
        })
    }
}

/// A decoded configuration of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeConfig {
    Gate(GateConfig),
    Stimulus(StimulusConfig),
    Probe(ProbeConfig),
}

impl NodeConfig {
    /// Reads and validates the block for `kind` from `region`.
    pub fn load(kind: NodeKind, region: &ConfigRegion) -> Result<Self> {
        let bytes = region.to_vec()?;
        Ok(match kind {
            NodeKind::Gate => NodeConfig::Gate(GateConfig::decode(&bytes)?),
            NodeKind::Stimulus => NodeConfig::Stimulus(StimulusConfig::decode(&bytes)?),
            NodeKind::Probe => NodeConfig::Probe(ProbeConfig::decode(&bytes)?),
        })
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::Gate(_) => NodeKind::Gate,
            NodeConfig::Stimulus(_) => NodeKind::Stimulus,
            NodeConfig::Probe(_) => NodeKind::Probe,
        }
    }

    pub fn sim_length(&self) -> u32 {
        match self {
            NodeConfig::Gate(c) => c.sim_length,
            NodeConfig::Stimulus(c) => c.sim_length,
            NodeConfig::Probe(c) => c.sim_length,
        }
    }
}

/// Wall-clock timing used by the real-time runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Period between ticks.
    pub tick_period: Duration,

    /// How long a settling node keeps accepting packets before its compute phase.
    pub settle_interval: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(1),
            settle_interval: Duration::from_micros(700),
        }
    }
}

impl TimingConfig {
    pub fn new(tick_period: Duration, settle_interval: Duration) -> Self {
        Self {
            tick_period,
            settle_interval,
        }
    }

    /// The tick period must be non-zero and the settle window must close
    /// before the next tick is due.
    pub fn validate(&self) -> Result<()> {
        if self.tick_period.is_zero() {
            return Err(SimError::InvalidTiming(
                "tick period must be non-zero".to_string(),
            ));
        }
        if self.settle_interval >= self.tick_period {
            return Err(SimError::InvalidTiming(format!(
                "settle interval {:?} must be shorter than tick period {:?}",
                self.settle_interval, self.tick_period
            )));
        }
        Ok(())
    }
}
