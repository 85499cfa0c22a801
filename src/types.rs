use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SimError};

/// 32-bit multicast routing key. Opaque to nodes beyond equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoutingKey(u32);

impl RoutingKey {
    /// Key written by the host for an input that no wire drives.
    pub const UNCONNECTED: RoutingKey = RoutingKey(0xFFFF_FFFF);

    pub const fn new(value: u32) -> Self {
        RoutingKey(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for RoutingKey {
    fn from(value: u32) -> Self {
        RoutingKey::new(value)
    }
}

impl From<RoutingKey> for u32 {
    fn from(key: RoutingKey) -> Self {
        key.value()
    }
}

/// Two-input lookup table. Bit `a | b << 1` holds the output for inputs (a, b).
///
/// | a | b | bit |
/// |---|---|-----|
/// | 0 | 0 | 0   |
/// | 1 | 0 | 1   |
/// | 0 | 1 | 2   |
/// | 1 | 1 | 3   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Lut(u8);

impl Lut {
    pub const AND: Lut = Lut(0b1000);
    pub const OR: Lut = Lut(0b1110);
    pub const XOR: Lut = Lut(0b0110);
    pub const NAND: Lut = Lut(0b0111);
    pub const NOR: Lut = Lut(0b0001);
    pub const XNOR: Lut = Lut(0b1001);
    /// Inverts input a; input b is ignored.
    pub const NOT: Lut = Lut(0b0101);
    /// Passes input a through; input b is ignored.
    pub const BUFFER: Lut = Lut(0b1010);

    /// Builds a table from a raw word, rejecting bits above bit 3.
    pub fn new(value: u32) -> Result<Self> {
        if value > 0xF {
            return Err(SimError::LutOutOfRange(value));
        }
        Ok(Lut(value as u8))
    }

    pub fn value(&self) -> u32 {
        self.0 as u32
    }

    pub fn evaluate(&self, a: bool, b: bool) -> bool {
        let bit_index = (a as u32) | ((b as u32) << 1);
        (self.value() >> bit_index) & 1 == 1
    }
}

impl fmt::Display for Lut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06b}", self.0)
    }
}

impl TryFrom<u32> for Lut {
    type Error = SimError;

    fn try_from(value: u32) -> Result<Self> {
        Lut::new(value)
    }
}

/// Index of a node within a loaded circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Number of bytes needed to hold `bits` bits packed eight to a byte.
pub fn packed_len(bits: u32) -> usize {
    (bits as usize + 7) / 8
}

/// Reads bit `index` of an LSB-first packed byte sequence.
pub fn packed_bit(bytes: &[u8], index: usize) -> bool {
    (bytes[index / 8] >> (index % 8)) & 1 == 1
}
