//! Host-allocated configuration regions.
//!
//! A region is a byte block the host fills with a configuration block before
//! the node starts. Nodes decode their configuration from it once; a probe
//! keeps a handle afterwards to write its recording in place, and the host
//! reads the recording back once the probe has terminated.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, SimError};

/// Fill byte used for freshly allocated regions. Nodes must not rely on
/// allocation zeroing their buffers.
pub const ALLOCATION_FILL: u8 = 0xA5;

/// Shared, host-owned byte region.
#[derive(Clone)]
pub struct ConfigRegion {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl ConfigRegion {
    /// Allocates `size` bytes without zeroing them.
    pub fn alloc(size: usize) -> Self {
        Self::filled(size, ALLOCATION_FILL)
    }

    pub fn filled(size: usize, fill: u8) -> Self {
        Self::from_bytes(vec![fill; size])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        ConfigRegion {
            bytes: Arc::new(Mutex::new(bytes)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<u8>>> {
        self.bytes.lock().map_err(|_| SimError::RegionPoisoned)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Copies `data` into the region starting at `offset`.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        let mut bytes = self.lock()?;
        let end = offset + data.len();
        if end > bytes.len() {
            return Err(SimError::RegionOutOfBounds {
                offset: end,
                len: bytes.len(),
            });
        }
        bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Copies `len` bytes starting at `offset` out of the region.
    pub fn read(&self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let bytes = self.lock()?;
        let end = offset + len;
        if end > bytes.len() {
            return Err(SimError::RegionOutOfBounds {
                offset: end,
                len: bytes.len(),
            });
        }
        Ok(bytes[offset..end].to_vec())
    }

    /// Snapshot of the whole region.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(self.lock()?.clone())
    }

    /// Sets `len` bytes from `offset` to zero.
    pub fn zero(&self, offset: usize, len: usize) -> Result<()> {
        let mut bytes = self.lock()?;
        let end = offset + len;
        if end > bytes.len() {
            return Err(SimError::RegionOutOfBounds {
                offset: end,
                len: bytes.len(),
            });
        }
        bytes[offset..end].fill(0);
        Ok(())
    }

    /// ORs `mask` into the byte at `offset`.
    pub fn or_byte(&self, offset: usize, mask: u8) -> Result<()> {
        let mut bytes = self.lock()?;
        let len = bytes.len();
        let byte = bytes
            .get_mut(offset)
            .ok_or(SimError::RegionOutOfBounds { offset, len })?;
        *byte |= mask;
        Ok(())
    }
}

impl fmt::Debug for ConfigRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bytes.lock() {
            Ok(bytes) => write!(f, "ConfigRegion({} bytes)", bytes.len()),
            Err(_) => write!(f, "ConfigRegion(poisoned)"),
        }
    }
}
