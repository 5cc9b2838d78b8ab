//! i69 memory subsystem.
//!
//! Memory is the program image itself: a flat byte buffer whose length is
//! fixed when the image is loaded. Code and data share the same space, so
//! store instructions can overwrite code.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Byte-addressable i69 memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Wrap a loaded program image.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Number of addressable bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The raw buffer, including any bytes written during execution.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read one byte.
    #[inline]
    pub fn read(&self, addr: u64) -> Result<u8, MemoryError> {
        let index = self.index(addr)?;
        Ok(self.bytes[index])
    }

    /// Write one byte.
    #[inline]
    pub fn write(&mut self, addr: u64, value: u8) -> Result<(), MemoryError> {
        let index = self.index(addr)?;
        self.bytes[index] = value;
        Ok(())
    }

    /// Read a little-endian 32-bit value. All four bytes must be in range.
    pub fn read_u32(&self, addr: u64) -> Result<u32, MemoryError> {
        let start = self.index(addr)?;
        let last = addr + 3;
        let bytes = self
            .bytes
            .get(start..start + 4)
            .ok_or(MemoryError::AddressOutOfRange { addr: last, len: self.len() })?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn index(&self, addr: u64) -> Result<usize, MemoryError> {
        match usize::try_from(addr) {
            Ok(index) if index < self.bytes.len() => Ok(index),
            _ => Err(MemoryError::AddressOutOfRange { addr, len: self.len() }),
        }
    }
}

impl From<Vec<u8>> for Memory {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.bytes.iter().filter(|b| **b != 0).count();

        f.debug_struct("Memory")
            .field("len", &self.bytes.len())
            .field("non_zero_bytes", &non_zero)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Address is outside `[0, len)`.
    #[error("memory address {addr:#x} out of range (memory is {len} bytes)")]
    AddressOutOfRange { addr: u64, len: usize },
}
