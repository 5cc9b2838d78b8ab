//! i69 CPU registers.
//!
//! The i69 has two banks of six registers:
//! - 8-bit: A, B, C, D, E, F (F holds the CMP result, 0x00 = equal)
//! - 32-bit: LA, LB, LC, LD, PTR (memory base), PC (program counter)
//!
//! Instructions name registers with a 3-bit designator where 1..=6 select a
//! register of the bank and 0 and 7 have special meanings handled by the
//! decoder.

use serde::{Serialize, Deserialize};

/// An 8-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    /// Comparison result register.
    F,
}

impl Reg8 {
    pub const ALL: [Reg8; 6] = [Reg8::A, Reg8::B, Reg8::C, Reg8::D, Reg8::E, Reg8::F];

    /// Map a designator (1..=6) to a register.
    pub fn from_designator(designator: u8) -> Option<Self> {
        match designator {
            1..=6 => Some(Self::ALL[usize::from(designator - 1)]),
            _ => None,
        }
    }

    /// The designator that selects this register.
    pub fn designator(self) -> u8 {
        self as u8 + 1
    }
}

/// A 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reg32 {
    La,
    Lb,
    Lc,
    Ld,
    /// Base of the `PTR + C` effective address.
    Ptr,
    /// Offset of the next byte to fetch.
    Pc,
}

impl Reg32 {
    pub const ALL: [Reg32; 6] = [Reg32::La, Reg32::Lb, Reg32::Lc, Reg32::Ld, Reg32::Ptr, Reg32::Pc];

    /// Map a designator (1..=6) to a register.
    pub fn from_designator(designator: u8) -> Option<Self> {
        match designator {
            1..=6 => Some(Self::ALL[usize::from(designator - 1)]),
            _ => None,
        }
    }

    /// The designator that selects this register.
    pub fn designator(self) -> u8 {
        self as u8 + 1
    }
}

/// The i69 register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// A, B, C, D, E, F
    pub r8: [u8; 6],

    /// LA, LB, LC, LD, PTR, PC
    pub r32: [u32; 6],
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn get8(&self, reg: Reg8) -> u8 {
        self.r8[reg as usize]
    }

    #[inline]
    pub fn set8(&mut self, reg: Reg8, value: u8) {
        self.r8[reg as usize] = value;
    }

    #[inline]
    pub fn get32(&self, reg: Reg32) -> u32 {
        self.r32[reg as usize]
    }

    #[inline]
    pub fn set32(&mut self, reg: Reg32, value: u32) {
        self.r32[reg as usize] = value;
    }

    #[inline]
    pub fn pc(&self) -> u32 {
        self.get32(Reg32::Pc)
    }

    /// Set the program counter to an absolute address.
    #[inline]
    pub fn jump(&mut self, addr: u32) {
        self.set32(Reg32::Pc, addr);
    }

    /// Increment the program counter by `n` bytes.
    /// Returns the old value.
    pub fn advance_pc(&mut self, n: u32) -> u32 {
        let old = self.pc();
        self.jump(old.wrapping_add(n));
        old
    }

    #[inline]
    pub fn ptr(&self) -> u32 {
        self.get32(Reg32::Ptr)
    }

    /// The comparison flag, F.
    #[inline]
    pub fn flag(&self) -> u8 {
        self.get8(Reg8::F)
    }

    /// Compute the `PTR + C` effective address.
    ///
    /// The sum is widened rather than wrapped, so an address past the 32-bit
    /// range stays out of range instead of aliasing low memory.
    pub fn effective_address(&self) -> u64 {
        u64::from(self.ptr()) + u64::from(self.get8(Reg8::C))
    }
}
