//! CPU emulation for the i69.
//!
//! This module implements the complete i69 architecture:
//! - a flat byte memory holding the program image
//! - six 8-bit registers (A-F) and six 32-bit registers (LA-LD, PTR, PC)
//! - a byte-coded instruction set of fixed opcodes and bit-packed moves

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{Registers, Reg8, Reg32};
pub use decode::{Instruction, Operand8, DecodeError};
pub use execute::{Cpu, CpuError, CpuState, ErrorKind};
