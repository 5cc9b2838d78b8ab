//! # i69 Emulator
//!
//! An emulator for the i69, a small byte-coded CPU. A program image is
//! loaded into memory at offset 0 and executed from there until it halts or
//! faults; bytes emitted by `OUT` are streamed to a caller-supplied writer.

pub mod cpu;
pub mod loader;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, ErrorKind, Memory, Registers, Instruction};
pub use cpu::decode::{decode, encode, encode_all};
pub use loader::{load_image, LoadError};
