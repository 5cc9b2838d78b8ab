//! Instruction decoder for the i69.
//!
//! An instruction is one opcode byte, optionally followed by a little-endian
//! immediate of one or four bytes. Nine opcodes are fixed; every other byte
//! is read as a move with the layout `CC DDD SSS`:
//!
//! - `CC`: class, `01` for 8-bit moves and `10` for 32-bit moves
//! - `DDD`: destination designator
//! - `SSS`: source designator, 0 meaning "immediate follows"
//!
//! In the 8-bit class designator 7 addresses memory at `PTR + C`. The
//! 32-bit class has no memory form, so 7 is invalid there.

use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{Reg8, Reg32};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// An 8-bit move operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand8 {
    Reg(Reg8),
    /// The byte at `PTR + C`.
    Mem,
}

impl Operand8 {
    fn from_designator(designator: u8) -> Option<Self> {
        match designator {
            MEM_DESIGNATOR => Some(Operand8::Mem),
            d => Reg8::from_designator(d).map(Operand8::Reg),
        }
    }

    fn designator(self) -> u8 {
        match self {
            Operand8::Reg(reg) => reg.designator(),
            Operand8::Mem => MEM_DESIGNATOR,
        }
    }
}

/// Decoded i69 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Fixed opcodes ====================

    /// Stop execution.
    Halt,

    /// Emit A to the output stream.
    Out,

    /// F := 0x00 if A == B else 0x01
    Cmp,

    /// A := A + B (wrapping)
    Add,

    /// A := A - B (wrapping)
    Sub,

    /// A := A ^ B
    Xor,

    /// PTR := PTR + imm
    Aptr { imm: u8 },

    /// Jump if F == 0x00
    Jez { target: u32 },

    /// Jump if F != 0x00
    Jnz { target: u32 },

    // ==================== Moves ====================

    /// Byte move between registers and memory.
    Mv { dst: Operand8, src: Operand8 },

    /// Byte immediate into register or memory.
    Mvi { dst: Operand8, imm: u8 },

    /// 32-bit register copy.
    Mv32 { dst: Reg32, src: Reg32 },

    /// 32-bit immediate into register.
    Mvi32 { dst: Reg32, imm: u32 },
}

impl Instruction {
    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> u32 {
        match self {
            Instruction::Aptr { .. } | Instruction::Mvi { .. } => 2,
            Instruction::Jez { .. } | Instruction::Jnz { .. } | Instruction::Mvi32 { .. } => 5,
            _ => 1,
        }
    }
}

/// Fixed opcode values.
struct Opcode;

impl Opcode {
    const HALT: u8 = 0x01;
    const OUT: u8 = 0x02;
    const JEZ: u8 = 0x21;
    const JNZ: u8 = 0x22;
    const CMP: u8 = 0xC1;
    const ADD: u8 = 0xC2;
    const SUB: u8 = 0xC3;
    const XOR: u8 = 0xC4;
    const APTR: u8 = 0xE1;
}

const CLASS_MASK: u8 = 0b1100_0000;
const DEST_MASK: u8 = 0b0011_1000;
const SRC_MASK: u8 = 0b0000_0111;

const CLASS_MV8: u8 = 0b0100_0000;
const CLASS_MV32: u8 = 0b1000_0000;

const MEM_DESIGNATOR: u8 = 7;

/// Fetch and decode the instruction at `*pc`.
///
/// `pc` is advanced past every byte consumed. On error it points past the
/// last byte that was read successfully.
pub fn decode(mem: &Memory, pc: &mut u32) -> Result<Instruction, DecodeError> {
    let opcode = fetch8(mem, pc)?;

    let instruction = match opcode {
        Opcode::HALT => Instruction::Halt,
        Opcode::OUT => Instruction::Out,
        Opcode::CMP => Instruction::Cmp,
        Opcode::ADD => Instruction::Add,
        Opcode::SUB => Instruction::Sub,
        Opcode::XOR => Instruction::Xor,
        Opcode::APTR => Instruction::Aptr { imm: fetch8(mem, pc)? },
        Opcode::JEZ => Instruction::Jez { target: fetch32(mem, pc)? },
        Opcode::JNZ => Instruction::Jnz { target: fetch32(mem, pc)? },
        _ => decode_move(opcode, mem, pc)?,
    };

    Ok(instruction)
}

fn decode_move(opcode: u8, mem: &Memory, pc: &mut u32) -> Result<Instruction, DecodeError> {
    let class = opcode & CLASS_MASK;
    let dst = (opcode & DEST_MASK) >> 3;
    let src = opcode & SRC_MASK;

    if dst == 0 || (dst == MEM_DESIGNATOR && src == MEM_DESIGNATOR) {
        return Err(DecodeError::InvalidDestination { opcode });
    }

    match class {
        CLASS_MV8 => {
            // Both fields are 3 bits wide, so these lookups cannot fail today.
            let dst = Operand8::from_designator(dst)
                .ok_or(DecodeError::InvalidDestination { opcode })?;
            if src == 0 {
                return Ok(Instruction::Mvi { dst, imm: fetch8(mem, pc)? });
            }
            let src = Operand8::from_designator(src)
                .ok_or(DecodeError::UnrecognizedOpcode(opcode))?;
            Ok(Instruction::Mv { dst, src })
        }
        CLASS_MV32 => {
            let dst = Reg32::from_designator(dst)
                .ok_or(DecodeError::InvalidDestination { opcode })?;
            if src == 0 {
                return Ok(Instruction::Mvi32 { dst, imm: fetch32(mem, pc)? });
            }
            let src = Reg32::from_designator(src)
                .ok_or(DecodeError::UnrecognizedOpcode(opcode))?;
            Ok(Instruction::Mv32 { dst, src })
        }
        _ => Err(DecodeError::UnrecognizedOpcode(opcode)),
    }
}

fn fetch8(mem: &Memory, pc: &mut u32) -> Result<u8, DecodeError> {
    let value = mem.read(u64::from(*pc))?;
    *pc = pc.wrapping_add(1);
    Ok(value)
}

fn fetch32(mem: &Memory, pc: &mut u32) -> Result<u32, DecodeError> {
    let value = mem.read_u32(u64::from(*pc))?;
    *pc = pc.wrapping_add(4);
    Ok(value)
}

/// Encode an instruction back to its byte form.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let move8 = |dst: Operand8, src: u8| CLASS_MV8 | (dst.designator() << 3) | src;
    let move32 = |dst: Reg32, src: u8| CLASS_MV32 | (dst.designator() << 3) | src;

    match *instr {
        Instruction::Halt => vec![Opcode::HALT],
        Instruction::Out => vec![Opcode::OUT],
        Instruction::Cmp => vec![Opcode::CMP],
        Instruction::Add => vec![Opcode::ADD],
        Instruction::Sub => vec![Opcode::SUB],
        Instruction::Xor => vec![Opcode::XOR],
        Instruction::Aptr { imm } => vec![Opcode::APTR, imm],
        Instruction::Jez { target } => with_imm32(Opcode::JEZ, target),
        Instruction::Jnz { target } => with_imm32(Opcode::JNZ, target),
        Instruction::Mv { dst, src } => vec![move8(dst, src.designator())],
        Instruction::Mvi { dst, imm } => vec![move8(dst, 0), imm],
        Instruction::Mv32 { dst, src } => vec![move32(dst, src.designator())],
        Instruction::Mvi32 { dst, imm } => with_imm32(move32(dst, 0), imm),
    }
}

/// Encode a sequence of instructions into one program image.
pub fn encode_all(instrs: &[Instruction]) -> Vec<u8> {
    instrs.iter().flat_map(encode).collect()
}

fn with_imm32(opcode: u8, imm: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(5);
    bytes.push(opcode);
    bytes.extend_from_slice(&imm.to_le_bytes());
    bytes
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid destination in opcode {opcode:#04x}")]
    InvalidDestination { opcode: u8 },

    #[error("unrecognized opcode {0:#04x}")]
    UnrecognizedOpcode(u8),

    #[error("fetch failed: {0}")]
    Fetch(#[from] MemoryError),
}
