//! CPU execution engine for the i69.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, Instruction, Operand8, DecodeError};
use crate::cpu::registers::{Reg8, Reg32};
use crate::cpu::memory::MemoryError;
use serde::{Serialize, Deserialize};
use std::io::Write;
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HALT instruction).
    Halted,
    /// CPU stopped on a fetch, decode or output error.
    Faulted,
}

/// The i69 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory, holding the program image.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instructions completed so far.
    pub steps: u64,
}

impl Cpu {
    /// Create a CPU over a program image with zeroed registers.
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::from_bytes(image),
            state: CpuState::Running,
            steps: 0,
        }
    }

    /// Execute a single instruction, writing any OUT byte to `out`.
    ///
    /// Returns the instruction that was executed. Any error moves the CPU to
    /// [`CpuState::Faulted`].
    pub fn step<W: Write>(&mut self, out: &mut W) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        match self.fetch_execute(out) {
            Ok(instr) => {
                self.steps += 1;
                Ok(instr)
            }
            Err(e) => {
                self.state = CpuState::Faulted;
                Err(e)
            }
        }
    }

    fn fetch_execute<W: Write>(&mut self, out: &mut W) -> Result<Instruction, CpuError> {
        // Fetch + decode, PC ends up past the whole instruction
        let mut pc = self.regs.pc();
        let decoded = decode::decode(&self.mem, &mut pc);
        self.regs.jump(pc);
        let instr = decoded?;

        self.execute(instr, out)?;
        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run<W: Write>(&mut self, out: &mut W) -> Result<u64, CpuError> {
        let start_steps = self.steps;

        while self.state == CpuState::Running {
            self.step(out)?;
        }

        Ok(self.steps - start_steps)
    }

    /// Run for at most `max_steps` instructions.
    ///
    /// The CPU is left [`CpuState::Running`] if the budget runs out first.
    pub fn run_limited<W: Write>(&mut self, out: &mut W, max_steps: u64) -> Result<u64, CpuError> {
        let start_steps = self.steps;
        let limit = self.steps.saturating_add(max_steps);

        while self.state == CpuState::Running && self.steps < limit {
            self.step(out)?;
        }

        Ok(self.steps - start_steps)
    }

    /// Execute a decoded instruction. PC already points past it.
    fn execute<W: Write>(&mut self, instr: Instruction, out: &mut W) -> Result<(), CpuError> {
        let regs = &mut self.regs;

        match instr {
            Instruction::Halt => {
                self.state = CpuState::Halted;
            }

            Instruction::Out => {
                let byte = regs.get8(Reg8::A);
                out.write_all(&[byte])
                    .map_err(|e| CpuError::Output(e.to_string()))?;
            }

            // ==================== Arithmetic ====================

            Instruction::Cmp => {
                let equal = regs.get8(Reg8::A) == regs.get8(Reg8::B);
                regs.set8(Reg8::F, if equal { 0x00 } else { 0x01 });
            }

            Instruction::Add => {
                let result = regs.get8(Reg8::A).wrapping_add(regs.get8(Reg8::B));
                regs.set8(Reg8::A, result);
            }

            Instruction::Sub => {
                let result = regs.get8(Reg8::A).wrapping_sub(regs.get8(Reg8::B));
                regs.set8(Reg8::A, result);
            }

            Instruction::Xor => {
                let result = regs.get8(Reg8::A) ^ regs.get8(Reg8::B);
                regs.set8(Reg8::A, result);
            }

            Instruction::Aptr { imm } => {
                let ptr = regs.ptr().wrapping_add(u32::from(imm));
                regs.set32(Reg32::Ptr, ptr);
            }

            // ==================== Control Flow ====================

            Instruction::Jez { target } => {
                if regs.flag() == 0x00 {
                    regs.jump(target);
                }
            }

            Instruction::Jnz { target } => {
                if regs.flag() != 0x00 {
                    regs.jump(target);
                }
            }

            // ==================== Data Transfer ====================

            Instruction::Mv { dst, src } => {
                let value = self.load8(src)?;
                self.store8(dst, value)?;
            }

            Instruction::Mvi { dst, imm } => {
                self.store8(dst, imm)?;
            }

            Instruction::Mv32 { dst, src } => {
                let value = regs.get32(src);
                regs.set32(dst, value);
            }

            Instruction::Mvi32 { dst, imm } => {
                regs.set32(dst, imm);
            }
        }

        Ok(())
    }

    /// Read an 8-bit operand. Memory goes through a fresh `PTR + C`.
    fn load8(&self, operand: Operand8) -> Result<u8, CpuError> {
        match operand {
            Operand8::Reg(reg) => Ok(self.regs.get8(reg)),
            Operand8::Mem => Ok(self.mem.read(self.regs.effective_address())?),
        }
    }

    fn store8(&mut self, operand: Operand8, value: u8) -> Result<(), CpuError> {
        match operand {
            Operand8::Reg(reg) => self.regs.set8(reg, value),
            Operand8::Mem => self.mem.write(self.regs.effective_address(), value)?,
        }
        Ok(())
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("steps", &self.steps)
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("output error: {0}")]
    Output(String),
}

/// Coarse classification of a [`CpuError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    OutOfBoundsAccess,
    InvalidDestination,
    UnrecognizedOpcode,
    Output,
    NotRunning,
}

impl CpuError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CpuError::NotRunning(_) => ErrorKind::NotRunning,
            CpuError::Memory(_) | CpuError::Decode(DecodeError::Fetch(_)) => ErrorKind::OutOfBoundsAccess,
            CpuError::Decode(DecodeError::InvalidDestination { .. }) => ErrorKind::InvalidDestination,
            CpuError::Decode(DecodeError::UnrecognizedOpcode(_)) => ErrorKind::UnrecognizedOpcode,
            CpuError::Output(_) => ErrorKind::Output,
        }
    }
}

impl ErrorKind {
    /// Process exit code reported by the command-line runner.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::OutOfBoundsAccess => 2,
            ErrorKind::InvalidDestination => 3,
            ErrorKind::UnrecognizedOpcode => 4,
            ErrorKind::Output => 5,
            ErrorKind::NotRunning => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode_all;
    use Instruction::*;

    fn run_program(instructions: &[Instruction]) -> (Cpu, Result<u64, CpuError>, Vec<u8>) {
        let mut cpu = Cpu::new(encode_all(instructions));
        let mut out = Vec::new();
        let result = cpu.run(&mut out);
        (cpu, result, out)
    }

    fn reg(r: Reg8) -> Operand8 {
        Operand8::Reg(r)
    }

    #[test]
    fn test_cpu_halt() {
        let (cpu, result, out) = run_program(&[Halt]);

        assert_eq!(result, Ok(1));
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.pc(), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn test_cpu_add_wraps() {
        let (cpu, _, _) = run_program(&[
            Mvi { dst: reg(Reg8::A), imm: 0xFF },
            Mvi { dst: reg(Reg8::B), imm: 0x01 },
            Add,
            Halt,
        ]);

        assert_eq!(cpu.regs.get8(Reg8::A), 0x00);
    }

    #[test]
    fn test_cpu_sub_wraps() {
        let (cpu, _, _) = run_program(&[
            Mvi { dst: reg(Reg8::B), imm: 0x01 },
            Sub,
            Halt,
        ]);

        assert_eq!(cpu.regs.get8(Reg8::A), 0xFF);
    }

    #[test]
    fn test_cpu_xor_and_out() {
        let (_, result, out) = run_program(&[
            Mvi { dst: reg(Reg8::A), imm: 0b1010_1010 },
            Mvi { dst: reg(Reg8::B), imm: 0b1111_0000 },
            Xor,
            Out,
            Halt,
        ]);

        assert!(result.is_ok());
        assert_eq!(out, vec![0b0101_1010]);
    }

    #[test]
    fn test_cpu_cmp_sets_flag() {
        let (cpu, _, _) = run_program(&[Mvi { dst: reg(Reg8::B), imm: 1 }, Cmp, Halt]);
        assert_eq!(cpu.regs.flag(), 0x01);

        let (cpu, _, _) = run_program(&[Mvi { dst: reg(Reg8::F), imm: 0x01 }, Cmp, Halt]);
        assert_eq!(cpu.regs.flag(), 0x00);
    }

    #[test]
    fn test_cpu_aptr_accumulates() {
        let (cpu, _, _) = run_program(&[
            Mvi32 { dst: Reg32::Ptr, imm: u32::MAX },
            Aptr { imm: 2 },
            Halt,
        ]);

        assert_eq!(cpu.regs.ptr(), 1);
    }

    #[test]
    fn test_cpu_jnz_skips_when_not_equal() {
        // 0: MVI A,1 (2)  2: CMP (1)  3: JNZ 10 (5)  8: OUT  9: HALT  10: HALT
        let (cpu, result, out) = run_program(&[
            Mvi { dst: reg(Reg8::A), imm: 1 },
            Cmp,
            Jnz { target: 10 },
            Out,
            Halt,
            Halt,
        ]);

        assert_eq!(result, Ok(4));
        assert!(out.is_empty());
        assert_eq!(cpu.regs.pc(), 11);
    }

    #[test]
    fn test_cpu_memory_move() {
        let mut image = encode_all(&[
            Mvi32 { dst: Reg32::Ptr, imm: 0x10 },
            Mvi { dst: reg(Reg8::C), imm: 0x05 },
            Mvi { dst: reg(Reg8::A), imm: 0x5A },
            Mv { dst: Operand8::Mem, src: reg(Reg8::A) },
            Mvi { dst: reg(Reg8::A), imm: 0x00 },
            Mv { dst: reg(Reg8::A), src: Operand8::Mem },
            Halt,
        ]);
        image.resize(0x20, 0);

        let mut cpu = Cpu::new(image);
        cpu.run(&mut Vec::new()).unwrap();

        assert_eq!(cpu.mem.as_bytes()[0x15], 0x5A);
        assert_eq!(cpu.regs.get8(Reg8::A), 0x5A);
    }

    #[test]
    fn test_cpu_mvi_into_memory() {
        let mut image = encode_all(&[
            Mvi32 { dst: Reg32::Ptr, imm: 0x0C },
            Mvi { dst: Operand8::Mem, imm: 0x77 },
            Halt,
        ]);
        image.resize(0x10, 0);

        let mut cpu = Cpu::new(image);
        cpu.run(&mut Vec::new()).unwrap();

        assert_eq!(cpu.mem.as_bytes()[0x0C], 0x77);
    }

    #[test]
    fn test_cpu_store_out_of_bounds() {
        let (cpu, result, _) = run_program(&[
            Mvi32 { dst: Reg32::Ptr, imm: 0x100 },
            Mv { dst: Operand8::Mem, src: reg(Reg8::A) },
            Halt,
        ]);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::OutOfBoundsAccess);
        assert_eq!(cpu.state, CpuState::Faulted);
        assert_eq!(cpu.steps, 1);
    }

    #[test]
    fn test_cpu_mvi32_into_pc_jumps() {
        // 0: MVI32 PC,6 (5)  5: OUT  6: HALT
        let (_, result, out) = run_program(&[Mvi32 { dst: Reg32::Pc, imm: 6 }, Out, Halt]);

        assert_eq!(result, Ok(2));
        assert!(out.is_empty());
    }

    #[test]
    fn test_cpu_runs_off_the_end() {
        let (cpu, result, _) = run_program(&[Cmp]);

        assert_eq!(result.unwrap_err().kind(), ErrorKind::OutOfBoundsAccess);
        assert_eq!(cpu.state, CpuState::Faulted);
    }

    #[test]
    fn test_cpu_not_running_after_halt() {
        let (mut cpu, _, _) = run_program(&[Halt]);

        let err = cpu.step(&mut Vec::new()).unwrap_err();
        assert_eq!(err, CpuError::NotRunning(CpuState::Halted));
        assert_eq!(cpu.state, CpuState::Halted);
    }

    #[test]
    fn test_run_limited_leaves_cpu_running() {
        // 0: MVI F,1  2: JNZ 2 spins forever
        let mut cpu = Cpu::new(encode_all(&[
            Mvi { dst: reg(Reg8::F), imm: 1 },
            Jnz { target: 2 },
        ]));

        let executed = cpu.run_limited(&mut Vec::new(), 100).unwrap();

        assert_eq!(executed, 100);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_output_failure_faults() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut cpu = Cpu::new(encode_all(&[Out, Halt]));
        let err = cpu.run(&mut Broken).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Output);
        assert_eq!(cpu.state, CpuState::Faulted);
    }
}
