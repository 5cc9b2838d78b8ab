//! i69 Emulator - CLI Entry Point
//!
//! `i69-emu <program>` runs a raw i69 image. Bytes produced by `OUT` go to
//! stdout unframed; everything else goes to stderr.
//!
//! Exit codes:
//! - 0: program executed HALT
//! - 1: program image could not be loaded
//! - 2: out-of-bounds fetch or memory access
//! - 3: invalid move destination
//! - 4: unrecognized opcode
//! - 5: writing program output failed
//! - 6: `--max-steps` budget exhausted

use clap::Parser;
use i69::{Cpu, CpuState, ErrorKind, Registers};
use serde::Serialize;
use std::io::Write;
use std::process;

const EXIT_LOAD_ERROR: i32 = 1;
const EXIT_STEP_LIMIT: i32 = 6;

#[derive(Parser)]
#[command(name = "i69-emu")]
#[command(version)]
#[command(about = "Run a program image on the i69 emulator")]
struct Cli {
    /// Path to the raw program image
    program: String,

    /// Stop after this many instructions
    #[arg(short, long)]
    max_steps: Option<u64>,

    /// Print a JSON run summary to stderr
    #[arg(short, long)]
    summary: bool,
}

/// Machine-readable account of a finished run.
#[derive(Serialize)]
struct RunSummary<'a> {
    steps: u64,
    state: CpuState,
    error: Option<ErrorKind>,
    message: Option<String>,
    registers: &'a Registers,
}

fn main() {
    let cli = Cli::parse();

    let image = match i69::load_image(&cli.program) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load program: {}", e);
            process::exit(EXIT_LOAD_ERROR);
        }
    };

    let mut cpu = Cpu::new(image);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let result = match cli.max_steps {
        Some(max_steps) => cpu.run_limited(&mut out, max_steps),
        None => cpu.run(&mut out),
    };
    // A failed flush loses output that OUT already reported as written.
    let result = result.and_then(|steps| {
        out.flush()
            .map(|_| steps)
            .map_err(|e| i69::CpuError::Output(e.to_string()))
    });

    let code = match &result {
        Ok(_) if cpu.is_running() => {
            eprintln!("⚠️  Reached max steps limit ({}) without HALT", cpu.steps);
            EXIT_STEP_LIMIT
        }
        Ok(_) => 0,
        Err(e) => {
            eprintln!("❌ CPU error at PC={:#010x}: {}", cpu.regs.pc(), e);
            e.kind().exit_code()
        }
    };

    if cli.summary {
        let summary = RunSummary {
            steps: cpu.steps,
            state: cpu.state,
            error: result.as_ref().err().map(|e| e.kind()),
            message: result.as_ref().err().map(|e| e.to_string()),
            registers: &cpu.regs,
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => eprintln!("❌ Failed to encode summary: {}", e),
        }
    }

    process::exit(code);
}
