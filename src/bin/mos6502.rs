use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use mos6502::Cpu;

/// Assembles and runs a 6502 program, then prints the final register and
/// memory snapshot.
#[derive(Parser, Debug)]
#[command(name = "mos6502", version, about)]
struct Args {
    /// Assembly source file to assemble and run.
    program: PathBuf,

    /// Overrides the interpreter's step-limit safety net for this run only.
    #[arg(long, default_value_t = mos6502::cpu::MAX_STEPS)]
    max_steps: u32,

    /// Print memory 0x0200..=0x02FF as the conventional screen buffer.
    #[arg(long)]
    dump_screen: bool,

    /// Install a debug-level tracing subscriber.
    #[arg(short, long)]
    verbose: bool,
}

fn dump_screen(cpu: &Cpu) {
    print!("screen: ");
    for address in 0x0200u16..=0x02FF {
        let byte = cpu.mem.read_u8(address);
        if (32..127).contains(&byte) {
            print!("{}", byte as char);
        } else {
            print!("[{:02X}]", byte);
        }
    }
    println!();
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .init();
    }

    let source = match fs::read_to_string(&args.program) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("could not read {}: {err}", args.program.display());
            return ExitCode::FAILURE;
        }
    };

    let mut cpu = Cpu::new();
    if let Err(err) = cpu.load(&source) {
        eprintln!("{}", mos6502::asm::render_error(&source, &err));
        return ExitCode::FAILURE;
    }

    cpu.run_with_limit(args.max_steps);

    println!(
        "A={:02X} X={:02X} Y={:02X} PC={:04X} SP={:02X} P={:02X} cycles={}",
        cpu.regs.a, cpu.regs.x, cpu.regs.y, cpu.regs.pc, cpu.regs.sp, cpu.regs.p, cpu.cycles
    );

    if let Some(fault) = cpu.last_fault {
        eprintln!(
            "halted on unknown opcode {:#04x} at pc={:#06x}",
            fault.opcode, fault.pc
        );
    }

    if args.dump_screen {
        dump_screen(&cpu);
    }

    ExitCode::SUCCESS
}
