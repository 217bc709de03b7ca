use armv7_inproc_dbg::core::config::CoordinatorConfig;
use armv7_inproc_dbg::core::cpu::registers::{Cpsr, InstructionSet, RegisterSnapshot};
use armv7_inproc_dbg::core::debugger::coordinator::ExceptionKind;
use armv7_inproc_dbg::core::debugger::manager::WatchKind;
use armv7_inproc_dbg::core::host::mock::MockHost;
use armv7_inproc_dbg::core::memory::RegionKind;
use armv7_inproc_dbg::log::Logger;
use armv7_inproc_dbg::Debugger;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

const TARGET_PID: u32 = 1;
const MAIN_TID: u32 = 100;

/// Demo harness for the breakpoint & exception coordinator: wires the core up to an in-memory
/// mock target and either runs one canned scenario or drops into an interactive console.
#[derive(Parser)]
struct Cli {
    /// tracing_subscriber EnvFilter directive, e.g. "debug" or "armv7_inproc_dbg=trace".
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run one of the §8 end-to-end scenarios (1-6) and exit instead of opening
    /// the interactive console.
    #[arg(long)]
    scenario: Option<u8>,
}

fn main() {
    let cli = Cli::parse();
    let logger = Logger::new(&cli.log_level);

    let host = Arc::new(MockHost::new(TARGET_PID, MAIN_TID));
    host.mark_region(0x8100_0000, 0x8200_0000, RegionKind::Rx);
    host.mark_region(0x9000_0000, 0x9010_0000, RegionKind::Rw);
    let debugger = Debugger::new(host.clone(), CoordinatorConfig::default());
    debugger.manager.on_process_create(TARGET_PID, 1, MAIN_TID);

    if let Some(n) = cli.scenario {
        run_scenario(n, &debugger, &host);
        return;
    }

    println!("armv7-inproc-dbg demo console. Commands: regs, list, break <addr> <thumb|arm>, hwbreak <addr>, watch <addr> <r|w|rw>, clear <idx>, step, callstack <depth>, read <addr> <len>, write <addr> <hex-bytes>, scenario <n>, log <level>, quit");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["quit"] | ["q"] => break,
            ["log", level] => logger.set_log_level(level),
            ["regs"] => match debugger.manager.get_registers() {
                Some(r) => print!("{}", r.dump()),
                None => println!("no captured registers"),
            },
            ["list"] => {
                for slot in debugger.manager.list().iter() {
                    if slot.kind != armv7_inproc_dbg::core::debugger::table::SlotKind::Empty {
                        println!("{:?}", slot);
                    }
                }
            }
            ["break", addr, isa] => {
                let Ok(addr) = parse_addr(*addr) else { println!("bad address"); continue };
                let isa = match *isa {
                    "thumb" => InstructionSet::Thumb,
                    "arm" => InstructionSet::Arm,
                    _ => { println!("isa must be thumb or arm"); continue; }
                };
                match debugger.manager.set_sw_break(addr, isa) {
                    Ok(idx) => println!("sw breakpoint set at slot {idx}"),
                    Err(e) => println!("error: {e}"),
                }
            }
            ["hwbreak", addr] => {
                let Ok(addr) = parse_addr(*addr) else { println!("bad address"); continue };
                match debugger.manager.set_hw_break(addr) {
                    Ok(idx) => println!("hw breakpoint set at slot {idx}"),
                    Err(e) => println!("error: {e}"),
                }
            }
            ["watch", addr, kind] => {
                let Ok(addr) = parse_addr(*addr) else { println!("bad address"); continue };
                let kind = match *kind {
                    "r" => WatchKind::Read,
                    "w" => WatchKind::Write,
                    "rw" => WatchKind::ReadWrite,
                    _ => { println!("kind must be r, w or rw"); continue; }
                };
                match debugger.manager.set_watchpoint(addr, kind) {
                    Ok(idx) => println!("watchpoint set at slot {idx}"),
                    Err(e) => println!("error: {e}"),
                }
            }
            ["clear", idx] => match idx.parse::<usize>() {
                Ok(idx) => match debugger.manager.clear(idx) {
                    Ok(()) => println!("cleared"),
                    Err(e) => println!("error: {e}"),
                },
                Err(_) => println!("bad slot index"),
            },
            ["step"] => match debugger.manager.single_step() {
                Ok(()) => println!("stepping"),
                Err(e) => println!("error: {e}"),
            },
            ["callstack", depth] => match depth.parse::<usize>() {
                Ok(depth) => match debugger.manager.get_callstack(depth) {
                    Ok(frames) => println!("{:08x?}", frames),
                    Err(e) => println!("error: {e}"),
                },
                Err(_) => println!("bad depth"),
            },
            ["read", addr, len] => {
                let Ok(addr) = parse_addr(*addr) else { println!("bad address"); continue };
                match len.parse::<usize>() {
                    Ok(len) => match debugger.manager.read_memory(addr, len) {
                        Ok(bytes) => println!("{:02x?}", bytes),
                        Err(e) => println!("error: {e}"),
                    },
                    Err(_) => println!("bad length"),
                }
            }
            ["write", addr, hex_bytes] => {
                let Ok(addr) = parse_addr(*addr) else { println!("bad address"); continue };
                match parse_hex_bytes(hex_bytes) {
                    Ok(bytes) => match debugger.manager.write_memory(addr, &bytes) {
                        Ok(()) => println!("wrote {} bytes", bytes.len()),
                        Err(e) => println!("error: {e}"),
                    },
                    Err(_) => println!("bad hex bytes"),
                }
            }
            ["scenario", n] => match n.parse::<u8>() {
                Ok(n) => run_scenario(n, &debugger, &host),
                Err(_) => println!("bad scenario number"),
            },
            [] => {}
            _ => println!("unrecognized command"),
        }
        io::stdout().flush().ok();
    }
}

fn parse_addr(s: &str) -> Result<u32, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

/// Parses a contiguous hex string like "deadbeef" into bytes, for the `write` console command.
fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, std::num::ParseIntError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..(i + 2).min(s.len())], 16))
        .collect()
}

fn user_regs_at(pc: u32, isa: InstructionSet) -> RegisterSnapshot {
    let mut regs = [0u32; 16];
    regs[15] = pc;
    let t_bit = if isa == InstructionSet::Thumb { 1 << 5 } else { 0 };
    RegisterSnapshot { regs, cpsr: Cpsr(0x10 | t_bit) }
}

fn run_scenario(n: u8, debugger: &Debugger, host: &Arc<MockHost>) {
    match n {
        1 => {
            // HW breakpoint hit.
            let idx = debugger.manager.set_hw_break(0x8100_0100).unwrap();
            host.set_registers(user_regs_at(0x8100_0104, InstructionSet::Arm));
            debugger.coordinator.handle_exception(ExceptionKind::Pabt);
            println!(
                "scenario 1: captured_pc={:08x?} slot={:?}",
                debugger.manager.get_registers().map(|r| r.pc()),
                debugger.manager.list()[idx]
            );
        }
        2 => {
            // SW breakpoint round trip.
            host.set_memory(0x8100_2000, &0x4770u16.to_le_bytes());
            debugger.manager.set_sw_break(0x8100_2000, InstructionSet::Thumb).unwrap();
            println!("scenario 2: patched bytes = {:02x?}", host.memory_at(0x8100_2000, 2));
            host.set_registers(user_regs_at(0x8100_2002, InstructionSet::Thumb));
            debugger.coordinator.handle_exception(ExceptionKind::Undef);
            println!("scenario 2: restored bytes = {:02x?}", host.memory_at(0x8100_2000, 2));
        }
        3 => {
            // Watchpoint RW.
            debugger.manager.set_watchpoint(0x8100_3000, WatchKind::ReadWrite).unwrap();
            host.set_dfar(0x8100_3002);
            host.set_registers(user_regs_at(0x8100_3008, InstructionSet::Arm));
            debugger.coordinator.handle_exception(ExceptionKind::Dabt);
            println!("scenario 3: suspended={}", host.is_suspended(MAIN_TID));
        }
        4 => {
            // Single step across a conditional branch: BEQ +6 (0xD003) with Z set predicts
            // P+2+6=P+8; with Z clear it predicts P+2.
            let pc = 0x8100_0000u32;
            host.set_memory(pc, &0xD003u16.to_le_bytes());
            // PABT reports pc+4, so the reported PC must be the break address plus the
            // adjustment the coordinator reverses (as in scenarios 1 and 6).
            host.set_registers(RegisterSnapshot { regs: { let mut r = [0u32; 16]; r[15] = pc + 4; r }, cpsr: Cpsr(0x10 | (1 << 5) | (1 << 30)) });
            debugger.manager.set_hw_break(pc).unwrap();
            debugger.coordinator.handle_exception(ExceptionKind::Pabt);
            debugger.manager.single_step().unwrap();
            println!("scenario 4: single-step slot = {:?}", debugger.manager.list()[armv7_inproc_dbg::core::config::SINGLE_STEP_SLOT]);
        }
        5 => {
            // Process kill cleans up.
            host.set_memory(0x8100_2100, &0x4770u16.to_le_bytes());
            debugger.manager.set_sw_break(0x8100_2100, InstructionSet::Thumb).unwrap();
            debugger.manager.set_watchpoint(0x8100_3100, WatchKind::Write).unwrap();
            debugger.manager.on_process_kill(TARGET_PID);
            println!("scenario 5: live slots after kill = {}",
                debugger.manager.list().iter().filter(|s| s.kind != armv7_inproc_dbg::core::debugger::table::SlotKind::Empty).count());
        }
        6 => {
            // Callstack unwind.
            let (f0, f1, f2) = (0x7000_0100u32, 0x7000_0200u32, 0x7000_0300u32);
            let (l0, l1, l2) = (0x8100_0010u32, 0x8100_0020u32, 0x8100_0030u32);
            host.set_memory(f0, &f1.to_le_bytes());
            host.set_memory(f0 - 4, &l0.to_le_bytes());
            host.set_memory(f1, &f2.to_le_bytes());
            host.set_memory(f1 - 4, &l1.to_le_bytes());
            host.set_memory(f2, &0u32.to_le_bytes());
            host.set_memory(f2 - 4, &l2.to_le_bytes());
            // Drive one HW breakpoint hit so the manager has a last_registers snapshot with r11=f0.
            let mut regs = [0u32; 16];
            regs[15] = 0x8100_0004;
            regs[11] = f0;
            host.set_registers(RegisterSnapshot { regs, cpsr: Cpsr(0x10) });
            debugger.manager.set_hw_break(0x8100_0000).unwrap();
            debugger.coordinator.handle_exception(ExceptionKind::Pabt);
            println!("scenario 6: callstack = {:08x?}", debugger.manager.get_callstack(8).unwrap());
        }
        other => println!("no such scenario: {other}"),
    }
}
