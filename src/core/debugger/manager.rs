//! Breakpoint Manager (§4.4): the public surface for set/clear/list of breakpoints and
//! watchpoints, plus execution control (suspend/resume/single-step) and the call-stack walker.

use crate::core::config::{CoordinatorConfig, DEBUG_SUSPEND_CODE, MAX_CALL_STACK_DEPTH, MAX_HW_BKPT, MAX_SLOT, SINGLE_STEP_SLOT};
use crate::core::cpu::predictor::predict_next_pc;
use crate::core::cpu::registers::{InstructionSet, RegisterSnapshot};
use crate::core::debugger::context::DebuggerContext;
use crate::core::debugger::table::{Slot, SlotKind};
use crate::core::error::{DebuggerError, DebuggerResult};
use crate::core::host::HostBackend;
use crate::core::memory::TargetMemoryGateway;
use crate::core::target::TargetProcess;
use std::sync::Arc;

/// Watchpoint access kind; maps 1:1 onto `SlotKind::Wp*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    Read,
    Write,
    ReadWrite,
}

impl WatchKind {
    fn slot_kind(self) -> SlotKind {
        match self {
            WatchKind::Read => SlotKind::WpRead,
            WatchKind::Write => SlotKind::WpWrite,
            WatchKind::ReadWrite => SlotKind::WpReadWrite,
        }
    }

    /// LSC field: 1=R, 2=W, 3=RW (§6).
    fn lsc(self) -> u32 {
        match self {
            WatchKind::Read => 1,
            WatchKind::Write => 2,
            WatchKind::ReadWrite => 3,
        }
    }
}

const THUMB_BKPT: u16 = 0xBE00;
const ARM_BKPT: u32 = 0xE120_0070;

fn hw_break_control() -> u32 {
    let enable = 1u32;
    let privilege = 0x3 << 1;
    let bas = 0xFu32 << 5;
    let linked = 1u32 << 14;
    enable | privilege | bas | linked
}

fn hw_watch_control(kind: WatchKind) -> u32 {
    let enable = 1u32;
    let privilege = 0x3 << 1;
    let lsc = kind.lsc() << 3;
    let bas = 0xFu32 << 5;
    let linked = 1u32 << 14;
    enable | privilege | lsc | bas | linked
}

fn sw_encoding(isa: InstructionSet) -> Vec<u8> {
    match isa {
        InstructionSet::Thumb => THUMB_BKPT.to_le_bytes().to_vec(),
        InstructionSet::Arm => ARM_BKPT.to_le_bytes().to_vec(),
    }
}

fn isa_slot_kind(isa: InstructionSet) -> SlotKind {
    match isa {
        InstructionSet::Thumb => SlotKind::SwThumb,
        InstructionSet::Arm => SlotKind::SwArm,
    }
}

pub struct BreakpointManager {
    ctx: Arc<DebuggerContext>,
    host: Arc<dyn HostBackend>,
    gateway: TargetMemoryGateway,
    config: CoordinatorConfig,
}

impl BreakpointManager {
    pub fn new(ctx: Arc<DebuggerContext>, host: Arc<dyn HostBackend>, config: CoordinatorConfig) -> Self {
        let gateway = TargetMemoryGateway::new(host.clone());
        Self { ctx, host, gateway, config }
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.config
    }

    fn attached_pid(&self) -> DebuggerResult<u32> {
        self.ctx.with_state(|s| {
            if s.target.is_attached() {
                Ok(s.target.pid)
            } else {
                Err(DebuggerError::NoTarget)
            }
        })
    }

    pub fn on_process_create(&self, pid: u32, main_module_id: u32, main_thread_id: u32) {
        self.ctx.with_state(|s| {
            if s.target.is_attached() {
                tracing::warn!(pid, existing = s.target.pid, "process-create ignored: a target is already attached");
                return;
            }
            s.target = TargetProcess { pid, main_module_id, main_thread_id, faulting_thread_id: 0 };
            tracing::debug!(pid, "target process attached");
        });
    }

    pub fn on_process_kill(&self, pid: u32) {
        self.ctx.with_state(|s| {
            if !s.target.owns(pid) {
                return;
            }
            let cleared = s.table.clear_owned_by(pid);
            for slot in cleared {
                self.disable_hardware_or_restore(&slot, true);
            }
            s.target = TargetProcess::default();
            tracing::debug!(pid, "target process killed, state cleared");
        });
    }

    /// Shared disable path used by both `clear` and process-kill teardown. `best_effort` governs
    /// whether a restore failure is logged-and-ignored (process-kill) or would otherwise be
    /// surfaced as an error (plain `clear`, handled by the caller instead).
    fn disable_hardware_or_restore(&self, slot: &Slot, best_effort: bool) -> DebuggerResult<()> {
        match slot.kind {
            SlotKind::HwBreak | SlotKind::SingleStep => {
                if !self.host.program_hw_break(slot.pid, slot.slot_index as usize, 0, 0) && !best_effort {
                    return Err(DebuggerError::KernelReject);
                }
            }
            SlotKind::WpRead | SlotKind::WpWrite | SlotKind::WpReadWrite => {
                if !self.host.program_hw_watch(slot.pid, slot.slot_index as usize, 0, 0) && !best_effort {
                    return Err(DebuggerError::KernelReject);
                }
            }
            SlotKind::SwThumb | SlotKind::SwArm => {
                let width = slot.kind.width();
                let bytes = slot.saved_word.to_le_bytes();
                let result = self.gateway.write_text(slot.pid, slot.address, &bytes[..width]);
                if let Err(e) = result {
                    if best_effort {
                        tracing::warn!(addr = slot.address, error = %e, "failed to restore SW breakpoint bytes during teardown; ignoring");
                    } else {
                        return Err(e);
                    }
                }
            }
            SlotKind::Empty => {}
        }
        Ok(())
    }

    pub fn set_hw_break(&self, address: u32) -> DebuggerResult<usize> {
        let pid = self.attached_pid()?;
        self.ctx.with_state(|s| {
            let idx = s.table.find_empty(0..SINGLE_STEP_SLOT).ok_or(DebuggerError::NoSlot)?;
            let control = hw_break_control();
            if !self.host.program_hw_break(pid, idx, address, control) {
                return Err(DebuggerError::KernelReject);
            }
            s.table.fill(idx, SlotKind::HwBreak, pid, address, 0);
            tracing::debug!(idx, address, "hw breakpoint set");
            Ok(idx)
        })
    }

    pub fn set_watchpoint(&self, address: u32, kind: WatchKind) -> DebuggerResult<usize> {
        let pid = self.attached_pid()?;
        self.ctx.with_state(|s| {
            let idx = s.table.find_empty(0..SINGLE_STEP_SLOT).ok_or(DebuggerError::NoSlot)?;
            let control = hw_watch_control(kind);
            if !self.host.program_hw_watch(pid, idx, address, control) {
                return Err(DebuggerError::KernelReject);
            }
            s.table.fill(idx, kind.slot_kind(), pid, address, 0);
            tracing::debug!(idx, address, ?kind, "watchpoint set");
            Ok(idx)
        })
    }

    pub fn set_sw_break(&self, address: u32, isa: InstructionSet) -> DebuggerResult<usize> {
        let pid = self.attached_pid()?;
        let width = isa.width() as usize;
        let encoding = sw_encoding(isa);
        self.ctx.with_state(|s| {
            let idx = s.table.find_empty(MAX_HW_BKPT..MAX_SLOT).ok_or(DebuggerError::NoSlot)?;
            let original = match self.gateway.read(pid, address, width) {
                Ok(b) => b,
                Err(e) => return Err(e),
            };
            if let Err(e) = self.gateway.write_text(pid, address, &encoding) {
                // Nothing was patched; restoring is a no-op, but attempt it anyway in case the
                // host partially wrote before failing.
                let _ = self.gateway.write_text(pid, address, &original);
                return Err(e);
            }
            let mut saved = [0u8; 4];
            saved[..width].copy_from_slice(&original);
            s.table.fill(idx, isa_slot_kind(isa), pid, address, u32::from_le_bytes(saved));
            tracing::debug!(idx, address, ?isa, "sw breakpoint set");
            Ok(idx)
        })
    }

    pub fn clear(&self, slot_index: usize) -> DebuggerResult<()> {
        self.ctx.with_state(|s| {
            if slot_index >= MAX_SLOT {
                return Err(DebuggerError::BadArg("slot index out of range"));
            }
            let slot = *s.table.get(slot_index);
            if slot.kind == SlotKind::Empty {
                return Err(DebuggerError::BadArg("slot is already empty"));
            }
            self.disable_hardware_or_restore(&slot, false)?;
            s.table.clear(slot_index);
            tracing::debug!(slot_index, "slot cleared");
            Ok(())
        })
    }

    pub fn list(&self) -> [Slot; MAX_SLOT] {
        self.ctx.with_state(|s| s.table.snapshot())
    }

    /// Hex editor read (§6). Requires an attached target; delegates to the gateway.
    pub fn read_memory(&self, address: u32, len: usize) -> DebuggerResult<Vec<u8>> {
        let pid = self.attached_pid()?;
        self.gateway.read(pid, address, len)
    }

    /// Hex editor write (§6). Requires an attached target; delegates to the gateway's
    /// data-domain write path.
    pub fn write_memory(&self, address: u32, bytes: &[u8]) -> DebuggerResult<()> {
        let pid = self.attached_pid()?;
        self.gateway.write_data(pid, address, bytes)
    }

    pub fn get_registers(&self) -> Option<RegisterSnapshot> {
        self.ctx.with_state(|s| s.last_registers)
    }

    /// Walks the APCS frame-pointer chain starting at the last captured snapshot. See §4.4 for
    /// the termination conditions this loop encodes.
    pub fn get_callstack(&self, depth: usize) -> DebuggerResult<Vec<u32>> {
        let pid = self.attached_pid()?;
        let regs = self.ctx.with_state(|s| s.last_registers).ok_or(DebuggerError::NotSuspended)?;
        let limit = depth.min(MAX_CALL_STACK_DEPTH);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut frames = vec![regs.pc()];
        let mut fp = regs.fp();
        for _ in 1..limit {
            if fp == 0 || fp & 3 != 0 {
                break;
            }
            let saved_fp = match self.gateway.read_target_word(pid, fp) {
                Ok(v) => v,
                Err(_) => break,
            };
            let saved_lr = match self.gateway.read_target_word(pid, fp.wrapping_sub(4)) {
                Ok(v) => v,
                Err(_) => break,
            };
            if saved_lr == 0 {
                break;
            }
            frames.push(saved_lr);
            if saved_fp == 0 || saved_fp <= fp {
                break;
            }
            fp = saved_fp;
        }
        Ok(frames)
    }

    pub fn suspend_process(&self) -> DebuggerResult<()> {
        let pid = self.attached_pid()?;
        if self.host.suspend_process(pid, DEBUG_SUSPEND_CODE) {
            Ok(())
        } else {
            Err(DebuggerError::KernelReject)
        }
    }

    pub fn resume_process(&self) -> DebuggerResult<()> {
        let pid = self.attached_pid()?;
        let faulting_tid = self.ctx.with_state(|s| s.target.faulting_thread_id);
        if faulting_tid != 0 && !self.host.set_suspend_status(faulting_tid, 0) {
            return Err(DebuggerError::KernelReject);
        }
        if !self.host.resume_process(pid) {
            return Err(DebuggerError::KernelReject);
        }
        self.ctx.with_state(|s| s.target.faulting_thread_id = 0);
        Ok(())
    }

    /// Predicts `next_pc`, programs the reserved single-step slot there, and resumes. The slot
    /// is retired by the Coordinator on the PABT it causes (§4.5).
    pub fn single_step(&self) -> DebuggerResult<()> {
        let pid = self.attached_pid()?;
        let (faulting_tid, regs) = self.ctx.with_state(|s| {
            if s.target.faulting_thread_id == 0 {
                return Err(DebuggerError::NotSuspended);
            }
            let regs = s.last_registers.ok_or(DebuggerError::NotSuspended)?;
            Ok((s.target.faulting_thread_id, regs))
        })?;
        if !self.host.query_suspend_status(faulting_tid) {
            return Err(DebuggerError::NotSuspended);
        }
        let slot_busy = self.ctx.with_state(|s| s.table.get(SINGLE_STEP_SLOT).kind != SlotKind::Empty);
        if slot_busy {
            return Err(DebuggerError::BadArg("single-step slot already in use"));
        }
        let instr_bytes = self.gateway.read(pid, regs.pc(), 4)?;
        let instr_word = u32::from_le_bytes(
            instr_bytes.try_into().map_err(|_| DebuggerError::MemRead { address: regs.pc() })?,
        );
        let next_pc = predict_next_pc(&regs, instr_word);

        let control = hw_break_control();
        if !self.host.program_hw_break(pid, SINGLE_STEP_SLOT, next_pc, control) {
            return Err(DebuggerError::KernelReject);
        }
        self.ctx.with_state(|s| s.table.fill(SINGLE_STEP_SLOT, SlotKind::SingleStep, pid, next_pc, 0));
        tracing::debug!(next_pc, "single-step slot programmed");
        self.resume_process()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CoordinatorConfig;
    use crate::core::cpu::registers::Cpsr;
    use crate::core::host::mock::MockHost;
    use crate::core::memory::RegionKind;

    fn manager() -> (Arc<DebuggerContext>, Arc<MockHost>, BreakpointManager) {
        let ctx = Arc::new(DebuggerContext::new());
        let host = Arc::new(MockHost::new(1, 100));
        let mgr = BreakpointManager::new(ctx.clone(), host.clone(), CoordinatorConfig::default());
        (ctx, host, mgr)
    }

    #[test]
    fn set_hw_break_requires_target() {
        let (_, _, mgr) = manager();
        assert!(matches!(mgr.set_hw_break(0x1000), Err(DebuggerError::NoTarget)));
    }

    #[test]
    fn sw_breakpoint_round_trip_thumb() {
        let (_, host, mgr) = manager();
        mgr.on_process_create(1, 1, 100);
        host.mark_region(0x8100_0000, 0x8200_0000, RegionKind::Rx);
        host.set_memory(0x8100_2000, &0x4770u16.to_le_bytes());

        let idx = mgr.set_sw_break(0x8100_2000, InstructionSet::Thumb).unwrap();
        assert_eq!(host.memory_at(0x8100_2000, 2), vec![0x00, 0xBE]);
        assert_eq!(mgr.list()[idx].saved_word, 0x4770);

        mgr.clear(idx).unwrap();
        assert_eq!(host.memory_at(0x8100_2000, 2), vec![0x70, 0x47]);
        assert_eq!(mgr.list()[idx].kind, SlotKind::Empty);
    }

    #[test]
    fn hw_slot_exhaustion_returns_no_slot() {
        let (_, _, mgr) = manager();
        mgr.on_process_create(1, 1, 100);
        for i in 0..SINGLE_STEP_SLOT {
            mgr.set_hw_break(0x1000 + i as u32).unwrap();
        }
        assert!(matches!(mgr.set_hw_break(0x9999), Err(DebuggerError::NoSlot)));
    }

    #[test]
    fn process_kill_clears_owned_slots_only() {
        let (ctx, host, mgr) = manager();
        mgr.on_process_create(1, 1, 100);
        host.mark_region(0x8100_0000, 0x8200_0000, RegionKind::Rx);
        host.set_memory(0x8100_2000, &0x4770u16.to_le_bytes());
        let sw_idx = mgr.set_sw_break(0x8100_2000, InstructionSet::Thumb).unwrap();
        let wp_idx = mgr.set_watchpoint(0x8100_3000, WatchKind::ReadWrite).unwrap();

        mgr.on_process_kill(1);

        let snapshot = mgr.list();
        assert_eq!(snapshot[sw_idx].kind, SlotKind::Empty);
        assert_eq!(snapshot[wp_idx].kind, SlotKind::Empty);
        assert_eq!(host.memory_at(0x8100_2000, 2), vec![0x70, 0x47]);
        assert_eq!(ctx.with_state(|s| s.target.pid), 0);
    }

    #[test]
    fn callstack_walks_fp_chain_to_terminator() {
        let (ctx, host, mgr) = manager();
        mgr.on_process_create(1, 1, 100);

        let f0 = 0x7000_0100u32;
        let f1 = 0x7000_0200u32;
        let f2 = 0x7000_0300u32;
        let (l0, l1, l2) = (0x8100_0010u32, 0x8100_0020u32, 0x8100_0030u32);
        host.set_memory(f0, &f1.to_le_bytes());
        host.set_memory(f0 - 4, &l0.to_le_bytes());
        host.set_memory(f1, &f2.to_le_bytes());
        host.set_memory(f1 - 4, &l1.to_le_bytes());
        host.set_memory(f2, &0u32.to_le_bytes());
        host.set_memory(f2 - 4, &l2.to_le_bytes());

        let mut regs = [0u32; 16];
        regs[15] = 0x8100_0000; // pc
        regs[11] = f0; // fp
        ctx.with_state(|s| {
            s.last_registers = Some(RegisterSnapshot { regs, cpsr: Cpsr(0) });
        });

        let stack = mgr.get_callstack(8).unwrap();
        assert_eq!(stack, vec![0x8100_0000, l0, l1, l2]);
    }

    #[test]
    fn callstack_without_suspension_fails() {
        let (_, _, mgr) = manager();
        mgr.on_process_create(1, 1, 100);
        assert!(matches!(mgr.get_callstack(4), Err(DebuggerError::NotSuspended)));
    }

    #[test]
    fn read_memory_requires_target() {
        let (_, _, mgr) = manager();
        assert!(matches!(mgr.read_memory(0x1000, 4), Err(DebuggerError::NoTarget)));
    }

    #[test]
    fn read_then_write_back_is_a_memory_no_op() {
        let (_, host, mgr) = manager();
        mgr.on_process_create(1, 1, 100);
        host.mark_region(0x9000_0000, 0x9010_0000, RegionKind::Rw);
        host.set_memory(0x9000_0100, &[0xDE, 0xAD, 0xBE, 0xEF]);

        let read = mgr.read_memory(0x9000_0100, 4).unwrap();
        mgr.write_memory(0x9000_0100, &read).unwrap();

        assert_eq!(host.memory_at(0x9000_0100, 4), read);
    }
}
