//! The seam between the core and whatever actually owns debug registers, process memory and
//! thread suspend state (§6). Everything above this trait is portable; everything below it is
//! somebody else's kernel.

use crate::core::cpu::registers::RegisterSnapshot;
use crate::core::memory::RegionKind;

/// Abstracts the host-primitive table of §6. A real host binds these to kernel syscalls or
/// hypervisor calls; the demo binary and the test suite bind them to [`mock::MockHost`].
///
/// `register exception handlers` / `register process lifecycle handlers` are deliberately not
/// methods here: the core is the *callee* for those two (the host calls
/// [`crate::core::debugger::coordinator::ExceptionCoordinator::handle_exception`] and
/// `on_process_create`/`on_process_kill` directly), not the caller.
pub trait HostBackend: Send + Sync {
    fn program_hw_break(&self, pid: u32, slot: usize, addr: u32, control_word: u32) -> bool;
    fn program_hw_watch(&self, pid: u32, slot: usize, addr: u32, control_word: u32) -> bool;

    fn read_memory(&self, pid: u32, addr: u32, len: usize) -> Option<Vec<u8>>;
    fn write_data(&self, pid: u32, addr: u32, bytes: &[u8]) -> bool;
    fn write_text(&self, pid: u32, addr: u32, bytes: &[u8]) -> bool;
    fn classify(&self, pid: u32, addr: u32) -> RegionKind;

    /// The pid/tid of the thread currently being delivered an exception. Only meaningful when
    /// called from within the exception-context entry points.
    fn faulting_thread_context(&self) -> (u32, u32);
    /// `(user_view, kernel_view)` register files for a thread.
    fn thread_registers(&self, tid: u32) -> Option<(RegisterSnapshot, RegisterSnapshot)>;
    /// Data Fault Address Register, valid after a DABT.
    fn dfar(&self) -> u32;

    fn set_suspend_status(&self, tid: u32, code: u32) -> bool;
    fn query_suspend_status(&self, tid: u32) -> bool;
    fn suspend_process(&self, pid: u32, code: u32) -> bool;
    fn resume_process(&self, pid: u32) -> bool;

    /// Open Question (§9): whether the interrupted thread's saved PC needs rewinding after a
    /// SW-breakpoint restore is host-dependent. The core never guesses; it calls this and trusts
    /// the host to do the right thing (including nothing).
    fn rewind_pc(&self, tid: u32, pc: u32);

    /// Raise the event flag the UI worker waits on.
    fn signal_event(&self);
}

pub mod mock {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy)]
    struct Region {
        start: u32,
        end: u32,
        kind: RegionKind,
    }

    struct State {
        memory: BTreeMap<u32, u8>,
        regions: Vec<Region>,
        user_regs: RegisterSnapshot,
        kernel_regs: RegisterSnapshot,
        dfar: u32,
        pid: u32,
        tid: u32,
        suspended: Option<(u32, u32)>,
        event_flag: bool,
        hw: [(u32, u32); 6],
        watch: [(u32, u32); 6],
    }

    /// In-memory stand-in for a real ARMv7-A host: a flat byte space plus one thread's worth of
    /// register state. Exists only to exercise the core without real hardware.
    pub struct MockHost {
        state: Mutex<State>,
    }

    impl MockHost {
        pub fn new(pid: u32, tid: u32) -> Self {
            Self {
                state: Mutex::new(State {
                    memory: BTreeMap::new(),
                    regions: Vec::new(),
                    user_regs: RegisterSnapshot { regs: [0; 16], cpsr: Default::default() },
                    kernel_regs: RegisterSnapshot { regs: [0; 16], cpsr: Default::default() },
                    dfar: 0,
                    pid,
                    tid,
                    suspended: None,
                    event_flag: false,
                    hw: [(0, 0); 6],
                    watch: [(0, 0); 6],
                }),
            }
        }

        pub fn mark_region(&self, start: u32, end: u32, kind: RegionKind) {
            self.state.lock().unwrap().regions.push(Region { start, end, kind });
        }

        pub fn set_memory(&self, addr: u32, bytes: &[u8]) {
            let mut st = self.state.lock().unwrap();
            for (i, b) in bytes.iter().enumerate() {
                st.memory.insert(addr.wrapping_add(i as u32), *b);
            }
        }

        pub fn memory_at(&self, addr: u32, len: usize) -> Vec<u8> {
            let st = self.state.lock().unwrap();
            (0..len as u32).map(|i| *st.memory.get(&addr.wrapping_add(i)).unwrap_or(&0)).collect()
        }

        pub fn set_registers(&self, regs: RegisterSnapshot) {
            let mut st = self.state.lock().unwrap();
            st.user_regs = regs;
            st.kernel_regs = regs;
        }

        pub fn set_dfar(&self, addr: u32) {
            self.state.lock().unwrap().dfar = addr;
        }

        pub fn event_flag_set(&self) -> bool {
            self.state.lock().unwrap().event_flag
        }

        pub fn clear_event_flag(&self) {
            self.state.lock().unwrap().event_flag = false;
        }

        pub fn is_suspended(&self, tid: u32) -> bool {
            self.state.lock().unwrap().suspended.map(|(t, _)| t == tid).unwrap_or(false)
        }
    }

    impl HostBackend for MockHost {
        fn program_hw_break(&self, _pid: u32, slot: usize, addr: u32, control_word: u32) -> bool {
            let mut st = self.state.lock().unwrap();
            if slot >= st.hw.len() {
                return false;
            }
            st.hw[slot] = (addr, control_word);
            true
        }

        fn program_hw_watch(&self, _pid: u32, slot: usize, addr: u32, control_word: u32) -> bool {
            let mut st = self.state.lock().unwrap();
            if slot >= st.watch.len() {
                return false;
            }
            st.watch[slot] = (addr, control_word);
            true
        }

        fn read_memory(&self, _pid: u32, addr: u32, len: usize) -> Option<Vec<u8>> {
            Some(self.memory_at(addr, len))
        }

        fn write_data(&self, _pid: u32, addr: u32, bytes: &[u8]) -> bool {
            let st = self.state.lock().unwrap();
            let writable = st.regions.iter().any(|r| {
                addr >= r.start
                    && addr < r.end
                    && matches!(r.kind, RegionKind::Rw)
            });
            drop(st);
            if !writable && !self.state.lock().unwrap().regions.is_empty() {
                return false;
            }
            self.set_memory(addr, bytes);
            true
        }

        fn write_text(&self, _pid: u32, addr: u32, bytes: &[u8]) -> bool {
            self.set_memory(addr, bytes);
            true
        }

        fn classify(&self, _pid: u32, addr: u32) -> RegionKind {
            let st = self.state.lock().unwrap();
            st.regions
                .iter()
                .find(|r| addr >= r.start && addr < r.end)
                .map(|r| r.kind)
                .unwrap_or(RegionKind::Unknown)
        }

        fn faulting_thread_context(&self) -> (u32, u32) {
            let st = self.state.lock().unwrap();
            (st.pid, st.tid)
        }

        fn thread_registers(&self, _tid: u32) -> Option<(RegisterSnapshot, RegisterSnapshot)> {
            let st = self.state.lock().unwrap();
            Some((st.user_regs, st.kernel_regs))
        }

        fn dfar(&self) -> u32 {
            self.state.lock().unwrap().dfar
        }

        fn set_suspend_status(&self, tid: u32, code: u32) -> bool {
            let mut st = self.state.lock().unwrap();
            st.suspended = Some((tid, code));
            true
        }

        fn query_suspend_status(&self, tid: u32) -> bool {
            self.is_suspended(tid)
        }

        fn suspend_process(&self, _pid: u32, code: u32) -> bool {
            let mut st = self.state.lock().unwrap();
            let tid = st.tid;
            st.suspended = Some((tid, code));
            true
        }

        fn resume_process(&self, _pid: u32) -> bool {
            self.state.lock().unwrap().suspended = None;
            true
        }

        fn rewind_pc(&self, _tid: u32, pc: u32) {
            tracing::debug!(pc, "mock host: rewind_pc is a no-op (host-dependent, see DESIGN.md)");
        }

        fn signal_event(&self) {
            self.state.lock().unwrap().event_flag = true;
        }
    }
}
