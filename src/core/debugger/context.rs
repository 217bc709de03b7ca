//! The single debugger-context object (§9 "Global mutable state → scoped"): replaces the
//! source's `g_target_process`, `g_active_slot[]` and `current_registers` globals with one
//! mutex-guarded struct shared between the Manager and the Coordinator.

use crate::core::cpu::registers::RegisterSnapshot;
use crate::core::debugger::table::BreakpointTable;
use crate::core::target::TargetProcess;
use std::sync::Mutex;

pub struct DebuggerState {
    pub target: TargetProcess,
    pub table: BreakpointTable,
    pub last_registers: Option<RegisterSnapshot>,
}

impl DebuggerState {
    fn new() -> Self {
        Self { target: TargetProcess::default(), table: BreakpointTable::new(), last_registers: None }
    }
}

/// Owns the one process-level mutex (§5) that the UI worker and lifecycle callbacks acquire.
///
/// Per the implementation note in SPEC_FULL.md §5, the exception-context entry point also
/// acquires this mutex rather than reading around it — a deliberate simplification from the
/// literal "exception context never locks" wording, safe in a single-CPU demo harness that never
/// calls `handle_exception` concurrently with a Manager mutation. See DESIGN.md.
pub struct DebuggerContext {
    inner: Mutex<DebuggerState>,
}

impl DebuggerContext {
    pub fn new() -> Self {
        Self { inner: Mutex::new(DebuggerState::new()) }
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut DebuggerState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap();
        f(&mut guard)
    }
}

impl Default for DebuggerContext {
    fn default() -> Self {
        Self::new()
    }
}
