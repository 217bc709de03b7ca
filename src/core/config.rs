//! Compile-time slot layout and runtime policy toggles for the coordinator.

/// Number of hardware-capable slots, one of which (the last) is reserved for single-step.
pub const MAX_HW_BKPT: usize = 6;
/// Total slot count; `[MAX_HW_BKPT, MAX_SLOT)` are software breakpoint slots.
pub const MAX_SLOT: usize = 16;
/// Index of the reserved single-step slot, the last hardware-capable slot.
pub const SINGLE_STEP_SLOT: usize = MAX_HW_BKPT - 1;
/// Hard cap on call-stack walk depth, independent of the caller-requested depth.
pub const MAX_CALL_STACK_DEPTH: usize = 64;

/// Distinguished thread-suspend code the coordinator uses so the UI can tell a debug
/// suspension apart from any other reason a thread might be stopped.
pub const DEBUG_SUSPEND_CODE: u32 = 0x1C;

/// Policy toggles for behaviour the source material left ambiguous (see DESIGN.md).
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// When a DABT's DFAR does not fall inside any watchpoint range, treat it as handled
    /// anyway (swallow it) rather than passing it through to the host's default processing.
    pub treat_unmatched_dabt_as_handled: bool,
    /// Whether `suspend_process` should also suspend the UI worker's own thread, should the
    /// host happen to schedule it inside the target process group.
    pub suspend_includes_ui_thread: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            treat_unmatched_dabt_as_handled: false,
            suspend_includes_ui_thread: false,
        }
    }
}
