use thiserror::Error;

/// Semantic error kinds returned by every public [`crate::core::debugger::manager::BreakpointManager`]
/// operation. The Exception Coordinator never propagates these: it logs and reports the
/// exception as unhandled instead, so a fault always falls back to the host's default processing.
#[derive(Debug, Error)]
pub enum DebuggerError {
    /// The operation requires an attached target process and none is attached.
    #[error("no target process is attached")]
    NoTarget,
    /// The relevant half of the breakpoint table (hardware or software) is full.
    #[error("no free slot available")]
    NoSlot,
    /// Caller-supplied value is out of range: an unknown slot index, watchpoint kind, or a
    /// zero-length memory request.
    #[error("bad argument: {0}")]
    BadArg(&'static str),
    /// The memory gateway refused or truncated a read.
    #[error("memory read failed at {address:#010x}")]
    MemRead { address: u32 },
    /// The memory gateway refused or truncated a write.
    #[error("memory write failed at {address:#010x}")]
    MemWrite { address: u32 },
    /// The host refused a privileged operation (debug-register programming, suspend).
    #[error("host rejected privileged operation")]
    KernelReject,
    /// The operation requires a debugger-suspended thread and there is none.
    #[error("no thread is currently suspended by the debugger")]
    NotSuspended,
    /// The Instruction Predictor could not determine `next_pc`; callers treat this as a safe
    /// fall-through rather than a hard failure.
    #[error("next pc could not be predicted statically")]
    PredictorUnknown,
}

pub type DebuggerResult<T> = Result<T, DebuggerError>;
