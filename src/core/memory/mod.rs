//! Target Memory Gateway (§4.3): the sole point where the core crosses into the target
//! process's address space. Everything else in the core treats target addresses as opaque
//! `u32` values.

use crate::core::error::{DebuggerError, DebuggerResult};
use crate::core::host::HostBackend;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Read-execute: code.
    Rx,
    /// Read-write: data.
    Rw,
    Other,
    Unknown,
}

/// Thin adapter over [`HostBackend`] memory primitives. Holds no target-process state of its
/// own; callers (the Manager, the Coordinator) are responsible for confirming the pid they pass
/// in is the attached target before calling through.
pub struct TargetMemoryGateway {
    host: Arc<dyn HostBackend>,
}

impl TargetMemoryGateway {
    pub fn new(host: Arc<dyn HostBackend>) -> Self {
        Self { host }
    }

    pub fn read(&self, pid: u32, addr: u32, len: usize) -> DebuggerResult<Vec<u8>> {
        self.host
            .read_memory(pid, addr, len)
            .ok_or(DebuggerError::MemRead { address: addr })
    }

    pub fn write_data(&self, pid: u32, addr: u32, bytes: &[u8]) -> DebuggerResult<()> {
        if self.host.write_data(pid, addr, bytes) {
            Ok(())
        } else {
            Err(DebuggerError::MemWrite { address: addr })
        }
    }

    pub fn write_text(&self, pid: u32, addr: u32, bytes: &[u8]) -> DebuggerResult<()> {
        if self.host.write_text(pid, addr, bytes) {
            Ok(())
        } else {
            Err(DebuggerError::MemWrite { address: addr })
        }
    }

    pub fn classify(&self, pid: u32, addr: u32) -> RegionKind {
        self.host.classify(pid, addr)
    }

    /// Convenience wrapper over `read`, used by the call-stack unwinder.
    pub fn read_target_word(&self, pid: u32, addr: u32) -> DebuggerResult<u32> {
        let bytes = self.read(pid, addr, 4)?;
        Ok(u32::from_le_bytes(bytes.try_into().map_err(|_| DebuggerError::MemRead { address: addr })?))
    }
}
