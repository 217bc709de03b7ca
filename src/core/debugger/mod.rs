//! Breakpoint Table, Manager and Exception Coordinator (§4.2, §4.4, §4.5), wired together
//! behind one shared [`context::DebuggerContext`].

pub mod context;
pub mod coordinator;
pub mod manager;
pub mod table;

use crate::core::config::CoordinatorConfig;
use crate::core::host::HostBackend;
use context::DebuggerContext;
use coordinator::ExceptionCoordinator;
use manager::BreakpointManager;
use std::sync::Arc;

/// Convenience bundle: a Manager and a Coordinator sharing one context and host. Process
/// lifecycle hooks live on the Manager (§4.6) since they reuse its table-teardown and gateway
/// access; the Coordinator is reserved for the three synchronous-exception entry points.
pub struct Debugger {
    pub manager: BreakpointManager,
    pub coordinator: ExceptionCoordinator,
}

impl Debugger {
    pub fn new(host: Arc<dyn HostBackend>, config: CoordinatorConfig) -> Self {
        let ctx = Arc::new(DebuggerContext::new());
        let manager = BreakpointManager::new(ctx.clone(), host.clone(), config);
        let coordinator = ExceptionCoordinator::new(ctx, host, config);
        Self { manager, coordinator }
    }
}
