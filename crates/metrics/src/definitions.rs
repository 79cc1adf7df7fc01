//! Metric name and label definitions.
//!
//! Centralized so that dashboards and the code emitting the numbers agree.

/// Dispatcher metrics
pub mod routing {
    /// Inbound messages by dispatch path (`continuation`, `awaited`, `routed`, `unknown`)
    pub const MESSAGES_TOTAL: &str = "parley_routing_messages_total";
    /// Messages rejected before dispatch (missing `type`/`from`)
    pub const REJECTED_TOTAL: &str = "parley_routing_rejected_total";
    /// Handler tasks spawned
    pub const TASKS_SPAWNED_TOTAL: &str = "parley_routing_tasks_spawned_total";
    /// Handler tasks that returned an error or panicked
    pub const TASK_FAILURES_TOTAL: &str = "parley_routing_task_failures_total";
    /// Handler task duration in seconds
    pub const TASK_DURATION_SECONDS: &str = "parley_routing_task_duration_seconds";
    /// Named-handler continuations engaged
    pub const CONTINUATIONS_ENGAGED_TOTAL: &str = "parley_routing_continuations_engaged_total";
}

/// One-shot wait metrics
pub mod waiters {
    /// Waits registered
    pub const REGISTERED_TOTAL: &str = "parley_waiters_registered_total";
    /// Waits fulfilled by an inbound message
    pub const RESOLVED_TOTAL: &str = "parley_waiters_resolved_total";
    /// Waits that hit their deadline
    pub const TIMED_OUT_TOTAL: &str = "parley_waiters_timed_out_total";
    /// Number of currently pending waits
    pub const PENDING: &str = "parley_waiters_pending";
}

/// Context store metrics
pub mod context {
    /// Store operations by operation and backend
    pub const OPERATIONS_TOTAL: &str = "parley_context_operations_total";
    /// Store operation errors by operation and backend
    pub const ERRORS_TOTAL: &str = "parley_context_errors_total";
}

/// Common label keys used across metrics
pub mod labels {
    pub const PATH: &str = "path";
    pub const HANDLER: &str = "handler";
    pub const OPERATION: &str = "operation";
    pub const BACKEND: &str = "backend";
}
