//! ABOUTME: Typed lifecycle event payloads and the abstract EventSink traits (§4.9)
//! ABOUTME: Kept dependency-free of the concrete bus crate, same split as llmspell-core's EventEmitter

use crate::ids::{ExecutionId, WorkflowId};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Fields common to every event payload.
#[derive(Debug, Clone)]
pub struct EventMeta {
    pub execution_id: ExecutionId,
    pub workflow_name: String,
    pub timestamp: DateTime<Utc>,
}

impl EventMeta {
    #[must_use]
    pub fn new(execution_id: ExecutionId, workflow_name: impl Into<String>) -> Self {
        Self {
            execution_id,
            workflow_name: workflow_name.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowStarted {
    pub meta: EventMeta,
    pub workflow_id: WorkflowId,
}

#[derive(Debug, Clone)]
pub struct WorkflowCompleted {
    pub meta: EventMeta,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct WorkflowFailed {
    pub meta: EventMeta,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct OperationStarted {
    pub meta: EventMeta,
    pub index: usize,
    pub operation_name: String,
}

#[derive(Debug, Clone)]
pub struct OperationCompleted {
    pub meta: EventMeta,
    pub index: usize,
    pub operation_name: String,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct OperationFailed {
    pub meta: EventMeta,
    pub index: usize,
    pub operation_name: String,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct CompensationStarted {
    pub meta: EventMeta,
    pub failed_at_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct CompensationCompleted {
    pub meta: EventMeta,
    pub compensated_count: usize,
}

#[derive(Debug, Clone)]
pub struct CompensationFailed {
    pub meta: EventMeta,
    pub index: usize,
    pub operation_name: String,
    pub error: String,
}

/// Emitted by the smith around one workflow execution.
pub trait WorkflowLifecycleSink: Send + Sync {
    fn workflow_started(&self, event: WorkflowStarted);
    fn workflow_completed(&self, event: WorkflowCompleted);
    fn workflow_failed(&self, event: WorkflowFailed);
}

/// Emitted by the foundry around each operation invocation.
pub trait OperationLifecycleSink: Send + Sync {
    fn operation_started(&self, event: OperationStarted);
    fn operation_completed(&self, event: OperationCompleted);
    fn operation_failed(&self, event: OperationFailed);
}

/// Emitted by the smith bracketing the reverse-order compensation traversal.
pub trait CompensationLifecycleSink: Send + Sync {
    fn compensation_started(&self, event: CompensationStarted);
    fn compensation_completed(&self, event: CompensationCompleted);
    fn compensation_failed(&self, event: CompensationFailed);
}

/// The full event surface a foundry/smith pair needs. A handler that panics must never be allowed
/// to fail the operation it's observing — implementations are responsible for isolating handler
/// panics (the built-in `EventBus` in `workflowforge-events` does this with `catch_unwind`).
pub trait EventSink:
    WorkflowLifecycleSink + OperationLifecycleSink + CompensationLifecycleSink
{
}

impl<T> EventSink for T where
    T: WorkflowLifecycleSink + OperationLifecycleSink + CompensationLifecycleSink
{
}

/// Runs `f`, converting any panic into an error-level log line rather than letting it propagate.
/// Used by `Foundry`/`Smith` around every sink dispatch so a panicking event handler can never
/// fail the operation or workflow it's merely observing.
pub(crate) fn isolate_handler(
    logger: &dyn crate::logger::Logger,
    event_name: &str,
    f: impl FnOnce(),
) {
    if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic with no message".to_string());
        logger.error(
            "event handler panicked; execution is unaffected",
            vec![("event", event_name.to_string()), ("panic", message)],
        );
    }
}

/// A sink that drops every event. Useful for tests and for callers with no observability needs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl WorkflowLifecycleSink for NullEventSink {
    fn workflow_started(&self, _event: WorkflowStarted) {}
    fn workflow_completed(&self, _event: WorkflowCompleted) {}
    fn workflow_failed(&self, _event: WorkflowFailed) {}
}

impl OperationLifecycleSink for NullEventSink {
    fn operation_started(&self, _event: OperationStarted) {}
    fn operation_completed(&self, _event: OperationCompleted) {}
    fn operation_failed(&self, _event: OperationFailed) {}
}

impl CompensationLifecycleSink for NullEventSink {
    fn compensation_started(&self, _event: CompensationStarted) {}
    fn compensation_completed(&self, _event: CompensationCompleted) {}
    fn compensation_failed(&self, _event: CompensationFailed) {}
}
