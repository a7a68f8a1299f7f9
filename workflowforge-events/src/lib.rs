//! ABOUTME: Concurrent, panic-isolating implementation of workflowforge-core's event sinks
//! ABOUTME: Grounded on llmspell-events' `EventBus`, trimmed of storage/flow-control machinery

use dashmap::DashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use workflowforge_core::events::{
    CompensationCompleted, CompensationFailed, CompensationLifecycleSink, CompensationStarted,
    EventSink, OperationCompleted, OperationFailed, OperationLifecycleSink, OperationStarted,
    WorkflowCompleted, WorkflowFailed, WorkflowLifecycleSink, WorkflowStarted,
};

/// Opaque handle returned by `EventBus::subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A broadcast-style event bus: every subscriber receives every event. A subscriber that panics
/// while handling an event is isolated — the panic is caught, logged, and does not propagate to
/// the foundry/smith invoking the emit.
#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<u64, Arc<dyn EventSink>>,
    next_id: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.insert(id, sink);
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(&id.0);
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn dispatch(&self, label: &str, f: impl Fn(&Arc<dyn EventSink>)) {
        for entry in &self.subscribers {
            let sink = entry.value();
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(sink))) {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic with no message".to_string());
                tracing::error!(event = label, panic = %message, "event subscriber panicked");
            }
        }
    }
}

impl WorkflowLifecycleSink for EventBus {
    fn workflow_started(&self, event: WorkflowStarted) {
        self.dispatch("WorkflowStarted", |sink| sink.workflow_started(event.clone()));
    }

    fn workflow_completed(&self, event: WorkflowCompleted) {
        self.dispatch("WorkflowCompleted", |sink| sink.workflow_completed(event.clone()));
    }

    fn workflow_failed(&self, event: WorkflowFailed) {
        self.dispatch("WorkflowFailed", |sink| sink.workflow_failed(event.clone()));
    }
}

impl OperationLifecycleSink for EventBus {
    fn operation_started(&self, event: OperationStarted) {
        self.dispatch("OperationStarted", |sink| sink.operation_started(event.clone()));
    }

    fn operation_completed(&self, event: OperationCompleted) {
        self.dispatch("OperationCompleted", |sink| sink.operation_completed(event.clone()));
    }

    fn operation_failed(&self, event: OperationFailed) {
        self.dispatch("OperationFailed", |sink| sink.operation_failed(event.clone()));
    }
}

impl CompensationLifecycleSink for EventBus {
    fn compensation_started(&self, event: CompensationStarted) {
        self.dispatch("CompensationStarted", |sink| sink.compensation_started(event.clone()));
    }

    fn compensation_completed(&self, event: CompensationCompleted) {
        self.dispatch("CompensationCompleted", |sink| {
            sink.compensation_completed(event.clone());
        });
    }

    fn compensation_failed(&self, event: CompensationFailed) {
        self.dispatch("CompensationFailed", |sink| sink.compensation_failed(event.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use workflowforge_core::ids::ExecutionId;

    #[derive(Default)]
    struct Recorder {
        started: Mutex<Vec<String>>,
    }

    impl WorkflowLifecycleSink for Recorder {
        fn workflow_started(&self, event: WorkflowStarted) {
            self.started.lock().push(event.meta.workflow_name);
        }
        fn workflow_completed(&self, _event: WorkflowCompleted) {}
        fn workflow_failed(&self, _event: WorkflowFailed) {}
    }
    impl OperationLifecycleSink for Recorder {
        fn operation_started(&self, _event: OperationStarted) {}
        fn operation_completed(&self, _event: OperationCompleted) {}
        fn operation_failed(&self, _event: OperationFailed) {}
    }
    impl CompensationLifecycleSink for Recorder {
        fn compensation_started(&self, _event: CompensationStarted) {}
        fn compensation_completed(&self, _event: CompensationCompleted) {}
        fn compensation_failed(&self, _event: CompensationFailed) {}
    }

    struct Panics;
    impl WorkflowLifecycleSink for Panics {
        fn workflow_started(&self, _event: WorkflowStarted) {
            panic!("boom");
        }
        fn workflow_completed(&self, _event: WorkflowCompleted) {}
        fn workflow_failed(&self, _event: WorkflowFailed) {}
    }
    impl OperationLifecycleSink for Panics {
        fn operation_started(&self, _event: OperationStarted) {}
        fn operation_completed(&self, _event: OperationCompleted) {}
        fn operation_failed(&self, _event: OperationFailed) {}
    }
    impl CompensationLifecycleSink for Panics {
        fn compensation_started(&self, _event: CompensationStarted) {}
        fn compensation_completed(&self, _event: CompensationCompleted) {}
        fn compensation_failed(&self, _event: CompensationFailed) {}
    }

    #[test]
    fn every_subscriber_receives_the_event() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(recorder.clone());
        bus.workflow_started(WorkflowStarted {
            meta: workflowforge_core::events::EventMeta::new(ExecutionId::new(), "checkout"),
            workflow_id: ExecutionId::new(),
        });
        assert_eq!(recorder.started.lock().as_slice(), ["checkout"]);
    }

    #[test]
    fn a_panicking_subscriber_does_not_stop_the_others() {
        let bus = EventBus::new();
        bus.subscribe(Arc::new(Panics));
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(recorder.clone());
        bus.workflow_started(WorkflowStarted {
            meta: workflowforge_core::events::EventMeta::new(ExecutionId::new(), "w"),
            workflow_id: ExecutionId::new(),
        });
        assert_eq!(recorder.started.lock().len(), 1);
    }

    #[test]
    fn unsubscribe_stops_further_delivery() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let id = bus.subscribe(recorder.clone());
        bus.unsubscribe(id);
        bus.workflow_started(WorkflowStarted {
            meta: workflowforge_core::events::EventMeta::new(ExecutionId::new(), "w"),
            workflow_id: ExecutionId::new(),
        });
        assert!(recorder.started.lock().is_empty());
    }
}
