//! ABOUTME: Smith, the orchestrator (§4.4): workflow-level middleware, the saga compensation
//! ABOUTME: protocol, workflow lifecycle events, and a smith-wide concurrency limiter.

use crate::error::{Result, WorkflowForgeError};
use crate::events::{
    isolate_handler, EventMeta, EventSink, NullEventSink, WorkflowCompleted, WorkflowFailed,
    WorkflowStarted, CompensationCompleted, CompensationFailed, CompensationStarted,
};
use crate::foundry::{Foundry, FoundryOptions};
use crate::logger::{Logger, NullLogger};
use crate::middleware::{WorkflowMiddleware, WorkflowNext};
use crate::service_locator::{NullServiceLocator, ServiceLocator};
use crate::snapshot::SnapshotCleanup;
use crate::workflow::Workflow;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Options recognized by a `Smith` (§6 configuration table). `continueOnError` and
/// `enableOutputChaining` also live in §6 but are per-foundry concerns — their one authoritative
/// home is `FoundryOptions`, set via `SmithBuilder::foundry_options`.
#[derive(Debug, Clone)]
pub struct SmithOptions {
    /// If false, `forgeAsync` becomes a no-op that only fires `WorkflowStarted`/`WorkflowCompleted`.
    pub enabled: bool,
    pub fail_fast_compensation: bool,
    pub throw_on_compensation_error: bool,
    /// Smith-wide cap on concurrent workflow executions. `None` means unbounded.
    pub max_concurrency: Option<usize>,
}

impl Default for SmithOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_fast_compensation: false,
            throw_on_compensation_error: false,
            max_concurrency: None,
        }
    }
}

/// The orchestrator: owns workflow-level middleware, drives a workflow through a foundry, and
/// implements the saga compensation protocol on failure. Reusable and safe for concurrent
/// `forge` calls, bounded by its own concurrency limiter.
pub struct Smith {
    options: SmithOptions,
    workflow_middlewares: RwLock<Vec<Arc<dyn WorkflowMiddleware>>>,
    logger: Arc<dyn Logger>,
    service_locator: Arc<dyn ServiceLocator>,
    events: RwLock<Arc<dyn EventSink>>,
    foundry_options: FoundryOptions,
    snapshot_cleanup: Option<Arc<dyn SnapshotCleanup>>,
    semaphore: Arc<Semaphore>,
    disposed: AtomicBool,
}

impl Smith {
    #[must_use]
    pub fn builder() -> SmithBuilder {
        SmithBuilder::default()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn add_workflow_middleware(&self, middleware: Arc<dyn WorkflowMiddleware>) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(WorkflowForgeError::Disposed);
        }
        self.workflow_middlewares.write().push(middleware);
        Ok(())
    }

    /// Assembles a `FoundryBuilder` pre-wired with this smith's logger/locator/events/options, the
    /// common base every `create_foundry*` variant starts from.
    fn foundry_builder(&self) -> crate::foundry::FoundryBuilder {
        let mut builder = Foundry::builder()
            .logger(Arc::clone(&self.logger))
            .service_locator(Arc::clone(&self.service_locator))
            .events(self.events.read().clone())
            .options(self.foundry_options.clone());
        if let Some(cleanup) = &self.snapshot_cleanup {
            builder = builder.snapshot_cleanup(Arc::clone(cleanup));
        }
        builder
    }

    #[must_use]
    pub fn create_foundry(&self) -> Arc<Foundry> {
        self.foundry_builder().build()
    }

    pub fn create_foundry_for(&self, workflow: &Workflow) -> Result<Arc<Foundry>> {
        let foundry = self.create_foundry();
        foundry.attach_workflow(workflow.clone())?;
        Ok(foundry)
    }

    #[must_use]
    pub fn create_foundry_with_data(&self, initial_properties: HashMap<String, Value>) -> Arc<Foundry> {
        self.foundry_builder()
            .initial_properties(initial_properties)
            .build()
    }

    /// Like `create_foundry_with_data`, but overrides the execution id — the `instanceId`
    /// key-stability option (§4.6) a resume caller uses to address a specific durable instance.
    #[must_use]
    pub fn create_foundry_with_execution_id(
        &self,
        execution_id: crate::ids::ExecutionId,
        initial_properties: HashMap<String, Value>,
    ) -> Arc<Foundry> {
        self.foundry_builder()
            .execution_id(execution_id)
            .initial_properties(initial_properties)
            .build()
    }

    fn event_meta(&self, execution_id: crate::ids::ExecutionId, workflow_name: &str) -> EventMeta {
        EventMeta::new(execution_id, workflow_name.to_string())
    }

    /// Forges `workflow` against a freshly created foundry.
    pub async fn forge(&self, workflow: Workflow, cancel: CancellationToken) -> Result<Value> {
        let foundry = self.create_foundry_for(&workflow)?;
        self.forge_with_foundry(workflow, foundry, cancel).await
    }

    /// Forges `workflow` against a foundry whose property bag starts from `initial_properties`.
    pub async fn forge_with_properties(
        &self,
        workflow: Workflow,
        initial_properties: HashMap<String, Value>,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let foundry = self.create_foundry_with_data(initial_properties);
        foundry.attach_workflow(workflow.clone())?;
        self.forge_with_foundry(workflow, foundry, cancel).await
    }

    /// Forges `workflow` against a caller-supplied foundry. The foundry must not be frozen; it is
    /// attached to `workflow` if not already.
    pub async fn forge_with_foundry(
        &self,
        workflow: Workflow,
        foundry: Arc<Foundry>,
        cancel: CancellationToken,
    ) -> Result<Value> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(WorkflowForgeError::Disposed);
        }
        if foundry.is_frozen() {
            return Err(WorkflowForgeError::invalid_state(
                "cannot forge a workflow against a foundry that is already executing",
            ));
        }
        if foundry.current_workflow().map(|w| w.id()) != Some(workflow.id()) {
            foundry.attach_workflow(workflow.clone())?;
        }

        // step 1: defensive copy of options, so a concurrent mutation (if a setter is ever added)
        // never changes behavior mid-run.
        let options = self.options.clone();

        if !options.enabled {
            let execution_id = foundry.execution_id();
            let meta = self.event_meta(execution_id, workflow.name());
            self.emit_workflow_started(&meta, workflow.id());
            self.emit_workflow_completed(&meta, std::time::Duration::ZERO);
            return Ok(Value::Null);
        }

        // step 2: acquire a concurrency permit. Held until this call returns; drop releases it
        // even if the smith is disposed concurrently (tokio permits never panic on release).
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkflowForgeError::Disposed)?;

        let execution_id = foundry.execution_id();
        let workflow_id = workflow.id();
        let meta = self.event_meta(execution_id, workflow.name());

        // step 3
        self.emit_workflow_started(&meta, workflow_id);

        let started_at = Instant::now();
        let middlewares = self.workflow_middlewares.read().clone();
        let foundry_for_terminal = Arc::clone(&foundry);
        let terminal = move |cancel: CancellationToken| {
            let foundry_for_terminal = Arc::clone(&foundry_for_terminal);
            Box::pin(async move { foundry_for_terminal.forge(cancel).await })
                as futures::future::BoxFuture<'_, Result<Value>>
        };

        // step 4: workflow-middleware chain, innermost runs the operation loop exactly as §4.3.
        let result = WorkflowNext::new(&middlewares, &workflow, foundry.as_ref(), &terminal)
            .call(cancel)
            .await;

        match result {
            Ok(output) => {
                // step 5
                self.emit_workflow_completed(&meta, started_at.elapsed());
                if let Some(cleanup) = foundry.snapshot_cleanup() {
                    if let Err(error) = cleanup.delete_snapshot(execution_id, workflow_id).await {
                        self.logger.warn(
                            "failed to delete persistence snapshot after a successful run",
                            vec![("error", error.to_string())],
                        );
                    }
                }
                Ok(output)
            }
            Err(error) => {
                // step 6: compensation
                self.emit_workflow_failed(&meta, &error);
                let compensation_result = self
                    .compensate(&foundry, &meta, options.fail_fast_compensation, cancel)
                    .await;

                match (options.throw_on_compensation_error, compensation_result) {
                    (true, Err(compensation_error)) => Err(compensation_error),
                    _ => Err(error),
                }
            }
        }
    }

    async fn compensate(
        &self,
        foundry: &Arc<Foundry>,
        meta: &EventMeta,
        fail_fast: bool,
        cancel: CancellationToken,
    ) -> Result<()> {
        let completed = foundry.completed_steps();
        self.emit_compensation_started(meta, completed.last().map(|s| s.index));

        let mut errors = Vec::new();
        let mut compensated = 0usize;
        for step in completed.iter().rev() {
            let restore_result = step
                .operation
                .restore(step.output.clone(), foundry.as_ref(), cancel.clone())
                .await;
            match restore_result {
                Ok(()) => compensated += 1,
                Err(error) => {
                    self.emit_compensation_failed(meta, step.index, step.operation.name(), &error);
                    errors.push(error);
                    if fail_fast {
                        break;
                    }
                }
            }
        }

        self.emit_compensation_completed(meta, compensated);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WorkflowForgeError::aggregate(errors))
        }
    }

    fn emit_workflow_started(&self, meta: &EventMeta, workflow_id: crate::ids::WorkflowId) {
        let sink = self.events.read().clone();
        isolate_handler(self.logger.as_ref(), "WorkflowStarted", || {
            sink.workflow_started(WorkflowStarted {
                meta: meta.clone(),
                workflow_id,
            });
        });
    }

    fn emit_workflow_completed(&self, meta: &EventMeta, duration: std::time::Duration) {
        let sink = self.events.read().clone();
        isolate_handler(self.logger.as_ref(), "WorkflowCompleted", || {
            sink.workflow_completed(WorkflowCompleted {
                meta: meta.clone(),
                duration,
            });
        });
    }

    fn emit_workflow_failed(&self, meta: &EventMeta, error: &WorkflowForgeError) {
        let sink = self.events.read().clone();
        let message = error.to_string();
        isolate_handler(self.logger.as_ref(), "WorkflowFailed", || {
            sink.workflow_failed(WorkflowFailed {
                meta: meta.clone(),
                error: message.clone(),
            });
        });
    }

    fn emit_compensation_started(&self, meta: &EventMeta, failed_at_index: Option<usize>) {
        let sink = self.events.read().clone();
        isolate_handler(self.logger.as_ref(), "CompensationStarted", || {
            sink.compensation_started(CompensationStarted {
                meta: meta.clone(),
                failed_at_index,
            });
        });
    }

    fn emit_compensation_completed(&self, meta: &EventMeta, compensated_count: usize) {
        let sink = self.events.read().clone();
        isolate_handler(self.logger.as_ref(), "CompensationCompleted", || {
            sink.compensation_completed(CompensationCompleted {
                meta: meta.clone(),
                compensated_count,
            });
        });
    }

    fn emit_compensation_failed(&self, meta: &EventMeta, index: usize, name: &str, error: &WorkflowForgeError) {
        let sink = self.events.read().clone();
        let message = error.to_string();
        isolate_handler(self.logger.as_ref(), "CompensationFailed", || {
            sink.compensation_failed(CompensationFailed {
                meta: meta.clone(),
                index,
                operation_name: name.to_string(),
                error: message.clone(),
            });
        });
    }

    /// Idempotent. Clears workflow middleware and replaces the event sink with a no-op.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.workflow_middlewares.write().clear();
        *self.events.write() = Arc::new(NullEventSink);
    }
}

/// Builder for `Smith`.
pub struct SmithBuilder {
    options: SmithOptions,
    logger: Option<Arc<dyn Logger>>,
    service_locator: Option<Arc<dyn ServiceLocator>>,
    events: Option<Arc<dyn EventSink>>,
    foundry_options: FoundryOptions,
    snapshot_cleanup: Option<Arc<dyn SnapshotCleanup>>,
}

impl Default for SmithBuilder {
    fn default() -> Self {
        Self {
            options: SmithOptions::default(),
            logger: None,
            service_locator: None,
            events: None,
            foundry_options: FoundryOptions::default(),
            snapshot_cleanup: None,
        }
    }
}

impl SmithBuilder {
    #[must_use]
    pub fn options(mut self, options: SmithOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    #[must_use]
    pub fn service_locator(mut self, service_locator: Arc<dyn ServiceLocator>) -> Self {
        self.service_locator = Some(service_locator);
        self
    }

    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn foundry_options(mut self, options: FoundryOptions) -> Self {
        self.foundry_options = options;
        self
    }

    #[must_use]
    pub fn snapshot_cleanup(mut self, cleanup: Arc<dyn SnapshotCleanup>) -> Self {
        self.snapshot_cleanup = Some(cleanup);
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<Smith> {
        let permits = self.options.max_concurrency.unwrap_or(Semaphore::MAX_PERMITS);
        Arc::new(Smith {
            options: self.options,
            workflow_middlewares: RwLock::new(Vec::new()),
            logger: self.logger.unwrap_or_else(|| Arc::new(NullLogger)),
            service_locator: self.service_locator.unwrap_or_else(|| Arc::new(NullServiceLocator)),
            events: RwLock::new(self.events.unwrap_or_else(|| Arc::new(NullEventSink))),
            foundry_options: self.foundry_options,
            snapshot_cleanup: self.snapshot_cleanup,
            semaphore: Arc::new(Semaphore::new(permits)),
            disposed: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::OperationId;
    use crate::operation::Operation;
    use async_trait::async_trait;
    use serde_json::json;

    struct SetsProperty(&'static str, i64);
    #[async_trait]
    impl Operation for SetsProperty {
        fn id(&self) -> OperationId {
            OperationId::new()
        }
        fn name(&self) -> &str {
            self.0
        }
        async fn forge(&self, _input: Value, foundry: &Foundry, _cancel: CancellationToken) -> Result<Value> {
            foundry.properties().set_raw(self.0, json!(self.1));
            Ok(json!(self.1))
        }
    }

    struct RecordsRestore(&'static str);
    #[async_trait]
    impl Operation for RecordsRestore {
        fn id(&self) -> OperationId {
            OperationId::new()
        }
        fn name(&self) -> &str {
            self.0
        }
        async fn forge(&self, input: Value, _foundry: &Foundry, _cancel: CancellationToken) -> Result<Value> {
            Ok(input)
        }
        async fn restore(&self, _output: Value, foundry: &Foundry, _cancel: CancellationToken) -> Result<()> {
            foundry
                .properties()
                .set_raw(format!("{}.restored", self.0), json!(true));
            Ok(())
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl Operation for AlwaysFails {
        fn id(&self) -> OperationId {
            OperationId::new()
        }
        fn name(&self) -> &str {
            "fail"
        }
        async fn forge(&self, _input: Value, _foundry: &Foundry, _cancel: CancellationToken) -> Result<Value> {
            Err(WorkflowForgeError::validation("boom"))
        }
    }

    #[tokio::test]
    async fn happy_path_returns_final_output() {
        let smith = Smith::builder().build();
        let workflow = Workflow::builder("w")
            .add_operation(Arc::new(SetsProperty("a", 1)))
            .add_operation(Arc::new(SetsProperty("b", 2)))
            .build()
            .unwrap();
        let output = smith.forge(workflow, CancellationToken::new()).await.unwrap();
        assert_eq!(output, json!(2));
    }

    #[tokio::test]
    async fn failure_triggers_reverse_order_compensation() {
        let smith = Smith::builder().build();
        let workflow = Workflow::builder("w")
            .add_operation(Arc::new(RecordsRestore("a")))
            .add_operation(Arc::new(RecordsRestore("b")))
            .add_operation(Arc::new(AlwaysFails))
            .build()
            .unwrap();
        let result = smith.forge(workflow, CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn disabled_smith_is_a_noop() {
        let smith = Smith::builder()
            .options(SmithOptions {
                enabled: false,
                ..SmithOptions::default()
            })
            .build();
        let workflow = Workflow::builder("w")
            .add_operation(Arc::new(AlwaysFails))
            .build()
            .unwrap();
        let output = smith.forge(workflow, CancellationToken::new()).await.unwrap();
        assert_eq!(output, Value::Null);
    }
}
