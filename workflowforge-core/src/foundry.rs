//! ABOUTME: Foundry, the per-run execution context: property bag, logger, locator, operation list,
//! ABOUTME: middleware list, and the operation-by-operation pipeline (§4.3)

use crate::error::{Result, WorkflowForgeError};
use crate::events::{
    isolate_handler, EventMeta, EventSink, NullEventSink, OperationCompleted, OperationFailed,
    OperationStarted,
};
use crate::ids::{ExecutionId, OperationId, WorkflowId};
use crate::logger::{Logger, NullLogger};
use crate::middleware::{run_operation_chain, OperationMiddleware};
use crate::operation::Operation;
use crate::property_bag::{keys, PropertyBag};
use crate::service_locator::{NullServiceLocator, ServiceLocator};
use crate::snapshot::SnapshotCleanup;
use crate::workflow::Workflow;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Options controlling how a foundry drives its operation list.
#[derive(Debug, Clone)]
pub struct FoundryOptions {
    /// On operation failure, record the error and continue; at the end, throw an aggregate.
    pub continue_on_error: bool,
    /// If true (default), each operation receives the previous operation's output as input.
    pub enable_output_chaining: bool,
}

impl Default for FoundryOptions {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            enable_output_chaining: true,
        }
    }
}

/// One completed forward step, recorded in completion order so a `Smith` can compensate in
/// reverse without relying on operation instance identity.
#[derive(Clone)]
pub struct CompletedStep {
    pub index: usize,
    pub operation: Arc<dyn Operation>,
    pub output: Value,
}

/// The per-execution context: property bag, logger, service locator, ordered operation list,
/// operation-middleware pipeline, and the operation lifecycle event channel.
///
/// Not safe for concurrent `forge` calls on the same instance — the freeze flag rejects concurrent
/// mutation of the operation/middleware lists, but concurrent *execution* is undefined behavior
/// the caller must avoid (§5).
pub struct Foundry {
    execution_id: ExecutionId,
    workflow_id: RwLock<WorkflowId>,
    current_workflow: RwLock<Option<Workflow>>,
    properties: PropertyBag,
    logger: Arc<dyn Logger>,
    service_locator: Arc<dyn ServiceLocator>,
    events: RwLock<Arc<dyn EventSink>>,
    operations: RwLock<Vec<Arc<dyn Operation>>>,
    middlewares: RwLock<Vec<Arc<dyn OperationMiddleware>>>,
    options: FoundryOptions,
    frozen: AtomicBool,
    disposed: AtomicBool,
    completed_steps: Mutex<Vec<CompletedStep>>,
    snapshot_cleanup: Option<Arc<dyn SnapshotCleanup>>,
}

impl Foundry {
    #[must_use]
    pub fn builder() -> FoundryBuilder {
        FoundryBuilder::default()
    }

    #[must_use]
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    #[must_use]
    pub fn workflow_id(&self) -> WorkflowId {
        *self.workflow_id.read()
    }

    #[must_use]
    pub fn current_workflow(&self) -> Option<Workflow> {
        self.current_workflow.read().clone()
    }

    #[must_use]
    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    #[must_use]
    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    #[must_use]
    pub fn service_provider(&self) -> &Arc<dyn ServiceLocator> {
        &self.service_locator
    }

    #[must_use]
    pub fn options(&self) -> &FoundryOptions {
        &self.options
    }

    #[must_use]
    pub fn snapshot_cleanup(&self) -> Option<&Arc<dyn SnapshotCleanup>> {
        self.snapshot_cleanup.as_ref()
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn guard_mutation(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(WorkflowForgeError::Disposed);
        }
        if self.frozen.load(Ordering::SeqCst) {
            return Err(WorkflowForgeError::invalid_state(
                "cannot mutate a foundry while it is frozen for a forge call",
            ));
        }
        Ok(())
    }

    pub fn add_operation(&self, operation: Arc<dyn Operation>) -> Result<()> {
        self.guard_mutation()?;
        self.operations.write().push(operation);
        Ok(())
    }

    /// Replaces the operation list. Clears every `Operation.*` reserved property key (see
    /// DESIGN.md Open Question #2) so a reused foundry doesn't leak a prior run's indices/outputs
    /// forward into the new operation list.
    pub fn replace_operations(&self, operations: Vec<Arc<dyn Operation>>) -> Result<()> {
        self.guard_mutation()?;
        *self.operations.write() = operations;
        self.properties.clear_reserved();
        self.completed_steps.lock().clear();
        Ok(())
    }

    pub fn add_middleware(&self, middleware: Arc<dyn OperationMiddleware>) -> Result<()> {
        self.guard_mutation()?;
        self.middlewares.write().push(middleware);
        Ok(())
    }

    pub fn add_middlewares(&self, middlewares: Vec<Arc<dyn OperationMiddleware>>) -> Result<()> {
        self.guard_mutation()?;
        self.middlewares.write().extend(middlewares);
        Ok(())
    }

    pub fn remove_middleware(&self, middleware: &Arc<dyn OperationMiddleware>) -> Result<()> {
        self.guard_mutation()?;
        self.middlewares
            .write()
            .retain(|existing| !Arc::ptr_eq(existing, middleware));
        Ok(())
    }

    /// Binds a workflow to this foundry: seeds the operation list from it and records its id/name.
    /// Called by `Smith` before driving a workflow, or directly by a caller using `Foundry::forge`
    /// without a smith.
    pub fn attach_workflow(&self, workflow: Workflow) -> Result<()> {
        self.guard_mutation()?;
        self.properties
            .set_raw(keys::WORKFLOW_NAME, json!(workflow.name()));
        *self.workflow_id.write() = workflow.id();
        *self.operations.write() = workflow.operations().to_vec();
        *self.current_workflow.write() = Some(workflow);
        Ok(())
    }

    #[must_use]
    pub fn get_operation_output(&self, index: usize, name: &str) -> Option<Value> {
        self.properties.get_raw(&keys::operation_output(index, name))
    }

    pub(crate) fn store_operation_output(&self, index: usize, name: &str, value: &Value) {
        self.properties
            .set_raw(keys::operation_output(index, name), value.clone());
    }

    /// Forward-completion order, oldest first. Used by `Smith` to compensate in reverse.
    #[must_use]
    pub fn completed_steps(&self) -> Vec<CompletedStep> {
        self.completed_steps.lock().clone()
    }

    fn workflow_name(&self) -> String {
        self.properties
            .get_raw(keys::WORKFLOW_NAME)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default()
    }

    fn event_meta(&self) -> EventMeta {
        EventMeta::new(self.execution_id, self.workflow_name())
    }

    /// Executes a single operation through the middleware pipeline, handling the bookkeeping
    /// §4.3 step 4 requires: `CurrentOperationIndex`, started/completed/failed events, output
    /// storage, and `LastCompleted*` tracking. Shared by `Foundry::forge` and by `Smith`'s own
    /// operation-by-operation loop.
    pub async fn execute_operation(
        self: &Arc<Self>,
        index: usize,
        operation: Arc<dyn Operation>,
        input: Value,
        cancel: CancellationToken,
    ) -> Result<Value> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(WorkflowForgeError::Disposed);
        }

        self.properties
            .set_raw(keys::CURRENT_OPERATION_INDEX, json!(index));

        let name = operation.name().to_string();
        self.emit_operation_started(index, &name);

        let middlewares = self.middlewares.read().clone();
        let started_at = Instant::now();
        let result =
            run_operation_chain(&middlewares, &operation, self.as_ref(), input, cancel).await;

        match result {
            Ok(output) => {
                self.store_operation_output(index, &name, &output);
                self.properties
                    .set_raw(keys::LAST_COMPLETED_INDEX, json!(index));
                self.properties
                    .set_raw(keys::LAST_COMPLETED_NAME, json!(name));
                self.completed_steps.lock().push(CompletedStep {
                    index,
                    operation,
                    output: output.clone(),
                });
                self.emit_operation_completed(index, &name, started_at.elapsed());
                Ok(output)
            }
            Err(error) => {
                self.emit_operation_failed(index, &name, &error);
                Err(error)
            }
        }
    }

    fn emit_operation_started(&self, index: usize, name: &str) {
        let meta = self.event_meta();
        let sink = self.events.read().clone();
        isolate_handler(self.logger.as_ref(), "OperationStarted", || {
            sink.operation_started(OperationStarted {
                meta: meta.clone(),
                index,
                operation_name: name.to_string(),
            });
        });
    }

    fn emit_operation_completed(&self, index: usize, name: &str, duration: std::time::Duration) {
        let meta = self.event_meta();
        let sink = self.events.read().clone();
        isolate_handler(self.logger.as_ref(), "OperationCompleted", || {
            sink.operation_completed(OperationCompleted {
                meta: meta.clone(),
                index,
                operation_name: name.to_string(),
                duration,
            });
        });
    }

    fn emit_operation_failed(&self, index: usize, name: &str, error: &WorkflowForgeError) {
        let meta = self.event_meta();
        let sink = self.events.read().clone();
        let message = error.to_string();
        isolate_handler(self.logger.as_ref(), "OperationFailed", || {
            sink.operation_failed(OperationFailed {
                meta: meta.clone(),
                index,
                operation_name: name.to_string(),
                error: message.clone(),
            });
        });
    }

    /// Drives the operation list directly, with no smith involved (§4.3 bullet 4). Freezes the
    /// pipeline for the duration of the call. Does **not** perform compensation on failure — that
    /// is the saga protocol, owned by `Smith`; a bare foundry forge just propagates the failure
    /// (wrapped as an `Operation` error) or the `Aggregate` from `continueOnError`.
    pub async fn forge(self: &Arc<Self>, cancel: CancellationToken) -> Result<Value> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(WorkflowForgeError::Disposed);
        }
        self.frozen.store(true, Ordering::SeqCst);
        let result = self.run_operations(cancel).await;
        self.frozen.store(false, Ordering::SeqCst);
        result
    }

    pub(crate) async fn run_operations(self: &Arc<Self>, cancel: CancellationToken) -> Result<Value> {
        let operations = self.operations.read().clone();
        let execution_id = self.execution_id;
        let workflow_id = self.workflow_id();
        let mut input = Value::Null;
        let mut errors = Vec::new();

        for (index, operation) in operations.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(WorkflowForgeError::Cancelled);
            }

            let name = operation.name().to_string();
            match self
                .execute_operation(index, operation, input.clone(), cancel.clone())
                .await
            {
                Ok(output) => {
                    input = if self.options.enable_output_chaining {
                        output
                    } else {
                        Value::Null
                    };
                }
                Err(error) => {
                    let wrapped = error.into_operation_error(execution_id, workflow_id, name);
                    if self.options.continue_on_error {
                        errors.push(wrapped);
                        input = Value::Null;
                    } else {
                        return Err(wrapped);
                    }
                }
            }

            if cancel.is_cancelled() {
                return Err(WorkflowForgeError::Cancelled);
            }
        }

        if errors.is_empty() {
            Ok(input)
        } else {
            Err(WorkflowForgeError::aggregate(errors))
        }
    }

    /// Idempotent. Releases the operation/middleware lists and replaces the event sink with a
    /// no-op, so a forgotten `Arc<Foundry>` can't keep an `EventBus`'s subscribers alive.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.operations.write().clear();
        self.middlewares.write().clear();
        *self.events.write() = Arc::new(NullEventSink);
    }
}

/// Builder for `Foundry`.
#[derive(Default)]
pub struct FoundryBuilder {
    execution_id: Option<ExecutionId>,
    logger: Option<Arc<dyn Logger>>,
    service_locator: Option<Arc<dyn ServiceLocator>>,
    events: Option<Arc<dyn EventSink>>,
    options: FoundryOptions,
    initial_properties: HashMap<String, Value>,
    snapshot_cleanup: Option<Arc<dyn SnapshotCleanup>>,
}

impl FoundryBuilder {
    #[must_use]
    pub fn execution_id(mut self, execution_id: ExecutionId) -> Self {
        self.execution_id = Some(execution_id);
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
    pub fn options(mut self, options: FoundryOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn initial_properties(mut self, properties: HashMap<String, Value>) -> Self {
        self.initial_properties = properties;
        self
    }

    #[must_use]
    pub fn snapshot_cleanup(mut self, cleanup: Arc<dyn SnapshotCleanup>) -> Self {
        self.snapshot_cleanup = Some(cleanup);
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<Foundry> {
        let execution_id = self.execution_id.unwrap_or_default();
        Arc::new(Foundry {
            execution_id,
            workflow_id: RwLock::new(WorkflowId::new()),
            current_workflow: RwLock::new(None),
            properties: PropertyBag::with_initial(self.initial_properties),
            logger: self.logger.unwrap_or_else(|| Arc::new(NullLogger)),
            service_locator: self
                .service_locator
                .unwrap_or_else(|| Arc::new(NullServiceLocator)),
            events: RwLock::new(self.events.unwrap_or_else(|| Arc::new(NullEventSink))),
            operations: RwLock::new(Vec::new()),
            middlewares: RwLock::new(Vec::new()),
            options: self.options,
            frozen: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            completed_steps: Mutex::new(Vec::new()),
            snapshot_cleanup: self.snapshot_cleanup,
        })
    }
}
