//! ABOUTME: The Workflow blueprint (§4.1): an ordered, named, immutable-once-built operation list
//! ABOUTME: plus the fluent WorkflowBuilder used to assemble one

use crate::error::{Result, WorkflowForgeError};
use crate::foundry::Foundry;
use crate::ids::WorkflowId;
use crate::operation::Operation;
use crate::operations::delegate::DelegateOperation;
use crate::operations::parallel::ParallelOperation;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct WorkflowInner {
    id: WorkflowId,
    name: String,
    description: Option<String>,
    version: Option<String>,
    operations: Vec<Arc<dyn Operation>>,
}

/// An immutable, named sequence of operations. Cheap to clone — the operation list is shared via
/// `Arc`, so handing a `Workflow` to a `Smith` or attaching it to a `Foundry` never deep-copies it.
#[derive(Clone)]
pub struct Workflow {
    inner: Arc<WorkflowInner>,
}

impl Workflow {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(name)
    }

    #[must_use]
    pub fn id(&self) -> WorkflowId {
        self.inner.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.inner.version.as_deref()
    }

    #[must_use]
    pub fn operations(&self) -> &[Arc<dyn Operation>] {
        &self.inner.operations
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.operations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.operations.is_empty()
    }
}

/// Fluent assembly for a `Workflow`. Duplicate operation instances are permitted (DESIGN.md Open
/// Question #1) — the foundry keys output storage by `(index, name)`, not instance identity, so
/// adding the same `Arc<dyn Operation>` twice is safe.
pub struct WorkflowBuilder {
    id: WorkflowId,
    name: String,
    description: Option<String>,
    version: Option<String>,
    operations: Vec<Arc<dyn Operation>>,
}

impl WorkflowBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            description: None,
            version: None,
            operations: Vec::new(),
        }
    }

    /// Derives a stable id from `key`, so the same logical workflow always gets the same
    /// `WorkflowId` across processes — the persistence module relies on this for resume.
    #[must_use]
    pub fn with_stable_id(mut self, key: &str) -> Self {
        self.id = WorkflowId::from_name(key);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn add_operation(mut self, operation: Arc<dyn Operation>) -> Self {
        self.operations.push(operation);
        self
    }

    /// Adds `operation`, keeping its forward step but overriding `restore` with the given closure
    /// — the `addOperation(op, restore?)` inline-restore overload from §4.1.
    #[must_use]
    pub fn add_operation_with_restore<R>(mut self, operation: Arc<dyn Operation>, restore: R) -> Self
    where
        R: for<'a> Fn(Value, &'a Foundry, CancellationToken) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.operations.push(Arc::new(DelegateOperation::wrapping(operation, restore)));
        self
    }

    #[must_use]
    pub fn add_operations(mut self, operations: impl IntoIterator<Item = Arc<dyn Operation>>) -> Self {
        self.operations.extend(operations);
        self
    }

    /// Adds a fan-out step: the given operations run concurrently as a single step in the
    /// workflow's sequence, see §4.5. `timeout`, if set, bounds the whole fan-out the same way
    /// `ParallelOperation::with_timeout` does.
    #[must_use]
    pub fn add_parallel_operations(
        mut self,
        name: impl Into<String>,
        operations: impl IntoIterator<Item = Arc<dyn Operation>>,
        max_concurrency: Option<usize>,
        timeout: Option<Duration>,
    ) -> Self {
        let mut parallel = ParallelOperation::new(name, operations.into_iter().collect(), max_concurrency);
        if let Some(timeout) = timeout {
            parallel = parallel.with_timeout(timeout);
        }
        self.operations.push(Arc::new(parallel));
        self
    }

    pub fn build(self) -> Result<Workflow> {
        if self.name.trim().is_empty() {
            return Err(WorkflowForgeError::validation(
                "a workflow must have a non-empty name",
            ));
        }
        Ok(Workflow {
            inner: Arc::new(WorkflowInner {
                id: self.id,
                name: self.name,
                description: self.description,
                version: self.version,
                operations: self.operations,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Noop;
    #[async_trait]
    impl Operation for Noop {
        fn id(&self) -> crate::ids::OperationId {
            crate::ids::OperationId::new()
        }
        fn name(&self) -> &str {
            "noop"
        }
        async fn forge(&self, input: Value, _foundry: &Foundry, _cancel: CancellationToken) -> Result<Value> {
            Ok(input)
        }
    }

    #[test]
    fn empty_name_is_rejected() {
        let result = Workflow::builder("   ").build();
        assert!(result.is_err());
    }

    #[test]
    fn stable_id_is_deterministic() {
        let a = Workflow::builder("checkout").with_stable_id("checkout-v1").build().unwrap();
        let b = Workflow::builder("checkout").with_stable_id("checkout-v1").build().unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn duplicate_instances_are_allowed() {
        let op: Arc<dyn Operation> = Arc::new(Noop);
        let workflow = Workflow::builder("dup")
            .add_operation(op.clone())
            .add_operation(op)
            .build()
            .unwrap();
        assert_eq!(workflow.len(), 2);
    }

    #[tokio::test]
    async fn add_operation_with_restore_overrides_restore_only() {
        let workflow = Workflow::builder("w")
            .add_operation_with_restore(Arc::new(Noop), |_output, foundry, _cancel| {
                Box::pin(async move {
                    foundry.properties().set_raw("noop.restored", Value::Bool(true));
                    Ok(())
                })
            })
            .build()
            .unwrap();

        let foundry = Foundry::builder().build();
        let operation = &workflow.operations()[0];
        let output = operation
            .forge(Value::String("in".into()), foundry.as_ref(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, Value::String("in".into()));

        operation
            .restore(output, foundry.as_ref(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            foundry.properties().get_raw("noop.restored"),
            Some(Value::Bool(true))
        );
    }

    #[tokio::test]
    async fn add_parallel_operations_applies_the_given_timeout() {
        let workflow = Workflow::builder("w")
            .add_parallel_operations(
                "fan-out",
                vec![Arc::new(Noop) as Arc<dyn Operation>],
                Some(2),
                Some(std::time::Duration::from_millis(50)),
            )
            .build()
            .unwrap();
        assert_eq!(workflow.len(), 1);
        assert_eq!(workflow.operations()[0].name(), "fan-out");
    }

    #[test]
    fn clone_is_cheap_and_shares_state() {
        let workflow = Workflow::builder("w").build().unwrap();
        let clone = workflow.clone();
        assert_eq!(workflow.id(), clone.id());
    }
}
