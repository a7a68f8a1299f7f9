//! ABOUTME: Persistence middleware (§4.6): skips already-completed operations on resume and
//! ABOUTME: snapshots progress after each successful step

use crate::provider::PersistenceProvider;
use crate::snapshot::Snapshot;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use workflowforge_core::error::Result;
use workflowforge_core::foundry::Foundry;
use workflowforge_core::middleware::{Next, OperationMiddleware};
use workflowforge_core::operation::Operation;
use workflowforge_core::property_bag::keys;

/// Wraps each operation invocation with resume-skip-and-snapshot behavior (§4.6 steps 1-4).
/// Register on the foundry created for a resumable execution — typically via
/// [`crate::recovery::RecoveryCoordinator`], which also seeds the property bag from the loaded
/// snapshot so skipped steps can return their stored output.
pub struct PersistenceMiddleware {
    provider: Arc<dyn PersistenceProvider>,
    /// Fallback index when `Operation.CurrentOperationIndex` is somehow absent — the foundry
    /// always sets it before running the chain, so this only guards against a bare `Next` call
    /// constructed outside the normal foundry pipeline.
    fallback_index: AtomicUsize,
}

impl PersistenceMiddleware {
    #[must_use]
    pub fn new(provider: Arc<dyn PersistenceProvider>) -> Self {
        Self {
            provider,
            fallback_index: AtomicUsize::new(0),
        }
    }

    fn current_index(&self, foundry: &Foundry) -> usize {
        foundry
            .properties()
            .get_raw(keys::CURRENT_OPERATION_INDEX)
            .and_then(|v| v.as_u64())
            .map_or_else(|| self.fallback_index.fetch_add(1, Ordering::SeqCst), |i| i as usize)
    }
}

#[async_trait]
impl OperationMiddleware for PersistenceMiddleware {
    async fn handle(
        &self,
        operation: &dyn Operation,
        foundry: &Foundry,
        input: Value,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let index = self.current_index(foundry);
        let name = operation.name().to_string();
        let execution_id = foundry.execution_id();
        let workflow_id = foundry.workflow_id();

        let existing = self.provider.try_load(execution_id, workflow_id).await?;

        if let Some(snapshot) = &existing {
            if index < snapshot.next_operation_index {
                return Ok(foundry
                    .get_operation_output(index, &name)
                    .unwrap_or(input));
            }
        }

        let output = next.call(cancel).await?;

        let workflow_name = foundry
            .current_workflow()
            .map_or_else(|| existing.as_ref().map_or_else(String::new, |s| s.workflow_name.clone()), |w| w.name().to_string());
        let snapshot = Snapshot::new(
            execution_id,
            workflow_id,
            workflow_name,
            index + 1,
            foundry.properties().snapshot(),
        );
        self.provider.save(snapshot).await?;

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryPersistenceProvider;
    use async_trait::async_trait as at;
    use serde_json::json;
    use workflowforge_core::ids::OperationId;
    use workflowforge_core::smith::Smith;
    use workflowforge_core::workflow::Workflow;

    struct CountsCalls {
        name: &'static str,
        calls: Arc<AtomicUsize>,
    }
    #[at]
    impl Operation for CountsCalls {
        fn id(&self) -> OperationId {
            OperationId::new()
        }
        fn name(&self) -> &str {
            self.name
        }
        async fn forge(&self, _input: Value, _foundry: &Foundry, _cancel: CancellationToken) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!(self.name))
        }
    }

    #[tokio::test]
    async fn fresh_run_persists_after_each_step() {
        let provider: Arc<dyn PersistenceProvider> = Arc::new(InMemoryPersistenceProvider::new());
        let smith = Smith::builder().build();
        let workflow = Workflow::builder("w")
            .with_stable_id("persist-fresh")
            .add_operation(Arc::new(CountsCalls {
                name: "a",
                calls: Arc::new(AtomicUsize::new(0)),
            }))
            .build()
            .unwrap();

        let foundry = smith.create_foundry_for(&workflow).unwrap();
        foundry.add_middleware(Arc::new(PersistenceMiddleware::new(Arc::clone(&provider)))).unwrap();
        smith
            .forge_with_foundry(workflow.clone(), foundry.clone(), CancellationToken::new())
            .await
            .unwrap();

        let snapshot = provider
            .try_load(foundry.execution_id(), workflow.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.next_operation_index, 1);
    }

    #[tokio::test]
    async fn resume_skips_completed_steps_and_returns_stored_output() {
        let provider: Arc<dyn PersistenceProvider> = Arc::new(InMemoryPersistenceProvider::new());
        let smith = Smith::builder().build();
        let calls_a = Arc::new(AtomicUsize::new(0));
        let calls_b = Arc::new(AtomicUsize::new(0));
        let workflow = Workflow::builder("w")
            .with_stable_id("persist-resume")
            .add_operation(Arc::new(CountsCalls { name: "a", calls: Arc::clone(&calls_a) }))
            .add_operation(Arc::new(CountsCalls { name: "b", calls: Arc::clone(&calls_b) }))
            .build()
            .unwrap();

        let execution_id = workflowforge_core::ids::ExecutionId::from_name("persist-resume-instance");
        let foundry = smith.create_foundry_with_execution_id(execution_id, Default::default());
        foundry.attach_workflow(workflow.clone()).unwrap();
        foundry.add_middleware(Arc::new(PersistenceMiddleware::new(Arc::clone(&provider)))).unwrap();
        smith
            .forge_with_foundry(workflow.clone(), foundry, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(calls_a.load(Ordering::SeqCst), 1);
        assert_eq!(calls_b.load(Ordering::SeqCst), 1);

        // simulate a fresh process: new foundry, same execution/workflow id, properties restored.
        let snapshot = provider.try_load(execution_id, workflow.id()).await.unwrap().unwrap();
        let resumed_foundry = smith.create_foundry_with_execution_id(execution_id, snapshot.properties);
        resumed_foundry.attach_workflow(workflow.clone()).unwrap();
        resumed_foundry
            .add_middleware(Arc::new(PersistenceMiddleware::new(Arc::clone(&provider))))
            .unwrap();
        smith
            .forge_with_foundry(workflow, resumed_foundry, CancellationToken::new())
            .await
            .unwrap();

        // neither operation re-ran: nextOperationIndex (2) already covers both indices.
        assert_eq!(calls_a.load(Ordering::SeqCst), 1);
        assert_eq!(calls_b.load(Ordering::SeqCst), 1);
    }
}
