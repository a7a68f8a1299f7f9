//! ABOUTME: The persistence provider boundary (§6): save/try_load/delete, plus the optional
//! ABOUTME: recovery catalog for listing resumable executions across a shared store

use crate::snapshot::Snapshot;
use async_trait::async_trait;
use dashmap::DashMap;
use workflowforge_core::error::Result;
use workflowforge_core::ids::{ExecutionId, WorkflowId};

/// Durable storage for resume snapshots. Implementations are free to back this with a file,
/// database, or remote store; the engine only ever sees the three operations below.
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    async fn save(&self, snapshot: Snapshot) -> Result<()>;
    async fn try_load(&self, execution_id: ExecutionId, workflow_id: WorkflowId) -> Result<Option<Snapshot>>;
    async fn delete(&self, execution_id: ExecutionId, workflow_id: WorkflowId) -> Result<()>;
}

/// Enumerates snapshots across a shared store, independent of any one execution id. Optional —
/// a provider backed by per-key storage with no listing capability need not implement it.
#[async_trait]
pub trait RecoveryCatalog: Send + Sync {
    async fn list_pending(&self) -> Result<Vec<Snapshot>>;
}

/// A process-local provider, useful for tests and single-process deployments where durability
/// doesn't need to survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryPersistenceProvider {
    snapshots: DashMap<(ExecutionId, WorkflowId), Snapshot>,
}

impl InMemoryPersistenceProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceProvider for InMemoryPersistenceProvider {
    async fn save(&self, snapshot: Snapshot) -> Result<()> {
        self.snapshots
            .insert((snapshot.foundry_execution_id, snapshot.workflow_id), snapshot);
        Ok(())
    }

    async fn try_load(&self, execution_id: ExecutionId, workflow_id: WorkflowId) -> Result<Option<Snapshot>> {
        Ok(self
            .snapshots
            .get(&(execution_id, workflow_id))
            .map(|entry| entry.value().clone()))
    }

    async fn delete(&self, execution_id: ExecutionId, workflow_id: WorkflowId) -> Result<()> {
        self.snapshots.remove(&(execution_id, workflow_id));
        Ok(())
    }
}

#[async_trait]
impl RecoveryCatalog for InMemoryPersistenceProvider {
    async fn list_pending(&self) -> Result<Vec<Snapshot>> {
        Ok(self.snapshots.iter().map(|entry| entry.value().clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_snapshot() {
        let provider = InMemoryPersistenceProvider::new();
        let execution_id = ExecutionId::new();
        let workflow_id = WorkflowId::new();
        let snapshot = Snapshot::new(execution_id, workflow_id, "w", 2, Default::default());
        provider.save(snapshot).await.unwrap();

        let loaded = provider.try_load(execution_id, workflow_id).await.unwrap();
        assert_eq!(loaded.unwrap().next_operation_index, 2);
    }

    #[tokio::test]
    async fn delete_removes_the_snapshot() {
        let provider = InMemoryPersistenceProvider::new();
        let execution_id = ExecutionId::new();
        let workflow_id = WorkflowId::new();
        provider
            .save(Snapshot::new(execution_id, workflow_id, "w", 1, Default::default()))
            .await
            .unwrap();
        provider.delete(execution_id, workflow_id).await.unwrap();
        assert!(provider.try_load(execution_id, workflow_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_pending_enumerates_every_saved_snapshot() {
        let provider = InMemoryPersistenceProvider::new();
        provider
            .save(Snapshot::new(ExecutionId::new(), WorkflowId::new(), "a", 1, Default::default()))
            .await
            .unwrap();
        provider
            .save(Snapshot::new(ExecutionId::new(), WorkflowId::new(), "b", 1, Default::default()))
            .await
            .unwrap();
        assert_eq!(provider.list_pending().await.unwrap().len(), 2);
    }
}
