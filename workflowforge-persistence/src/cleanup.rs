//! ABOUTME: Bridges a `PersistenceProvider` onto core's abstract `SnapshotCleanup` seam so a
//! ABOUTME: `Smith`/`Foundry` can delete the resume snapshot on success (§4.4 step 5) without
//! ABOUTME: depending on this crate directly.

use crate::provider::PersistenceProvider;
use async_trait::async_trait;
use std::sync::Arc;
use workflowforge_core::error::Result;
use workflowforge_core::ids::{ExecutionId, WorkflowId};
use workflowforge_core::snapshot::SnapshotCleanup;

pub struct ProviderSnapshotCleanup {
    provider: Arc<dyn PersistenceProvider>,
}

impl ProviderSnapshotCleanup {
    #[must_use]
    pub fn new(provider: Arc<dyn PersistenceProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl SnapshotCleanup for ProviderSnapshotCleanup {
    async fn delete_snapshot(&self, execution_id: ExecutionId, workflow_id: WorkflowId) -> Result<()> {
        self.provider.delete(execution_id, workflow_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryPersistenceProvider;
    use crate::snapshot::Snapshot;

    #[tokio::test]
    async fn delegates_delete_to_the_provider() {
        let provider = Arc::new(InMemoryPersistenceProvider::new());
        let execution_id = ExecutionId::new();
        let workflow_id = WorkflowId::new();
        provider
            .save(Snapshot::new(execution_id, workflow_id, "w", 1, Default::default()))
            .await
            .unwrap();

        let cleanup = ProviderSnapshotCleanup::new(provider.clone());
        cleanup.delete_snapshot(execution_id, workflow_id).await.unwrap();

        assert!(provider.try_load(execution_id, workflow_id).await.unwrap().is_none());
    }
}
