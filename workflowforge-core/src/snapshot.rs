//! ABOUTME: Abstract seam for deleting a completed workflow's persistence snapshot (§4.4 step 5)
//! ABOUTME: Kept dependency-free of the concrete persistence provider, same split as `EventSink`

use crate::error::Result;
use crate::ids::{ExecutionId, WorkflowId};
use async_trait::async_trait;

/// Deletes the resume snapshot for one `(executionId, workflowId)` pair. `Smith` calls this after
/// a successful `forgeAsync` if one was registered on the foundry; the concrete implementation
/// (backed by a `PersistenceProvider`) lives in `workflowforge-persistence`.
#[async_trait]
pub trait SnapshotCleanup: Send + Sync {
    async fn delete_snapshot(&self, execution_id: ExecutionId, workflow_id: WorkflowId) -> Result<()>;
}

/// The default when no persistence provider is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSnapshotCleanup;

#[async_trait]
impl SnapshotCleanup for NullSnapshotCleanup {
    async fn delete_snapshot(&self, _execution_id: ExecutionId, _workflow_id: WorkflowId) -> Result<()> {
        Ok(())
    }
}
