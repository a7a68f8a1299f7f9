//! ABOUTME: The resume marker (§3, §4.6): opaque to the engine beyond these required fields

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use workflowforge_core::ids::{ExecutionId, WorkflowId};

/// Written by the persistence middleware after each successful step, deleted on workflow
/// completion. `next_operation_index` is the authoritative resume point: operations with
/// `index < next_operation_index` are skipped on replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub foundry_execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub workflow_name: String,
    pub next_operation_index: usize,
    pub properties: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    #[must_use]
    pub fn new(
        foundry_execution_id: ExecutionId,
        workflow_id: WorkflowId,
        workflow_name: impl Into<String>,
        next_operation_index: usize,
        properties: HashMap<String, Value>,
    ) -> Self {
        Self {
            foundry_execution_id,
            workflow_id,
            workflow_name: workflow_name.into(),
            next_operation_index,
            properties,
            created_at: Utc::now(),
        }
    }
}
