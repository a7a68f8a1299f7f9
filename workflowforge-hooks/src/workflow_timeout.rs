//! ABOUTME: Workflow timeout middleware (§4.8): deadline around the whole workflow iteration,
//! ABOUTME: mirroring `OperationTimeoutMiddleware` one level up the Russian-doll chain.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use workflowforge_core::error::{Result, WorkflowForgeError};
use workflowforge_core::foundry::Foundry;
use workflowforge_core::middleware::{WorkflowMiddleware, WorkflowNext};
use workflowforge_core::property_bag::keys;
use workflowforge_core::workflow::Workflow;

/// Wraps the remaining workflow-middleware chain (and, ultimately, the whole operation
/// iteration) in a deadline. On expiry, cancels downstream work, sets `Workflow.TimedOut`, and
/// fails the forge with `Timeout`.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowTimeoutMiddleware {
    duration: Duration,
}

impl WorkflowTimeoutMiddleware {
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl WorkflowMiddleware for WorkflowTimeoutMiddleware {
    async fn handle(
        &self,
        _workflow: &Workflow,
        foundry: &Foundry,
        next: WorkflowNext<'_>,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let child = cancel.child_token();
        match tokio::time::timeout(self.duration, next.call(child.clone())).await {
            Ok(result) => result,
            Err(_) => {
                child.cancel();
                foundry
                    .properties()
                    .set_raw(keys::WORKFLOW_TIMED_OUT, json!(true));
                Err(WorkflowForgeError::Timeout { duration: self.duration })
            }
        }
    }
}
