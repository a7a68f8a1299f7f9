//! ABOUTME: Operation timeout middleware (§4.8): deadline around `next`, cancels and fails with
//! ABOUTME: `Timeout` on expiry, propagating the cancellation both through the token and a
//! ABOUTME: reserved property so operations can observe it without depending on the token.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use workflowforge_core::error::{Result, WorkflowForgeError};
use workflowforge_core::foundry::Foundry;
use workflowforge_core::middleware::{Next, OperationMiddleware};
use workflowforge_core::operation::Operation;
use workflowforge_core::property_bag::keys;

/// Wraps the remaining operation-middleware chain in a deadline. On expiry, cancels the
/// downstream cancellation token, sets `Operation.TimedOut`, and fails with `Timeout`.
#[derive(Debug, Clone, Copy)]
pub struct OperationTimeoutMiddleware {
    duration: Duration,
}

impl OperationTimeoutMiddleware {
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl OperationMiddleware for OperationTimeoutMiddleware {
    async fn handle(
        &self,
        _operation: &dyn Operation,
        foundry: &Foundry,
        _input: Value,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let child = cancel.child_token();
        match tokio::time::timeout(self.duration, next.call(child.clone())).await {
            Ok(result) => result,
            Err(_) => {
                child.cancel();
                foundry
                    .properties()
                    .set_raw(keys::OPERATION_TIMED_OUT, json!(true));
                Err(WorkflowForgeError::Timeout { duration: self.duration })
            }
        }
    }
}
