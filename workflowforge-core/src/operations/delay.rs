//! ABOUTME: DelayOperation (§4.2): suspends for a fixed duration, honoring cancellation

use crate::error::{Result, WorkflowForgeError};
use crate::foundry::Foundry;
use crate::ids::OperationId;
use crate::operation::Operation;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sleeps for a fixed duration, passing its input through unchanged. A cancellation observed
/// during the sleep ends the delay early with `Cancelled` rather than completing it.
pub struct DelayOperation {
    id: OperationId,
    name: String,
    duration: Duration,
}

impl DelayOperation {
    #[must_use]
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: OperationId::new(),
            name: name.into(),
            duration,
        }
    }
}

#[async_trait]
impl Operation for DelayOperation {
    fn id(&self) -> OperationId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn forge(&self, input: Value, _foundry: &Foundry, cancel: CancellationToken) -> Result<Value> {
        tokio::select! {
            () = tokio::time::sleep(self.duration) => Ok(input),
            () = cancel.cancelled() => Err(WorkflowForgeError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn sleeps_then_returns_input() {
        let op = DelayOperation::new("pause", Duration::from_millis(1));
        let foundry = Foundry::builder().build();
        let out = op
            .forge(json!("ok"), foundry.as_ref(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, json!("ok"));
    }

    #[tokio::test]
    async fn cancellation_ends_the_delay_early() {
        let op = DelayOperation::new("pause", Duration::from_secs(10));
        let foundry = Foundry::builder().build();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = op.forge(json!("ok"), foundry.as_ref(), cancel).await;
        assert!(matches!(result, Err(WorkflowForgeError::Cancelled)));
    }
}
