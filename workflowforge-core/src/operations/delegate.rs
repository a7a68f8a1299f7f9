//! ABOUTME: DelegateOperation (§4.2): a user-supplied forward closure plus an optional restore
//! ABOUTME: closure. Also backs `WorkflowBuilder::add_operation_with_restore`, which wraps an
//! ABOUTME: existing operation's forward step with an inline restore.

use crate::error::Result;
use crate::foundry::Foundry;
use crate::ids::OperationId;
use crate::operation::Operation;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type ForgeFn = Arc<dyn for<'a> Fn(Value, &'a Foundry, CancellationToken) -> BoxFuture<'a, Result<Value>> + Send + Sync>;
type RestoreFn = Arc<dyn for<'a> Fn(Value, &'a Foundry, CancellationToken) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// An operation defined by closures rather than a dedicated type. Useful for one-off steps in a
/// workflow that don't warrant their own `Operation` impl.
pub struct DelegateOperation {
    id: OperationId,
    name: String,
    forge: ForgeFn,
    restore: Option<RestoreFn>,
}

impl DelegateOperation {
    pub fn new<F>(name: impl Into<String>, forge: F) -> Self
    where
        F: for<'a> Fn(Value, &'a Foundry, CancellationToken) -> BoxFuture<'a, Result<Value>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: OperationId::new(),
            name: name.into(),
            forge: Arc::new(forge),
            restore: None,
        }
    }

    #[must_use]
    pub fn with_restore<R>(mut self, restore: R) -> Self
    where
        R: for<'a> Fn(Value, &'a Foundry, CancellationToken) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.restore = Some(Arc::new(restore));
        self
    }

    /// Wraps an existing operation, keeping its forward step but overriding `restore` with
    /// `restore`. This is how `addOperation(op, restore)` is realized in §4.1.
    #[must_use]
    pub fn wrapping<R>(operation: Arc<dyn Operation>, restore: R) -> Self
    where
        R: for<'a> Fn(Value, &'a Foundry, CancellationToken) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        let name = operation.name().to_string();
        let id = operation.id();
        let inner = Arc::clone(&operation);
        Self {
            id,
            name,
            forge: Arc::new(move |input, foundry, cancel| {
                let inner = Arc::clone(&inner);
                Box::pin(async move { inner.forge(input, foundry, cancel).await })
            }),
            restore: Some(Arc::new(restore)),
        }
    }
}

#[async_trait]
impl Operation for DelegateOperation {
    fn id(&self) -> OperationId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn forge(&self, input: Value, foundry: &Foundry, cancel: CancellationToken) -> Result<Value> {
        (self.forge)(input, foundry, cancel).await
    }

    async fn restore(&self, output: Value, foundry: &Foundry, cancel: CancellationToken) -> Result<()> {
        match &self.restore {
            Some(restore) => restore(output, foundry, cancel).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn forge_runs_the_closure() {
        let op = DelegateOperation::new("double", |input, _foundry, _cancel| {
            Box::pin(async move { Ok(json!(input.as_i64().unwrap_or(0) * 2)) })
        });
        let foundry = Foundry::builder().build();
        let out = op.forge(json!(4), foundry.as_ref(), CancellationToken::new()).await.unwrap();
        assert_eq!(out, json!(8));
    }

    #[tokio::test]
    async fn restore_defaults_to_noop() {
        let op = DelegateOperation::new("x", |input, _foundry, _cancel| {
            Box::pin(async move { Ok(input) })
        });
        let foundry = Foundry::builder().build();
        op.restore(json!(null), foundry.as_ref(), CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn with_restore_runs_the_supplied_closure() {
        let foundry = Foundry::builder().build();
        let op = DelegateOperation::new("x", |input, _foundry, _cancel| {
            Box::pin(async move { Ok(input) })
        })
        .with_restore(|_output, foundry, _cancel| {
            Box::pin(async move {
                foundry.properties().set_raw("restored", json!(true));
                Ok(())
            })
        });
        op.restore(json!(null), foundry.as_ref(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(foundry.properties().get_raw("restored"), Some(json!(true)));
    }
}
