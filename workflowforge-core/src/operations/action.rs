//! ABOUTME: ActionOperation (§4.2): a side-effecting closure that passes its input through unchanged

use crate::error::Result;
use crate::foundry::Foundry;
use crate::ids::OperationId;
use crate::operation::Operation;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type ActionFn = Arc<dyn for<'a> Fn(&'a Value, &'a Foundry, CancellationToken) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Runs a side effect (a log line, a metric bump, a notification) without transforming the data
/// flowing through the workflow. `restore` is a no-op unless one is supplied.
pub struct ActionOperation {
    id: OperationId,
    name: String,
    action: ActionFn,
}

impl ActionOperation {
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: for<'a> Fn(&'a Value, &'a Foundry, CancellationToken) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id: OperationId::new(),
            name: name.into(),
            action: Arc::new(action),
        }
    }
}

#[async_trait]
impl Operation for ActionOperation {
    fn id(&self) -> OperationId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn forge(&self, input: Value, foundry: &Foundry, cancel: CancellationToken) -> Result<Value> {
        (self.action)(&input, foundry, cancel).await?;
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn passes_input_through_unchanged() {
        let op = ActionOperation::new("notify", |_input, foundry, _cancel| {
            Box::pin(async move {
                foundry.properties().set_raw("notified", json!(true));
                Ok(())
            })
        });
        let foundry = Foundry::builder().build();
        let out = op
            .forge(json!("payload"), foundry.as_ref(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, json!("payload"));
        assert_eq!(foundry.properties().get_raw("notified"), Some(json!(true)));
    }
}
