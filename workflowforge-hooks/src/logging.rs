//! ABOUTME: Logging middleware (§4.8): structured begin/end/fail logs via the foundry's logger

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use workflowforge_core::error::Result;
use workflowforge_core::foundry::Foundry;
use workflowforge_core::middleware::{Next, OperationMiddleware};
use workflowforge_core::operation::Operation;

/// Logs a begin/end (or begin/fail) pair around each operation invocation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

#[async_trait]
impl OperationMiddleware for LoggingMiddleware {
    async fn handle(
        &self,
        operation: &dyn Operation,
        foundry: &Foundry,
        input: Value,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let name = operation.name().to_string();
        foundry
            .logger()
            .debug("operation starting", vec![("operation", name.clone())]);

        match next.call(cancel).await {
            Ok(output) => {
                foundry
                    .logger()
                    .debug("operation completed", vec![("operation", name)]);
                Ok(output)
            }
            Err(error) => {
                foundry.logger().warn(
                    "operation failed",
                    vec![("operation", name), ("error", error.to_string())],
                );
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use serde_json::json;
    use workflowforge_core::ids::OperationId;

    struct Echo;
    #[async_trait]
    impl Operation for Echo {
        fn id(&self) -> OperationId {
            OperationId::new()
        }
        fn name(&self) -> &str {
            "echo"
        }
        async fn forge(&self, input: Value, _foundry: &Foundry, _cancel: CancellationToken) -> Result<Value> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn passes_through_output_unchanged() {
        let foundry = Foundry::builder().build();
        let op: Arc<dyn Operation> = Arc::new(Echo);
        let middlewares: Vec<Arc<dyn OperationMiddleware>> = vec![Arc::new(LoggingMiddleware)];
        let output = workflowforge_core::middleware::run_operation_chain(
            &middlewares,
            &op,
            foundry.as_ref(),
            json!("hi"),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(output, json!("hi"));
    }
}
