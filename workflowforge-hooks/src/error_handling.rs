//! ABOUTME: Error handling middleware (§4.8): records error properties, optionally swallows

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use workflowforge_core::error::Result;
use workflowforge_core::foundry::Foundry;
use workflowforge_core::middleware::{Next, OperationMiddleware};
use workflowforge_core::operation::Operation;
use workflowforge_core::property_bag::keys;

/// Catches a failing operation, records `Error.Message`/`Error.StackTrace` in the property bag,
/// and either rethrows (default) or swallows the error and returns `Value::Null`.
#[derive(Debug, Clone, Copy)]
pub struct ErrorHandlingMiddleware {
    swallow: bool,
}

impl Default for ErrorHandlingMiddleware {
    fn default() -> Self {
        Self { swallow: false }
    }
}

impl ErrorHandlingMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn swallowing() -> Self {
        Self { swallow: true }
    }
}

#[async_trait]
impl OperationMiddleware for ErrorHandlingMiddleware {
    async fn handle(
        &self,
        _operation: &dyn Operation,
        foundry: &Foundry,
        _input: Value,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<Value> {
        match next.call(cancel).await {
            Ok(output) => Ok(output),
            Err(error) => {
                foundry
                    .properties()
                    .set_raw(keys::ERROR_MESSAGE, json!(error.to_string()));
                foundry
                    .properties()
                    .set_raw(keys::ERROR_STACK_TRACE, json!(format!("{error:?}")));
                if self.swallow {
                    Ok(Value::Null)
                } else {
                    Err(error)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use workflowforge_core::error::WorkflowForgeError;
    use workflowforge_core::ids::OperationId;

    struct AlwaysFails;
    #[async_trait]
    impl Operation for AlwaysFails {
        fn id(&self) -> OperationId {
            OperationId::new()
        }
        fn name(&self) -> &str {
            "fail"
        }
        async fn forge(&self, _input: Value, _foundry: &Foundry, _cancel: CancellationToken) -> Result<Value> {
            Err(WorkflowForgeError::validation("boom"))
        }
    }

    #[tokio::test]
    async fn records_error_properties_and_rethrows_by_default() {
        let foundry = Foundry::builder().build();
        let op: Arc<dyn Operation> = Arc::new(AlwaysFails);
        let middlewares: Vec<Arc<dyn OperationMiddleware>> = vec![Arc::new(ErrorHandlingMiddleware::new())];
        let result = workflowforge_core::middleware::run_operation_chain(
            &middlewares,
            &op,
            foundry.as_ref(),
            Value::Null,
            CancellationToken::new(),
        )
        .await;
        assert!(result.is_err());
        assert!(foundry.properties().get_raw(keys::ERROR_MESSAGE).is_some());
    }

    #[tokio::test]
    async fn swallowing_variant_returns_null_instead_of_propagating() {
        let foundry = Foundry::builder().build();
        let op: Arc<dyn Operation> = Arc::new(AlwaysFails);
        let middlewares: Vec<Arc<dyn OperationMiddleware>> = vec![Arc::new(ErrorHandlingMiddleware::swallowing())];
        let output = workflowforge_core::middleware::run_operation_chain(
            &middlewares,
            &op,
            foundry.as_ref(),
            Value::Null,
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(output, Value::Null);
    }
}
