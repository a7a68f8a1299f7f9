//! ABOUTME: ParallelOperation (§4.5): bounded concurrent fan-out composite with saga-aware restore

use super::support::{forge_concurrently, restore_in_reverse, CompletedFanOutStep};
use crate::error::{Result, WorkflowForgeError};
use crate::foundry::Foundry;
use crate::ids::OperationId;
use crate::operation::Operation;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How the composite's own input is distributed to its inner operations.
#[derive(Clone)]
pub enum ParallelInputMode {
    /// Every inner operation receives the composite's input unchanged.
    Shared,
    /// The composite's input must be a JSON array (or `properties[collection_key]` is used
    /// instead, when set); each inner operation receives one element, by position.
    Split { collection_key: Option<String> },
}

/// Runs a fixed list of inner operations concurrently, bounded by `max_concurrency`. A failure of
/// any inner operation cancels the others and surfaces the first failure. Compensation runs the
/// completed inner operations' `restore` in reverse completion order, independent of launch order.
pub struct ParallelOperation {
    id: OperationId,
    name: String,
    operations: Vec<Arc<dyn Operation>>,
    max_concurrency: usize,
    timeout: Option<Duration>,
    input_mode: ParallelInputMode,
    completed: Mutex<Vec<CompletedFanOutStep>>,
}

impl ParallelOperation {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        operations: Vec<Arc<dyn Operation>>,
        max_concurrency: Option<usize>,
    ) -> Self {
        let max_concurrency = max_concurrency.unwrap_or_else(default_concurrency);
        Self {
            id: OperationId::new(),
            name: name.into(),
            operations,
            max_concurrency,
            timeout: None,
            input_mode: ParallelInputMode::Shared,
            completed: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_input_mode(mut self, mode: ParallelInputMode) -> Self {
        self.input_mode = mode;
        self
    }

    fn partition_input(&self, input: &Value, foundry: &Foundry) -> Result<Vec<Value>> {
        match &self.input_mode {
            ParallelInputMode::Shared => {
                Ok(self.operations.iter().map(|_| input.clone()).collect())
            }
            ParallelInputMode::Split { collection_key } => {
                let collection = match collection_key {
                    Some(key) => foundry.properties().get_raw(key).ok_or_else(|| {
                        WorkflowForgeError::validation(format!(
                            "split-input parallel operation '{}' found no collection at property '{key}'",
                            self.name
                        ))
                    })?,
                    None => input.clone(),
                };
                let elements = collection.as_array().cloned().ok_or_else(|| {
                    WorkflowForgeError::validation(format!(
                        "split-input parallel operation '{}' requires a JSON array collection",
                        self.name
                    ))
                })?;
                if elements.len() != self.operations.len() {
                    return Err(WorkflowForgeError::validation(format!(
                        "split-input parallel operation '{}' expected {} elements, found {}",
                        self.name,
                        self.operations.len(),
                        elements.len()
                    )));
                }
                Ok(elements)
            }
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}

#[async_trait]
impl Operation for ParallelOperation {
    fn id(&self) -> OperationId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn forge(
        &self,
        input: Value,
        foundry: &Foundry,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let inputs = self.partition_input(&input, foundry)?;
        let items: Vec<_> = self
            .operations
            .iter()
            .cloned()
            .zip(inputs)
            .collect();

        let fan_out = async {
            forge_concurrently(items, foundry, cancel.clone(), self.max_concurrency).await
        };

        let result = match self.timeout {
            Some(duration) => match tokio::time::timeout(duration, fan_out).await {
                Ok(result) => result,
                Err(_) => {
                    cancel.cancel();
                    Err(WorkflowForgeError::Timeout { duration })
                }
            },
            None => fan_out.await,
        };

        match result {
            Ok(fan_out) => {
                *self.completed.lock() = fan_out.completed;
                Ok(Value::Array(fan_out.outputs))
            }
            Err(error) => Err(error),
        }
    }

    async fn restore(&self, _output: Value, foundry: &Foundry, cancel: CancellationToken) -> Result<()> {
        let completed = self.completed.lock().clone();
        restore_in_reverse(&completed, foundry, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property_bag::keys;
    use serde_json::json;

    struct Double;
    #[async_trait]
    impl Operation for Double {
        fn id(&self) -> OperationId {
            OperationId::new()
        }
        fn name(&self) -> &str {
            "double"
        }
        async fn forge(&self, input: Value, _foundry: &Foundry, _cancel: CancellationToken) -> Result<Value> {
            Ok(json!(input.as_i64().unwrap_or(0) * 2))
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl Operation for AlwaysFails {
        fn id(&self) -> OperationId {
            OperationId::new()
        }
        fn name(&self) -> &str {
            "fails"
        }
        async fn forge(&self, _input: Value, _foundry: &Foundry, _cancel: CancellationToken) -> Result<Value> {
            Err(WorkflowForgeError::validation("boom"))
        }
    }

    #[tokio::test]
    async fn shared_input_runs_every_operation_with_same_input() {
        let foundry = Foundry::builder().build();
        let parallel = ParallelOperation::new(
            "p",
            vec![Arc::new(Double), Arc::new(Double)],
            Some(2),
        );
        let output = parallel
            .forge(json!(3), foundry.as_ref(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, json!([6, 6]));
    }

    #[tokio::test]
    async fn failure_surfaces_as_error() {
        let foundry = Foundry::builder().build();
        let parallel = ParallelOperation::new(
            "p",
            vec![Arc::new(Double), Arc::new(AlwaysFails)],
            Some(2),
        );
        let result = parallel
            .forge(json!(3), foundry.as_ref(), CancellationToken::new())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn split_input_partitions_a_json_array() {
        let foundry = Foundry::builder().build();
        let parallel = ParallelOperation::new(
            "p",
            vec![Arc::new(Double), Arc::new(Double), Arc::new(Double)],
            Some(3),
        )
        .with_input_mode(ParallelInputMode::Split { collection_key: None });
        let output = parallel
            .forge(json!([1, 2, 3]), foundry.as_ref(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, json!([2, 4, 6]));
    }

    #[tokio::test]
    async fn split_input_reads_from_property_when_key_given() {
        let foundry = Foundry::builder().build();
        foundry.properties().set_raw("batch", json!([10, 20]));
        let parallel = ParallelOperation::new("p", vec![Arc::new(Double), Arc::new(Double)], Some(2))
            .with_input_mode(ParallelInputMode::Split {
                collection_key: Some("batch".to_string()),
            });
        let output = parallel
            .forge(Value::Null, foundry.as_ref(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(output, json!([20, 40]));
        assert!(!keys::is_reserved("batch"));
    }
}
