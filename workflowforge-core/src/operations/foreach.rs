//! ABOUTME: ForEachOperation (§4.2): applies one template operation over a collection, in one of
//! ABOUTME: three modes — sequential, shared-input parallel, split-input parallel.

use super::support::{forge_concurrently, restore_in_reverse, CompletedFanOutStep};
use crate::error::{Result, WorkflowForgeError};
use crate::foundry::Foundry;
use crate::ids::OperationId;
use crate::operation::Operation;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
pub enum ForEachMode {
    /// Iterate elements one at a time, in declaration order. Stops at the first failure.
    Sequential,
    /// Run one invocation per element concurrently, but every invocation receives the *whole*
    /// input collection rather than its own element.
    SharedInputParallel { max_concurrency: Option<usize> },
    /// Run one invocation per element concurrently, each receiving its own partitioned element.
    SplitInputParallel { max_concurrency: Option<usize> },
}

/// Applies `template` to every element of an input JSON array, in the given mode. Restore
/// compensates whichever invocations completed forward, in reverse completion order.
pub struct ForEachOperation {
    id: OperationId,
    name: String,
    template: Arc<dyn Operation>,
    mode: ForEachMode,
    completed: Mutex<Vec<CompletedFanOutStep>>,
}

impl ForEachOperation {
    #[must_use]
    pub fn new(name: impl Into<String>, template: Arc<dyn Operation>, mode: ForEachMode) -> Self {
        Self {
            id: OperationId::new(),
            name: name.into(),
            template,
            mode,
            completed: Mutex::new(Vec::new()),
        }
    }

    fn elements(&self, input: &Value) -> Result<Vec<Value>> {
        input.as_array().cloned().ok_or_else(|| {
            WorkflowForgeError::validation(format!(
                "for-each operation '{}' requires a JSON array input",
                self.name
            ))
        })
    }
}

#[async_trait]
impl Operation for ForEachOperation {
    fn id(&self) -> OperationId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn forge(&self, input: Value, foundry: &Foundry, cancel: CancellationToken) -> Result<Value> {
        let elements = self.elements(&input)?;

        match self.mode {
            ForEachMode::Sequential => {
                let mut outputs = Vec::with_capacity(elements.len());
                let mut completed = Vec::with_capacity(elements.len());
                for (index, element) in elements.into_iter().enumerate() {
                    if cancel.is_cancelled() {
                        *self.completed.lock() = completed;
                        return Err(WorkflowForgeError::Cancelled);
                    }
                    match self.template.forge(element, foundry, cancel.clone()).await {
                        Ok(output) => {
                            completed.push(CompletedFanOutStep {
                                index,
                                operation: Arc::clone(&self.template),
                                output: output.clone(),
                            });
                            outputs.push(output);
                        }
                        Err(error) => {
                            *self.completed.lock() = completed;
                            return Err(error);
                        }
                    }
                }
                *self.completed.lock() = completed;
                Ok(Value::Array(outputs))
            }
            ForEachMode::SharedInputParallel { max_concurrency } => {
                let shared = Value::Array(elements.clone());
                let items = elements
                    .iter()
                    .map(|_| (Arc::clone(&self.template), shared.clone()))
                    .collect();
                let max_concurrency = max_concurrency.unwrap_or(elements.len().max(1));
                let fan_out = forge_concurrently(items, foundry, cancel, max_concurrency).await?;
                *self.completed.lock() = fan_out.completed;
                Ok(Value::Array(fan_out.outputs))
            }
            ForEachMode::SplitInputParallel { max_concurrency } => {
                let max_concurrency = max_concurrency.unwrap_or(elements.len().max(1));
                let items = elements
                    .into_iter()
                    .map(|element| (Arc::clone(&self.template), element))
                    .collect();
                let fan_out = forge_concurrently(items, foundry, cancel, max_concurrency).await?;
                *self.completed.lock() = fan_out.completed;
                Ok(Value::Array(fan_out.outputs))
            }
        }
    }

    async fn restore(&self, _output: Value, foundry: &Foundry, cancel: CancellationToken) -> Result<()> {
        let completed = self.completed.lock().clone();
        restore_in_reverse(&completed, foundry, cancel).await
    }
}
