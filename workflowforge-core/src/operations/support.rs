//! ABOUTME: Shared bounded-concurrency fan-out helper used by ParallelOperation and the
//! ABOUTME: parallel ForEach modes (§4.5): first failure cancels siblings, restore order is
//! ABOUTME: reverse-completion, not launch order.

use crate::error::{Result, WorkflowForgeError};
use crate::foundry::Foundry;
use crate::operation::Operation;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One inner operation that completed its forward step during a fan-out, in completion order.
#[derive(Clone)]
pub(crate) struct CompletedFanOutStep {
    pub index: usize,
    pub operation: Arc<dyn Operation>,
    pub output: Value,
}

pub(crate) struct FanOutResult {
    /// Outputs in launch order, `Value::Null` for any slot that never completed.
    pub outputs: Vec<Value>,
    /// Completed steps in completion order (for reverse-order restore).
    pub completed: Vec<CompletedFanOutStep>,
}

/// Runs `items` concurrently, bounded by `max_concurrency`. The first failure cancels a child
/// token shared by the remaining in-flight operations and is returned as the overall error; every
/// operation that completed forward beforehand is still reported via `completed` so the caller can
/// compensate it.
pub(crate) async fn forge_concurrently(
    items: Vec<(Arc<dyn Operation>, Value)>,
    foundry: &Foundry,
    cancel: CancellationToken,
    max_concurrency: usize,
) -> Result<FanOutResult> {
    let max_concurrency = max_concurrency.max(1);
    let group_cancel = cancel.child_token();
    let mut outputs: Vec<Value> = vec![Value::Null; items.len()];
    let completed = Mutex::new(Vec::with_capacity(items.len()));
    let mut first_error: Option<WorkflowForgeError> = None;

    let mut in_flight = FuturesUnordered::new();
    let mut remaining = items.into_iter().enumerate();

    for (index, (operation, input)) in remaining.by_ref().take(max_concurrency) {
        in_flight.push(run_one(index, operation, input, foundry, group_cancel.clone()));
    }

    while let Some((index, operation, result)) = in_flight.next().await {
        match result {
            Ok(output) => {
                completed.lock().push(CompletedFanOutStep {
                    index,
                    operation,
                    output: output.clone(),
                });
                outputs[index] = output;
            }
            Err(error) => {
                if first_error.is_none() {
                    first_error = Some(error);
                    group_cancel.cancel();
                }
            }
        }

        if let Some((next_index, (next_op, next_input))) = remaining.next() {
            in_flight.push(run_one(
                next_index,
                next_op,
                next_input,
                foundry,
                group_cancel.clone(),
            ));
        }
    }

    if let Some(error) = first_error {
        return Err(error);
    }

    Ok(FanOutResult {
        outputs,
        completed: completed.into_inner(),
    })
}

async fn run_one(
    index: usize,
    operation: Arc<dyn Operation>,
    input: Value,
    foundry: &Foundry,
    cancel: CancellationToken,
) -> (usize, Arc<dyn Operation>, Result<Value>) {
    let result = operation.forge(input, foundry, cancel).await;
    (index, operation, result)
}

/// Compensates `completed` steps in reverse completion order, collecting every restore failure
/// rather than stopping at the first (the composite itself has no `failFastCompensation` option —
/// that policy lives at the `Smith` level).
pub(crate) async fn restore_in_reverse(
    completed: &[CompletedFanOutStep],
    foundry: &Foundry,
    cancel: CancellationToken,
) -> Result<()> {
    let mut errors = Vec::new();
    for step in completed.iter().rev() {
        if let Err(error) = step
            .operation
            .restore(step.output.clone(), foundry, cancel.clone())
            .await
        {
            errors.push(error);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(WorkflowForgeError::aggregate(errors))
    }
}
