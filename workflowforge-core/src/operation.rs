//! ABOUTME: The Operation contract (§4.2): forward `forge` step plus optional compensating `restore`
//! ABOUTME: Built-in operation variants live under `operations/`

use crate::error::Result;
use crate::foundry::Foundry;
use crate::ids::OperationId;
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// A single async unit of work. Forward (`forge`) and compensating (`restore`) steps share a
/// stable identity and name.
///
/// Implementations must be safe to invoke sequentially and, for the built-in `ParallelOperation`
/// composite, concurrently with other operations in the same workflow. `restore` must tolerate
/// being called on an operation whose `forge` never ran or failed (idempotent-tolerant per §4.2).
#[async_trait]
pub trait Operation: Send + Sync {
    /// Stable identity for this operation instance.
    fn id(&self) -> OperationId;

    /// Display name, used in output keys (`Operation.{index}:{name}.Output`) and events.
    fn name(&self) -> &str;

    /// The forward step. `input` is the previous operation's output when output-chaining is
    /// enabled, otherwise `Value::Null`.
    async fn forge(&self, input: Value, foundry: &Foundry, cancel: CancellationToken)
        -> Result<Value>;

    /// The compensating step. Default is a no-op; operations override to undo their forward
    /// effect. May be invoked even if `forge` never completed for this instance.
    async fn restore(
        &self,
        _output: Value,
        _foundry: &Foundry,
        _cancel: CancellationToken,
    ) -> Result<()> {
        Ok(())
    }
}
