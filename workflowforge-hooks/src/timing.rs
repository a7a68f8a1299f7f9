//! ABOUTME: Timing middleware (§4.8): measures wall-clock of each operation invocation

use async_trait::async_trait;
use serde_json::json;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use workflowforge_core::error::Result;
use workflowforge_core::foundry::Foundry;
use workflowforge_core::middleware::{Next, OperationMiddleware};
use workflowforge_core::operation::Operation;
use workflowforge_core::property_bag::keys;
use serde_json::Value;

/// Records how long each operation took under `Timing.Duration` (seconds, as an `f64`) and
/// `Timing.DurationTicks` (nanoseconds); on failure also writes `Timing.Failed = true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimingMiddleware;

#[async_trait]
impl OperationMiddleware for TimingMiddleware {
    async fn handle(
        &self,
        _operation: &dyn Operation,
        foundry: &Foundry,
        _input: Value,
        next: Next<'_>,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let started_at = Instant::now();
        let result = next.call(cancel).await;
        let elapsed = started_at.elapsed();

        foundry
            .properties()
            .set_raw(keys::TIMING_DURATION, json!(elapsed.as_secs_f64()));
        foundry
            .properties()
            .set_raw(keys::TIMING_DURATION_TICKS, json!(elapsed.as_nanos() as u64));
        if result.is_err() {
            foundry.properties().set_raw(keys::TIMING_FAILED, json!(true));
        }

        result
    }
}
