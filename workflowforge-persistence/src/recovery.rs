//! ABOUTME: Recovery coordinator (§4.7): resume-then-retry wrapper around a smith execution,
//! ABOUTME: bounded by fixed or exponential backoff.

use crate::middleware::PersistenceMiddleware;
use crate::provider::PersistenceProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use workflowforge_core::error::{Result, WorkflowForgeError};
use workflowforge_core::ids::ExecutionId;
use workflowforge_core::logger::{Logger, NullLogger};
use serde_json::Value;
use workflowforge_core::smith::Smith;
use workflowforge_core::workflow::Workflow;

/// How long to wait between retry attempts.
#[derive(Debug, Clone, Copy)]
pub enum BackoffPolicy {
    Fixed(Duration),
    Exponential {
        base: Duration,
        factor: f64,
        max: Option<Duration>,
    },
}

impl BackoffPolicy {
    /// `attempt` is 1-based: the delay before the *next* attempt after `attempt` has failed.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(duration) => duration,
            Self::Exponential { base, factor, max } => {
                let scaled = base.as_secs_f64() * factor.powi(attempt.saturating_sub(1) as i32);
                let delay = Duration::from_secs_f64(scaled.max(0.0));
                max.map_or(delay, |cap| delay.min(cap))
            }
        }
    }
}

/// Bounds on the retry loop.
#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::Fixed(Duration::from_millis(100)),
        }
    }
}

/// Wraps a `Smith` call with resume-from-snapshot and bounded retry-with-backoff (§4.7). Each
/// attempt builds a fresh foundry seeded from the latest snapshot, so operations completed by an
/// earlier attempt (including ones within the same `run` call) are skipped on the next.
pub struct RecoveryCoordinator {
    smith: Arc<Smith>,
    provider: Arc<dyn PersistenceProvider>,
    options: RecoveryOptions,
    logger: Arc<dyn Logger>,
}

impl RecoveryCoordinator {
    #[must_use]
    pub fn new(smith: Arc<Smith>, provider: Arc<dyn PersistenceProvider>, options: RecoveryOptions) -> Self {
        Self {
            smith,
            provider,
            options,
            logger: Arc::new(NullLogger),
        }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Runs `workflow` under `execution_id` (the `instanceId` key-stability option), resuming from
    /// whatever snapshot the provider holds for `(execution_id, workflow.id())` and retrying with
    /// backoff on failure.
    pub async fn run(
        &self,
        workflow: Workflow,
        execution_id: ExecutionId,
        cancel: CancellationToken,
    ) -> Result<Value> {
        let mut last_error = WorkflowForgeError::invalid_state("recovery ran with max_attempts == 0");

        for attempt in 1..=self.options.max_attempts.max(1) {
            let initial_properties = self
                .provider
                .try_load(execution_id, workflow.id())
                .await?
                .map(|snapshot| snapshot.properties)
                .unwrap_or_default();

            let foundry = self
                .smith
                .create_foundry_with_execution_id(execution_id, initial_properties);
            foundry.attach_workflow(workflow.clone())?;
            foundry.add_middleware(Arc::new(PersistenceMiddleware::new(Arc::clone(&self.provider))))?;

            match self
                .smith
                .forge_with_foundry(workflow.clone(), foundry, cancel.clone())
                .await
            {
                Ok(output) => return Ok(output),
                Err(error) => {
                    self.logger.warn(
                        "recovery attempt failed",
                        vec![("attempt", attempt.to_string()), ("error", error.to_string())],
                    );
                    last_error = error;
                    if attempt < self.options.max_attempts {
                        tokio::time::sleep(self.options.backoff.delay_for(attempt)).await;
                    }
                }
            }
        }

        Err(last_error)
    }
}
