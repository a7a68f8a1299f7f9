//! ABOUTME: Error taxonomy for the WorkflowForge execution engine
//! ABOUTME: Flat thiserror enum plus the crate-wide Result alias

use crate::ids::{ExecutionId, WorkflowId};
use std::time::Duration;
use thiserror::Error;

/// Every error kind the engine can surface, per the error-handling design.
///
/// These are kinds, not 1:1 mappings onto exception types in some other runtime: callers match on
/// variants to decide retry/compensation/surfacing policy.
#[derive(Debug, Error)]
pub enum WorkflowForgeError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error(
        "operation '{operation_name}' failed (execution {execution_id}, workflow {workflow_id})"
    )]
    Operation {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        operation_name: String,
        #[source]
        source: Box<WorkflowForgeError>,
    },

    #[error("compensation failed for operation '{operation_name}' (execution {execution_id})")]
    Compensation {
        execution_id: ExecutionId,
        operation_name: String,
        #[source]
        source: Box<WorkflowForgeError>,
    },

    #[error("deadline exceeded after {duration:?}")]
    Timeout { duration: Duration },

    #[error("operation cancelled")]
    Cancelled,

    #[error("component used after disposal")]
    Disposed,

    #[error("invalid state: {message}")]
    InvalidState { message: String },

    #[error("{} error(s) occurred", .0.len())]
    Aggregate(Vec<WorkflowForgeError>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WorkflowForgeError {
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Wrap `self` as the cause of an `Operation` error, the way the foundry does when a forward
    /// step's middleware chain returns an error that isn't already an `Operation`/`Cancelled`/
    /// `Timeout` kind.
    #[must_use]
    pub fn into_operation_error(
        self,
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        operation_name: impl Into<String>,
    ) -> Self {
        Self::Operation {
            execution_id,
            workflow_id,
            operation_name: operation_name.into(),
            source: Box::new(self),
        }
    }

    /// Flatten a list of errors into a single `Aggregate`, the way `continueOnError` and
    /// compensation fan-out both need to.
    #[must_use]
    pub fn aggregate(errors: Vec<WorkflowForgeError>) -> Self {
        Self::Aggregate(errors)
    }

    /// True for the error kinds that should cause a workflow to transition to compensation
    /// rather than, say, a pure validation failure raised before any operation ran.
    #[must_use]
    pub fn is_execution_failure(&self) -> bool {
        !matches!(
            self,
            Self::Validation { .. } | Self::Configuration { .. } | Self::Disposed
        )
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, WorkflowForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_error_carries_correlation_ids() {
        let execution_id = ExecutionId::new();
        let workflow_id = WorkflowId::new();
        let err = WorkflowForgeError::validation("bad input")
            .into_operation_error(execution_id, workflow_id, "step-a");
        let rendered = err.to_string();
        assert!(rendered.contains("step-a"));
        assert!(rendered.contains(&execution_id.to_string()));
    }

    #[test]
    fn aggregate_reports_count() {
        let err = WorkflowForgeError::aggregate(vec![
            WorkflowForgeError::validation("a"),
            WorkflowForgeError::validation("b"),
        ]);
        assert_eq!(err.to_string(), "2 error(s) occurred");
    }

    #[test]
    fn execution_failure_classification() {
        assert!(!WorkflowForgeError::validation("x").is_execution_failure());
        assert!(!WorkflowForgeError::configuration("x").is_execution_failure());
        assert!(WorkflowForgeError::Cancelled.is_execution_failure());
        assert!(WorkflowForgeError::Timeout {
            duration: Duration::from_millis(1)
        }
        .is_execution_failure());
    }
}
