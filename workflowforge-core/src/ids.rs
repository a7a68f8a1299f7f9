//! ABOUTME: Identifier types for executions, workflows, and operations
//! ABOUTME: A single UUID newtype reused across domains, grounded on ComponentId's dual new()/from_name() modes

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A unique identifier, either randomly generated (v4) or deterministically derived from a name
/// (v5). The deterministic mode backs the persistence module's `instanceId`/`workflowKey`
/// overrides, letting a caller resume a specific workflow instance across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Id(Uuid);

impl Id {
    /// Generate a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a deterministic id from a stable name, so the same name always yields the same id.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifies one run of a workflow against a foundry. Unique per run.
pub type ExecutionId = Id;

/// Identifies a `Workflow` blueprint. Shared across every run of that workflow.
pub type WorkflowId = Id;

/// Identifies an `Operation` instance within the workflow that owns it.
pub type OperationId = Id;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_differ() {
        assert_ne!(Id::new(), Id::new());
    }

    #[test]
    fn deterministic_ids_match() {
        assert_eq!(Id::from_name("checkout"), Id::from_name("checkout"));
        assert_ne!(Id::from_name("checkout"), Id::from_name("refund"));
    }
}
