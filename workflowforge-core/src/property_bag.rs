//! ABOUTME: Process-local, thread-safe key/value map shared across a foundry's operations
//! ABOUTME: Reserved `Operation.`/`Workflow.` key helpers live in the `keys` submodule

use crate::error::{Result, WorkflowForgeError};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved property keys, engine-owned. Consumers may read these but must not write them
/// directly — the foundry/smith are the only writers.
pub mod keys {
    pub const WORKFLOW_NAME: &str = "Workflow.Name";
    pub const CURRENT_OPERATION_INDEX: &str = "Operation.CurrentOperationIndex";
    pub const LAST_COMPLETED_INDEX: &str = "Operation.LastCompletedIndex";
    pub const LAST_COMPLETED_NAME: &str = "Operation.LastCompletedName";

    pub const TIMING_DURATION: &str = "Timing.Duration";
    pub const TIMING_DURATION_TICKS: &str = "Timing.DurationTicks";
    pub const TIMING_FAILED: &str = "Timing.Failed";

    pub const ERROR_MESSAGE: &str = "Error.Message";
    pub const ERROR_STACK_TRACE: &str = "Error.StackTrace";

    pub const VALIDATION_STATUS: &str = "Validation.Status";
    pub const VALIDATION_ERRORS: &str = "Validation.Errors";

    /// Set by the operation-timeout middleware when a deadline expires, so operations that don't
    /// want to depend on the cancellation token directly can still observe the timeout.
    pub const OPERATION_TIMED_OUT: &str = "Operation.TimedOut";
    /// Set by the workflow-timeout middleware, analogous to `OPERATION_TIMED_OUT` at workflow scope.
    pub const WORKFLOW_TIMED_OUT: &str = "Workflow.TimedOut";

    /// Builds the reserved key an operation's forward output is stored under:
    /// `Operation.{index}:{name}.Output`.
    #[must_use]
    pub fn operation_output(index: usize, name: &str) -> String {
        format!("Operation.{index}:{name}.Output")
    }

    /// True for any key the engine owns (`Operation.*` / `Workflow.*` prefixes).
    #[must_use]
    pub fn is_reserved(key: &str) -> bool {
        key.starts_with("Operation.") || key.starts_with("Workflow.")
    }
}

/// A concurrent, process-local property bag. Cheap to clone (an `Arc` underneath), last-writer
/// wins on concurrent writes to the same key.
#[derive(Clone, Debug, Default)]
pub struct PropertyBag {
    inner: Arc<DashMap<String, Value>>,
}

impl PropertyBag {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Seed a bag from an initial map, e.g. `Smith::forge(workflow, initial_properties, cancel)`.
    #[must_use]
    pub fn with_initial(initial: HashMap<String, Value>) -> Self {
        let inner = DashMap::new();
        for (k, v) in initial {
            inner.insert(k, v);
        }
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Set a raw JSON value.
    pub fn set_raw(&self, key: impl Into<String>, value: Value) {
        self.inner.insert(key.into(), value);
    }

    /// Typed setter: serializes `value` to JSON.
    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        let json = serde_json::to_value(value).map_err(|e| WorkflowForgeError::Other(e.into()))?;
        self.inner.insert(key.into(), json);
        Ok(())
    }

    /// Raw accessor, no deserialization.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    /// Typed accessor returning `T::default()` when the key is absent. A type mismatch is still
    /// reported as an error rather than silently falling back to the default.
    pub fn get_property_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.inner.get(key) {
            Some(entry) => serde_json::from_value(entry.value().clone()).map_err(|e| {
                WorkflowForgeError::validation(format!(
                    "property '{key}' could not be read as the requested type: {e}"
                ))
            }),
            None => Ok(T::default()),
        }
    }

    /// Typed accessor distinguishing "absent" from "present but wrong type".
    pub fn try_get_property<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.inner.get(key) {
            Some(entry) => serde_json::from_value(entry.value().clone())
                .map(Some)
                .map_err(|e| {
                    WorkflowForgeError::validation(format!(
                        "property '{key}' could not be read as the requested type: {e}"
                    ))
                }),
            None => Ok(None),
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.remove(key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.iter().map(|e| e.key().clone()).collect()
    }

    /// A point-in-time copy of the whole bag, used by the persistence middleware to capture a
    /// snapshot.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Removes every engine-owned (`Operation.`/`Workflow.`) key. Used when a foundry's operation
    /// list is replaced mid-reuse, so stale indices/outputs from a prior run don't leak forward.
    pub fn clear_reserved(&self) {
        let reserved: Vec<String> = self
            .inner
            .iter()
            .filter(|e| keys::is_reserved(e.key()))
            .map(|e| e.key().clone())
            .collect();
        for key in reserved {
            self.inner.remove(&key);
        }
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_roundtrip() {
        let bag = PropertyBag::new();
        bag.set("n", &7i64).unwrap();
        let n: i64 = bag.try_get_property("n").unwrap().unwrap();
        assert_eq!(n, 7);
    }

    #[test]
    fn default_when_absent() {
        let bag = PropertyBag::new();
        let n: i64 = bag.get_property_or_default("missing").unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn type_mismatch_is_an_error_not_a_silent_default() {
        let bag = PropertyBag::new();
        bag.set_raw("n", json!("not-a-number"));
        let result: Result<i64> = bag.get_property_or_default("n");
        assert!(result.is_err());
    }

    #[test]
    fn operation_output_key_format() {
        assert_eq!(
            keys::operation_output(2, "C"),
            "Operation.2:C.Output".to_string()
        );
    }

    #[test]
    fn reserved_key_detection() {
        assert!(keys::is_reserved(keys::CURRENT_OPERATION_INDEX));
        assert!(keys::is_reserved(&keys::operation_output(0, "A")));
        assert!(!keys::is_reserved("user.custom.key"));
    }

    #[test]
    fn clear_reserved_keeps_user_data() {
        let bag = PropertyBag::new();
        bag.set_raw(keys::CURRENT_OPERATION_INDEX, json!(3));
        bag.set_raw("user.n", json!(42));
        bag.clear_reserved();
        assert!(bag.get_raw(keys::CURRENT_OPERATION_INDEX).is_none());
        assert_eq!(bag.get_raw("user.n"), Some(json!(42)));
    }
}
