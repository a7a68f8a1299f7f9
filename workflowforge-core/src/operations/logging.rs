//! ABOUTME: LoggingOperation (§4.2): structured log line via the foundry's logger, input passthrough

use crate::error::Result;
use crate::foundry::Foundry;
use crate::ids::OperationId;
use crate::logger::Fields;
use crate::operation::Operation;
use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Logs a fixed message (with optional static fields) through `foundry.logger()` and passes its
/// input through unchanged. Useful as a cheap tracing checkpoint inside a workflow.
pub struct LoggingOperation {
    id: OperationId,
    name: String,
    message: String,
    fields: Fields,
}

impl LoggingOperation {
    #[must_use]
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: OperationId::new(),
            name: name.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }
}

#[async_trait]
impl Operation for LoggingOperation {
    fn id(&self) -> OperationId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn forge(&self, input: Value, foundry: &Foundry, _cancel: CancellationToken) -> Result<Value> {
        foundry.logger().info(&self.message, self.fields.clone());
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn logs_and_passes_input_through() {
        let op = LoggingOperation::new("checkpoint", "reached checkpoint");
        let foundry = Foundry::builder().build();
        let out = op
            .forge(json!(42), foundry.as_ref(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out, json!(42));
    }
}
