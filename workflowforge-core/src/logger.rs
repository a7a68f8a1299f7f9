//! ABOUTME: Consumed logging interface (§6 external interfaces) plus a tracing-backed default
//! ABOUTME: and the required null-logger implementation

use std::fmt;

/// Structured log fields attached to a single log call.
pub type Fields = Vec<(&'static str, String)>;

/// Logging capability the foundry owns one instance of. Concrete sinks (files, OTel exporters,
/// etc.) are out of scope for this crate; this is the seam they plug into.
pub trait Logger: Send + Sync + fmt::Debug {
    fn trace(&self, message: &str, fields: Fields);
    fn debug(&self, message: &str, fields: Fields);
    fn info(&self, message: &str, fields: Fields);
    fn warn(&self, message: &str, fields: Fields);
    fn error(&self, message: &str, fields: Fields);
}

/// Bridges `Logger` onto the `tracing` crate, the teacher's logging backbone.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

fn render_fields(fields: &Fields) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

impl Logger for TracingLogger {
    fn trace(&self, message: &str, fields: Fields) {
        tracing::trace!(fields = %render_fields(&fields), "{message}");
    }

    fn debug(&self, message: &str, fields: Fields) {
        tracing::debug!(fields = %render_fields(&fields), "{message}");
    }

    fn info(&self, message: &str, fields: Fields) {
        tracing::info!(fields = %render_fields(&fields), "{message}");
    }

    fn warn(&self, message: &str, fields: Fields) {
        tracing::warn!(fields = %render_fields(&fields), "{message}");
    }

    fn error(&self, message: &str, fields: Fields) {
        tracing::error!(fields = %render_fields(&fields), "{message}");
    }
}

/// The explicit no-op logger §6 requires.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn trace(&self, _message: &str, _fields: Fields) {}
    fn debug(&self, _message: &str, _fields: Fields) {}
    fn info(&self, _message: &str, _fields: Fields) {}
    fn warn(&self, _message: &str, _fields: Fields) {}
    fn error(&self, _message: &str, _fields: Fields) {}
}
