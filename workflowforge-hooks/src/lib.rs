//! ABOUTME: Built-in middleware catalog (§4.8): timing, logging, error handling, and timeouts
//! ABOUTME: at both the operation and workflow scope. Register these on a `Foundry`/`Smith`.

mod error_handling;
mod logging;
mod operation_timeout;
mod timing;
mod workflow_timeout;

pub use error_handling::ErrorHandlingMiddleware;
pub use logging::LoggingMiddleware;
pub use operation_timeout::OperationTimeoutMiddleware;
pub use timing::TimingMiddleware;
pub use workflow_timeout::WorkflowTimeoutMiddleware;

/// Common imports for consumers wiring up the built-in middleware catalog.
pub mod prelude {
    pub use crate::{
        ErrorHandlingMiddleware, LoggingMiddleware, OperationTimeoutMiddleware, TimingMiddleware,
        WorkflowTimeoutMiddleware,
    };
}
