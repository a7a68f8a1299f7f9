//! ABOUTME: WorkflowForge execution engine: workflow/operation/foundry/smith object model,
//! ABOUTME: the Russian-doll middleware pipeline, and the saga compensation protocol.

pub mod error;
pub mod events;
pub mod foundry;
pub mod ids;
pub mod logger;
pub mod middleware;
pub mod operation;
pub mod operations;
pub mod property_bag;
pub mod service_locator;
pub mod smith;
pub mod snapshot;
pub mod workflow;

/// Re-exports covering the common assembly path: build a `Workflow`, create a `Foundry` (directly
/// or via a `Smith`), forge it.
pub mod prelude {
    pub use crate::error::{Result, WorkflowForgeError};
    pub use crate::events::{EventSink, NullEventSink};
    pub use crate::foundry::{Foundry, FoundryOptions};
    pub use crate::ids::{ExecutionId, Id, OperationId, WorkflowId};
    pub use crate::logger::{Logger, NullLogger, TracingLogger};
    pub use crate::middleware::{OperationMiddleware, WorkflowMiddleware};
    pub use crate::operation::Operation;
    pub use crate::operations::{
        ActionOperation, ConditionalOperation, DelayOperation, DelegateOperation, ForEachMode,
        ForEachOperation, LoggingOperation, ParallelInputMode, ParallelOperation,
    };
    pub use crate::property_bag::{keys, PropertyBag};
    pub use crate::service_locator::{NullServiceLocator, ServiceLocator, ServiceRegistry};
    pub use crate::smith::{Smith, SmithOptions};
    pub use crate::snapshot::{NullSnapshotCleanup, SnapshotCleanup};
    pub use crate::workflow::{Workflow, WorkflowBuilder};
}
