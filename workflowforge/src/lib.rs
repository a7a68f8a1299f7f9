//! ABOUTME: Umbrella crate over the WorkflowForge engine: re-exports `workflowforge-core`'s object
//! ABOUTME: model plus the built-in hooks, event bus, and persistence crates behind one dependency.

pub use workflowforge_core as core;
pub use workflowforge_events as events_bus;
pub use workflowforge_hooks as hooks;
pub use workflowforge_persistence as persistence;

/// The common assembly path in one `use`: build a `Workflow`, wire a `Smith` with the built-in
/// middleware catalog, an `EventBus`, and (optionally) a persistence provider, then forge it.
pub mod prelude {
    pub use workflowforge_core::prelude::*;
    pub use workflowforge_events::EventBus;
    pub use workflowforge_hooks::prelude::*;
    pub use workflowforge_persistence::prelude::*;
}
