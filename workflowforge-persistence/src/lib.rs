//! ABOUTME: Resume/persistence support (§4.6, §4.7): snapshot format, provider boundary,
//! ABOUTME: persistence middleware, and the retry-with-backoff recovery coordinator.

mod cleanup;
mod middleware;
mod provider;
mod recovery;
mod snapshot;

pub use cleanup::ProviderSnapshotCleanup;
pub use middleware::PersistenceMiddleware;
pub use provider::{InMemoryPersistenceProvider, PersistenceProvider, RecoveryCatalog};
pub use recovery::{BackoffPolicy, RecoveryCoordinator, RecoveryOptions};
pub use snapshot::Snapshot;

pub mod prelude {
    pub use crate::{
        BackoffPolicy, InMemoryPersistenceProvider, PersistenceMiddleware, PersistenceProvider,
        ProviderSnapshotCleanup, RecoveryCatalog, RecoveryCoordinator, RecoveryOptions, Snapshot,
    };
}
