//! ABOUTME: Optional resolve-by-type service locator consumed via `foundry.service_provider()`
//! ABOUTME: No lifetime guarantees are provided by the engine, per §6

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve-by-type service lookup. Operations reach external collaborators (retry policies,
/// validation engines, DI-managed clients, ...) through this seam instead of global state.
pub trait ServiceLocator: Send + Sync {
    fn resolve_any(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;
}

impl dyn ServiceLocator {
    /// Typed convenience wrapper over `resolve_any`.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolve_any(TypeId::of::<T>())
            .and_then(|any| any.downcast::<T>().ok())
    }
}

/// A locator with nothing registered. Returns `None` for every type.
#[derive(Debug, Default, Clone)]
pub struct NullServiceLocator;

impl ServiceLocator for NullServiceLocator {
    fn resolve_any(&self, _type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
}

/// A simple in-process registry, the most common concrete locator: register a singleton instance
/// per type, resolve it back later.
#[derive(Debug, Default, Clone)]
pub struct ServiceRegistry {
    services: Arc<parking_lot::RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Send + Sync + 'static>(&self, service: Arc<T>) {
        self.services
            .write()
            .insert(TypeId::of::<T>(), service as Arc<dyn Any + Send + Sync>);
    }
}

impl ServiceLocator for ServiceRegistry {
    fn resolve_any(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.services.read().get(&type_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Thing(u32);

    #[test]
    fn register_and_resolve() {
        let registry = ServiceRegistry::new();
        registry.register(Arc::new(Thing(42)));
        let locator: &dyn ServiceLocator = &registry;
        let resolved = locator.resolve::<Thing>().unwrap();
        assert_eq!(*resolved, Thing(42));
    }

    #[test]
    fn null_locator_resolves_nothing() {
        let locator = NullServiceLocator;
        assert!(locator.resolve::<Thing>().is_none());
    }
}
