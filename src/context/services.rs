use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-erased service instance as stored in a provider.
pub type ServiceRef = Arc<dyn Any + Send + Sync>;

/// Identity of an injectable service type.
///
/// A handler parameter declared with `ParamDefault::Injected(ServiceKey::of::<Db>())`
/// is filled from the request's [`ServiceProvider`] instead of from the transport.
#[derive(Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceKey {
    pub fn of<T: Any + Send + Sync>() -> Self {
        ServiceKey {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceKey {}

impl std::hash::Hash for ServiceKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceKey({})", self.type_name)
    }
}

/// Source of dependency-injected values.
///
/// The container that owns service lifetimes lives outside this crate; resolvers only
/// ever ask it for an instance by key.
pub trait ServiceProvider: Send + Sync {
    fn get(&self, key: &ServiceKey) -> Option<ServiceRef>;
}

/// Minimal map-backed provider, enough for tests and single-binary applications.
///
/// ```rust
/// use brrtrouter_args::context::{ServiceKey, ServiceProvider, ServiceRegistry};
///
/// struct Clock;
///
/// let registry = ServiceRegistry::new().with(Clock);
/// assert!(registry.get(&ServiceKey::of::<Clock>()).is_some());
/// assert!(registry.get(&ServiceKey::of::<String>()).is_none());
/// ```
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    services: HashMap<ServiceKey, ServiceRef>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        ServiceRegistry::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, service: T) -> Self {
        self.insert(service);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, service: T) {
        self.services.insert(ServiceKey::of::<T>(), Arc::new(service));
    }

    /// Register an already shared instance; every request sees the same `Arc`.
    pub fn insert_arc<T: Any + Send + Sync>(&mut self, service: Arc<T>) {
        self.services.insert(ServiceKey::of::<T>(), service);
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.services.keys()).finish()
    }
}

impl ServiceProvider for ServiceRegistry {
    fn get(&self, key: &ServiceKey) -> Option<ServiceRef> {
        self.services.get(key).map(Arc::clone)
    }
}
