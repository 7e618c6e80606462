// Service container

use crate::logging::{debug, trace};
use crate::{Error, ErrorKind, Result};
use once_cell::sync::OnceCell;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

type Service = Arc<dyn Any + Send + Sync>;

type FactoryFn = Arc<dyn Fn(&Container, &[String]) -> Result<Service> + Send + Sync>;

enum Definition {
    /// A concrete value stored with `set`.
    Value(Service),
    /// Built on first `get`, then cached for the container's lifetime.
    Shared {
        factory: FactoryFn,
        resolved: OnceCell<Service>,
    },
    /// Built again on every resolution.
    Factory(FactoryFn),
}

/// Registry mapping string keys to services.
///
/// Registration takes `&mut self` and happens while the application is being
/// composed; resolution only needs `&self`. One container is built per
/// request, so cached shared services never outlive the request.
///
/// A factory that resolves its own key while it is being built never
/// terminates. This is not detected.
#[derive(Default)]
pub struct Container {
    definitions: HashMap<String, Definition>,
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new service container");
        Self::default()
    }

    /// Store a concrete value, replacing whatever `key` held before.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.set_arc(key, Arc::new(value));
    }

    /// Store an already shared value, e.g. an immutable snapshot built at startup.
    pub fn set_arc<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: Arc<T>) {
        let key = key.into();
        debug!(service = %key, kind = type_name::<T>(), "Value registered in container");
        self.definitions.insert(key, Definition::Value(value));
    }

    /// Register a shared factory: invoked once on first `get`, result cached.
    ///
    /// A factory that fails caches nothing, so a later `get` runs it again.
    pub fn register<T, F>(&mut self, key: impl Into<String>, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
    {
        let key = key.into();
        debug!(service = %key, kind = type_name::<T>(), "Shared factory registered in container");
        let factory: FactoryFn = Arc::new(move |container: &Container, _args: &[String]| {
            Ok(Arc::new(factory(container)?) as Service)
        });
        self.definitions.insert(
            key,
            Definition::Shared {
                factory,
                resolved: OnceCell::new(),
            },
        );
    }

    /// Register a per-call factory: every resolution builds a fresh instance.
    ///
    /// `get` invokes it without arguments; [`Container::make`] passes
    /// construction arguments through.
    pub fn factory<T, F>(&mut self, key: impl Into<String>, factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(&Container, &[String]) -> Result<T> + Send + Sync + 'static,
    {
        let key = key.into();
        debug!(service = %key, kind = type_name::<T>(), "Per-call factory registered in container");
        let factory: FactoryFn = Arc::new(move |container: &Container, args: &[String]| {
            Ok(Arc::new(factory(container, args)?) as Service)
        });
        self.definitions.insert(key, Definition::Factory(factory));
    }

    /// Resolve a service by key.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        trace!(service = key, "Resolving service");

        let definition = self
            .definitions
            .get(key)
            .ok_or_else(|| Error::unknown_service(key))?;

        let service = match definition {
            Definition::Value(value) => value.clone(),
            Definition::Shared { factory, resolved } => resolved
                .get_or_try_init(|| {
                    debug!(service = key, "Building shared service");
                    factory(self, &[])
                })?
                .clone(),
            Definition::Factory(factory) => factory(self, &[])?,
        };

        downcast(key, service)
    }

    /// Invoke the per-call factory registered under `key` with `args`.
    pub fn make<T: Any + Send + Sync>(&self, key: &str, args: &[String]) -> Result<Arc<T>> {
        match self.definitions.get(key) {
            Some(Definition::Factory(factory)) => {
                trace!(service = key, args = args.len(), "Invoking per-call factory");
                downcast(key, factory(self, args)?)
            }
            Some(_) => Err(Error::new(
                ErrorKind::UnknownService,
                format!("Service '{}' is not a per-call factory", key),
            )),
            None => Err(Error::unknown_service(key)),
        }
    }

    /// Check if a key is registered
    pub fn has(&self, key: &str) -> bool {
        self.definitions.contains_key(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.keys())
            .finish()
    }
}

fn downcast<T: Any + Send + Sync>(key: &str, service: Service) -> Result<Arc<T>> {
    service
        .downcast::<T>()
        .map_err(|_| Error::service_type_mismatch(key, type_name::<T>()))
}
