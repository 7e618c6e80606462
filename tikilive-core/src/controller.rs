// Controller contract and registry

use crate::logging::debug;
use crate::{Container, Error, HandlerResult, HttpMethod, ParameterBag, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// The four canonical handler operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Create,
    Update,
    Delete,
}

impl Verb {
    /// GET, POST, PUT and DELETE map one to one; other methods have no operation.
    pub fn from_method(method: HttpMethod) -> Option<Self> {
        match method {
            HttpMethod::GET => Some(Verb::Get),
            HttpMethod::POST => Some(Verb::Create),
            HttpMethod::PUT => Some(Verb::Update),
            HttpMethod::DELETE => Some(Verb::Delete),
            _ => None,
        }
    }

    pub fn method(&self) -> HttpMethod {
        match self {
            Verb::Get => HttpMethod::GET,
            Verb::Create => HttpMethod::POST,
            Verb::Update => HttpMethod::PUT,
            Verb::Delete => HttpMethod::DELETE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

/// A pluggable resource handler.
///
/// Operations a controller does not override answer `MethodNotAllowed`
/// with no `Allow` header.
pub trait Controller: Send + Sync {
    fn get(&self, _params: &ParameterBag) -> HandlerResult {
        Err(Error::method_not_allowed("GET", &[]))
    }

    fn create(&self, _params: &ParameterBag) -> HandlerResult {
        Err(Error::method_not_allowed("POST", &[]))
    }

    fn update(&self, _params: &ParameterBag) -> HandlerResult {
        Err(Error::method_not_allowed("PUT", &[]))
    }

    fn delete(&self, _params: &ParameterBag) -> HandlerResult {
        Err(Error::method_not_allowed("DELETE", &[]))
    }

    /// Run the operation selected by `verb`.
    fn invoke(&self, verb: Verb, params: &ParameterBag) -> HandlerResult {
        match verb {
            Verb::Get => self.get(params),
            Verb::Create => self.create(params),
            Verb::Update => self.update(params),
            Verb::Delete => self.delete(params),
        }
    }
}

/// Builds a controller from the request's container.
pub type ControllerFactory = Arc<dyn Fn(&Container) -> Result<Box<dyn Controller>> + Send + Sync>;

/// Controller factories keyed by fully qualified controller name
/// (e.g. `api.ChannelsController`). Filled at startup, read-only afterwards.
#[derive(Default, Clone)]
pub struct ControllerRegistry {
    factories: BTreeMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Container) -> Result<Box<dyn Controller>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(controller = %name, "Controller registered");
        self.factories.insert(name, Arc::new(factory));
        self
    }

    /// Construct the controller registered under `name`.
    pub fn resolve(&self, name: &str, container: &Container) -> Result<Box<dyn Controller>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::controller_not_found(name))?;
        factory(container)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRegistry")
            .field("controllers", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// `prefix` + StudlyCase(`controller`) + `Controller`.
///
/// Words are split on `-` and `_`:
///
/// ```
/// use tikilive_core::controller_name;
///
/// assert_eq!(controller_name("api.", "channels"), "api.ChannelsController");
/// assert_eq!(controller_name("api.", "user-groups"), "api.UserGroupsController");
/// assert_eq!(controller_name("", "live_events"), "LiveEventsController");
/// ```
pub fn controller_name(prefix: &str, controller: &str) -> String {
    let mut name = String::with_capacity(prefix.len() + controller.len() + 10);
    name.push_str(prefix);

    for word in controller.split(['-', '_']).filter(|word| !word.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }

    name.push_str("Controller");
    name
}
