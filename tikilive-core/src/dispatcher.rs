//! Request dispatch
//!
//! Each request walks `Unmatched → Matched → Resolved → Invoked` and ends in
//! `Succeeded` or `Failed`. Errors raised along the way, including the
//! handler's own, are carried out unchanged; translating them is left to
//! the [`ExceptionTranslator`](crate::ExceptionTranslator).

use crate::logging::debug;
use crate::{
    Container, ControllerRegistry, Error, ErrorKind, HandlerOutput, HttpRequest, MatchedRoute,
    ParameterBag, Result, Router, Verb, controller_name,
};

/// Container key of the compiled [`Router`]
pub const ROUTER_SERVICE: &str = "router";

/// Container key of the [`ControllerRegistry`]
pub const CONTROLLERS_SERVICE: &str = "controllers";

/// Route parameter naming the controller
pub const CONTROLLER_PARAM: &str = "controller";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Unmatched,
    Matched,
    Resolved,
    Invoked,
    Succeeded,
    Failed,
}

impl DispatchStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchStage::Succeeded | DispatchStage::Failed)
    }
}

/// Outcome of one dispatch.
#[derive(Debug)]
pub struct Dispatch {
    /// Last stage reached before the outcome
    reached: DispatchStage,
    route: Option<MatchedRoute>,
    outcome: Result<HandlerOutput>,
}

impl Dispatch {
    fn failed(reached: DispatchStage, route: Option<MatchedRoute>, error: Error) -> Self {
        debug!(stage = ?reached, kind = %error.kind(), "Dispatch failed");
        Self {
            reached,
            route,
            outcome: Err(error),
        }
    }

    /// `Succeeded` or `Failed`
    pub fn stage(&self) -> DispatchStage {
        if self.outcome.is_ok() {
            DispatchStage::Succeeded
        } else {
            DispatchStage::Failed
        }
    }

    pub fn reached(&self) -> DispatchStage {
        self.reached
    }

    /// Whether a controller operation was called.
    ///
    /// True as well when the controller kept the default for that operation:
    /// the default ran and answered `MethodNotAllowed` without an `Allow`
    /// header, since a controller does not advertise which operations it
    /// overrides.
    pub fn handler_invoked(&self) -> bool {
        self.reached == DispatchStage::Invoked
    }

    pub fn route(&self) -> Option<&MatchedRoute> {
        self.route.as_ref()
    }

    pub fn outcome(&self) -> &Result<HandlerOutput> {
        &self.outcome
    }

    pub fn into_result(self) -> Result<HandlerOutput> {
        self.outcome
    }
}

/// Resolves and invokes exactly one controller operation per request.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    namespace_prefix: String,
}

impl Dispatcher {
    pub fn new(namespace_prefix: impl Into<String>) -> Self {
        Self {
            namespace_prefix: namespace_prefix.into(),
        }
    }

    pub fn namespace_prefix(&self) -> &str {
        &self.namespace_prefix
    }

    pub fn dispatch(&self, container: &Container, request: &HttpRequest) -> Dispatch {
        // Unmatched
        let matched = match container
            .get::<Router>(ROUTER_SERVICE)
            .and_then(|router| router.match_route(&request.path, &request.method))
        {
            Ok(matched) => matched,
            Err(error) => return Dispatch::failed(DispatchStage::Unmatched, None, error),
        };
        debug!(route = matched.name(), method = %matched.method(), path = %request.path, "Route matched");

        // Matched
        let name = match matched.param(CONTROLLER_PARAM) {
            Some(controller) => controller_name(&self.namespace_prefix, controller),
            None => {
                let error = Error::new(
                    ErrorKind::ControllerNotFound,
                    format!("Route '{}' names no controller", matched.name()),
                );
                return Dispatch::failed(DispatchStage::Matched, Some(matched), error);
            }
        };
        let controller = match container
            .get::<ControllerRegistry>(CONTROLLERS_SERVICE)
            .and_then(|registry| registry.resolve(&name, container))
        {
            Ok(controller) => controller,
            Err(error) => return Dispatch::failed(DispatchStage::Matched, Some(matched), error),
        };
        debug!(controller = %name, "Controller resolved");

        // Resolved
        let Some(verb) = Verb::from_method(matched.method()) else {
            let allowed: Vec<_> = matched
                .route()
                .methods()
                .iter()
                .copied()
                .filter(|method| Verb::from_method(*method).is_some())
                .collect();
            let error = Error::method_not_allowed(matched.method().as_str(), &allowed);
            return Dispatch::failed(DispatchStage::Resolved, Some(matched), error);
        };
        let params = match ParameterBag::from_request(matched.params().clone(), request) {
            Ok(params) => params,
            Err(error) => return Dispatch::failed(DispatchStage::Resolved, Some(matched), error),
        };

        // Invoked
        debug!(controller = %name, operation = verb.as_str(), "Invoking controller");
        let outcome = controller.invoke(verb, &params);
        if let Err(error) = &outcome {
            debug!(controller = %name, kind = %error.kind(), "Controller raised an error");
        }

        Dispatch {
            reached: DispatchStage::Invoked,
            route: Some(matched),
            outcome,
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new("")
    }
}
