use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tikilive_core::*;

/// Counts invocations so tests can assert a handler ran exactly once, or not at all.
struct CountingController {
    calls: Arc<AtomicUsize>,
}

impl Controller for CountingController {
    fn get(&self, params: &ParameterBag) -> HandlerResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match params.param("id") {
            Some("404") => Err(Error::not_found("Channel does not exist.")),
            Some(id) => Ok(json!({"id": id}).into()),
            None => Ok(json!([]).into()),
        }
    }

    fn create(&self, params: &ParameterBag) -> HandlerResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"name": params.post("name")}).into())
    }
}

fn router() -> Arc<Router> {
    let mut builder = RouterBuilder::new();
    builder.map("status", "/status").methods([HttpMethod::GET]);
    builder
        .map("resource", "/:controller/:id")
        .methods([HttpMethod::GET, HttpMethod::PUT, HttpMethod::DELETE, HttpMethod::OPTIONS])
        .requirements([("controller", "[a-z0-9_-]+"), ("id", r"[1-9]\d*")]);
    builder
        .map("collection", "/:controller")
        .methods([HttpMethod::POST, HttpMethod::GET])
        .requirement("controller", "[a-z0-9_-]+");
    Arc::new(builder.build().unwrap())
}

fn container(calls: &Arc<AtomicUsize>) -> Container {
    let mut registry = ControllerRegistry::new();
    let counter = Arc::clone(calls);
    registry.register("api.ChannelsController", move |_| {
        Ok(Box::new(CountingController {
            calls: Arc::clone(&counter),
        }))
    });
    registry.register("api.BrokenController", |_| Err(Error::store("no database")));

    let mut container = Container::new();
    container.set_arc(ROUTER_SERVICE, router());
    container.set(CONTROLLERS_SERVICE, registry);
    container
}

fn dispatch(method: &str, target: &str) -> (Dispatch, usize) {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = container(&calls);
    let request = HttpRequest::new(method, target);
    let dispatch = Dispatcher::new("api.").dispatch(&container, &request);
    (dispatch, calls.load(Ordering::SeqCst))
}

#[test]
fn test_successful_dispatch() {
    let (dispatch, calls) = dispatch("GET", "/channels/42");

    assert_eq!(dispatch.stage(), DispatchStage::Succeeded);
    assert_eq!(dispatch.reached(), DispatchStage::Invoked);
    assert!(dispatch.handler_invoked());
    assert_eq!(calls, 1);
    assert_eq!(dispatch.route().unwrap().name(), "resource");
    assert_eq!(
        dispatch.into_result().unwrap(),
        HandlerOutput::Value(json!({"id": "42"}))
    );
}

#[test]
fn test_unmatched_path() {
    let (dispatch, calls) = dispatch("GET", "/channels/0");

    assert_eq!(dispatch.stage(), DispatchStage::Failed);
    assert_eq!(dispatch.reached(), DispatchStage::Unmatched);
    assert_eq!(calls, 0);
    let error = dispatch.into_result().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::RouteNotFound);
}

#[test]
fn test_unsupported_verb_invokes_nothing() {
    let (dispatch, calls) = dispatch("PATCH", "/channels/1");

    assert_eq!(dispatch.stage(), DispatchStage::Failed);
    assert!(!dispatch.handler_invoked());
    assert_eq!(calls, 0);
    assert_eq!(dispatch.into_result().unwrap_err().status_code(), 405);
}

#[test]
fn test_unknown_controller() {
    let (dispatch, _) = dispatch("GET", "/playlists/1");

    assert_eq!(dispatch.reached(), DispatchStage::Matched);
    let error = dispatch.into_result().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ControllerNotFound);
    assert!(error.message().contains("api.PlaylistsController"));
}

#[test]
fn test_route_without_controller_param() {
    let (dispatch, _) = dispatch("GET", "/status");
    assert_eq!(dispatch.reached(), DispatchStage::Matched);
    assert_eq!(
        dispatch.into_result().unwrap_err().kind(),
        ErrorKind::ControllerNotFound
    );
}

#[test]
fn test_controller_factory_error_passes_through() {
    let (dispatch, _) = dispatch("GET", "/broken/1");
    assert_eq!(dispatch.reached(), DispatchStage::Matched);
    assert_eq!(dispatch.into_result().unwrap_err().kind(), ErrorKind::Store);
}

#[test]
fn test_method_without_operation() {
    let (dispatch, calls) = dispatch("OPTIONS", "/channels/1");

    assert_eq!(dispatch.reached(), DispatchStage::Resolved);
    assert_eq!(calls, 0);
    let error = dispatch.into_result().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::MethodNotAllowed);
    assert_eq!(error.headers()[0].1, "GET, PUT, DELETE");
}

#[test]
fn test_unimplemented_operation_is_method_not_allowed() {
    let (dispatch, calls) = dispatch("DELETE", "/channels/1");

    assert!(dispatch.handler_invoked());
    assert_eq!(dispatch.reached(), DispatchStage::Invoked);
    assert_eq!(calls, 0);
    let error = dispatch.into_result().unwrap_err();
    assert_eq!(error.status_code(), 405);
    assert!(error.headers().is_empty());
}

#[test]
fn test_handler_error_is_not_rewrapped() {
    let (dispatch, calls) = dispatch("GET", "/channels/404");

    assert_eq!(calls, 1);
    assert_eq!(dispatch.stage(), DispatchStage::Failed);
    let error = dispatch.into_result().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert_eq!(error.message(), "Channel does not exist.");
    assert!(std::error::Error::source(&error).is_none());
}

#[test]
fn test_body_reaches_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = container(&calls);
    let request = HttpRequest::new("POST", "/channels").with_form([("name", "News")]);

    let dispatch = Dispatcher::new("api.").dispatch(&container, &request);
    assert_eq!(
        dispatch.into_result().unwrap(),
        HandlerOutput::Value(json!({"name": "News"}))
    );
}

#[test]
fn test_malformed_body_fails_before_invocation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let container = container(&calls);
    let request = HttpRequest::new("POST", "/channels")
        .with_header("Content-Type", "application/json")
        .with_body("{");

    let dispatch = Dispatcher::new("api.").dispatch(&container, &request);
    assert_eq!(dispatch.reached(), DispatchStage::Resolved);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(dispatch.into_result().unwrap_err().status_code(), 400);
}

#[test]
fn test_missing_router_fails_unmatched() {
    let container = Container::new();
    let request = HttpRequest::new("GET", "/channels/1");
    let dispatch = Dispatcher::new("api.").dispatch(&container, &request);

    assert_eq!(dispatch.reached(), DispatchStage::Unmatched);
    assert_eq!(
        dispatch.into_result().unwrap_err().kind(),
        ErrorKind::UnknownService
    );
}
