use serde_json::json;
use std::sync::Arc;
use tikilive_core::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_test::assert_ok;

struct PingController;

impl Controller for PingController {
    fn get(&self, params: &ParameterBag) -> HandlerResult {
        Ok(json!({"pong": params.get_or("echo", "")}).into())
    }

    fn create(&self, params: &ParameterBag) -> HandlerResult {
        Ok(json!({"received": params.post("name")}).into())
    }
}

fn factory(router: Arc<Router>) -> impl Fn() -> Result<Application> + Send + Sync + 'static {
    move || {
        let mut registry = ControllerRegistry::new();
        registry.register("PingController", |_| Ok(Box::new(PingController)));

        let mut container = Container::new();
        container.set_arc(ROUTER_SERVICE, Arc::clone(&router));
        container.set(CONTROLLERS_SERVICE, registry);
        container.set(DISPATCHER_SERVICE, Dispatcher::default());
        container.set(EXCEPTION_HANDLER_SERVICE, ExceptionTranslator::production());
        container.set(RESPONSE_HANDLER_SERVICE, ResponseNormalizer::new());
        Ok(Application::new(container))
    }
}

fn router() -> Arc<Router> {
    let mut builder = RouterBuilder::new();
    builder
        .map("collection", "/:controller")
        .methods([HttpMethod::GET, HttpMethod::POST])
        .requirement("controller", "[a-z]+");
    Arc::new(builder.build().unwrap())
}

async fn start<F>(factory: F) -> (std::net::SocketAddr, oneshot::Sender<()>)
where
    F: Fn() -> Result<Application> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    tokio::spawn(async move {
        serve_listener(listener, factory, async move {
            let _ = stopped.await;
        })
        .await
        .unwrap();
    });

    (address, stop)
}

async fn send(address: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(address).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_serves_envelope() {
    let (address, stop) = start(factory(router())).await;

    let response = send(
        address,
        "GET /ping?echo=hello HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
    assert!(response.to_ascii_lowercase().contains("content-type: application/json"));
    assert!(response.contains(r#"{"status":200,"message":"OK","data":{"pong":"hello"}}"#));

    let _ = stop.send(());
}

#[tokio::test]
async fn test_forwards_form_body() {
    let (address, stop) = start(factory(router())).await;

    let body = "name=News";
    let raw = format!(
        "POST /ping HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let response = send(address, &raw).await;

    assert!(response.starts_with("HTTP/1.1 200"), "{}", response);
    assert!(response.contains(r#""received":"News""#));

    let _ = stop.send(());
}

#[tokio::test]
async fn test_errors_are_translated() {
    let (address, stop) = start(factory(router())).await;

    let not_found = send(
        address,
        "GET /Ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(not_found.starts_with("HTTP/1.1 404"), "{}", not_found);

    let not_allowed = send(
        address,
        "DELETE /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(not_allowed.starts_with("HTTP/1.1 405"), "{}", not_allowed);
    assert!(not_allowed.to_ascii_lowercase().contains("allow: get, post"));

    let _ = stop.send(());
}

#[tokio::test]
async fn test_factory_failure_is_500() {
    let (address, stop) = start(|| Err(Error::config("settings unavailable"))).await;

    let response = send(
        address,
        "GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 500"), "{}", response);
    assert!(response.contains(r#""message":"Internal Server Error""#));

    let _ = stop.send(());
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let server = tokio::spawn(serve_listener(listener, factory(router()), async move {
        let _ = stopped.await;
    }));

    stop.send(()).unwrap();
    assert_ok!(server.await.unwrap());
}
