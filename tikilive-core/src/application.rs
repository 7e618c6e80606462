// Application pipeline and HTTP server

use crate::logging::{debug, error, info};
use crate::{
    Container, Dispatcher, EnvelopeFormat, Error, ExceptionTranslator, HttpRequest, HttpResponse,
    JsonResponse, ResponseNormalizer, Result,
};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Request, Response, StatusCode, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::Instrument;
use uuid::Uuid;

/// Container key of the application settings
pub const CONFIG_SERVICE: &str = "config";

/// Container key of the current [`HttpRequest`], set by [`Application::handle`]
pub const REQUEST_SERVICE: &str = "request";

/// Container key of the [`Dispatcher`]
pub const DISPATCHER_SERVICE: &str = "dispatcher";

/// Container key of the [`ExceptionTranslator`]
pub const EXCEPTION_HANDLER_SERVICE: &str = "exception.handler";

/// Container key of the [`ResponseNormalizer`]
pub const RESPONSE_HANDLER_SERVICE: &str = "response.handler";

/// Container key of the [`EnvelopeFormat`]; optional
pub const RESPONSE_FORMAT_SERVICE: &str = "response.format";

/// One request's worth of pipeline: match, dispatch, normalize, translate.
///
/// An application owns its container and is consumed by [`Application::handle`];
/// build a fresh one for every request.
pub struct Application {
    container: Container,
}

impl Application {
    pub fn new(container: Container) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    /// Run the pipeline for `request` and emit the final response.
    ///
    /// Never fails: errors raised while routing or inside a controller go
    /// through the registered translator, and a missing pipeline service is
    /// reported by a production translator.
    pub fn handle(mut self, request: HttpRequest) -> HttpResponse {
        let request = Arc::new(request);
        self.container.set_arc(REQUEST_SERVICE, Arc::clone(&request));

        let format = self
            .container
            .get::<EnvelopeFormat>(RESPONSE_FORMAT_SERVICE)
            .map(|format| format.as_ref().clone())
            .unwrap_or_default();

        let envelope = match self.run(&request) {
            Ok(envelope) => envelope,
            Err(error) => ExceptionTranslator::production().translate(&error),
        };

        debug!(status = envelope.status(), "Response ready");
        envelope.into_http(&format)
    }

    fn run(&self, request: &HttpRequest) -> Result<JsonResponse> {
        let dispatcher = self.container.get::<Dispatcher>(DISPATCHER_SERVICE)?;
        let translator = self
            .container
            .get::<ExceptionTranslator>(EXCEPTION_HANDLER_SERVICE)?;
        let normalizer = self
            .container
            .get::<ResponseNormalizer>(RESPONSE_HANDLER_SERVICE)?;

        let dispatch = dispatcher.dispatch(&self.container, request);
        Ok(match dispatch.into_result() {
            Ok(output) => normalizer.normalize(output),
            Err(error) => translator.translate(&error),
        })
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("container", &self.container)
            .finish()
    }
}

/// Serve on `address` until Ctrl-C.
///
/// `factory` builds the [`Application`] for each request.
pub async fn serve<F>(address: SocketAddr, factory: F) -> Result<()>
where
    F: Fn() -> Result<Application> + Send + Sync + 'static,
{
    let listener = TcpListener::bind(address).await?;
    serve_listener(listener, factory, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
    })
    .await
}

/// Accept connections from `listener` until `shutdown` completes.
///
/// Connections already accepted are served to completion on their own tasks.
pub async fn serve_listener<F, S>(listener: TcpListener, factory: F, shutdown: S) -> Result<()>
where
    F: Fn() -> Result<Application> + Send + Sync + 'static,
    S: Future<Output = ()>,
{
    let factory = Arc::new(factory);
    info!(address = %listener.local_addr()?, "Server listening");

    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = &mut shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
                return Ok(());
            }
        };

        let io = TokioIo::new(stream);
        let factory = Arc::clone(&factory);

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<IncomingBody>| {
                let factory = Arc::clone(&factory);
                async move { handle_request(req, factory, peer).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!(%peer, error = %err, "Error serving connection");
            }
        });
    }
}

/// Handle an incoming HTTP request
async fn handle_request<F>(
    req: Request<IncomingBody>,
    factory: Arc<F>,
    peer: SocketAddr,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error>
where
    F: Fn() -> Result<Application> + Send + Sync + 'static,
{
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
        %peer
    );

    async move {
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let mut request = HttpRequest::new(req.method().as_str(), &target);

        for (name, value) in req.headers() {
            if let Ok(value) = value.to_str() {
                request = request.with_header(name.as_str(), value);
            }
        }

        request.body = req.collect().await?.to_bytes().to_vec();

        let span = tracing::Span::current();
        let response = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            match factory() {
                Ok(application) => application.handle(request),
                Err(error) => failure_response(&error),
            }
        })
        .await
        .unwrap_or_else(|join_error| {
            error!(error = %join_error, "Request handler panicked");
            failure_response(&Error::internal(join_error.to_string()))
        });

        info!(status = response.status, "Request completed");
        Ok(into_hyper(response))
    }
    .instrument(span)
    .await
}

/// Response for failures outside the pipeline, such as an application that
/// could not be built.
fn failure_response(error: &Error) -> HttpResponse {
    ExceptionTranslator::production()
        .translate(error)
        .into_http(&EnvelopeFormat::default())
}

fn into_hyper(response: HttpResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);

    for (key, value) in &response.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    builder
        .body(Full::new(Bytes::from(response.body)))
        .unwrap_or_else(|e| {
            error!(status = response.status, error = %e, "Invalid response, replying 500");
            invalid_response_fallback()
        })
}

/// 500 envelope for a response hyper refused to build.
fn invalid_response_fallback() -> Response<Full<Bytes>> {
    let envelope = failure_response(&Error::internal("Handler produced an invalid HTTP response"));

    let mut fallback = Response::new(Full::new(Bytes::from(envelope.body)));
    *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    fallback
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    fallback
}
