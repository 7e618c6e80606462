//! Composition root: route table, controller registry and the per-request
//! container.

use crate::controllers::{COLLECTION_ROUTE, ChannelsController, RESOURCE_ROUTE, UsersController};
use crate::store::{ChannelStore, MemoryChannelStore, MemoryUserStore, UserStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tikilive_config::{ConfigService, Settings};
use tikilive_core::{
    Application, CONFIG_SERVICE, CONTROLLERS_SERVICE, Container, ControllerRegistry,
    DISPATCHER_SERVICE, Dispatcher, EXCEPTION_HANDLER_SERVICE, Error, HttpMethod, HttpRequest,
    HttpResponse, RESPONSE_FORMAT_SERVICE, RESPONSE_HANDLER_SERVICE, ROUTER_SERVICE,
    ResponseNormalizer, Result, Router, controller_name, serve,
};
use tracing::info;

/// Container key of the `Arc<dyn ChannelStore>`
pub const CHANNEL_STORE_SERVICE: &str = "store.channels";

/// Container key of the `Arc<dyn UserStore>`
pub const USER_STORE_SERVICE: &str = "store.users";

/// Container key of the per-call [`ConfigService`] loader; arguments are
/// configuration directories
pub const CONFIG_FACTORY_SERVICE: &str = "config.factory";

/// Controller names, as they appear in request paths
pub const CONTROLLERS: [&str; 2] = ["channels", "users"];

/// `/:controller/:id` and `/:controller`
pub fn routes() -> Result<Router> {
    let mut builder = Router::builder();
    builder
        .map(RESOURCE_ROUTE, "/:controller/:id")
        .methods([HttpMethod::GET, HttpMethod::PUT, HttpMethod::DELETE])
        .requirements([("controller", "[a-z0-9_-]+"), ("id", r"[1-9]\d*")]);
    builder
        .map(COLLECTION_ROUTE, "/:controller")
        .methods([HttpMethod::POST, HttpMethod::GET])
        .requirement("controller", "[a-z0-9_-]+");
    builder.build()
}

/// Controller factories, named `<prefix><Name>Controller`
pub fn controllers(namespace_prefix: &str) -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();
    registry
        .register(controller_name(namespace_prefix, "channels"), |container: &Container| {
            Ok(Box::new(ChannelsController::from_container(container)?))
        })
        .register(controller_name(namespace_prefix, "users"), |container: &Container| {
            Ok(Box::new(UsersController::from_container(container)?))
        });
    registry
}

/// Everything that outlives a request.
///
/// Each request gets a fresh [`Container`] from [`Kernel::container`]; the
/// router, registry, stores and settings are shared into it.
#[derive(Clone)]
pub struct Kernel {
    settings: Arc<Settings>,
    router: Arc<Router>,
    controllers: Arc<ControllerRegistry>,
    channels: Arc<dyn ChannelStore>,
    users: Arc<dyn UserStore>,
}

impl Kernel {
    /// Kernel over empty in-memory stores
    pub fn new(settings: Settings) -> Result<Self> {
        Self::with_stores(
            settings,
            Arc::new(MemoryChannelStore::new()),
            Arc::new(MemoryUserStore::new()),
        )
    }

    pub fn with_stores(
        settings: Settings,
        channels: Arc<dyn ChannelStore>,
        users: Arc<dyn UserStore>,
    ) -> Result<Self> {
        let router = routes()?;
        let controllers = controllers(&settings.namespace_prefix);
        info!(
            routes = router.routes().count(),
            controllers = ?controllers.names().collect::<Vec<_>>(),
            debug = settings.debug,
            "Kernel ready"
        );

        Ok(Self {
            settings: Arc::new(settings),
            router: Arc::new(router),
            controllers: Arc::new(controllers),
            channels,
            users,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn channels(&self) -> &Arc<dyn ChannelStore> {
        &self.channels
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// A request's container with every service the pipeline resolves
    pub fn container(&self) -> Container {
        let mut container = Container::new();

        container.set_arc(CONFIG_SERVICE, Arc::clone(&self.settings));
        container.set_arc(ROUTER_SERVICE, Arc::clone(&self.router));
        container.set_arc(CONTROLLERS_SERVICE, Arc::clone(&self.controllers));
        container.set(CHANNEL_STORE_SERVICE, Arc::clone(&self.channels));
        container.set(USER_STORE_SERVICE, Arc::clone(&self.users));
        container.set(RESPONSE_FORMAT_SERVICE, self.settings.envelope_format());

        let settings = Arc::clone(&self.settings);
        container.register(DISPATCHER_SERVICE, move |_: &Container| {
            Ok(Dispatcher::new(settings.namespace_prefix.clone()))
        });
        let settings = Arc::clone(&self.settings);
        container.register(EXCEPTION_HANDLER_SERVICE, move |_: &Container| {
            Ok(settings.translator())
        });
        container.register(RESPONSE_HANDLER_SERVICE, |_: &Container| Ok(ResponseNormalizer::new()));
        container.factory(CONFIG_FACTORY_SERVICE, |_: &Container, dirs: &[String]| {
            ConfigService::from_dirs(dirs).map_err(Error::from)
        });

        container
    }

    pub fn application(&self) -> Application {
        Application::new(self.container())
    }

    /// Run one request through a fresh application
    pub fn handle(&self, request: HttpRequest) -> HttpResponse {
        self.application().handle(request)
    }

    /// Serve HTTP on `address` until Ctrl-C
    pub async fn serve(self, address: SocketAddr) -> Result<()> {
        serve(address, move || Ok(self.application())).await
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("settings", &self.settings)
            .field("router", &self.router)
            .field("controllers", &self.controllers)
            .finish()
    }
}
