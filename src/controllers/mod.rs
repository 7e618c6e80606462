//! Resource controllers.
//!
//! Both controllers follow the same contract: `GET /name` lists active
//! records with a `pager` block, `GET /name/:id` shows one, `POST /name`
//! creates, `PUT /name/:id` updates with the stored values as fallbacks and
//! `DELETE /name/:id` removes.

pub mod channels;
pub mod users;

pub use channels::ChannelsController;
pub use users::UsersController;

use crate::bootstrap::{CHANNEL_STORE_SERVICE, USER_STORE_SERVICE};
use crate::store::{ChannelStore, Page, UserStore};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tikilive_config::Settings;
use tikilive_core::{
    CONFIG_SERVICE, Container, Error, ErrorKind, HttpRequest, JsonResponse, ParameterBag,
    REQUEST_SERVICE, ROUTER_SERVICE, Result, Router, UrlBase,
};

/// Listing arguments read from the query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub offset: usize,
    pub limit: usize,
    pub order_by: String,
    pub direction: String,
}

impl Listing {
    /// `offset`, `limit`, `order_by` and `direction`, defaulted from settings.
    /// The limit is capped at `collection.max_limit`.
    pub fn from_params(params: &ParameterBag, settings: &Settings) -> Result<Self> {
        let limit: usize = params.get_as("limit", settings.default_limit)?;

        Ok(Self {
            offset: params.get_as("offset", 0)?,
            limit: limit.min(settings.max_limit),
            order_by: params.get_or("order_by", &settings.default_order_by),
            direction: params.get_or("direction", &settings.default_direction),
        })
    }

    pub fn page(&self) -> Page<'_> {
        Page {
            offset: self.offset,
            limit: self.limit,
            order_by: &self.order_by,
            direction: &self.direction,
        }
    }

    /// Listing envelope with the `pager` block after the standard keys
    pub fn respond(&self, items: Vec<Value>, total: usize) -> JsonResponse {
        let mut response = JsonResponse::ok(Value::Array(items));
        response.set_custom(
            "pager",
            json!({
                "offset": self.offset,
                "limit": self.limit,
                "total": total,
            }),
        );
        response
    }
}

/// Services every controller resolves from the container
#[derive(Clone)]
pub(crate) struct Services {
    pub channels: Arc<dyn ChannelStore>,
    pub users: Arc<dyn UserStore>,
    pub settings: Arc<Settings>,
    links: Links,
}

impl Services {
    pub fn resolve(container: &Container) -> Result<Self> {
        let settings = container.get::<Settings>(CONFIG_SERVICE)?;
        let base = container
            .get::<HttpRequest>(REQUEST_SERVICE)
            .ok()
            .and_then(|request| UrlBase::from_request(&request, &settings.url_options()));

        let channels = container.get::<Arc<dyn ChannelStore>>(CHANNEL_STORE_SERVICE)?;
        let users = container.get::<Arc<dyn UserStore>>(USER_STORE_SERVICE)?;

        Ok(Self {
            channels: Arc::clone(&*channels),
            users: Arc::clone(&*users),
            links: Links {
                router: container.get::<Router>(ROUTER_SERVICE)?,
                base,
            },
            settings,
        })
    }

    /// Absolute URL of `/:controller/:id` when the request named a host
    pub fn resource_url(&self, controller: &str, id: u64) -> Result<String> {
        let params = HashMap::from([
            ("controller".to_string(), controller.to_string()),
            ("id".to_string(), id.to_string()),
        ]);
        self.links
            .router
            .url_for(RESOURCE_ROUTE, &params, self.links.base.as_ref())
    }
}

#[derive(Clone)]
struct Links {
    router: Arc<Router>,
    base: Option<UrlBase>,
}

/// Route names of the default route table
pub const RESOURCE_ROUTE: &str = "resource";
pub const COLLECTION_ROUTE: &str = "collection";

/// Turn store rejections into client errors.
///
/// Validation failures keep their field errors and stay reachable as the
/// cause; bad listing arguments become a plain 400.
pub(crate) fn client_error(error: Error) -> Error {
    match error.kind() {
        ErrorKind::Validation | ErrorKind::InvalidArgument => error.recategorize(ErrorKind::BadRequest),
        _ => error,
    }
}

/// The route `id` as a number. An id too large to parse names no record.
pub(crate) fn record_id(params: &ParameterBag) -> Option<u64> {
    params.param("id").and_then(|id| id.parse().ok())
}

/// `{id}` body returned by creations, with a `Location` header
pub(crate) fn created(id: u64, location: Result<String>) -> JsonResponse {
    let response = JsonResponse::ok(json!({ "id": id }));
    match location {
        Ok(url) => response.with_header("Location", url),
        Err(_) => response,
    }
}
