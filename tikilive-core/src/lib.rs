// Request dispatch core for the TikiLIVE REST API
// Container, routing, dispatch, JSON envelopes and error translation

pub mod application;
pub mod container;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod exception_filter;
pub mod http;
pub mod logging;
pub mod parameters;
pub mod response;
pub mod route_constraint;
pub mod routing;
pub mod status;

// Re-export commonly used types
pub use application::*;
pub use container::*;
pub use controller::*;
pub use dispatcher::*;
pub use error::*;
pub use exception_filter::*;
pub use self::http::*;
pub use parameters::*;
pub use response::*;
pub use route_constraint::*;
pub use routing::*;
pub use status::*;
