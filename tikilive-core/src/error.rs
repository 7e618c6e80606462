// Error types for the TikiLIVE dispatch core

use crate::{HttpMethod, HttpStatus};
use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::panic::Location;
use thiserror::Error;

/// Field-level validation detail: field name to the list of violations.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Boxed foreign error used as the cause of an [`Error`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy.
///
/// Categorized kinds carry an HTTP status and their message is shown to
/// clients verbatim. Every other kind is an internal fault and is reported
/// as a 500 with a generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Categorized
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RouteNotFound,
    ControllerNotFound,
    MethodNotAllowed,
    Conflict,

    // Uncategorized
    UnknownService,
    ServiceTypeMismatch,
    MissingParameter,
    InvalidRoute,
    InvalidArgument,
    Validation,
    Store,
    Config,
    Io,
    Serialization,
    Internal,
}

impl ErrorKind {
    /// The status carried by a categorized kind, `None` for internal faults.
    pub fn status(&self) -> Option<HttpStatus> {
        match self {
            ErrorKind::BadRequest => Some(HttpStatus::BadRequest),
            ErrorKind::Unauthorized => Some(HttpStatus::Unauthorized),
            ErrorKind::Forbidden => Some(HttpStatus::Forbidden),
            ErrorKind::NotFound
            | ErrorKind::RouteNotFound
            | ErrorKind::ControllerNotFound => Some(HttpStatus::NotFound),
            ErrorKind::MethodNotAllowed => Some(HttpStatus::MethodNotAllowed),
            ErrorKind::Conflict => Some(HttpStatus::Conflict),
            _ => None,
        }
    }

    pub fn is_categorized(&self) -> bool {
        self.status().is_some()
    }

    /// Type name reported in diagnostic output.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequestError",
            ErrorKind::Unauthorized => "UnauthorizedError",
            ErrorKind::Forbidden => "ForbiddenError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::RouteNotFound => "RouteNotFoundError",
            ErrorKind::ControllerNotFound => "ControllerNotFoundError",
            ErrorKind::MethodNotAllowed => "MethodNotAllowedError",
            ErrorKind::Conflict => "ConflictError",
            ErrorKind::UnknownService => "UnknownServiceError",
            ErrorKind::ServiceTypeMismatch => "ServiceTypeMismatchError",
            ErrorKind::MissingParameter => "MissingParameterError",
            ErrorKind::InvalidRoute => "InvalidRouteError",
            ErrorKind::InvalidArgument => "InvalidArgumentError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Store => "StoreError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Io => "IoError",
            ErrorKind::Serialization => "SerializationError",
            ErrorKind::Internal => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The single error type raised by routing, dispatch and handlers.
///
/// Besides its [`ErrorKind`] and message an error may carry field errors,
/// extra response headers and a cause. The construction site and a backtrace
/// are recorded for the debug diagnostic block.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    errors: Option<FieldErrors>,
    headers: Vec<(String, String)>,
    #[source]
    cause: Option<BoxError>,
    location: &'static Location<'static>,
    stack: Box<Backtrace>,
}

impl Error {
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            errors: None,
            headers: Vec::new(),
            cause: None,
            location: Location::caller(),
            stack: Box::new(Backtrace::capture()),
        }
    }

    // 4xx Client Errors

    #[track_caller]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// 401 with an optional `WWW-Authenticate` challenge.
    #[track_caller]
    pub fn unauthorized(message: impl Into<String>, challenge: Option<&str>) -> Self {
        let error = Self::new(ErrorKind::Unauthorized, message);
        match challenge {
            Some(challenge) => error.with_header("WWW-Authenticate", challenge),
            None => error,
        }
    }

    #[track_caller]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[track_caller]
    pub fn route_not_found(path: &str) -> Self {
        Self::new(
            ErrorKind::RouteNotFound,
            format!("No route matches the path {}", path),
        )
    }

    /// Reverse routing of a name that was never registered.
    #[track_caller]
    pub fn unknown_route(name: &str) -> Self {
        Self::new(
            ErrorKind::RouteNotFound,
            format!("Named route does not exist for name: {}", name),
        )
    }

    #[track_caller]
    pub fn controller_not_found(name: &str) -> Self {
        Self::new(
            ErrorKind::ControllerNotFound,
            format!("Resource '{}' does not exist", name),
        )
    }

    /// 405 carrying an `Allow` header built from `allowed`.
    #[track_caller]
    pub fn method_not_allowed(method: &str, allowed: &[HttpMethod]) -> Self {
        let error = Self::new(
            ErrorKind::MethodNotAllowed,
            format!("Method {} is not allowed on this resource", method),
        );
        if allowed.is_empty() {
            return error;
        }
        let allow = allowed
            .iter()
            .map(HttpMethod::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        error.with_header("Allow", allow)
    }

    #[track_caller]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    // Internal faults

    #[track_caller]
    pub fn unknown_service(key: &str) -> Self {
        Self::new(
            ErrorKind::UnknownService,
            format!("Service '{}' is not registered", key),
        )
    }

    #[track_caller]
    pub fn service_type_mismatch(key: &str, expected: &str) -> Self {
        Self::new(
            ErrorKind::ServiceTypeMismatch,
            format!("Service '{}' is not of type {}", key, expected),
        )
    }

    #[track_caller]
    pub fn missing_parameter(route: &str, param: &str) -> Self {
        Self::new(
            ErrorKind::MissingParameter,
            format!("Route '{}' requires the parameter '{}'", route, param),
        )
    }

    #[track_caller]
    pub fn invalid_route(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRoute, message)
    }

    #[track_caller]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Store-level validation failure. Handlers usually recategorize it
    /// as a bad request with [`Error::recategorize`].
    #[track_caller]
    pub fn validation(message: impl Into<String>, errors: FieldErrors) -> Self {
        Self::new(ErrorKind::Validation, message).with_errors(errors)
    }

    #[track_caller]
    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Store, message)
    }

    #[track_caller]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Replace the field errors.
    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Append a single violation for `field`.
    pub fn with_field_error(mut self, field: impl Into<String>, violation: impl Into<String>) -> Self {
        self.errors
            .get_or_insert_with(FieldErrors::new)
            .entry(field.into())
            .or_default()
            .push(violation.into());
        self
    }

    /// Add a response header emitted with the translated error.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach the error this one was raised from.
    pub fn caused_by(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Re-raise under another kind, keeping message and field errors and
    /// chaining the original as cause.
    #[track_caller]
    pub fn recategorize(self, kind: ErrorKind) -> Self {
        let mut error = Self::new(kind, self.message.clone());
        error.errors = self.errors.clone();
        error.caused_by(self)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        self.errors.as_ref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.stack
    }

    pub fn is_categorized(&self) -> bool {
        self.kind.is_categorized()
    }

    /// Get the HttpStatus for this error
    pub fn http_status(&self) -> HttpStatus {
        self.kind.status().unwrap_or(HttpStatus::InternalServerError)
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        self.http_status().code()
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.http_status().is_server_error()
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(error: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, error.to_string()).caused_by(error)
    }
}

impl From<serde_json::Error> for Error {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization, error.to_string()).caused_by(error)
    }
}

impl From<regex::Error> for Error {
    #[track_caller]
    fn from(error: regex::Error) -> Self {
        Self::new(ErrorKind::InvalidRoute, error.to_string()).caused_by(error)
    }
}
