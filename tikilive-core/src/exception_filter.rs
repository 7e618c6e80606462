//! Exception translation
//!
//! The [`ExceptionTranslator`] is the single recovery point of the pipeline:
//! every error raised while routing, resolving or running a controller is
//! turned into an error envelope here, exactly once.
//!
//! - Categorized errors keep their status, headers and message.
//! - Anything else becomes a 500 with the message `Internal Server Error`.
//! - Field errors are attached under `errors` whatever the category.
//! - In debug mode an `exception` block describes the error and its causes.
//!
//! ```
//! use tikilive_core::{Error, ExceptionTranslator};
//!
//! let translator = ExceptionTranslator::production();
//! let response = translator.translate(&Error::store("connection refused"));
//! assert_eq!(response.status(), 500);
//! assert_eq!(response.message(), "Internal Server Error");
//! ```

use crate::logging::{error, warn};
use crate::{Error, HttpStatus, JsonResponse};
use serde_json::{Map, Value, json};
use std::backtrace::BacktraceStatus;

/// Default bound on the length of the rendered cause chain
pub const DEFAULT_MAX_CAUSE_DEPTH: usize = 10;

/// Type name reported for causes that are not [`Error`]s
const FOREIGN_ERROR_TYPE: &str = "Error";

/// Converts any [`Error`] into an error envelope. Never fails.
#[derive(Debug, Clone)]
pub struct ExceptionTranslator {
    debug: bool,
    max_cause_depth: usize,
}

impl ExceptionTranslator {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            max_cause_depth: DEFAULT_MAX_CAUSE_DEPTH,
        }
    }

    /// Translator that hides diagnostics
    pub fn production() -> Self {
        Self::new(false)
    }

    /// Translator that attaches the `exception` block
    pub fn development() -> Self {
        Self::new(true)
    }

    /// Limit how many causes the `exception` block nests
    pub fn with_max_cause_depth(mut self, depth: usize) -> Self {
        self.max_cause_depth = depth;
        self
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn max_cause_depth(&self) -> usize {
        self.max_cause_depth
    }

    pub fn translate(&self, error: &Error) -> JsonResponse {
        let location = error.location();

        let mut response = match error.kind().status() {
            Some(status) => {
                warn!(
                    status = status.code(),
                    kind = %error.kind(),
                    message = error.message(),
                    "Request failed"
                );
                let mut response = JsonResponse::new(status, error.message());
                for (name, value) in error.headers() {
                    response = response.with_header(name.clone(), value.clone());
                }
                response
            }
            None => {
                error!(
                    kind = %error.kind(),
                    message = error.message(),
                    file = location.file(),
                    line = location.line(),
                    "Unhandled error"
                );
                JsonResponse::new(
                    HttpStatus::InternalServerError,
                    HttpStatus::InternalServerError.reason(),
                )
            }
        };

        if let Some(errors) = error.errors() {
            response = response.with_errors(errors.clone());
        }

        if self.debug {
            response = response.with_exception(self.describe(error, 0));
        }

        response
    }

    /// Diagnostic block for `error`, nesting its causes under `previous`.
    fn describe(&self, error: &(dyn std::error::Error + 'static), depth: usize) -> Value {
        let mut block = match error.downcast_ref::<Error>() {
            Some(error) => {
                let trace: Vec<String> = match error.backtrace().status() {
                    BacktraceStatus::Captured => error
                        .backtrace()
                        .to_string()
                        .lines()
                        .map(|line| line.trim().to_string())
                        .filter(|line| !line.is_empty())
                        .collect(),
                    _ => Vec::new(),
                };

                let mut block = Map::new();
                block.insert("type".to_string(), json!(error.kind().name()));
                block.insert("message".to_string(), json!(error.message()));
                block.insert("file".to_string(), json!(error.location().file()));
                block.insert("line".to_string(), json!(error.location().line()));
                block.insert("trace".to_string(), json!(trace));
                block
            }
            None => {
                let mut block = Map::new();
                block.insert("type".to_string(), json!(FOREIGN_ERROR_TYPE));
                block.insert("message".to_string(), json!(error.to_string()));
                block
            }
        };

        if depth < self.max_cause_depth {
            if let Some(cause) = error.source() {
                block.insert("previous".to_string(), self.describe(cause, depth + 1));
            }
        }

        Value::Object(block)
    }
}

impl Default for ExceptionTranslator {
    fn default() -> Self {
        Self::production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, FieldErrors, HttpMethod};

    #[test]
    fn test_categorized_keeps_message_and_headers() {
        let error = Error::method_not_allowed("PATCH", &[HttpMethod::GET, HttpMethod::PUT]);
        let response = ExceptionTranslator::production().translate(&error);
        assert_eq!(response.status(), 405);
        assert_eq!(response.message(), error.message());
        assert_eq!(response.headers(), error.headers());
        assert!(response.exception().is_none());
    }

    #[test]
    fn test_uncategorized_hides_message_and_headers() {
        let error = Error::store("password=hunter2 rejected").with_header("X-Leak", "1");
        let response = ExceptionTranslator::production().translate(&error);
        assert_eq!(response.status(), 500);
        assert_eq!(response.message(), "Internal Server Error");
        assert!(response.headers().is_empty());
    }

    #[test]
    fn test_field_errors_attached() {
        let mut errors = FieldErrors::new();
        errors.insert("name".to_string(), vec!["required".to_string()]);
        let error = Error::bad_request("Channel is invalid.").with_errors(errors.clone());

        let response = ExceptionTranslator::production().translate(&error);
        assert_eq!(response.status(), 400);
        assert_eq!(response.errors(), Some(&errors));
    }

    #[test]
    fn test_debug_block() {
        let error = Error::internal("boom");
        let response = ExceptionTranslator::development().translate(&error);
        let exception = response.exception().unwrap();
        assert_eq!(exception["type"], "InternalError");
        assert_eq!(exception["message"], "boom");
        assert_eq!(exception["line"], error.location().line());
        assert!(exception["file"].as_str().unwrap().ends_with("exception_filter.rs"));
        assert!(exception["trace"].is_array());
        assert!(exception.get("previous").is_none());
    }

    #[test]
    fn test_debug_block_nests_causes() {
        let io = std::io::Error::other("disk full");
        let store = Error::store("insert failed").caused_by(io);
        let error = store.recategorize(ErrorKind::Conflict);

        let response = ExceptionTranslator::development().translate(&error);
        let exception = response.exception().unwrap();
        assert_eq!(exception["type"], "ConflictError");
        assert_eq!(exception["previous"]["type"], "StoreError");
        assert_eq!(exception["previous"]["previous"]["type"], "Error");
        assert_eq!(exception["previous"]["previous"]["message"], "disk full");
    }

    #[test]
    fn test_cause_depth_is_bounded() {
        let mut error = Error::internal("level 0");
        for level in 1..=5 {
            error = Error::internal(format!("level {}", level)).caused_by(error);
        }

        let translator = ExceptionTranslator::development().with_max_cause_depth(2);
        let exception = translator.translate(&error).exception().cloned().unwrap();
        assert_eq!(exception["message"], "level 5");
        assert_eq!(exception["previous"]["previous"]["message"], "level 3");
        assert!(exception["previous"]["previous"].get("previous").is_none());
    }
}
