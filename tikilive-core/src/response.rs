// JSON envelope and response normalization

use crate::{FieldErrors, HttpResponse, HttpStatus, Result};
use serde::Serialize;
use serde_json::{Map, Value};

/// Keys every envelope reserves; custom keys never replace them.
const RESERVED_KEYS: [&str; 4] = ["status", "data", "errors", "exception"];

/// Naming choices of the emitted envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeFormat {
    /// Key holding the human-readable message
    pub message_field: String,
}

impl EnvelopeFormat {
    pub fn new(message_field: impl Into<String>) -> Self {
        Self {
            message_field: message_field.into(),
        }
    }
}

impl Default for EnvelopeFormat {
    fn default() -> Self {
        Self::new("message")
    }
}

/// The uniform response envelope.
///
/// Success: `{status, message, data, <custom keys>...}`.
/// Error: `{status, message, errors?, exception?}`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonResponse {
    status: u16,
    message: String,
    data: Option<Value>,
    errors: Option<FieldErrors>,
    exception: Option<Value>,
    custom: Vec<(String, Value)>,
    headers: Vec<(String, String)>,
}

impl JsonResponse {
    /// An envelope without `data`; handlers usually start from [`JsonResponse::ok`].
    pub fn new(status: impl Into<u16>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            data: None,
            errors: None,
            exception: None,
            custom: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// 200 "OK" wrapping `data`
    pub fn ok(data: Value) -> Self {
        Self::new(HttpStatus::Ok, HttpStatus::Ok.reason()).with_data(data)
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_status(mut self, status: impl Into<u16>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_exception(mut self, exception: Value) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Attach an extra top-level key such as `pager`.
    ///
    /// Setting the same key twice keeps its position and replaces the value.
    pub fn set_custom(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        let key = key.into();
        match self.custom.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.custom.push((key, value)),
        }
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set_custom(key, value);
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        self.errors.as_ref()
    }

    pub fn exception(&self) -> Option<&Value> {
        self.exception.as_ref()
    }

    pub fn custom(&self, key: &str) -> Option<&Value> {
        self.custom
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Render the envelope body: standard keys first, custom keys after.
    pub fn to_value(&self, format: &EnvelopeFormat) -> Value {
        let mut body = Map::new();
        body.insert("status".to_string(), Value::from(self.status));
        body.insert(format.message_field.clone(), Value::from(self.message.clone()));

        if let Some(data) = &self.data {
            body.insert("data".to_string(), data.clone());
        }
        if let Some(errors) = &self.errors {
            body.insert("errors".to_string(), serde_json::json!(errors));
        }
        if let Some(exception) = &self.exception {
            body.insert("exception".to_string(), exception.clone());
        }

        for (key, value) in &self.custom {
            if RESERVED_KEYS.contains(&key.as_str()) || *key == format.message_field {
                continue;
            }
            body.insert(key.clone(), value.clone());
        }

        Value::Object(body)
    }

    /// Emit as an HTTP response with `Content-Type: application/json`.
    pub fn into_http(self, format: &EnvelopeFormat) -> HttpResponse {
        let body = self.to_value(format).to_string().into_bytes();
        let mut response = HttpResponse::new(self.status)
            .with_header("Content-Type".to_string(), "application/json".to_string())
            .with_body(body);

        for (name, value) in self.headers {
            response = response.with_header(name, value);
        }
        response
    }
}

/// What a controller operation returns.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// Raw payload, wrapped as `data` by the normalizer
    Value(Value),
    /// Pre-built envelope, passed through unchanged
    Envelope(JsonResponse),
}

impl HandlerOutput {
    /// No content: still wrapped, with `data` set to null
    pub fn empty() -> Self {
        HandlerOutput::Value(Value::Null)
    }

    /// Serialize `value` as the raw payload
    pub fn serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(HandlerOutput::Value(serde_json::to_value(value)?))
    }
}

impl From<Value> for HandlerOutput {
    fn from(value: Value) -> Self {
        HandlerOutput::Value(value)
    }
}

impl From<JsonResponse> for HandlerOutput {
    fn from(response: JsonResponse) -> Self {
        HandlerOutput::Envelope(response)
    }
}

pub type HandlerResult = Result<HandlerOutput>;

/// Turns handler output into an envelope.
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer;

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, output: HandlerOutput) -> JsonResponse {
        match output {
            HandlerOutput::Envelope(response) => response,
            HandlerOutput::Value(value) => JsonResponse::ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_is_wrapped() {
        let response = ResponseNormalizer::new().normalize(json!({"id": 1}).into());
        assert_eq!(response.status(), 200);
        assert_eq!(response.message(), "OK");
        assert_eq!(response.data(), Some(&json!({"id": 1})));
    }

    #[test]
    fn test_null_is_wrapped() {
        let response = ResponseNormalizer::new().normalize(HandlerOutput::empty());
        let body = response.to_value(&EnvelopeFormat::default());
        assert_eq!(body, json!({"status": 200, "message": "OK", "data": null}));
    }

    #[test]
    fn test_envelope_passes_through() {
        let envelope = JsonResponse::ok(json!([])).with_custom("pager", json!({"total": 0}));
        let response = ResponseNormalizer::new().normalize(envelope.clone().into());
        assert_eq!(response, envelope);
    }

    #[test]
    fn test_custom_keys_follow_standard_keys() {
        let mut response = JsonResponse::ok(json!([1, 2]));
        response.set_custom("pager", json!({"offset": 0}));
        response.set_custom("pager", json!({"offset": 10}));
        response.set_custom("status", json!("hijacked"));

        let body = response.to_value(&EnvelopeFormat::default());
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["status", "message", "data", "pager"]);
        assert_eq!(body["pager"]["offset"], 10);
        assert_eq!(body["status"], 200);
    }

    #[test]
    fn test_message_field_is_configurable() {
        let body = JsonResponse::new(404u16, "Channel does not exist.")
            .to_value(&EnvelopeFormat::new("reason"));
        assert_eq!(body, json!({"status": 404, "reason": "Channel does not exist."}));
    }

    #[test]
    fn test_into_http() {
        let response = JsonResponse::new(HttpStatus::MethodNotAllowed, "Method Not Allowed")
            .with_header("Allow", "GET, POST")
            .into_http(&EnvelopeFormat::default());
        assert_eq!(response.status, 405);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("allow"), Some("GET, POST"));
        assert_eq!(response.json().unwrap()["status"], 405);
    }
}
