// Request parameters handed to controllers

use crate::{Error, HttpRequest, Result};
use std::collections::HashMap;
use std::str::FromStr;

/// Read-only view over the route, query-string and body parameters of one
/// request.
///
/// ```
/// use std::collections::HashMap;
/// use tikilive_core::ParameterBag;
///
/// let route = HashMap::from([("id".to_string(), "42".to_string())]);
/// let query = HashMap::from([("limit".to_string(), "10".to_string())]);
/// let bag = ParameterBag::new(route, query, HashMap::new());
///
/// assert_eq!(bag.get("id"), Some("42"));
/// assert_eq!(bag.get_as("limit", 30u32).unwrap(), 10);
/// assert_eq!(bag.get_as("offset", 0u32).unwrap(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParameterBag {
    route: HashMap<String, String>,
    query: HashMap<String, String>,
    body: HashMap<String, String>,
}

impl ParameterBag {
    pub fn new(
        route: HashMap<String, String>,
        query: HashMap<String, String>,
        body: HashMap<String, String>,
    ) -> Self {
        Self { route, query, body }
    }

    /// Combine matched route parameters with the request's query and body.
    ///
    /// Fails with `BadRequest` when the body cannot be decoded.
    pub fn from_request(route: HashMap<String, String>, request: &HttpRequest) -> Result<Self> {
        Ok(Self {
            route,
            query: request.query_params.clone(),
            body: request.body_params()?,
        })
    }

    /// Route (path) parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.route.get(name).map(String::as_str)
    }

    /// Query-string parameter
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Body field
    pub fn post(&self, name: &str) -> Option<&str> {
        self.body.get(name).map(String::as_str)
    }

    /// Look the name up in route, query, then body parameters.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.param(name)
            .or_else(|| self.query(name))
            .or_else(|| self.post(name))
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or(default).to_string()
    }

    /// Parse a parameter, falling back to `default` when it is absent.
    ///
    /// A present value that does not parse is a `BadRequest` naming the field.
    pub fn get_as<T: FromStr>(&self, name: &str, default: T) -> Result<T> {
        match self.get(name) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                Error::bad_request(format!("Invalid value for parameter '{}'", name))
                    .with_field_error(name, format!("'{}' is not a valid value", raw))
            }),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn route_params(&self) -> &HashMap<String, String> {
        &self.route
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn body_params(&self) -> &HashMap<String, String> {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag() -> ParameterBag {
        ParameterBag::new(
            HashMap::from([("id".to_string(), "7".to_string())]),
            HashMap::from([
                ("id".to_string(), "99".to_string()),
                ("limit".to_string(), "abc".to_string()),
            ]),
            HashMap::from([("name".to_string(), "News".to_string())]),
        )
    }

    #[test]
    fn test_lookup_order() {
        let bag = bag();
        assert_eq!(bag.get("id"), Some("7"));
        assert_eq!(bag.query("id"), Some("99"));
        assert_eq!(bag.get("name"), Some("News"));
        assert_eq!(bag.get("missing"), None);
        assert!(bag.has("name"));
    }

    #[test]
    fn test_get_or() {
        let bag = bag();
        assert_eq!(bag.get_or("direction", "ASC"), "ASC");
        assert_eq!(bag.get_or("name", "x"), "News");
    }

    #[test]
    fn test_get_as_unparsable_is_bad_request() {
        let error = bag().get_as::<u32>("limit", 30).unwrap_err();
        assert_eq!(error.status_code(), 400);
        assert!(error.errors().unwrap().contains_key("limit"));
    }

    #[test]
    fn test_from_request() {
        let request = HttpRequest::new("POST", "/channels?draft=1").with_form([("name", "Sports")]);
        let bag = ParameterBag::from_request(HashMap::new(), &request).unwrap();
        assert_eq!(bag.query("draft"), Some("1"));
        assert_eq!(bag.post("name"), Some("Sports"));
    }
}
