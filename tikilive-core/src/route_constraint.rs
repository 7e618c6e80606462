//! Placeholder constraints
//!
//! A constraint restricts which raw path segments a named placeholder may
//! capture. Constraints are checked while matching, so a segment that fails
//! one makes the route not match at all; the request then falls through to
//! the next route or ends as a 404.
//!
//! # Examples
//!
//! ```
//! use tikilive_core::{RegexConstraint, RouteConstraint};
//!
//! let id = RegexConstraint::new(r"[1-9]\d*").unwrap();
//! assert!(id.validate("42").is_ok());
//! assert!(id.validate("0").is_err());
//! assert!(id.validate("42abc").is_err());
//! ```

use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for validating captured placeholder values
pub trait RouteConstraint: Send + Sync {
    /// Validate a raw captured segment
    ///
    /// Returns Ok(()) if valid, Err with a descriptive message if invalid
    fn validate(&self, value: &str) -> Result<(), String>;

    /// Get a description of this constraint (for logs and diagnostics)
    fn description(&self) -> &str;
}

/// Regex constraint, always evaluated against the whole segment
pub struct RegexConstraint {
    regex: Regex,
    pattern: String,
}

impl RegexConstraint {
    /// Compile `pattern` anchored at both ends as `^(?:pattern)$`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tikilive_core::RegexConstraint;
    ///
    /// let controller = RegexConstraint::new("[a-z0-9_-]+").unwrap();
    /// assert_eq!(controller.pattern(), "[a-z0-9_-]+");
    /// ```
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(&format!("^(?:{})$", pattern))?,
            pattern: pattern.to_string(),
        })
    }

    /// The pattern as written, without anchors
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl RouteConstraint for RegexConstraint {
    fn validate(&self, value: &str) -> Result<(), String> {
        if self.is_match(value) {
            Ok(())
        } else {
            Err(format!("'{}' must match pattern: {}", value, self.pattern))
        }
    }

    fn description(&self) -> &str {
        &self.pattern
    }
}

impl std::fmt::Debug for RegexConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RegexConstraint").field(&self.pattern).finish()
    }
}

/// Constraints of one route, keyed by placeholder name.
#[derive(Default, Clone)]
pub struct RouteConstraints {
    constraints: HashMap<String, Arc<dyn RouteConstraint>>,
}

impl RouteConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint for a parameter, replacing an earlier one
    pub fn add(mut self, param: impl Into<String>, constraint: Box<dyn RouteConstraint>) -> Self {
        self.add_mut(param, constraint);
        self
    }

    /// Add a constraint for a parameter (mutable version)
    pub fn add_mut(&mut self, param: impl Into<String>, constraint: Box<dyn RouteConstraint>) {
        self.constraints.insert(param.into(), Arc::from(constraint));
    }

    pub fn get(&self, param: &str) -> Option<&dyn RouteConstraint> {
        self.constraints.get(param).map(|c| c.as_ref())
    }

    /// Check one captured value. Unconstrained placeholders accept any
    /// non-empty segment without a slash.
    pub fn check(&self, param: &str, value: &str) -> Result<(), String> {
        match self.constraints.get(param) {
            Some(constraint) => constraint.validate(value),
            None if !value.is_empty() && !value.contains('/') => Ok(()),
            None => Err(format!("'{}' is not a valid path segment", value)),
        }
    }

    /// Constrained parameter names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.constraints.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }
}

impl std::fmt::Debug for RouteConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (name, constraint) in &self.constraints {
            map.entry(name, &constraint.description());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_constraint_is_anchored() {
        let constraint = RegexConstraint::new(r"[1-9]\d*").unwrap();
        assert!(constraint.validate("42").is_ok());
        assert!(constraint.validate("9999999999999999999").is_ok());
        assert!(constraint.validate("0").is_err());
        assert!(constraint.validate("abc").is_err());
        assert!(constraint.validate("x42").is_err());
        assert!(constraint.validate("42x").is_err());
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let constraint = RegexConstraint::new("enabled|disabled").unwrap();
        assert!(constraint.is_match("enabled"));
        assert!(!constraint.is_match("enabledx"));
        assert!(!constraint.is_match("xdisabled"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(RegexConstraint::new("[a-z").is_err());
    }

    #[test]
    fn test_unconstrained_segment() {
        let constraints = RouteConstraints::new();
        assert!(constraints.check("slug", "hello-world").is_ok());
        assert!(constraints.check("slug", "").is_err());
        assert!(constraints.check("slug", "a/b").is_err());
    }

    #[test]
    fn test_route_constraints() {
        let constraints = RouteConstraints::new()
            .add("id", Box::new(RegexConstraint::new(r"[1-9]\d*").unwrap()))
            .add("controller", Box::new(RegexConstraint::new("[a-z0-9_-]+").unwrap()));

        assert_eq!(constraints.len(), 2);
        assert!(constraints.check("controller", "channels").is_ok());
        assert!(constraints.check("controller", "Channels").is_err());
        assert!(constraints.check("id", "7").is_ok());
        assert_eq!(constraints.get("id").unwrap().description(), r"[1-9]\d*");
    }
}
