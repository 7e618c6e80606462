// Routing: named path templates, placeholder constraints and reverse routing

use crate::logging::{debug, trace};
use crate::route_constraint::{RegexConstraint, RouteConstraint, RouteConstraints};
use crate::{Error, HttpMethod, HttpRequest, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One `/`-separated piece of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `:name` in the template
    Placeholder(String),
}

/// A compiled, immutable route.
#[derive(Debug)]
pub struct Route {
    name: String,
    template: String,
    segments: Vec<Segment>,
    methods: Vec<HttpMethod>,
    constraints: RouteConstraints,
}

impl Route {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn methods(&self) -> &[HttpMethod] {
        &self.methods
    }

    pub fn constraints(&self) -> &RouteConstraints {
        &self.constraints
    }

    /// Placeholder names in template order
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// The allowed method equal to `method`. Methods are case-sensitive.
    pub fn allowed_method(&self, method: &str) -> Option<HttpMethod> {
        self.methods.iter().copied().find(|m| m.as_str() == method)
    }

    /// Match the whole path against the template and every constraint.
    ///
    /// Captured values are the raw segments; nothing is URL-decoded.
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let parts = split_path(path)?;
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Placeholder(name) => {
                    if let Err(reason) = self.constraints.check(name, part) {
                        trace!(route = %self.name, param = %name, %reason, "Constraint rejected segment");
                        return None;
                    }
                    params.insert(name.clone(), part.to_string());
                }
            }
        }

        Some(params)
    }

    /// Substitute `params` into the template.
    pub fn generate(&self, params: &HashMap<String, String>) -> Result<String> {
        if self.segments.is_empty() {
            return Ok("/".to_string());
        }

        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(literal) => path.push_str(literal),
                Segment::Placeholder(name) => {
                    let value = params
                        .get(name)
                        .ok_or_else(|| Error::missing_parameter(&self.name, name))?;
                    path.push_str(value);
                }
            }
        }
        Ok(path)
    }
}

/// Route skeleton returned by [`RouterBuilder::map`].
pub struct RouteBuilder {
    name: String,
    template: String,
    methods: Vec<HttpMethod>,
    requirements: Vec<(String, String)>,
    constraints: Vec<(String, Box<dyn RouteConstraint>)>,
}

impl RouteBuilder {
    fn new(name: String, template: String) -> Self {
        Self {
            name,
            template,
            methods: Vec::new(),
            requirements: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Set the allowed methods, replacing earlier ones
    pub fn methods(&mut self, methods: impl IntoIterator<Item = HttpMethod>) -> &mut Self {
        self.methods.clear();
        for method in methods {
            if !self.methods.contains(&method) {
                self.methods.push(method);
            }
        }
        self
    }

    /// Restrict a placeholder to a regex, matched against the whole segment.
    pub fn requirement(&mut self, param: impl Into<String>, pattern: impl Into<String>) -> &mut Self {
        self.requirements.push((param.into(), pattern.into()));
        self
    }

    pub fn requirements<I, K, V>(&mut self, requirements: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (param, pattern) in requirements {
            self.requirement(param, pattern);
        }
        self
    }

    /// Restrict a placeholder with a custom constraint
    pub fn constraint(&mut self, param: impl Into<String>, constraint: Box<dyn RouteConstraint>) -> &mut Self {
        self.constraints.push((param.into(), constraint));
        self
    }

    fn build(self) -> Result<Route> {
        let segments = parse_template(&self.name, &self.template)?;

        if self.methods.is_empty() {
            return Err(Error::invalid_route(format!(
                "Route '{}' allows no HTTP method",
                self.name
            )));
        }

        let placeholders: HashSet<&str> = segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect();

        let mut constraints = RouteConstraints::new();
        for (param, pattern) in self.requirements {
            ensure_placeholder(&self.name, &placeholders, &param)?;
            let constraint = RegexConstraint::new(&pattern).map_err(|e| {
                Error::invalid_route(format!(
                    "Route '{}' has an invalid requirement for '{}'",
                    self.name, param
                ))
                .caused_by(e)
            })?;
            constraints.add_mut(param, Box::new(constraint));
        }
        for (param, constraint) in self.constraints {
            ensure_placeholder(&self.name, &placeholders, &param)?;
            constraints.add_mut(param, constraint);
        }

        Ok(Route {
            name: self.name,
            template: self.template,
            segments,
            methods: self.methods,
            constraints,
        })
    }
}

/// Collects routes during bootstrap and compiles them into an immutable [`Router`].
///
/// ```
/// use tikilive_core::{HttpMethod, RouterBuilder};
///
/// let mut builder = RouterBuilder::new();
/// builder
///     .map("resource", "/:controller/:id")
///     .methods([HttpMethod::GET, HttpMethod::PUT, HttpMethod::DELETE])
///     .requirement("controller", "[a-z0-9_-]+")
///     .requirement("id", r"[1-9]\d*");
/// let router = builder.build().unwrap();
///
/// let matched = router.match_route("/channels/42", "GET").unwrap();
/// assert_eq!(matched.param("id"), Some("42"));
/// ```
#[derive(Default)]
pub struct RouterBuilder {
    routes: Vec<RouteBuilder>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route skeleton; routes are matched in registration order.
    pub fn map(&mut self, name: impl Into<String>, template: impl Into<String>) -> &mut RouteBuilder {
        self.routes.push(RouteBuilder::new(name.into(), template.into()));
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    pub fn build(self) -> Result<Router> {
        let mut routes = Vec::with_capacity(self.routes.len());
        let mut by_name = HashMap::new();

        for builder in self.routes {
            let route = builder.build()?;
            if by_name.contains_key(route.name()) {
                return Err(Error::invalid_route(format!(
                    "Route '{}' is registered twice",
                    route.name()
                )));
            }
            debug!(
                route = route.name(),
                template = route.template(),
                methods = ?route.methods(),
                "Route registered"
            );
            by_name.insert(route.name().to_string(), routes.len());
            routes.push(Arc::new(route));
        }

        Ok(Router { routes, by_name })
    }
}

/// Outcome of a successful match.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    route: Arc<Route>,
    params: HashMap<String, String>,
    method: HttpMethod,
}

impl MatchedRoute {
    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn name(&self) -> &str {
        self.route.name()
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn into_params(self) -> HashMap<String, String> {
        self.params
    }
}

/// Immutable route table.
#[derive(Debug)]
pub struct Router {
    routes: Vec<Arc<Route>>,
    by_name: HashMap<String, usize>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().map(|route| route.as_ref())
    }

    pub fn route(&self, name: &str) -> Option<&Route> {
        self.by_name.get(name).map(|&index| self.routes[index].as_ref())
    }

    /// Find the first route whose template, constraints and methods all match.
    ///
    /// When some route matches the path but none allows `method`, the error
    /// is `MethodNotAllowed` with the union of their methods in `Allow`;
    /// otherwise it is `RouteNotFound`.
    pub fn match_route(&self, path: &str, method: &str) -> Result<MatchedRoute> {
        let mut allowed: Vec<HttpMethod> = Vec::new();

        for route in &self.routes {
            let Some(params) = route.match_path(path) else {
                continue;
            };

            if let Some(method) = route.allowed_method(method) {
                trace!(route = route.name(), %path, "Route matched");
                return Ok(MatchedRoute {
                    route: Arc::clone(route),
                    params,
                    method,
                });
            }

            trace!(route = route.name(), %path, %method, "Path matched, method not allowed");
            for candidate in route.methods() {
                if !allowed.contains(candidate) {
                    allowed.push(*candidate);
                }
            }
        }

        if allowed.is_empty() {
            Err(Error::route_not_found(path))
        } else {
            Err(Error::method_not_allowed(method, &allowed))
        }
    }

    /// Build the path of a named route, prefixed with `base` when given.
    pub fn url_for(
        &self,
        name: &str,
        params: &HashMap<String, String>,
        base: Option<&UrlBase>,
    ) -> Result<String> {
        let route = self.route(name).ok_or_else(|| Error::unknown_route(name))?;
        let path = route.generate(params)?;

        Ok(match base {
            Some(base) => format!("{}{}", base, path),
            None => path,
        })
    }
}

/// Settings that decide how the absolute URL base is derived from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlOptions {
    /// Honour `X-Forwarded-Proto` and `X-Forwarded-Host`
    pub trust_proxy: bool,
    pub http_port: u16,
    pub https_port: u16,
}

impl Default for UrlOptions {
    fn default() -> Self {
        Self {
            trust_proxy: false,
            http_port: 80,
            https_port: 443,
        }
    }
}

/// Scheme, host and port prepended by [`Router::url_for`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlBase {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl UrlBase {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// Derive the base from the request's `Host` header.
    ///
    /// Returns `None` when the request names no host.
    pub fn from_request(request: &HttpRequest, options: &UrlOptions) -> Option<Self> {
        let forwarded = |name: &str| {
            options
                .trust_proxy
                .then(|| request.header(name))
                .flatten()
                .and_then(|value| value.split(',').next())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let scheme = forwarded("x-forwarded-proto")
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "http".to_string());
        let authority = forwarded("x-forwarded-host").or_else(|| request.header("host"))?;

        let (host, port) = match authority
            .rsplit_once(':')
            .and_then(|(host, port)| Some((host, port.parse::<u16>().ok()?)))
        {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        };
        let port = port.unwrap_or(if scheme == "https" {
            options.https_port
        } else {
            options.http_port
        });

        Some(Self::new(scheme, host, port))
    }

    fn is_default_port(&self) -> bool {
        matches!((self.scheme.as_str(), self.port), ("http", 80) | ("https", 443))
    }
}

impl std::fmt::Display for UrlBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if !self.is_default_port() {
            write!(f, ":{}", self.port)?;
        }
        Ok(())
    }
}

/// Split a request path into raw segments; `None` unless it starts with `/`.
fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    Some(rest.split('/').collect())
}

fn parse_template(route: &str, template: &str) -> Result<Vec<Segment>> {
    let parts = split_path(template).ok_or_else(|| {
        Error::invalid_route(format!(
            "Route '{}' template must start with '/': {}",
            route, template
        ))
    })?;

    let mut seen = HashSet::new();
    let mut segments = Vec::with_capacity(parts.len());

    for part in parts {
        if part.is_empty() {
            return Err(Error::invalid_route(format!(
                "Route '{}' template has an empty segment: {}",
                route, template
            )));
        }

        match part.strip_prefix(':') {
            Some(name) => {
                let valid = name
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                if !valid {
                    return Err(Error::invalid_route(format!(
                        "Route '{}' has an invalid placeholder ':{}'",
                        route, name
                    )));
                }
                if !seen.insert(name) {
                    return Err(Error::invalid_route(format!(
                        "Route '{}' uses the placeholder ':{}' twice",
                        route, name
                    )));
                }
                segments.push(Segment::Placeholder(name.to_string()));
            }
            None => segments.push(Segment::Literal(part.to_string())),
        }
    }

    Ok(segments)
}

fn ensure_placeholder(route: &str, placeholders: &HashSet<&str>, param: &str) -> Result<()> {
    if placeholders.contains(param) {
        Ok(())
    } else {
        Err(Error::invalid_route(format!(
            "Route '{}' constrains ':{}' which is not in its template",
            route, param
        )))
    }
}
