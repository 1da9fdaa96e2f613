//! Route table input.
//!
//! The host framework's route table reaches the generator through the [`RouteSource`]
//! trait. [`ManifestRouteSource`] reads the JSON route list a framework can export
//! (`php artisan route:list --json` produces a compatible shape). [`expand`] turns raw
//! routes into one [`RouteDescriptor`] per verb, dropping HEAD/OPTIONS and applying the
//! include/exclude filters.

use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use log::{debug, info};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;

/// HTTP methods known to the generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Any other verb, kept upper-cased
    Other(String),
}

impl HttpMethod {
    /// Parses a verb case-insensitively.
    pub fn parse(method: &str) -> Self {
        match method.trim().to_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            other => HttpMethod::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Other(verb) => verb,
        }
    }

    /// Sort rank inside a folder. Unrecognized verbs sort last.
    pub fn rank(&self) -> u8 {
        match self {
            HttpMethod::Get => 1,
            HttpMethod::Post => 2,
            HttpMethod::Put => 3,
            HttpMethod::Patch => 4,
            HttpMethod::Delete => 5,
            _ => 99,
        }
    }

    /// HEAD and OPTIONS are never turned into collection items.
    pub fn is_materialized(&self) -> bool {
        !matches!(self, HttpMethod::Head | HttpMethod::Options)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered route as enumerated by the host framework.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRoute {
    pub uri: String,
    pub verbs: Vec<String>,
    pub declared_name: Option<String>,
    /// `Class@method`, `Class::method`, a bare invokable class, or `Closure`
    pub controller_ref: Option<String>,
    pub middleware: Vec<String>,
}

/// One endpoint: a single verb on a single URI.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDescriptor {
    /// Always starts with `/`
    pub uri: String,
    pub method: HttpMethod,
    pub declared_name: Option<String>,
    pub controller_type: Option<String>,
    pub action_method: Option<String>,
    /// Middleware identifiers, de-duplicated, in registration order
    pub middleware: Vec<String>,
}

impl RouteDescriptor {
    pub fn new(uri: &str, method: HttpMethod) -> Self {
        Self {
            uri: normalize_uri(uri),
            method,
            declared_name: None,
            controller_type: None,
            action_method: None,
            middleware: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.declared_name = Some(name.to_string());
        self
    }

    pub fn with_action(mut self, controller_type: &str, action_method: &str) -> Self {
        self.controller_type = Some(controller_type.to_string());
        self.action_method = Some(action_method.to_string());
        self
    }

    pub fn with_middleware(mut self, middleware: &[&str]) -> Self {
        self.middleware = dedup(middleware.iter().map(|m| m.to_string()));
        self
    }
}

/// Anything that can enumerate the application's routes.
pub trait RouteSource {
    fn routes(&self) -> Result<Vec<RawRoute>>;
}

impl RouteSource for Vec<RawRoute> {
    fn routes(&self) -> Result<Vec<RawRoute>> {
        Ok(self.clone())
    }
}

/// Reads routes from a JSON route-list manifest.
pub struct ManifestRouteSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    uri: String,
    /// Pipe-joined verbs, e.g. `GET|HEAD`
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    methods: Vec<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    middleware: Vec<String>,
}

impl ManifestRouteSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Parses manifest JSON content.
    pub fn parse(content: &str) -> Result<Vec<RawRoute>> {
        let entries: Vec<ManifestEntry> = serde_json::from_str(content)?;
        Ok(entries.into_iter().map(RawRoute::from).collect())
    }
}

impl From<ManifestEntry> for RawRoute {
    fn from(entry: ManifestEntry) -> Self {
        let mut verbs = entry.methods;
        if let Some(joined) = entry.method {
            verbs.extend(
                joined
                    .split('|')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string),
            );
        }
        RawRoute {
            uri: entry.uri,
            verbs,
            declared_name: entry.name.filter(|n| !n.is_empty()),
            controller_ref: entry.action,
            middleware: entry.middleware,
        }
    }
}

impl RouteSource for ManifestRouteSource {
    fn routes(&self) -> Result<Vec<RawRoute>> {
        debug!("Reading route manifest {}", self.path.display());
        let content = fs::read_to_string(&self.path).map_err(|e| {
            Error::Configuration(format!(
                "cannot read route manifest {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }
}

/// Include/exclude rules applied while expanding raw routes.
#[derive(Debug, Clone, Default)]
pub struct RouteFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl RouteFilter {
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self {
            include: config.include_routes.clone(),
            exclude: config.exclude_routes.clone(),
        }
    }

    pub fn is_excluded(&self, uri: &str) -> bool {
        self.exclude
            .iter()
            .filter(|pattern| !pattern.is_empty())
            .any(|pattern| uri.contains(pattern.as_str()))
    }

    /// `api` matches routes carrying the `api` middleware or living under `api/`;
    /// `web` matches everything else; `all` (or no groups) matches every route.
    pub fn is_included(&self, route: &RawRoute) -> bool {
        if self.include.is_empty() || self.include.iter().any(|g| g == "all") {
            return true;
        }

        let uri = route.uri.trim_start_matches('/');
        let is_api = route.middleware.iter().any(|m| m == "api") || uri.starts_with("api/");

        (self.include.iter().any(|g| g == "api") && is_api)
            || (self.include.iter().any(|g| g == "web") && !is_api)
    }
}

/// Expands raw routes into per-verb descriptors.
pub fn expand(raw_routes: Vec<RawRoute>, filter: &RouteFilter) -> Vec<RouteDescriptor> {
    let total = raw_routes.len();
    let mut descriptors = Vec::new();

    for route in raw_routes {
        if filter.is_excluded(&route.uri) {
            debug!("Excluding route {}", route.uri);
            continue;
        }
        if !filter.is_included(&route) {
            debug!("Route {} is outside the included groups", route.uri);
            continue;
        }

        let (controller_type, action_method) = match route.controller_ref.as_deref() {
            Some(reference) => match split_controller_ref(reference) {
                Some((class, method)) => (Some(class), Some(method)),
                None => (None, None),
            },
            None => (None, None),
        };
        let middleware = dedup(route.middleware.iter().cloned());

        for verb in &route.verbs {
            let method = HttpMethod::parse(verb);
            if !method.is_materialized() {
                continue;
            }
            descriptors.push(RouteDescriptor {
                uri: normalize_uri(&route.uri),
                method,
                declared_name: route.declared_name.clone(),
                controller_type: controller_type.clone(),
                action_method: action_method.clone(),
                middleware: middleware.clone(),
            });
        }
    }

    info!(
        "Expanded {} registered routes into {} endpoints",
        total,
        descriptors.len()
    );
    descriptors
}

/// Splits a controller reference into `(type, method)`.
///
/// Bare class names refer to invokable controllers; closures have no controller.
pub fn split_controller_ref(reference: &str) -> Option<(String, String)> {
    let reference = reference.trim();
    if reference.is_empty() || reference == "Closure" {
        return None;
    }
    if let Some((class, method)) = reference.split_once('@') {
        return Some((class.to_string(), method.to_string()));
    }
    if let Some((class, method)) = reference.split_once("::") {
        return Some((class.to_string(), method.to_string()));
    }
    Some((reference.to_string(), "__invoke".to_string()))
}

fn normalize_uri(uri: &str) -> String {
    format!("/{}", uri.trim_start_matches('/'))
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = Vec::new();
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}
