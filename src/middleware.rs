//! Middleware classification.
//!
//! Each middleware identifier attached to a route is mapped to request scaffolding:
//! authentication headers, a CSRF header, and placeholders for the headers and inputs a
//! custom middleware reads in its `handle` method.

use crate::introspection::ControllerMetadataProvider;
use crate::parser::short_name;
use crate::validation::{scan_source, ValidationRuleSet};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HEADER_READ_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\$request\s*->\s*header\(\s*['"]([\w-]+)['"]"#).expect("header regex should be valid")
});

static INPUT_READ_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\$request\s*->\s*input\(\s*['"]([\w.]+)['"]"#).expect("input regex should be valid")
});

const AUTH_KEYWORDS: &[&str] = &["auth", "sanctum", "passport"];
const CSRF_KEYWORD: &str = "csrf";
const THROTTLE_KEYWORD: &str = "throttle";

/// Entry point method scanned on custom middleware types.
pub const HANDLER_METHOD: &str = "handle";

/// A request header, in collection format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl HeaderEntry {
    pub fn text(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            kind: "text".to_string(),
            description: None,
        }
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// An input field a middleware expects on the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterEntry {
    pub key: String,
    pub value: String,
    pub description: String,
}

/// Which issuer an authentication middleware belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProvenance {
    Sanctum,
    Passport,
    Generic,
}

impl AuthProvenance {
    fn detect(identifier: &str) -> Self {
        let lower = identifier.to_lowercase();
        if lower.contains("sanctum") {
            AuthProvenance::Sanctum
        } else if lower.contains("passport") {
            AuthProvenance::Passport
        } else {
            AuthProvenance::Generic
        }
    }

    fn description(self) -> &'static str {
        match self {
            AuthProvenance::Sanctum => "Sanctum authentication token",
            AuthProvenance::Passport => "Passport OAuth token",
            AuthProvenance::Generic => "Authentication token",
        }
    }
}

/// Combined scaffolding for a route's middleware stack.
///
/// Header and parameter lists keep every contribution in order; duplicates are
/// removed later, when headers are attached to an item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MiddlewareAnalysis {
    pub headers: Vec<HeaderEntry>,
    pub parameters: Vec<ParameterEntry>,
    pub auth: bool,
    pub auth_type: Option<String>,
    /// Literal validation rules found in custom `handle` methods
    pub rules: ValidationRuleSet,
}

impl MiddlewareAnalysis {
    /// Folds another contribution in: lists concatenate, `auth` is OR-ed, the
    /// first `auth_type` seen is kept and later rules overwrite earlier ones.
    pub fn absorb(&mut self, other: MiddlewareAnalysis) {
        self.headers.extend(other.headers);
        self.parameters.extend(other.parameters);
        self.rules.merge(other.rules);
        self.auth |= other.auth;
        if self.auth_type.is_none() {
            self.auth_type = other.auth_type;
        }
    }
}

/// Maps middleware identifiers to headers, inputs and an auth classification.
pub struct MiddlewareClassifier<'a> {
    provider: Option<&'a dyn ControllerMetadataProvider>,
}

impl<'a> MiddlewareClassifier<'a> {
    /// Classifier that also inspects custom middleware source through `provider`.
    pub fn new(provider: &'a dyn ControllerMetadataProvider) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Classifier working from identifiers alone.
    pub fn keywords_only() -> Self {
        Self { provider: None }
    }

    pub fn analyze(&self, middleware: &[String]) -> MiddlewareAnalysis {
        let mut analysis = MiddlewareAnalysis::default();
        for identifier in middleware {
            analysis.absorb(self.classify(identifier));
        }
        analysis
    }

    /// Classifies a single middleware identifier.
    pub fn classify(&self, identifier: &str) -> MiddlewareAnalysis {
        let mut analysis = MiddlewareAnalysis::default();
        let lower = identifier.to_lowercase();

        if AUTH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            let provenance = AuthProvenance::detect(identifier);
            analysis.auth = true;
            analysis.auth_type = Some("bearer".to_string());
            analysis.headers.push(
                HeaderEntry::text("Authorization", "Bearer {{token}}").described(provenance.description()),
            );
        }

        if lower.contains(CSRF_KEYWORD) {
            analysis.headers.push(
                HeaderEntry::text("X-CSRF-TOKEN", "{{csrf_token}}").described("CSRF protection token"),
            );
        }

        if lower.contains(THROTTLE_KEYWORD) {
            debug!("{}: rate limited, no request scaffolding needed", identifier);
        }

        if let Some(middleware_type) = self.resolve_middleware_type(identifier) {
            analysis.absorb(self.analyze_handler(&middleware_type));
        }

        analysis
    }

    /// Resolves identifiers that name a class (`App\Http\Middleware\EnsureTenant`,
    /// `EnsureTenant:admin`). Lower-case aliases such as `auth` are not looked up.
    pub fn resolve_middleware_type(&self, identifier: &str) -> Option<String> {
        let provider = self.provider?;
        let name = identifier.split(':').next().unwrap_or(identifier).trim();
        let looks_like_class = name.contains('\\')
            || name.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false);
        if !looks_like_class {
            return None;
        }
        provider.resolve_type(name)
    }

    fn analyze_handler(&self, middleware_type: &str) -> MiddlewareAnalysis {
        let mut analysis = MiddlewareAnalysis::default();
        let Some(provider) = self.provider else {
            return analysis;
        };

        let source = provider.source_text(middleware_type, HANDLER_METHOD);
        if source.is_empty() {
            debug!("{} has no readable {} method", middleware_type, HANDLER_METHOD);
            return analysis;
        }

        let provenance = format!("Required by {}", short_name(middleware_type));
        for caps in HEADER_READ_RE.captures_iter(&source) {
            analysis
                .headers
                .push(HeaderEntry::text(&caps[1], "").described(provenance.clone()));
        }
        for caps in INPUT_READ_RE.captures_iter(&source) {
            analysis.parameters.push(ParameterEntry {
                key: caps[1].to_string(),
                value: String::new(),
                description: provenance.clone(),
            });
        }
        analysis.rules = scan_source(&source);
        analysis
    }
}
