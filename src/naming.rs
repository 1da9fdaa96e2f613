//! Endpoint naming and descriptions.
//!
//! Names are derived from the verb and the shape of the path (root, single resource,
//! resource by parameter, nested resource, flat path). A declared route name longer than
//! [`DECLARED_NAME_THRESHOLD`] characters replaces the derived name; the action method
//! is the last resort.

use crate::parser::short_name;
use crate::route_source::{HttpMethod, RouteDescriptor};

/// Declared names at or below this many characters are ignored.
pub const DECLARED_NAME_THRESHOLD: usize = 5;

/// Middleware group tags left out of descriptions.
const GROUP_TAGS: &[&str] = &["api", "web"];

/// Derives names and markdown descriptions for endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamingEngine;

impl NamingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Human-readable name for a route.
    pub fn name(&self, route: &RouteDescriptor) -> String {
        let verb = verb_word(&route.method);

        if let Some(declared) = route.declared_name.as_deref().map(humanize_declared) {
            if declared.chars().count() > DECLARED_NAME_THRESHOLD {
                return declared;
            }
        }

        let segments = path_segments(&route.uri);
        if let Some(name) = name_from_shape(&route.method, &verb, &segments) {
            return name;
        }

        if let Some(action) = route.action_method.as_deref().filter(|a| !a.is_empty()) {
            return format!("{} {}", verb, humanize_identifier(action));
        }

        match segments.last() {
            Some(last) => format!("{} {}", verb, humanize_identifier(param_name(last))),
            None => format!("{} Root", verb),
        }
    }

    /// Markdown description: request line, route name, meaning of the verb, controller
    /// reference and middleware, one paragraph each.
    pub fn describe(&self, route: &RouteDescriptor) -> String {
        let mut lines = vec![format!("**{}** `{}`", route.method, route.uri)];

        if let Some(name) = route.declared_name.as_deref().filter(|n| !n.is_empty()) {
            lines.push(format!("Route name: `{}`", name));
        }

        if let Some(sentence) = verb_sentence(&route.method) {
            lines.push(sentence.to_string());
        }

        if let (Some(controller), Some(action)) = (&route.controller_type, &route.action_method) {
            lines.push(format!("Controller: `{}@{}`", short_name(controller), action));
        }

        let middleware: Vec<&str> = route
            .middleware
            .iter()
            .map(String::as_str)
            .filter(|m| !GROUP_TAGS.contains(m))
            .collect();
        if !middleware.is_empty() {
            lines.push(format!("Middleware: {}", middleware.join(", ")));
        }

        lines.join("\n\n")
    }
}

fn name_from_shape(method: &HttpMethod, verb: &str, segments: &[&str]) -> Option<String> {
    match segments {
        [] => Some(format!("{} Root", verb)),
        [segment] => {
            let resource = capitalize(&singularize(param_name(segment)));
            let plural = segment.ends_with('s');
            Some(match method {
                HttpMethod::Get if plural => format!("Get All {}s", resource),
                HttpMethod::Get => format!("Get Current {}", resource),
                HttpMethod::Post => format!("Create {}", resource),
                _ => format!("{} {}", verb, resource),
            })
        }
        [first, .., last] if is_param(last) => {
            let resource = capitalize(&singularize(first));
            let param = capitalize(param_name(last));
            match method {
                HttpMethod::Get => Some(format!("Get {} by {}", resource, param)),
                HttpMethod::Put | HttpMethod::Patch => Some(format!("Update {}", resource)),
                HttpMethod::Delete => Some(format!("Delete {}", resource)),
                _ => None,
            }
        }
        [first, second, .., last] if segments.len() >= 3 && is_param(second) => {
            let parent = capitalize(&singularize(first));
            let child = capitalize(&singularize(last));
            match method {
                HttpMethod::Get => Some(format!("Get {}s for {}", child, parent)),
                HttpMethod::Post => Some(format!("Create {} for {}", child, parent)),
                _ => None,
            }
        }
        [.., last] => {
            let resource = capitalize(&singularize(last));
            match method {
                HttpMethod::Get => Some(format!("Get {}s", resource)),
                HttpMethod::Post => Some(format!("Create {}", resource)),
                _ => None,
            }
        }
    }
}

fn verb_sentence(method: &HttpMethod) -> Option<&'static str> {
    match method {
        HttpMethod::Get => Some("Retrieves the requested resource or collection."),
        HttpMethod::Post => Some("Creates a new resource."),
        HttpMethod::Put => Some("Replaces the resource with a full update."),
        HttpMethod::Patch => Some("Partially updates the resource."),
        HttpMethod::Delete => Some("Removes the resource."),
        _ => None,
    }
}

/// Display word for a verb: GET→Get, POST→Create, PUT/PATCH→Update, DELETE→Delete.
pub fn verb_word(method: &HttpMethod) -> String {
    match method {
        HttpMethod::Get => "Get".to_string(),
        HttpMethod::Post => "Create".to_string(),
        HttpMethod::Put | HttpMethod::Patch => "Update".to_string(),
        HttpMethod::Delete => "Delete".to_string(),
        other => other.as_str().to_string(),
    }
}

/// Path segments with a leading `api` segment removed.
pub fn path_segments(uri: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = uri.split('/').filter(|s| !s.is_empty()).collect();
    if segments.first() == Some(&"api") {
        segments.remove(0);
    }
    segments
}

/// Suffix-rule singularization: `ies`→`y`, `es`→drop (longer than 3), `s`→drop.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if word.len() > 3 {
        if let Some(stem) = word.strip_suffix("es") {
            return stem.to_string();
        }
    }
    if word.len() > 1 {
        if let Some(stem) = word.strip_suffix('s') {
            return stem.to_string();
        }
    }
    word.to_string()
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn is_param(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// `{id}` and `{id?}` → `id`; other segments are returned unchanged.
pub fn param_name(segment: &str) -> &str {
    if is_param(segment) {
        segment[1..segment.len() - 1].trim_end_matches('?')
    } else {
        segment
    }
}

/// `users.password-reset` → `Users Password Reset`.
fn humanize_declared(name: &str) -> String {
    name.split(|c: char| c == '.' || c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// `storeBulk` / `__invoke` / `user_id` → `Store Bulk` / `Invoke` / `User Id`.
fn humanize_identifier(ident: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    for part in ident.split(|c: char| c == '_' || c == '-' || c == '.') {
        let mut current = String::new();
        for c in part.chars() {
            if c.is_uppercase() && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(c);
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words.iter().map(|w| capitalize(w)).collect::<Vec<_>>().join(" ")
}
