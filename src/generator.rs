//! The generation pipeline.
//!
//! Routes are analysed independently and in parallel: the controller action is
//! introspected, its validation rules resolved into an example body, its middleware
//! classified into headers, and the endpoint named. Items are then handed to the
//! [`CollectionAssembler`], which orders them explicitly, so completion order never
//! shows in the output.

use crate::collection::{Body, Collection, CollectionAssembler, CollectionItem};
use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::introspection::{ControllerIntrospector, ControllerMetadataProvider};
use crate::middleware::{HeaderEntry, MiddlewareAnalysis, MiddlewareClassifier};
use crate::naming::NamingEngine;
use crate::route_source::{expand, HttpMethod, RouteDescriptor, RouteFilter, RouteSource};
use crate::validation::{ExampleSynthesizer, ValidationRuleResolver, ValidationRuleSet};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::{Map, Value};

/// Turns route descriptors into a collection.
pub struct CollectionGenerator<'a> {
    config: &'a GeneratorConfig,
    provider: &'a dyn ControllerMetadataProvider,
    naming: NamingEngine,
    synthesizer: ExampleSynthesizer,
}

impl<'a> CollectionGenerator<'a> {
    pub fn new(config: &'a GeneratorConfig, provider: &'a dyn ControllerMetadataProvider) -> Self {
        Self {
            config,
            provider,
            naming: NamingEngine::new(),
            synthesizer: ExampleSynthesizer::new(),
        }
    }

    /// Replaces the example synthesizer, e.g. to pin the date used for `date` rules.
    pub fn with_synthesizer(mut self, synthesizer: ExampleSynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    /// Enumerates `source`, applies the configured filters and generates the collection.
    pub fn generate_from(&self, source: &dyn RouteSource) -> Result<Collection> {
        let raw = source.routes()?;
        let routes = expand(raw, &RouteFilter::from_config(self.config));
        Ok(self.generate(&routes))
    }

    pub fn generate(&self, routes: &[RouteDescriptor]) -> Collection {
        info!("Analysing {} endpoints...", routes.len());
        let items: Vec<CollectionItem> = routes.par_iter().map(|route| self.build_item(route)).collect();

        let mut assembler = CollectionAssembler::from_config(self.config);
        for item in items {
            assembler.add_item(item);
        }
        assembler.build()
    }

    /// Builds the collection item for one endpoint. Analysis failures are logged and
    /// the item is emitted with whatever could be recovered.
    pub fn build_item(&self, route: &RouteDescriptor) -> CollectionItem {
        debug!("Building item for {} {}", route.method, route.uri);

        let name = self.naming.name(route);
        let mut description = self.naming.describe(route);
        let mut rules = self.resolve_rules(route);
        let mut middleware = MiddlewareClassifier::new(self.provider).analyze(&route.middleware);
        rules.merge(std::mem::take(&mut middleware.rules));

        let mut body = (!rules.is_empty()).then(|| self.synthesizer.body(&rules));
        if !middleware.parameters.is_empty() {
            if carries_body(&route.method) {
                merge_middleware_inputs(&mut body, &middleware);
            } else {
                let keys: Vec<String> = middleware
                    .parameters
                    .iter()
                    .map(|p| format!("`{}`", p.key))
                    .collect();
                description.push_str(&format!("\n\nMiddleware inputs: {}", keys.join(", ")));
            }
        }

        let default_headers = self
            .config
            .default_headers
            .iter()
            .map(|(key, value)| HeaderEntry::text(key, value));
        let mut item = CollectionItem::new(route, name, description)
            .with_headers(middleware.headers)
            .with_headers(default_headers);

        if let Some(value) = body {
            match Body::json(&value) {
                Ok(body) => item = item.with_body(body),
                Err(e) => warn!("{} {}: cannot render example body: {}", route.method, route.uri, e),
            }
        }
        item
    }

    fn resolve_rules(&self, route: &RouteDescriptor) -> ValidationRuleSet {
        let (Some(controller_type), Some(action_method)) = (&route.controller_type, &route.action_method)
        else {
            return ValidationRuleSet::new();
        };

        let resolver = ValidationRuleResolver::new(self.provider);
        match ControllerIntrospector::new(self.provider).analyze(controller_type, action_method) {
            Ok(info) => resolver.resolve(
                &info.controller_type,
                &info.action_method,
                info.request_validator.as_deref(),
            ),
            Err(e) => {
                warn!("{} {}: {}", route.method, route.uri, e);
                resolver.resolve(controller_type, action_method, None)
            }
        }
    }
}

fn carries_body(method: &HttpMethod) -> bool {
    matches!(method, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
}

/// Adds middleware inputs to the body as empty strings, leaving fields the rules
/// already produced untouched.
fn merge_middleware_inputs(body: &mut Option<Value>, middleware: &MiddlewareAnalysis) {
    let value = body.get_or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(fields) = value else {
        return;
    };
    for parameter in &middleware.parameters {
        fields
            .entry(parameter.key.clone())
            .or_insert_with(|| Value::String(parameter.value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Node;
    use crate::introspection::SourceTreeProvider;
    use crate::parser::SourceParser;
    use crate::route_source::RawRoute;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;

    const USER_CONTROLLER: &str = r#"<?php
namespace App\Http\Controllers;

use App\Http\Requests\StoreUserRequest;
use Illuminate\Http\Request;

class UserController extends Controller
{
    public function store(StoreUserRequest $request)
    {
        return User::create($request->validated());
    }

    public function update(Request $request, $id)
    {
        $request->validate([
            'name' => 'string|max:40',
            'email' => 'email',
        ]);
    }

    public function index()
    {
        return User::all();
    }
}
"#;

    const STORE_USER_REQUEST: &str = r#"<?php
namespace App\Http\Requests;

use Illuminate\Foundation\Http\FormRequest;

class StoreUserRequest extends FormRequest
{
    public function rules()
    {
        return [
            'name' => 'required|string|min:3',
            'age' => 'integer|min:18',
            'tags' => ['array'],
        ];
    }
}
"#;

    const LOCALE_MIDDLEWARE: &str = r#"<?php
namespace App\Http\Middleware;

class SetLocale
{
    public function handle($request, $next)
    {
        app()->setLocale($request->input('locale'));
        return $next($request);
    }
}
"#;

    const TENANT_MIDDLEWARE: &str = r#"<?php
namespace App\Http\Middleware;

class RequireTenant
{
    public function handle($request, $next)
    {
        $request->validate(['tenant_id' => 'required|integer', 'name' => 'string|max:3']);
        return $next($request);
    }
}
"#;

    fn provider() -> SourceTreeProvider {
        SourceTreeProvider::from_parsed_files(vec![
            SourceParser::parse_str(Path::new("UserController.php"), USER_CONTROLLER),
            SourceParser::parse_str(Path::new("StoreUserRequest.php"), STORE_USER_REQUEST),
            SourceParser::parse_str(Path::new("SetLocale.php"), LOCALE_MIDDLEWARE),
            SourceParser::parse_str(Path::new("RequireTenant.php"), TENANT_MIDDLEWARE),
        ])
    }

    fn generator<'a>(config: &'a GeneratorConfig, provider: &'a SourceTreeProvider) -> CollectionGenerator<'a> {
        CollectionGenerator::new(config, provider).with_synthesizer(ExampleSynthesizer::with_date("2024-01-01"))
    }

    fn body_of(item: &CollectionItem) -> Value {
        serde_json::from_str(&item.body.as_ref().expect("item should have a body").raw).unwrap()
    }

    #[test]
    fn test_body_from_request_validator() {
        let config = GeneratorConfig::default();
        let provider = provider();
        let route = RouteDescriptor::new("/api/users", HttpMethod::Post)
            .with_action("App\\Http\\Controllers\\UserController", "store");

        let item = generator(&config, &provider).build_item(&route);
        assert_eq!(item.name, "Create User");
        assert_eq!(item.folder, "Users");
        assert_eq!(body_of(&item), json!({"name": "aaa", "age": 18, "tags": []}));
        let body = item.body.unwrap();
        assert_eq!(body.mode, "raw");
        assert_eq!(body.options.raw.language, "json");
    }

    #[test]
    fn test_body_from_inline_validation() {
        let config = GeneratorConfig::default();
        let provider = provider();
        let route = RouteDescriptor::new("/users/{id}", HttpMethod::Put)
            .with_action("App\\Http\\Controllers\\UserController", "update");

        let item = generator(&config, &provider).build_item(&route);
        assert_eq!(item.name, "Update User");
        assert_eq!(item.url.variable.len(), 1);
        assert_eq!(item.url.variable[0].key, "id");
        assert_eq!(item.url.variable[0].value, ":id");
        assert_eq!(
            body_of(&item),
            json!({"name": "string", "email": "example@email.com"})
        );
    }

    #[test]
    fn test_no_rules_means_no_body() {
        let config = GeneratorConfig::default();
        let provider = provider();
        let route = RouteDescriptor::new("/api/users", HttpMethod::Get)
            .with_action("App\\Http\\Controllers\\UserController", "index");

        let item = generator(&config, &provider).build_item(&route);
        assert!(item.body.is_none());
    }

    #[test]
    fn test_missing_controller_still_emits_item() {
        let config = GeneratorConfig::default();
        let provider = provider();
        let route = RouteDescriptor::new("/api/orders", HttpMethod::Get)
            .with_action("App\\Http\\Controllers\\OrderController", "index")
            .with_middleware(&["api", "auth:sanctum"]);

        let item = generator(&config, &provider).build_item(&route);
        assert_eq!(item.name, "Get All Orders");
        assert!(item.body.is_none());
        let keys: Vec<_> = item.headers.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["Authorization", "Accept", "Content-Type"]);
    }

    #[test]
    fn test_middleware_headers_precede_defaults_and_win() {
        let mut config = GeneratorConfig::default();
        config
            .default_headers
            .insert("authorization".to_string(), "Basic abc".to_string());
        let provider = provider();
        let route = RouteDescriptor::new("/api/profile", HttpMethod::Get).with_middleware(&["auth", "auth:sanctum"]);

        let item = generator(&config, &provider).build_item(&route);
        let headers: Vec<_> = item
            .headers
            .iter()
            .map(|h| (h.key.as_str(), h.value.as_str()))
            .collect();
        assert_eq!(
            headers,
            vec![
                ("Authorization", "Bearer {{token}}"),
                ("Accept", "application/json"),
                ("Content-Type", "application/json"),
            ]
        );
        assert_eq!(item.headers[0].description.as_deref(), Some("Authentication token"));
    }

    #[test]
    fn test_middleware_inputs_join_body_or_description() {
        let config = GeneratorConfig::default();
        let provider = provider();
        let middleware = ["App\\Http\\Middleware\\SetLocale"];

        let post = RouteDescriptor::new("/api/users", HttpMethod::Post)
            .with_action("App\\Http\\Controllers\\UserController", "store")
            .with_middleware(&middleware);
        let item = generator(&config, &provider).build_item(&post);
        assert_eq!(
            body_of(&item),
            json!({"name": "aaa", "age": 18, "tags": [], "locale": ""})
        );

        let get = RouteDescriptor::new("/api/users", HttpMethod::Get).with_middleware(&middleware);
        let item = generator(&config, &provider).build_item(&get);
        assert!(item.body.is_none());
        assert!(item.description.ends_with("Middleware inputs: `locale`"));
    }

    #[test]
    fn test_middleware_handler_validation_joins_body() {
        let config = GeneratorConfig::default();
        let provider = provider();

        let orders = RouteDescriptor::new("/api/orders", HttpMethod::Post)
            .with_middleware(&["App\\Http\\Middleware\\RequireTenant"]);
        let item = generator(&config, &provider).build_item(&orders);
        assert_eq!(body_of(&item), json!({"tenant_id": 1, "name": "str"}));

        // Handler rules are merged last and override the validator's rule for `name`
        let users = RouteDescriptor::new("/api/users", HttpMethod::Post)
            .with_action("App\\Http\\Controllers\\UserController", "store")
            .with_middleware(&["App\\Http\\Middleware\\RequireTenant"]);
        let item = generator(&config, &provider).build_item(&users);
        assert_eq!(
            body_of(&item),
            json!({"name": "str", "age": 18, "tags": [], "tenant_id": 1})
        );
    }

    #[test]
    fn test_generate_from_source_filters_and_orders() {
        let config = GeneratorConfig::default();
        let provider = provider();
        let routes = vec![
            RawRoute {
                uri: "api/users/{id}".to_string(),
                verbs: vec!["DELETE".to_string()],
                ..RawRoute::default()
            },
            RawRoute {
                uri: "api/users".to_string(),
                verbs: vec!["GET".to_string(), "HEAD".to_string(), "POST".to_string()],
                controller_ref: Some("App\\Http\\Controllers\\UserController@index".to_string()),
                ..RawRoute::default()
            },
            RawRoute {
                uri: "telescope/api/entries".to_string(),
                verbs: vec!["GET".to_string()],
                middleware: vec!["api".to_string()],
                ..RawRoute::default()
            },
            RawRoute {
                uri: "api/login".to_string(),
                verbs: vec!["OPTIONS".to_string(), "POST".to_string()],
                ..RawRoute::default()
            },
        ];

        let collection = generator(&config, &provider).generate_from(&routes).unwrap();
        let folders: Vec<_> = collection.folders().map(|f| f.name.as_str()).collect();
        assert_eq!(folders, vec!["Authentication", "Users"]);
        assert_eq!(collection.request_count(), 4);

        let users = collection.folders().nth(1).unwrap();
        let methods: Vec<_> = users
            .item
            .iter()
            .filter_map(|node| match node {
                Node::Request(request) => Some(request.request.method.as_str()),
                Node::Folder(_) => None,
            })
            .collect();
        assert_eq!(methods, vec!["GET", "POST", "DELETE"]);
    }
}
