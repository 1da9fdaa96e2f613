//! Postman v2.1 collection model and assembly.
//!
//! [`CollectionItem`] is one endpoint with its folder key already derived.
//! [`CollectionAssembler`] groups items into folders, orders them and wraps the tree
//! with collection metadata, variables and default auth.

use crate::config::{GeneratorConfig, DEFAULT_APP_NAME, DEFAULT_BASE_URL};
use crate::error::Result;
use crate::middleware::HeaderEntry;
use crate::naming::{capitalize, is_param, param_name, path_segments};
use crate::route_source::{HttpMethod, RouteDescriptor};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Schema identifier of the Postman v2.1 collection format.
pub const SCHEMA_URL: &str = "https://schema.getpostman.com/json/collection/v2.1.0/collection.json";

pub const EXPORTER_ID: &str = "laravel-postman-generator";

const BASE_URL_HOST: &str = "{{base_url}}";

/// Folder for routes whose first segment is empty or a parameter.
pub const ROOT_FOLDER: &str = "API";

const AUTH_FAMILY: &[&str] = &["auth", "login", "register", "logout", "password"];

const FOLDER_SYNONYMS: &[(&str, &str)] = &[
    ("User", "Users"),
    ("Product", "Products"),
    ("Order", "Orders"),
    ("Category", "Categories"),
];

/// Complete collection document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub info: Info,
    pub item: Vec<Node>,
    pub variable: Vec<Variable>,
    pub auth: Auth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Info {
    pub name: String,
    pub description: String,
    pub schema: String,
    #[serde(rename = "_exporter_id")]
    pub exporter_id: String,
}

/// Collection-level variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Variable {
    fn string(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            kind: "string".to_string(),
        }
    }
}

/// Default auth applied to every request in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Auth {
    Noauth,
    Bearer { bearer: Vec<Variable> },
}

impl Auth {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Auth::Bearer {
                bearer: vec![Variable::string("token", "{{token}}")],
            }
        } else {
            Auth::Noauth
        }
    }
}

/// A node of the item tree: either a folder or a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Folder(Folder),
    Request(RequestNode),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    pub name: String,
    pub description: String,
    pub item: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestNode {
    pub name: String,
    pub request: Request,
    pub response: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub header: Vec<HeaderEntry>,
    pub url: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Url {
    pub raw: String,
    pub host: Vec<String>,
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable: Vec<UrlVariable>,
}

impl Url {
    /// `{{base_url}}`-relative URL for a route path. Every `{name}` or `{name?}`
    /// segment yields one variable.
    pub fn for_path(uri: &str) -> Self {
        let path: Vec<String> = uri
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let variable = path
            .iter()
            .filter(|segment| is_param(segment))
            .map(|segment| UrlVariable::for_param(param_name(segment)))
            .collect();

        Self {
            raw: format!("{}/{}", BASE_URL_HOST, path.join("/")),
            host: vec![BASE_URL_HOST.to_string()],
            path,
            variable,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlVariable {
    pub key: String,
    pub value: String,
    pub description: String,
}

impl UrlVariable {
    fn for_param(name: &str) -> Self {
        Self {
            key: name.to_string(),
            value: format!(":{}", name),
            description: format!("Route parameter: {}", name),
        }
    }
}

/// Raw JSON request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub mode: String,
    pub raw: String,
    pub options: BodyOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyOptions {
    pub raw: RawOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOptions {
    pub language: String,
}

impl Body {
    /// Pretty-printed JSON body.
    pub fn json(value: &Value) -> Result<Self> {
        Ok(Self {
            mode: "raw".to_string(),
            raw: serde_json::to_string_pretty(value)?,
            options: BodyOptions {
                raw: RawOptions {
                    language: "json".to_string(),
                },
            },
        })
    }
}

/// One endpoint, ready to be placed in a folder.
#[derive(Debug, Clone)]
pub struct CollectionItem {
    pub name: String,
    pub description: String,
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<HeaderEntry>,
    pub body: Option<Body>,
    pub folder: String,
}

impl CollectionItem {
    pub fn new(route: &RouteDescriptor, name: String, description: String) -> Self {
        Self {
            name,
            description,
            method: route.method.clone(),
            url: Url::for_path(&route.uri),
            headers: Vec::new(),
            body: None,
            folder: folder_for(&route.uri),
        }
    }

    /// Appends headers, dropping any whose key (case-insensitively) is already present.
    pub fn with_headers(mut self, headers: impl IntoIterator<Item = HeaderEntry>) -> Self {
        for header in headers {
            let duplicate = self
                .headers
                .iter()
                .any(|existing| existing.key.eq_ignore_ascii_case(&header.key));
            if duplicate {
                debug!("{}: dropping duplicate header {}", self.name, header.key);
                continue;
            }
            self.headers.push(header);
        }
        self
    }

    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    fn into_node(self) -> Node {
        Node::Request(RequestNode {
            name: self.name,
            request: Request {
                method: self.method.as_str().to_string(),
                header: self.headers,
                url: self.url,
                body: self.body,
                description: self.description,
            },
            response: Vec::new(),
        })
    }
}

/// Folder key for a route path.
pub fn folder_for(uri: &str) -> String {
    let Some(first) = path_segments(uri).first().copied() else {
        return ROOT_FOLDER.to_string();
    };
    if is_param(first) {
        return ROOT_FOLDER.to_string();
    }

    let lower = first.to_lowercase();
    if AUTH_FAMILY.contains(&lower.as_str()) {
        return "Authentication".to_string();
    }
    if lower == "admin" {
        return "Admin".to_string();
    }

    let title = first
        .split(|c: char| c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ");
    FOLDER_SYNONYMS
        .iter()
        .find(|(singular, _)| *singular == title)
        .map(|(_, plural)| plural.to_string())
        .unwrap_or(title)
}

/// One-line description shown on a folder.
pub fn folder_description(folder: &str) -> String {
    match folder {
        "Authentication" => "Authentication and session endpoints".to_string(),
        "Admin" => "Administrative endpoints".to_string(),
        other => format!("Endpoints for {}", other),
    }
}

/// Builds a [`Collection`] from items.
pub struct CollectionAssembler {
    info: Info,
    base_url: String,
    auth: Auth,
    items: Vec<CollectionItem>,
}

impl CollectionAssembler {
    pub fn new() -> Self {
        Self {
            info: Info {
                name: format!("{} Collection", DEFAULT_APP_NAME),
                description: String::new(),
                schema: SCHEMA_URL.to_string(),
                exporter_id: EXPORTER_ID.to_string(),
            },
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: Auth::from_flag(true),
            items: Vec::new(),
        }
    }

    /// Assembler carrying the configured name, description, base URL and auth mode.
    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new()
            .with_info(&config.collection_name, &config.collection_description)
            .with_base_url(&config.base_url)
            .with_auth(config.enable_auth)
    }

    pub fn with_info(mut self, name: &str, description: &str) -> Self {
        self.info.name = name.to_string();
        self.info.description = description.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_auth(mut self, enabled: bool) -> Self {
        self.auth = Auth::from_flag(enabled);
        self
    }

    pub fn add_item(&mut self, item: CollectionItem) {
        debug!("Adding item: {} -> {}", item.name, item.folder);
        self.items.push(item);
    }

    /// Groups items into folders sorted by name; items inside a folder are stably
    /// sorted by verb rank.
    pub fn build(self) -> Collection {
        let mut folders: BTreeMap<String, Vec<CollectionItem>> = BTreeMap::new();
        for item in self.items {
            folders.entry(item.folder.clone()).or_default().push(item);
        }

        let item = folders
            .into_iter()
            .map(|(name, mut items)| {
                items.sort_by_key(|item| item.method.rank());
                Node::Folder(Folder {
                    description: folder_description(&name),
                    name,
                    item: items.into_iter().map(CollectionItem::into_node).collect(),
                })
            })
            .collect();

        Collection {
            info: self.info,
            item,
            variable: vec![
                Variable::string("base_url", &self.base_url),
                Variable::string("token", ""),
            ],
            auth: self.auth,
        }
    }
}

impl Default for CollectionAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Assembles `items` with the metadata from `config`.
pub fn assemble(items: Vec<CollectionItem>, config: &GeneratorConfig) -> Collection {
    let mut assembler = CollectionAssembler::from_config(config);
    for item in items {
        assembler.add_item(item);
    }
    assembler.build()
}

impl Collection {
    pub fn folders(&self) -> impl Iterator<Item = &Folder> {
        self.item.iter().filter_map(|node| match node {
            Node::Folder(folder) => Some(folder),
            Node::Request(_) => None,
        })
    }

    /// Number of request nodes anywhere in the tree.
    pub fn request_count(&self) -> usize {
        fn count(nodes: &[Node]) -> usize {
            nodes
                .iter()
                .map(|node| match node {
                    Node::Folder(folder) => count(&folder.item),
                    Node::Request(_) => 1,
                })
                .sum()
        }
        count(&self.item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item(method: HttpMethod, uri: &str, name: &str) -> CollectionItem {
        let route = RouteDescriptor::new(uri, method);
        CollectionItem::new(&route, name.to_string(), String::new())
    }

    fn request_names(folder: &Folder) -> Vec<String> {
        folder
            .item
            .iter()
            .map(|node| match node {
                Node::Request(request) => request.name.clone(),
                Node::Folder(folder) => folder.name.clone(),
            })
            .collect()
    }

    #[test]
    fn test_folder_derivation() {
        assert_eq!(folder_for("/api"), "API");
        assert_eq!(folder_for("/"), "API");
        assert_eq!(folder_for("/api/{tenant}/users"), "API");
        assert_eq!(folder_for("/api/login"), "Authentication");
        assert_eq!(folder_for("/api/password/reset"), "Authentication");
        assert_eq!(folder_for("/api/Auth/token"), "Authentication");
        assert_eq!(folder_for("/api/admin/stats"), "Admin");
        assert_eq!(folder_for("/api/user"), "Users");
        assert_eq!(folder_for("/api/users/{id}"), "Users");
        assert_eq!(folder_for("/api/category/{id}"), "Categories");
        assert_eq!(folder_for("/api/order-items"), "Order Items");
        assert_eq!(folder_for("/webhooks/stripe"), "Webhooks");
    }

    #[test]
    fn test_folder_descriptions() {
        assert_eq!(folder_description("Users"), "Endpoints for Users");
        assert_eq!(folder_description("Authentication"), "Authentication and session endpoints");
        assert_eq!(folder_description("Admin"), "Administrative endpoints");
    }

    #[test]
    fn test_url_variables() {
        let url = Url::for_path("/api/users/{user}/posts/{post?}");
        assert_eq!(url.raw, "{{base_url}}/api/users/{user}/posts/{post?}");
        assert_eq!(url.host, vec!["{{base_url}}"]);
        assert_eq!(url.path, vec!["api", "users", "{user}", "posts", "{post?}"]);
        assert_eq!(
            url.variable,
            vec![
                UrlVariable {
                    key: "user".to_string(),
                    value: ":user".to_string(),
                    description: "Route parameter: user".to_string(),
                },
                UrlVariable {
                    key: "post".to_string(),
                    value: ":post".to_string(),
                    description: "Route parameter: post".to_string(),
                },
            ]
        );

        let serialized = serde_json::to_value(Url::for_path("/api/ping")).unwrap();
        assert!(serialized.get("variable").is_none());
    }

    #[test]
    fn test_header_dedup_first_seen_wins() {
        let item = item(HttpMethod::Get, "/api/users", "Get All Users").with_headers(vec![
            HeaderEntry::text("Authorization", "Bearer {{token}}"),
            HeaderEntry::text("Accept", "application/json"),
            HeaderEntry::text("authorization", "Bearer other"),
            HeaderEntry::text("ACCEPT", "text/html"),
        ]);
        let keys: Vec<_> = item.headers.iter().map(|h| (h.key.as_str(), h.value.as_str())).collect();
        assert_eq!(
            keys,
            vec![("Authorization", "Bearer {{token}}"), ("Accept", "application/json")]
        );
    }

    #[test]
    fn test_build_sorts_items_and_folders() {
        let mut assembler = CollectionAssembler::new();
        assembler.add_item(item(HttpMethod::Delete, "/api/users/{id}", "delete"));
        assembler.add_item(item(HttpMethod::Other("PURGE".to_string()), "/api/users", "purge"));
        assembler.add_item(item(HttpMethod::Get, "/api/products", "products"));
        assembler.add_item(item(HttpMethod::Post, "/api/users", "create"));
        assembler.add_item(item(HttpMethod::Get, "/api/users", "list"));
        assembler.add_item(item(HttpMethod::Get, "/api/users/{id}", "show"));
        assembler.add_item(item(HttpMethod::Patch, "/api/users/{id}", "patch"));
        assembler.add_item(item(HttpMethod::Put, "/api/users/{id}", "put"));
        assembler.add_item(item(HttpMethod::Post, "/api/login", "login"));

        let collection = assembler.build();
        let folders: Vec<_> = collection.folders().collect();
        let names: Vec<_> = folders.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Authentication", "Products", "Users"]);

        assert_eq!(
            request_names(folders[2]),
            vec!["list", "show", "create", "put", "patch", "delete", "purge"]
        );
        assert_eq!(collection.request_count(), 9);
    }

    #[test]
    fn test_document_shape_with_auth() {
        let config = GeneratorConfig {
            base_url: "https://api.example.com".to_string(),
            collection_name: "Shop".to_string(),
            collection_description: "Shop API".to_string(),
            ..GeneratorConfig::default()
        };
        let route = RouteDescriptor::new("/api/users/{id}", HttpMethod::Put);
        let body = Body::json(&json!({"name": "example_name"})).unwrap();
        let items = vec![CollectionItem::new(&route, "Update User".to_string(), "desc".to_string())
            .with_headers(vec![HeaderEntry::text("Accept", "application/json")])
            .with_body(body)];

        let value = serde_json::to_value(assemble(items, &config)).unwrap();

        assert_eq!(value["info"]["name"], "Shop");
        assert_eq!(value["info"]["description"], "Shop API");
        assert_eq!(value["info"]["schema"], SCHEMA_URL);
        assert_eq!(value["info"]["_exporter_id"], EXPORTER_ID);
        assert_eq!(
            value["variable"],
            json!([
                {"key": "base_url", "value": "https://api.example.com", "type": "string"},
                {"key": "token", "value": "", "type": "string"}
            ])
        );
        assert_eq!(
            value["auth"],
            json!({"type": "bearer", "bearer": [{"key": "token", "value": "{{token}}", "type": "string"}]})
        );

        let folder = &value["item"][0];
        assert_eq!(folder["name"], "Users");
        assert_eq!(folder["description"], "Endpoints for Users");
        let request = &folder["item"][0];
        assert_eq!(request["name"], "Update User");
        assert_eq!(request["response"], json!([]));
        assert_eq!(request["request"]["method"], "PUT");
        assert_eq!(request["request"]["header"], json!([{"key": "Accept", "value": "application/json", "type": "text"}]));
        assert_eq!(request["request"]["body"]["mode"], "raw");
        assert_eq!(request["request"]["body"]["options"]["raw"]["language"], "json");
        assert_eq!(request["request"]["body"]["raw"], "{\n  \"name\": \"example_name\"\n}");
        assert_eq!(request["request"]["url"]["variable"][0]["key"], "id");
        assert_eq!(request["request"]["description"], "desc");
    }

    #[test]
    fn test_auth_disabled_is_noauth() {
        let config = GeneratorConfig {
            enable_auth: false,
            ..GeneratorConfig::default()
        };
        let value = serde_json::to_value(assemble(Vec::new(), &config)).unwrap();
        assert_eq!(value["auth"], json!({"type": "noauth"}));
        assert_eq!(value["item"], json!([]));
    }

    #[test]
    fn test_collection_deserializes_back() {
        let config = GeneratorConfig::default();
        let route = RouteDescriptor::new("/api/users", HttpMethod::Get);
        let collection = assemble(
            vec![CollectionItem::new(&route, "Get All Users".to_string(), String::new())],
            &config,
        );
        let json = serde_json::to_string(&collection).unwrap();
        let parsed: Collection = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.folders().count(), 1);
        assert_eq!(parsed.request_count(), 1);
        assert_eq!(parsed.auth, Auth::from_flag(true));
    }
}
