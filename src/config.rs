//! Generator configuration.
//!
//! A single immutable [`GeneratorConfig`] is built once per run (defaults, then an
//! optional YAML file, then environment, then command-line overrides) and passed by
//! reference through every stage of the pipeline.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Fallback application name used to derive the collection name.
pub const DEFAULT_APP_NAME: &str = "Laravel API";

pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// Complete configuration for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Base URL exported as the `base_url` collection variable
    pub base_url: String,
    /// Name of the generated collection
    pub collection_name: String,
    /// Description of the generated collection
    pub collection_description: String,
    /// Where the collection JSON is written
    pub output_path: PathBuf,
    /// Route groups to include: `api`, `web` or `all`
    pub include_routes: Vec<String>,
    /// URI substrings that exclude a route
    pub exclude_routes: Vec<String>,
    /// Remote collection host settings
    pub postman: PostmanConfig,
    /// Whether the collection carries a default bearer auth block
    pub enable_auth: bool,
    /// Headers added to every request, after middleware headers
    pub default_headers: IndexMap<String, String>,
}

/// Credentials and identifiers for the Postman API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostmanConfig {
    pub api_key: Option<String>,
    pub workspace_id: Option<String>,
    pub collection_id: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let mut default_headers = IndexMap::new();
        default_headers.insert("Accept".to_string(), "application/json".to_string());
        default_headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            collection_name: format!("{} Collection", DEFAULT_APP_NAME),
            collection_description: "Auto-generated Postman collection from Laravel routes"
                .to_string(),
            output_path: PathBuf::from("storage/app/postman-collection.json"),
            include_routes: vec!["api".to_string()],
            exclude_routes: ["telescope", "horizon", "ignition", "_debugbar"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            postman: PostmanConfig::default(),
            enable_auth: true,
            default_headers,
        }
    }
}

impl GeneratorConfig {
    /// Loads the configuration from an optional YAML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Reads a YAML configuration file. Missing keys fall back to defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Applies environment overrides through `lookup`.
    ///
    /// `APP_NAME` only affects the collection name while it still holds the default.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("APP_URL") {
            self.base_url = url;
        }
        if let Some(app_name) = non_empty("APP_NAME") {
            if self.collection_name == Self::default().collection_name {
                self.collection_name = format!("{} Collection", app_name);
            }
        }
        if let Some(key) = non_empty("POSTMAN_API_KEY") {
            self.postman.api_key = Some(key);
        }
        if let Some(id) = non_empty("POSTMAN_WORKSPACE_ID") {
            self.postman.workspace_id = Some(id);
        }
        if let Some(id) = non_empty("POSTMAN_COLLECTION_ID") {
            self.postman.collection_id = Some(id);
        }
        self
    }

    /// Checks the settings that must hold before anything is written.
    pub fn validate(&self) -> Result<()> {
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::Configuration(
                "an output path is required".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(Error::Configuration("base_url must not be empty".to_string()));
        }
        Ok(())
    }
}
