//! Postman API client.
//!
//! Pushes a generated collection to a remote workspace. Every call is a single
//! blocking request bounded by [`REQUEST_TIMEOUT`]; failures surface as
//! [`Error::RemoteSync`] and never affect the file already written.

use crate::collection::Collection;
use crate::config::PostmanConfig;
use crate::error::{Error, Result};
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.getpostman.com";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct CollectionPayload<'a> {
    collection: &'a Collection,
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace: Option<&'a str>,
}

/// Client for the collection endpoints of the Postman API.
pub struct PostmanApiClient {
    api_key: Option<String>,
    workspace_id: Option<String>,
    base_url: String,
}

impl PostmanApiClient {
    pub fn new(config: &PostmanConfig) -> Self {
        Self {
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            workspace_id: config.workspace_id.clone().filter(|w| !w.is_empty()),
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Replaces the remote collection `collection_id` with `collection`.
    pub fn update_collection(&self, collection: &Collection, collection_id: Option<&str>) -> Result<()> {
        let api_key = self.api_key()?;
        let collection_id = collection_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::RemoteSync("Postman collection ID is not configured".to_string()))?;

        let url = format!("{}/collections/{}", self.base_url, collection_id);
        debug!("PUT {}", url);
        let response = self
            .client()?
            .put(&url)
            .header("X-Api-Key", api_key)
            .json(&CollectionPayload {
                collection,
                workspace: None,
            })
            .send()?;

        let status = response.status();
        if status.is_success() {
            info!("Updated Postman collection {}", collection_id);
            return Ok(());
        }
        let body = response.text().unwrap_or_default();
        Err(Error::RemoteSync(format!(
            "Postman API returned status {} - Response: {}",
            status, body
        )))
    }

    /// Creates a new remote collection and returns its uid.
    pub fn create_collection(&self, collection: &Collection) -> Result<String> {
        let api_key = self.api_key()?;
        let url = format!("{}/collections", self.base_url);
        debug!("POST {}", url);
        let response = self
            .client()?
            .post(&url)
            .header("X-Api-Key", api_key)
            .json(&CollectionPayload {
                collection,
                workspace: self.workspace_id.as_deref(),
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::RemoteSync(format!(
                "Postman API returned status {} - Response: {}",
                status, body
            )));
        }
        let data: Value = response.json()?;
        data["collection"]["uid"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::RemoteSync("response carries no collection uid".to_string()))
    }

    /// Fetches the remote collection document.
    pub fn get_collection(&self, collection_id: &str) -> Result<Value> {
        let api_key = self.api_key()?;
        let url = format!("{}/collections/{}", self.base_url, collection_id);
        debug!("GET {}", url);
        let response = self.client()?.get(&url).header("X-Api-Key", api_key).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::RemoteSync(format!("Postman API returned status {}", status)));
        }
        Ok(response.json()?)
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::RemoteSync("Postman API key is not configured".to_string()))
    }

    fn client(&self) -> Result<reqwest::blocking::Client> {
        Ok(reqwest::blocking::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionAssembler;

    fn config(api_key: Option<&str>) -> PostmanConfig {
        PostmanConfig {
            api_key: api_key.map(str::to_string),
            workspace_id: None,
            collection_id: None,
        }
    }

    // Nothing listens here; none of these tests may reach it.
    const UNUSED_BASE: &str = "http://127.0.0.1:9";

    #[test]
    fn test_missing_api_key_fails_without_request() {
        let client = PostmanApiClient::new(&config(None)).with_base_url(UNUSED_BASE);
        let collection = CollectionAssembler::new().build();

        let err = client.update_collection(&collection, Some("abc")).unwrap_err();
        assert_eq!(err.to_string(), "Remote sync error: Postman API key is not configured");

        let err = client.create_collection(&collection).unwrap_err();
        assert!(matches!(err, Error::RemoteSync(_)));
    }

    #[test]
    fn test_empty_api_key_counts_as_missing() {
        let client = PostmanApiClient::new(&config(Some("")));
        let err = client.get_collection("abc").unwrap_err();
        assert!(err.to_string().contains("API key is not configured"));
    }

    #[test]
    fn test_missing_collection_id_fails_without_request() {
        let client = PostmanApiClient::new(&config(Some("key"))).with_base_url(UNUSED_BASE);
        let collection = CollectionAssembler::new().build();

        let err = client.update_collection(&collection, None).unwrap_err();
        assert_eq!(err.to_string(), "Remote sync error: Postman collection ID is not configured");

        let err = client.update_collection(&collection, Some("")).unwrap_err();
        assert!(matches!(err, Error::RemoteSync(_)));
    }

    #[test]
    fn test_payload_shape() {
        let collection = CollectionAssembler::new().with_info("Shop", "").build();
        let payload = serde_json::to_value(CollectionPayload {
            collection: &collection,
            workspace: Some("ws-1"),
        })
        .unwrap();
        assert_eq!(payload["collection"]["info"]["name"], "Shop");
        assert_eq!(payload["workspace"], "ws-1");

        let payload = serde_json::to_value(CollectionPayload {
            collection: &collection,
            workspace: None,
        })
        .unwrap();
        assert!(payload.get("workspace").is_none());
    }
}
