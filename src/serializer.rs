//! Serialization module for writing collections as JSON.
//!
//! This module renders a [`Collection`] as pretty-printed JSON and persists it. Writes go
//! to a temporary sibling file that is renamed over the target, so a failed run never
//! leaves a truncated collection behind.

use crate::collection::Collection;
use crate::error::{Error, Result};
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Serializes a collection to JSON with pretty printing.
///
/// Key order follows the document structure and the order in which body fields were
/// synthesized. Slashes are not escaped.
///
/// # Errors
///
/// Returns a `SerializationError` if serialization fails.
pub fn serialize_json(collection: &Collection) -> Result<String> {
    debug!("Serializing collection to JSON");
    Ok(serde_json::to_string_pretty(collection)?)
}

/// Serializes `collection` and writes it to `path`, returning the number of bytes written.
///
/// # Errors
///
/// Returns a `Persistence` error naming `path` if the collection cannot be encoded
/// or written.
pub fn save_collection(collection: &Collection, path: &Path) -> Result<usize> {
    save_json(collection, path)
}

fn save_json<T: Serialize + ?Sized>(document: &T, path: &Path) -> Result<usize> {
    let json = serde_json::to_string_pretty(document)
        .map_err(|e| Error::persistence(path, format!("cannot encode collection: {}", e)))?;
    write_to_file(&json, path)?;
    Ok(json.len())
}

/// Writes string content to a file.
///
/// Parent directories are created as needed. The content is first written to a
/// temporary file next to `path` and then renamed into place, replacing any
/// existing file.
///
/// # Errors
///
/// Returns a `Persistence` error naming `path` if any step fails. The temporary
/// file is removed on failure.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| Error::persistence(path, format!("cannot create {}: {}", parent.display(), e)))?;
    }

    let temp = temp_sibling(path)?;
    if let Err(e) = fs::write(&temp, content) {
        let _ = fs::remove_file(&temp);
        return Err(Error::persistence(path, e.to_string()));
    }
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(Error::persistence(path, e.to_string()));
    }

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// `dir/name.json` → `dir/.name.json.tmp`
fn temp_sibling(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::persistence(path, "output path has no file name"))?;
    let mut temp_name = std::ffi::OsString::from(".");
    temp_name.push(file_name);
    temp_name.push(".tmp");
    Ok(path.with_file_name(temp_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::{CollectionAssembler, CollectionItem};
    use crate::route_source::{HttpMethod, RouteDescriptor};
    use tempfile::TempDir;

    /// Helper function to create a small collection for testing
    fn create_test_collection() -> Collection {
        let mut assembler = CollectionAssembler::new().with_info("Test API", "A test API");
        let route = RouteDescriptor::new("/api/users/{id}", HttpMethod::Get);
        assembler.add_item(CollectionItem::new(
            &route,
            "Get User by Id".to_string(),
            "**GET** `/api/users/{id}`".to_string(),
        ));
        assembler.build()
    }

    #[test]
    fn test_serialize_json() {
        let json = serialize_json(&create_test_collection()).unwrap();

        assert!(json.contains("\"info\""));
        assert!(json.contains("\"Test API\""));
        assert!(json.contains("\"_exporter_id\""));
        assert!(json.contains("https://schema.getpostman.com/json/collection/v2.1.0/collection.json"));
        assert!(json.contains("{{base_url}}/api/users/{id}"));

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["info"]["name"], "Test API");
        assert_eq!(parsed["item"][0]["item"][0]["name"], "Get User by Id");
    }

    #[test]
    fn test_serialize_json_pretty_format() {
        let json = serialize_json(&create_test_collection()).unwrap();

        assert!(json.contains('\n'));
        assert!(json.contains("  "));
        assert!(json.lines().count() > 5, "Pretty printed JSON should have multiple lines");
    }

    #[test]
    fn test_serialize_json_keeps_document_key_order() {
        let json = serialize_json(&create_test_collection()).unwrap();
        let info = json.find("\"info\"").unwrap();
        let item = json.find("\"item\"").unwrap();
        let variable = json.find("\"variable\"").unwrap();
        let auth = json.find("\"auth\"").unwrap();
        assert!(info < item && item < variable && variable < auth);
    }

    #[test]
    fn test_save_collection_reports_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out").join("collection.json");
        let collection = create_test_collection();

        let written = save_collection(&collection, &path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(written, content.len());
        assert_eq!(content, serialize_json(&collection).unwrap());
    }

    #[test]
    fn test_encode_failure_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("collection.json");
        // JSON object keys must be strings
        let mut document = std::collections::BTreeMap::new();
        document.insert((1, 2), "value");

        let err = save_json(&document, &path).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert!(err.to_string().contains("cannot encode collection"));
        assert!(!path.exists());
    }

    #[test]
    fn test_write_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("collection.json");

        write_to_file("test content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "test content");
        assert!(!temp_dir.path().join(".collection.json.tmp").exists());
    }

    #[test]
    fn test_write_to_file_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("storage").join("app").join("collection.json");

        write_to_file("test content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "test content");
    }

    #[test]
    fn test_write_to_file_overwrites_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("collection.json");

        write_to_file("initial content", &file_path).unwrap();
        write_to_file("new content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_write_to_directory_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("taken");
        fs::create_dir(&target).unwrap();

        let err = write_to_file("content", &target).unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert!(target.is_dir());
        assert!(!temp_dir.path().join(".taken.tmp").exists());
    }

    #[test]
    fn test_write_json_file_end_to_end() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("postman-collection.json");

        let json = serialize_json(&create_test_collection()).unwrap();
        write_to_file(&json, &file_path).unwrap();

        let content = fs::read_to_string(&file_path).unwrap();
        let deserialized: Collection = serde_json::from_str(&content).unwrap();
        assert_eq!(deserialized.info.name, "Test API");
        assert_eq!(deserialized.request_count(), 1);
    }
}
