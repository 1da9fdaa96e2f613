//! Route2Postman - Postman collections from a Laravel route table.
//!
//! This library turns the routes of a Laravel application into a Postman v2.1 collection.
//! Every endpoint becomes a request template with a method, a `{{base_url}}` URL with
//! path variables, headers derived from its middleware, and an example JSON body
//! synthesized from its validation rules. Requests are grouped into sorted folders.
//!
//! # Architecture
//!
//! 1. [`route_source`] - Reads the route table and expands it into one descriptor per verb
//! 2. [`scanner`] - Recursively scans the application for PHP files
//! 3. [`parser`] - Indexes namespaces, classes, methods and literal arrays in PHP source
//! 4. [`introspection`] - Answers questions about controllers and request types
//! 5. [`validation`] - Resolves validation rules and synthesizes example values
//! 6. [`middleware`] - Maps middleware to auth, CSRF and custom headers
//! 7. [`naming`] - Names and describes endpoints
//! 8. [`collection`] - Builds the folder tree and the collection document
//! 9. [`generator`] - Runs the per-route analysis and assembly
//! 10. [`serializer`] - Writes the collection as JSON
//! 11. [`remote`] - Pushes the collection to the Postman API
//!
//! # Example Usage
//!
//! ```no_run
//! use route2postman::{
//!     config::GeneratorConfig,
//!     generator::CollectionGenerator,
//!     introspection::SourceTreeProvider,
//!     route_source::ManifestRouteSource,
//!     serializer::save_collection,
//! };
//! use std::path::{Path, PathBuf};
//!
//! let config = GeneratorConfig::load(None).unwrap();
//! let provider = SourceTreeProvider::from_directory(Path::new("./my-app")).unwrap();
//! let routes = ManifestRouteSource::new(PathBuf::from("routes.json"));
//!
//! let collection = CollectionGenerator::new(&config, &provider)
//!     .generate_from(&routes)
//!     .unwrap();
//!
//! save_collection(&collection, &config.output_path).unwrap();
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod cli;
pub mod collection;
pub mod config;
pub mod error;
pub mod generator;
pub mod introspection;
pub mod middleware;
pub mod naming;
pub mod parser;
pub mod remote;
pub mod route_source;
pub mod scanner;
pub mod serializer;
pub mod validation;
