use crate::config::GeneratorConfig;
use crate::error::Error;
use crate::generator::CollectionGenerator;
use crate::introspection::SourceTreeProvider;
use crate::remote::PostmanApiClient;
use crate::route_source::ManifestRouteSource;
use crate::serializer::save_collection;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;

/// Exit status for a successful run, including runs whose remote update failed.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status when configuration or generation fails.
pub const EXIT_GENERATION_FAILURE: i32 = 1;
/// Exit status when the collection cannot be written.
pub const EXIT_PERSISTENCE_FAILURE: i32 = 2;

/// Route2Postman - Generate a Postman collection from a Laravel route table
#[derive(Parser, Debug)]
#[command(name = "route2postman")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the collection and write it to disk
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Default)]
pub struct GenerateArgs {
    /// Route list manifest (JSON, as produced by `php artisan route:list --json`)
    #[arg(short = 'r', long = "routes", value_name = "FILE")]
    pub routes: PathBuf,

    /// Application source root used to read controllers, requests and middleware
    #[arg(short = 's', long = "source", value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// YAML configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Collection name
    #[arg(long = "name")]
    pub name: Option<String>,

    /// Base URL for the API
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Routes to include (web, api, all)
    #[arg(long = "include", value_delimiter = ',')]
    pub include: Vec<String>,

    /// Route patterns to exclude
    #[arg(long = "exclude", value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Update the existing Postman collection via the API
    #[arg(long = "update-api")]
    pub update_api: bool,

    /// Postman collection ID for the API update
    #[arg(long = "collection-id")]
    pub collection_id: Option<String>,
}

impl GenerateArgs {
    /// Applies command-line overrides on top of file and environment settings.
    pub fn apply_to(&self, config: &mut GeneratorConfig) {
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(name) = &self.name {
            config.collection_name = name.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if !self.include.is_empty() {
            config.include_routes = self.include.clone();
        }
        if !self.exclude.is_empty() {
            config.exclude_routes = self.exclude.clone();
        }
        if let Some(id) = &self.collection_id {
            config.postman.collection_id = Some(id.clone());
        }
    }
}

/// Run the selected command
pub fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Generate(generate) => run_generate(&generate),
    }
}

/// Run the generate workflow
pub fn run_generate(args: &GenerateArgs) -> Result<()> {
    debug!("Parsed arguments: {:?}", args);

    // Step 1: Resolve configuration
    let mut config = GeneratorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_to(&mut config);
    config.validate()?;
    info!("Output file: {}", config.output_path.display());
    info!("Base URL: {}", config.base_url);

    // Step 2: Index application sources
    let provider = match &args.source {
        Some(root) => {
            if !root.is_dir() {
                anyhow::bail!("Source path is not a directory: {}", root.display());
            }
            SourceTreeProvider::from_directory(root)?
        }
        None => {
            info!("No source root given; validation rules and custom middleware are not analysed");
            SourceTreeProvider::from_parsed_files(Vec::new())
        }
    };
    info!("Indexed {} classes", provider.class_count());

    // Step 3: Generate
    info!("Scanning routes...");
    let source = ManifestRouteSource::new(args.routes.clone());
    let collection = CollectionGenerator::new(&config, &provider)
        .generate_from(&source)
        .context("Failed to generate collection")?;
    info!("Found {} route group(s)", collection.folders().count());

    // Step 4: Persist
    info!("Saving collection to file...");
    let written = save_collection(&collection, &config.output_path)?;
    let size = fs::metadata(&config.output_path)
        .map(|m| m.len())
        .unwrap_or(written as u64);
    info!(
        "Collection saved successfully to: {} ({})",
        config.output_path.display(),
        format_bytes(size)
    );

    // Step 5: Optional remote update, best effort
    if args.update_api {
        info!("Updating Postman collection via API...");
        let client = PostmanApiClient::new(&config.postman);
        match client.update_collection(&collection, config.postman.collection_id.as_deref()) {
            Ok(()) => info!("Postman collection updated successfully"),
            Err(e) => warn!("Failed to update Postman collection: {}", e),
        }
    }

    // Step 6: Display summary
    info!("Generation complete!");
    info!("Summary:");
    info!("  - Folders: {}", collection.folders().count());
    info!("  - Requests: {}", collection.request_count());
    info!("  - File size: {}", format_bytes(size));

    Ok(())
}

/// Maps a failed run to its exit status.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    let persistence = err
        .chain()
        .filter_map(|cause| cause.downcast_ref::<Error>())
        .any(|e| matches!(e, Error::Persistence { .. }));
    if persistence {
        EXIT_PERSISTENCE_FAILURE
    } else {
        EXIT_GENERATION_FAILURE
    }
}

/// Human-readable size with two decimals: `1536` → `1.50 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}
