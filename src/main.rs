//! Route2Postman - Command-line tool for generating Postman collections.
//!
//! This binary turns a Laravel application's route table into a Postman v2.1 collection.
//! Routes come from a `route:list --json` manifest; when the application source is
//! available, controllers, form requests and middleware are read to produce example
//! bodies and request headers.
//!
//! # Usage
//!
//! ```bash
//! route2postman generate --routes <FILE> [OPTIONS]
//! ```
//!
//! # Examples
//!
//! Generate with request bodies derived from validation rules:
//! ```bash
//! php artisan route:list --json > routes.json
//! route2postman generate --routes routes.json --source .
//! ```
//!
//! Write elsewhere and push to an existing Postman collection:
//! ```bash
//! route2postman generate -r routes.json -o api.json --update-api --collection-id 1234-abcd
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! route2postman generate -r routes.json -v
//! ```
//!
//! # Exit status
//!
//! `0` on success (a failed remote update only logs a warning), `1` when configuration
//! or generation fails, `2` when the collection cannot be written.

use clap::Parser;
use log::{error, info};
use route2postman::cli;
use std::process;

fn main() {
    let args = cli::CliArgs::parse();

    // Initialize logger based on verbose flag
    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Route2Postman starting...");

    match cli::run(args) {
        Ok(()) => {
            info!("Postman collection generation completed successfully");
            process::exit(cli::EXIT_SUCCESS);
        }
        Err(e) => {
            error!("{:#}", e);
            process::exit(cli::exit_code(&e));
        }
    }
}
