//! OpenAPI Minimal API Generator - Command-line tool for generating ASP.NET Core Minimal API
//! descriptors.
//!
//! This binary reads an OpenAPI 3.x document (or a directory of them) and emits the
//! structured descriptors a template layer renders into C#: route groups, handler
//! interfaces, typed results, typed clients, models and policy registrations.
//!
//! # Usage
//!
//! ```bash
//! openapi-minimal-api-gen [OPTIONS] <SPEC_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML descriptors:
//! ```bash
//! openapi-minimal-api-gen petstore.yaml -o petstore.descriptors.yaml
//! ```
//!
//! Group by tag and emit JSON:
//! ```bash
//! openapi-minimal-api-gen petstore.yaml -g tag -f json
//! ```
//!
//! Generate every document in a directory, one pass per path segment:
//! ```bash
//! openapi-minimal-api-gen ./specs --per-segment -o ./generated -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_minimal_api_gen::cli;

fn main() -> Result<()> {
    // Parse once up front so the verbose flag can configure the logger
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI Minimal API Generator starting...");

    let args = cli::parse_args_from_parsed(args)?;

    cli::run(args)?;

    info!("Descriptor generation completed successfully");

    Ok(())
}
