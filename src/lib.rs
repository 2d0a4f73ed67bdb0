//! OpenAPI Minimal API Generator - ASP.NET Core Minimal API descriptors from OpenAPI documents.
//!
//! This library reads an OpenAPI 3.x document and produces the structured records a code
//! emitter needs to write a Minimal API server and its typed client: route groups mapped with
//! `MapGroup`, handler interfaces, `TypedResults`-based result unions, parameter records with
//! binding attributes, typed client methods, component models and the DI registrations for
//! rate limiting, output caching, resilience pipelines and authentication.
//!
//! Only method bodies are emitted as literal C# snippets; everything else is data.
//!
//! # Architecture
//!
//! 1. [`loader`] / [`scanner`] - Read documents from files or directories
//! 2. [`document`] / [`schema`] - The input document object model
//! 3. [`naming`] / [`context`] - Identifier rules and pass-scoped registries
//! 4. [`type_resolver`] / [`inline`] - Map schemas to C# type references, hoisting inline shapes
//! 5. [`models`] / [`polymorphism`] - Component records, enums, tuples and hierarchies
//! 6. [`operations`] / [`grouping`] - Collect operations and partition them into groups
//! 7. [`policies`] / [`security`] - Vendor-extension policies and authorization
//! 8. [`endpoints`] / [`results`] / [`snippets`] - Endpoint, result and client synthesis
//! 9. [`generator`] - The pipeline tying the stages together
//! 10. [`serializer`] - Serializes the output to YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_minimal_api_gen::{
//!     generator::{Generator, GeneratorOptions},
//!     grouping::GroupingStrategy,
//!     loader::SpecLoader,
//!     serializer::serialize_yaml,
//! };
//! use std::path::Path;
//!
//! let spec = SpecLoader::load_file(Path::new("petstore.yaml")).unwrap();
//!
//! let options = GeneratorOptions {
//!     grouping: GroupingStrategy::OpenApiTag,
//!     ..GeneratorOptions::default()
//! };
//! let output = Generator::new(&spec.document, options).generate().unwrap();
//!
//! for group in &output.groups {
//!     println!("{} -> {}", group.name, group.mapping_route);
//! }
//! println!("{}", serialize_yaml(&output).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module which provides a complete CLI application.

pub mod cli;
pub mod context;
pub mod descriptors;
pub mod document;
pub mod endpoints;
pub mod error;
pub mod generator;
pub mod grouping;
pub mod inline;
pub mod loader;
pub mod models;
pub mod naming;
pub mod operations;
pub mod policies;
pub mod polymorphism;
pub mod results;
pub mod scanner;
pub mod schema;
pub mod security;
pub mod serializer;
pub mod snippets;
pub mod type_resolver;
