use crate::document::Document;
use crate::generator::{Generator, GeneratorOptions};
use crate::grouping::GroupingStrategy;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// OpenAPI Minimal API Generator - Generate ASP.NET Core Minimal API descriptors from OpenAPI documents
#[derive(Parser, Debug)]
#[command(name = "openapi-minimal-api-gen")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to an OpenAPI document or a directory of documents
    #[arg(value_name = "SPEC_PATH")]
    pub spec_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file, or output directory for directory input (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// How operations are grouped into endpoint groups
    #[arg(short = 'g', long = "grouping", value_enum, default_value = "first-path-segment")]
    pub grouping: GroupingStrategy,

    /// Only generate operations under this first path segment
    #[arg(short = 's', long = "segment", value_name = "SEGMENT")]
    pub segment: Option<String>,

    /// Include operations marked as deprecated
    #[arg(long = "include-deprecated")]
    pub include_deprecated: bool,

    /// Root namespace of the generated code
    #[arg(short = 'n', long = "namespace", default_value = "Api")]
    pub namespace: String,

    /// Run one independent pass per path segment
    #[arg(long = "per-segment")]
    pub per_segment: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }
}

impl CliArgs {
    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            namespace: self.namespace.clone(),
            grouping: self.grouping,
            include_deprecated: self.include_deprecated,
            path_segment: self.segment.clone(),
        }
    }
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.spec_path.exists() {
        anyhow::bail!("Spec path does not exist: {}", args.spec_path.display());
    }

    if args.per_segment && args.segment.is_some() {
        anyhow::bail!("--segment and --per-segment cannot be used together");
    }

    if args.namespace.trim().is_empty() {
        anyhow::bail!("Namespace must not be empty");
    }

    if args.spec_path.is_dir() {
        if let Some(ref output) = args.output_path {
            if output.is_file() {
                anyhow::bail!(
                    "Output must be a directory when the spec path is a directory: {}",
                    output.display()
                );
            }
        }
    }

    info!("Spec path: {}", args.spec_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output: {}", output.display());
    } else {
        info!("Output: stdout");
    }
    info!("Grouping: {:?}", args.grouping);
    info!("Namespace: {}", args.namespace);
    if let Some(ref segment) = args.segment {
        info!("Segment: {}", segment);
    }
    if args.per_segment {
        info!("Per-segment generation enabled");
    }

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    use crate::loader::{LoadedSpec, SpecLoader};
    use crate::scanner::SpecScanner;
    use crate::serializer::write_to_file;

    info!("Starting descriptor generation...");

    // Step 1: Collect input documents
    let spec_files = if args.spec_path.is_dir() {
        info!("Scanning spec directory...");
        let scan_result = SpecScanner::new(args.spec_path.clone()).scan()?;
        for warning in &scan_result.warnings {
            warn!("{}", warning);
        }
        if scan_result.spec_files.is_empty() {
            anyhow::bail!("No OpenAPI documents found in {}", args.spec_path.display());
        }
        info!("Found {} documents", scan_result.spec_files.len());
        scan_result.spec_files
    } else {
        vec![args.spec_path.clone()]
    };

    // Step 2: Load documents
    info!("Loading documents...");
    let loaded: Vec<LoadedSpec> = if spec_files.len() == 1 {
        vec![SpecLoader::load_file(&spec_files[0])?]
    } else {
        SpecLoader::load_files(&spec_files)
            .into_iter()
            .filter_map(|result| match result {
                Ok(spec) => Some(spec),
                Err(e) => {
                    debug!("Skipping document: {:#}", e);
                    None
                }
            })
            .collect()
    };

    if loaded.is_empty() {
        anyhow::bail!("No documents could be loaded successfully");
    }
    info!("Loaded {} documents", loaded.len());

    // Step 3: Generate and emit
    let options = args.generator_options();
    let directory_output = args.spec_path.is_dir();
    let mut endpoints = 0;

    for spec in &loaded {
        info!("Generating descriptors for {}...", spec.path.display());
        let (content, count) = generate_content(&spec.document, &options, &args)
            .with_context(|| format!("Failed to generate descriptors for {}", spec.path.display()))?;
        endpoints += count;

        match &args.output_path {
            Some(output) => {
                let target = if directory_output {
                    output_file_for(output, &spec.path, args.output_format)
                } else {
                    output.clone()
                };
                info!("Writing output to: {}", target.display());
                write_to_file(&content, &target)?;
            }
            None => println!("{}", content),
        }
    }

    // Step 4: Display summary
    info!("Generation complete!");
    info!("Summary:");
    info!("  - Documents loaded: {}", loaded.len());
    info!("  - Endpoints generated: {}", endpoints);
    info!("  - Grouping: {:?}", args.grouping);

    Ok(())
}

/// Generates and serializes one document, returning the content and its endpoint count.
fn generate_content(document: &Document, options: &GeneratorOptions, args: &CliArgs) -> Result<(String, usize)> {
    use crate::serializer::{serialize_json, serialize_yaml};

    let generator = Generator::new(document, options.clone());

    if args.per_segment {
        let segments: IndexMap<String, _> = generator.generate_per_segment()?.into_iter().collect();
        let count = segments.values().map(|output| output.endpoint_count()).sum();
        let content = match args.output_format {
            OutputFormat::Yaml => serialize_yaml(&segments)?,
            OutputFormat::Json => serialize_json(&segments)?,
        };
        return Ok((content, count));
    }

    let output = generator.generate()?;
    info!(
        "Generated {} groups, {} endpoints, {} models",
        output.groups.len(),
        output.endpoint_count(),
        output.models.len()
    );
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&output)?,
        OutputFormat::Json => serialize_json(&output)?,
    };
    Ok((content, output.endpoint_count()))
}

/// `{output}/{input stem}.{format extension}`
pub fn output_file_for(output_dir: &Path, input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "openapi".to_string());
    output_dir.join(format!("{}.{}", stem, format.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const SPEC: &str = r#"
openapi: 3.0.3
info: { title: Pets, version: '1' }
paths:
  /pets:
    get:
      operationId: listPets
      responses: { '200': { description: ok } }
  /owners:
    get:
      operationId: listOwners
      responses: { '200': { description: ok } }
"#;

    fn args(spec_path: PathBuf, extra: &[&str]) -> CliArgs {
        let mut argv = vec!["openapi-minimal-api-gen".to_string(), spec_path.to_string_lossy().to_string()];
        argv.extend(extra.iter().map(|s| s.to_string()));
        CliArgs::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let dir = TempDir::new().unwrap();
        let parsed = args(dir.path().to_path_buf(), &[]);
        assert_eq!(parsed.output_format, OutputFormat::Yaml);
        assert_eq!(parsed.grouping, GroupingStrategy::FirstPathSegment);
        assert_eq!(parsed.generator_options(), GeneratorOptions::default());
    }

    #[test]
    fn test_grouping_values() {
        let dir = TempDir::new().unwrap();
        let parsed = args(dir.path().to_path_buf(), &["-g", "tag", "-n", "Contoso"]);
        assert_eq!(parsed.grouping, GroupingStrategy::OpenApiTag);
        assert_eq!(parsed.generator_options().models_namespace(), "Contoso.Models");
    }

    #[test]
    fn test_missing_spec_path_is_rejected() {
        let parsed = args(PathBuf::from("/nonexistent/api.yaml"), &[]);
        let err = parse_args_from_parsed(parsed).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_segment_conflicts_with_per_segment() {
        let dir = TempDir::new().unwrap();
        let parsed = args(dir.path().to_path_buf(), &["-s", "pets", "--per-segment"]);
        assert!(parse_args_from_parsed(parsed).is_err());
    }

    #[test]
    fn test_run_writes_output_file() {
        let dir = TempDir::new().unwrap();
        let spec = dir.path().join("pets.yaml");
        fs::write(&spec, SPEC).unwrap();
        let output = dir.path().join("out/pets.json");

        let parsed = args(spec, &["-f", "json", "-o", output.to_str().unwrap()]);
        run(parse_args_from_parsed(parsed).unwrap()).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(json["groups"][0]["name"], "Pets");
        assert_eq!(json["groups"][1]["name"], "Owners");
    }

    #[test]
    fn test_run_directory_per_segment() {
        let dir = TempDir::new().unwrap();
        let specs = dir.path().join("specs");
        fs::create_dir(&specs).unwrap();
        fs::write(specs.join("pets.yaml"), SPEC).unwrap();
        let output = dir.path().join("out");

        let parsed = args(specs, &["--per-segment", "-o", output.to_str().unwrap()]);
        run(parse_args_from_parsed(parsed).unwrap()).unwrap();

        let yaml = fs::read_to_string(output.join("pets.yaml")).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert!(value.get("pets").is_some());
        assert!(value.get("owners").is_some());
    }

    #[test]
    fn test_output_file_for() {
        let path = output_file_for(Path::new("out"), Path::new("specs/orders.yml"), OutputFormat::Json);
        assert_eq!(path, PathBuf::from("out/orders.json"));
    }
}
