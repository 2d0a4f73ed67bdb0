//! Serialization of generation output to YAML or JSON.
//!
//! The functions are generic over any [`Serialize`] value so that a single
//! [`GenerationOutput`](crate::generator::GenerationOutput) and the per-segment map emitted
//! by `--per-segment` go through the same path.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Serializes generation output to YAML.
///
/// # Example
///
/// ```no_run
/// use openapi_minimal_api_gen::document::Document;
/// use openapi_minimal_api_gen::generator::{Generator, GeneratorOptions};
/// use openapi_minimal_api_gen::serializer::serialize_yaml;
///
/// let document = Document::from_yaml_str("openapi: 3.0.3\npaths: {}").unwrap();
/// let output = Generator::new(&document, GeneratorOptions::default()).generate().unwrap();
/// println!("{}", serialize_yaml(&output).unwrap());
/// ```
pub fn serialize_yaml<T: Serialize + ?Sized>(output: &T) -> Result<String> {
    debug!("Serializing generation output to YAML");
    serde_yaml::to_string(output).context("Failed to serialize generation output to YAML")
}

/// Serializes generation output to pretty-printed JSON.
pub fn serialize_json<T: Serialize + ?Sized>(output: &T) -> Result<String> {
    debug!("Serializing generation output to JSON");
    serde_json::to_string_pretty(output).context("Failed to serialize generation output to JSON")
}

/// Writes string content to a file, creating parent directories as needed.
///
/// # Errors
///
/// Returns an error if a directory or the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::generator::{GenerationOutput, Generator, GeneratorOptions};
    use tempfile::TempDir;

    fn output() -> GenerationOutput {
        let document = Document::from_yaml_str(
            r#"
openapi: 3.0.3
info: { title: Test API, version: 1.0.0 }
paths:
  /health:
    get:
      operationId: getHealth
      responses: { '204': { description: healthy } }
"#,
        )
        .unwrap();
        Generator::new(&document, GeneratorOptions::default())
            .generate()
            .unwrap()
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&output()).unwrap();

        assert!(yaml.contains("title: Test API"));
        assert!(yaml.contains("models_namespace: Api.Models"));
        assert!(yaml.contains("groups:"));
        assert!(yaml.contains("operation_id: getHealth"));
    }

    #[test]
    fn test_serialize_json() {
        let json = serialize_json(&output()).unwrap();

        assert!(json.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["title"], "Test API");
        assert_eq!(parsed["groups"][0]["name"], "Health");
        assert_eq!(parsed["groups"][0]["endpoints"][0]["http_method"], "GET");
    }

    #[test]
    fn test_write_to_file_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out/nested/api.json");

        write_to_file("{}", &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_write_to_file_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("api.yaml");

        write_to_file("first", &path).unwrap();
        write_to_file("second", &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }
}
