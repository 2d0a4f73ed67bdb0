use crate::document::Document;
use crate::error::Error;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Reads OpenAPI documents from disk.
///
/// The format is chosen by extension: `.json` files are read with `serde_json`, everything
/// else with `serde_yaml`.
///
/// # Example
///
/// ```no_run
/// use openapi_minimal_api_gen::loader::SpecLoader;
/// use std::path::Path;
///
/// let loaded = SpecLoader::load_file(Path::new("petstore.yaml")).unwrap();
/// println!("Loaded {}", loaded.document.info.title);
/// ```
pub struct SpecLoader;

/// A successfully loaded document with the file it came from.
#[derive(Debug)]
pub struct LoadedSpec {
    pub path: PathBuf,
    pub document: Document,
}

impl SpecLoader {
    /// Loads a single document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid OpenAPI document.
    pub fn load_file(path: &Path) -> Result<LoadedSpec> {
        debug!("Loading document: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let parsed = if is_json(path) {
            Document::from_json_str(&content)
        } else {
            Document::from_yaml_str(&content)
        };
        let document = parsed.map_err(|e| Error::ParseError {
            file: path.to_path_buf(),
            message: e.to_string(),
        })?;

        debug!(
            "Loaded '{}' {} from {}",
            document.info.title,
            document.info.version,
            path.display()
        );

        Ok(LoadedSpec {
            path: path.to_path_buf(),
            document,
        })
    }

    /// Loads several documents, continuing past failures.
    ///
    /// Returns one result per input path, in input order.
    pub fn load_files(paths: &[PathBuf]) -> Vec<Result<LoadedSpec>> {
        debug!("Loading {} documents", paths.len());

        let results: Vec<Result<LoadedSpec>> = paths
            .iter()
            .map(|path| {
                Self::load_file(path).inspect_err(|e| {
                    warn!("Failed to load {}: {:#}", path.display(), e);
                })
            })
            .collect();

        let loaded = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Loading complete: {} succeeded, {} failed",
            loaded,
            results.len() - loaded
        );

        results
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
