use anyhow::Result;
use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SPEC_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Finds OpenAPI documents under a directory.
///
/// The `SpecScanner` recursively walks a directory and collects every `.yaml`, `.yml` and
/// `.json` file. The `target` directory and hidden directories (those starting with `.`)
/// are skipped.
///
/// # Example
///
/// ```no_run
/// use openapi_minimal_api_gen::scanner::SpecScanner;
/// use std::path::PathBuf;
///
/// let scanner = SpecScanner::new(PathBuf::from("./specs"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} documents", result.spec_files.len());
/// ```
pub struct SpecScanner {
    root_path: PathBuf,
}

/// Result of a directory scan.
pub struct ScanResult {
    /// Discovered documents, sorted by path
    pub spec_files: Vec<PathBuf>,
    /// Warning messages for entries that could not be read
    pub warnings: Vec<String>,
}

impl SpecScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Walks the directory tree and collects candidate documents.
    ///
    /// Inaccessible entries are logged and recorded as warnings; scanning continues.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut spec_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && file_name != "target"
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && is_spec_file(path) {
                        spec_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult {
            spec_files,
            warnings,
        })
    }
}

pub fn is_spec_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| SPEC_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(result: &ScanResult) -> Vec<String> {
        result
            .spec_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_scan_collects_spec_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("pets.yaml"), "openapi: 3.0.3").unwrap();
        fs::write(root.join("orders.yml"), "openapi: 3.0.3").unwrap();
        fs::write(root.join("users.JSON"), "{}").unwrap();
        fs::write(root.join("readme.md"), "# README").unwrap();

        let result = SpecScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(names(&result), vec!["orders.yml", "pets.yaml", "users.JSON"]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = SpecScanner::new(temp_dir.path().to_path_buf()).scan().unwrap();
        assert!(result.spec_files.is_empty());
    }

    #[test]
    fn test_scan_nested_and_skipped_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("v1/internal")).unwrap();
        fs::create_dir(root.join("target")).unwrap();
        fs::create_dir(root.join(".cache")).unwrap();

        fs::write(root.join("v1/public.yaml"), "").unwrap();
        fs::write(root.join("v1/internal/admin.yaml"), "").unwrap();
        fs::write(root.join("target/copy.yaml"), "").unwrap();
        fs::write(root.join(".cache/stale.json"), "").unwrap();

        let result = SpecScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(names(&result), vec!["admin.yaml", "public.yaml"]);
    }
}
