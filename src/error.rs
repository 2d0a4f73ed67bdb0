use std::path::PathBuf;

/// Result type alias for the generator
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the generator
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    ParseError { file: PathBuf, message: String },
    InvalidArgument(String),
    /// A `$ref` that does not name an entry of the document's component table
    UnresolvedReference { reference: String },
    /// The document has no `paths` object
    MissingPaths,
    SerializationError(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::ParseError { file, message } => {
                write!(f, "Parse error in {}: {}", file.display(), message)
            }
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::UnresolvedReference { reference } => {
                write!(f, "Unresolved schema reference: {}", reference)
            }
            Error::MissingPaths => write!(f, "OpenAPI document does not declare any paths"),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_reference_message() {
        let err = Error::UnresolvedReference {
            reference: "#/components/schemas/Missing".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unresolved schema reference: #/components/schemas/Missing"
        );
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error as _;
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(Error::MissingPaths.source().is_none());
    }
}
