//! Error types for taxonomy operations.
//!
//! Storage and validation failures surface as values; nothing in the core
//! panics on bad input.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for taxonomy operations.
pub type Result<T> = std::result::Result<T, TaxonomyError>;

/// Errors that can occur while reading or mutating a taxonomy.
#[derive(Debug, Error)]
pub enum TaxonomyError {
    /// A caller-supplied argument was missing or blank.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The node is not in a state that allows the operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A category name cannot be used as a storage directory.
    #[error("Invalid category name: {0:?}")]
    InvalidCategory(String),

    /// No node exists at the given path.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Filesystem failure at a specific location.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Marker or export serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TaxonomyError {
    fn from(e: serde_json::Error) -> Self {
        TaxonomyError::Serialization(e.to_string())
    }
}

// Convenience constructors
impl TaxonomyError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        TaxonomyError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn node_not_found(path: &[String]) -> Self {
        TaxonomyError::NodeNotFound(path.join(" -> "))
    }

    pub fn invalid_category(name: impl Into<String>) -> Self {
        TaxonomyError::InvalidCategory(name.into())
    }
}

/// Extension for attaching a path to raw `std::io` results.
pub(crate) trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|e| TaxonomyError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_not_found_joins_path() {
        let err = TaxonomyError::node_not_found(&["Temp-related".into(), "SlowDrift".into()]);
        assert_eq!(err.to_string(), "Node not found: Temp-related -> SlowDrift");
    }

    #[test]
    fn test_io_context_keeps_path() {
        let res: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = res.at(Path::new("/tmp/x")).unwrap_err();
        assert!(err.to_string().contains("/tmp/x"));
    }
}
