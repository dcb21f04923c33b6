//! Runtime errors.

use anomtree_core::error::TaxonomyError;
use anomtree_llm::LlmError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Everything that can abort one record or one export.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] LlmError),

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input table is missing required columns or holds bad values.
    #[error("Invalid table: {0}")]
    InvalidTable(String),
}

impl RuntimeError {
    pub fn csv(path: impl AsRef<Path>, source: csv::Error) -> Self {
        RuntimeError::Csv {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        RuntimeError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// True when the oracle answered but broke the reply format.
    pub fn is_protocol(&self) -> bool {
        matches!(self, RuntimeError::Oracle(LlmError::Protocol(_)))
    }
}
