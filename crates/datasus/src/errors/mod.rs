use std::path::PathBuf;
use thiserror::Error;

/// Centralized error type for the datasus crate
#[derive(Error, Debug)]
pub enum DatasusError {
    /// A caller supplied values outside an adapter's recognized domain.
    /// Raised before any network I/O.
    #[error("unknown {field}: {values:?}")]
    Validation {
        field: &'static str,
        values: Vec<String>,
    },

    #[error("path not found: {0}")]
    NotFound(String),

    /// The server refused to enter a directory (treated as an opaque leaf by listings)
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("FTP transport error on {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: suppaftp::FtpError,
    },

    #[error("corrupt input {}: {message}", path.display())]
    CorruptInput { path: PathBuf, message: String },

    #[error("unsupported format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON (de)serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl DatasusError {
    /// Builds a validation error, sorting and deduplicating the offending values
    pub fn validation<I, S>(field: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        values.sort();
        values.dedup();
        Self::Validation { field, values }
    }

    pub fn corrupt(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::CorruptInput {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Alias for fallible operations in the datasus crate
pub type DatasusResult<T> = Result<T, DatasusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_sorts_values() {
        let err = DatasusError::validation("uf", ["ZZ", "AA", "ZZ"]);
        match err {
            DatasusError::Validation { field, values } => {
                assert_eq!(field, "uf");
                assert_eq!(values, vec!["AA".to_string(), "ZZ".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_display_messages() {
        let err = DatasusError::corrupt("/tmp/x.dbc", "bad header");
        assert_eq!(err.to_string(), "corrupt input /tmp/x.dbc: bad header");
        assert!(DatasusError::NotFound("/a".into()).is_not_found());
    }
}
