use std::path::PathBuf;
use thiserror::Error;

/// Failures of the permission lookup itself (never a denial)
#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("Could not read permissions file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid permissions document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Permission service unavailable: {0}")]
    Unavailable(String),
}
