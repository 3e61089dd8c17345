//! Errors raised while loading or persisting backend files.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use spider_auth::error::AuthError;

/// Failure to load a clients, users or snapshot file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A client registration failed validation.
    #[error("Invalid client registration: {0}")]
    InvalidClient(String),
}

impl From<LoadError> for AuthError {
    fn from(err: LoadError) -> Self {
        AuthError::storage(err.to_string())
    }
}

/// Reads and deserializes a JSON file.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
