use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by [`ServiceFiles`](super::ServiceFiles) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid service file {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Temporary sibling used while rewriting `file_name`.
pub(super) fn tmp_filename(file_name: &str) -> String {
    format!(".{}.tmp", file_name)
}
