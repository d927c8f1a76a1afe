mod error;

pub use error::StoreError;

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use docimport_core::ServiceRecord;

use error::tmp_filename;

/// Filesystem-backed service records.
///
/// ```text
/// services/
///   Example.json      <- one pretty-printed record per service
///   Google.json
/// ```
pub struct ServiceFiles {
    dir: PathBuf,
}

impl ServiceFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Read every `*.json` record, keyed by file name.
    ///
    /// Creates the directory when it does not exist yet. A file that cannot
    /// be parsed is an error: importing on top of an unreadable record would
    /// overwrite it.
    pub async fn load_all(&self) -> Result<Vec<(String, ServiceRecord)>, StoreError> {
        if !fs::try_exists(&self.dir).await? {
            warn!(path = %self.dir.display(), "services directory missing, creating it");
            fs::create_dir_all(&self.dir).await?;
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();

        let mut records = Vec::with_capacity(names.len());
        for name in names {
            let path = self.dir.join(&name);
            let json = fs::read_to_string(&path).await?;
            let record = serde_json::from_str(&json)
                .map_err(|source| StoreError::Json { path, source })?;
            records.push((name, record));
        }
        debug!(count = records.len(), path = %self.dir.display(), "loaded service records");
        Ok(records)
    }

    /// Replace the whole file for `file_name` with `record`.
    ///
    /// Written to a dot-prefixed temporary file first, then renamed, so a
    /// reader never observes a half-written record.
    pub async fn write(&self, file_name: &str, record: &ServiceRecord) -> Result<PathBuf, StoreError> {
        let final_path = self.path_for(file_name);
        let tmp_path = self.dir.join(tmp_filename(file_name));

        let mut json = serde_json::to_string_pretty(record)?;
        json.push('\n');

        fs::create_dir_all(&self.dir).await?;
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &final_path).await?;
        Ok(final_path)
    }
}
