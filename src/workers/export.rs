//! Persisting recorded artifacts

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::recorder::blob::RecordedBlob;
use crate::utils::error::{RecorderError, RecorderResult};

pub trait BlobExportSink: Send + Sync {
    /// Store `blob` under `file_name` and return where it ended up
    fn save(&self, blob: &RecordedBlob, file_name: &str) -> RecorderResult<PathBuf>;
}

/// Writes artifacts as files inside one directory
#[derive(Debug, Clone)]
pub struct FileExportSink {
    dir: PathBuf,
}

impl FileExportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for FileExportSink {
    fn default() -> Self {
        Self::new(".")
    }
}

impl BlobExportSink for FileExportSink {
    fn save(&self, blob: &RecordedBlob, file_name: &str) -> RecorderResult<PathBuf> {
        // only the final component is used, the sink never writes outside its dir
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| RecorderError::InvalidArgument(format!("bad file name: {:?}", file_name)))?;

        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        fs::write(&path, &blob.data)?;

        info!(
            "Saved {} bytes ({}, {} chunks) to {}",
            blob.size(),
            blob.mime_type,
            blob.chunk_count,
            path.display()
        );
        Ok(path)
    }
}
