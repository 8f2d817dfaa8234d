//! Request-scoped local scratch space
//!
//! Every request gets its own temporary directory under the configured
//! scratch root. Dropping the [`ScratchSpace`] removes the directory and
//! everything staged in it, so early returns and cancelled fetches cannot
//! leak files into a long-lived worker.

use crate::Result;

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Temporary directory owned by one request
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a fresh scratch directory under `root`
    pub fn create_in(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix("lcstitch-")
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Created scratch space");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for a staged file; `name` is reduced to a safe single segment
    pub fn stage_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(sanitize_file_name(name))
    }

    /// Write `bytes` to a staged file
    pub async fn stage_bytes(&self, name: &str, bytes: &[u8]) -> Result<StagedFile> {
        let staged = StagedFile::new(self.stage_path(name));
        tokio::fs::write(staged.path(), bytes).await?;
        Ok(staged)
    }

    /// Remove the scratch directory, reporting failures instead of
    /// swallowing them as drop does
    pub fn close(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}

/// A file in scratch space that is deleted when discarded or dropped
#[derive(Debug)]
pub struct StagedFile {
    path: Option<PathBuf>,
}

impl StagedFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Read the staged contents
    pub async fn read(&self) -> std::io::Result<Bytes> {
        tokio::fs::read(self.path()).await.map(Bytes::from)
    }

    /// Delete the staged file now
    pub async fn discard(mut self) -> std::io::Result<()> {
        if let Some(path) = self.path.take() {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove staged file");
                }
            }
        }
    }
}

fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "staged".to_string()
    } else {
        cleaned
    }
}
