//! The codec engine's private file namespace.
//!
//! Every codec call writes its inputs and outputs into a [`ScopedFiles`]
//! guard. File names carry the caller's scope (the job id) and a per-call
//! id, and the guard removes everything it registered when dropped, so no
//! entry outlives the call that created it.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, RevoiceError};

/// Directory backing the engine's virtual filesystem.
pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    pub fn create(parent: Option<&Path>) -> Result<Self> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("revoice-codec-");
            builder
        };
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| RevoiceError::EngineUnavailable(format!("Failed to create codec scratch space: {}", e)))?;

        debug!("Codec scratch space at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open a namespace for one codec call.
    pub fn scope(&self, scope: &str) -> ScopedFiles {
        ScopedFiles {
            root: self.dir.path().to_path_buf(),
            prefix: format!("{}-{}", sanitize(scope), Uuid::new_v4().simple()),
            created: Vec::new(),
        }
    }

    /// Names of all files currently present.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.dir.path())? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        Ok(names)
    }
}

fn sanitize(scope: &str) -> String {
    let cleaned: String = scope
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "call".to_string()
    } else {
        cleaned
    }
}

/// Files belonging to one codec call; removed on drop.
pub struct ScopedFiles {
    root: PathBuf,
    prefix: String,
    created: Vec<PathBuf>,
}

impl ScopedFiles {
    /// Reserve a path for `name` without writing it (e.g. an output file).
    pub fn reserve(&mut self, name: &str) -> PathBuf {
        let path = self.root.join(format!("{}-{}", self.prefix, name));
        self.created.push(path.clone());
        path
    }

    pub async fn write(&mut self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.reserve(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| {
            RevoiceError::CodecExecution(format!("Codec produced no output at {}: {}", path.display(), e))
        })
    }
}

impl Drop for ScopedFiles {
    fn drop(&mut self) {
        for path in self.created.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
            }
        }
    }
}
