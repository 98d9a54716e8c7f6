use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

use crate::config::StorageConfig;
use crate::error::Result;
use crate::job::JobId;

/// Reference to a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    /// Generated object name
    pub name: String,
    /// Public retrieval reference (URL or local path)
    pub location: String,
}

/// Destination for finished videos.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn store(&self, name: &str, bytes: &[u8]) -> Result<ArtifactRef>;
}

/// Unique object name for a job's output video.
pub fn artifact_name(job_id: &JobId) -> String {
    format!(
        "translated-{}-{}.mp4",
        chrono::Utc::now().timestamp_millis(),
        job_id.short()
    )
}

/// Stores artifacts in a local directory, optionally published under a base URL.
pub struct LocalArtifactStore {
    dir: PathBuf,
    public_base_url: Option<String>,
}

impl LocalArtifactStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            dir: config.output_dir,
            public_base_url: config.public_base_url,
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn store(&self, name: &str, bytes: &[u8]) -> Result<ArtifactRef> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        fs::write(&path, bytes).await?;

        let location = match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), name),
            None => path.display().to_string(),
        };

        info!("Stored {} ({} bytes) at {}", name, bytes.len(), location);
        Ok(ArtifactRef {
            name: name.to_string(),
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn test_artifact_names_are_unique_per_job() {
        let a = artifact_name(&JobId::new());
        let b = artifact_name(&JobId::new());
        assert!(a.starts_with("translated-"));
        assert!(a.ends_with(".mp4"));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_local_store_writes_file() {
        let temp = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(StorageConfig {
            output_dir: temp.path().join("out"),
            public_base_url: None,
        });

        let artifact = store.store("video.mp4", b"data").await.unwrap();
        assert_eq!(artifact.name, "video.mp4");
        let written = std::fs::read(temp.path().join("out").join("video.mp4")).unwrap();
        assert_eq!(written, b"data");
    }

    #[tokio::test]
    async fn test_local_store_uses_public_url() {
        let temp = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(StorageConfig {
            output_dir: temp.path().to_path_buf(),
            public_base_url: Some("https://cdn.example.com/videos/".to_string()),
        });

        let artifact = store.store("video.mp4", b"data").await.unwrap();
        assert_eq!(artifact.location, "https://cdn.example.com/videos/video.mp4");
    }
}
