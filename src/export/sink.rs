//! Export sinks: where an assembled artifact ends up

use super::ExportArtifact;
use crate::config::{ExportConfig, FileCollisionAction};
use crate::error::{Error, Result};
use crate::utils::get_unique_path;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Consumer of a finished export
#[async_trait]
pub trait Sink: Send + Sync {
    /// Persist or present the artifact
    async fn deliver(&self, artifact: ExportArtifact) -> Result<()>;
}

/// Writes the artifact to a file, the way a browser saves `data.txt`
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    collision: FileCollisionAction,
    written: Mutex<Vec<PathBuf>>,
}

impl FileSink {
    /// Sink writing to `path`
    pub fn new(path: impl Into<PathBuf>, collision: FileCollisionAction) -> Self {
        Self {
            path: path.into(),
            collision,
            written: Mutex::new(Vec::new()),
        }
    }

    /// Sink for the configured output directory and file name
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(
            config.output_dir.join(&config.file_name),
            config.file_collision,
        )
    }

    /// Requested target path (the written path may differ after a rename)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Paths written so far, in delivery order
    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.written
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn deliver(&self, artifact: ExportArtifact) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create export directory '{}': {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        let target = get_unique_path(&self.path, self.collision)?;
        let bytes = artifact.to_bytes()?;
        tokio::fs::write(&target, &bytes).await?;

        info!(
            task = %artifact.task_name,
            path = %target.display(),
            bytes = bytes.len(),
            "export written"
        );
        self.written
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(target);
        Ok(())
    }
}

/// Keeps delivered artifacts in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    artifacts: Mutex<Vec<ExportArtifact>>,
}

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifacts delivered so far
    pub fn artifacts(&self) -> Vec<ExportArtifact> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of deliveries
    pub fn deliveries(&self) -> usize {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn deliver(&self, artifact: ExportArtifact) -> Result<()> {
        self.artifacts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(artifact);
        Ok(())
    }
}
