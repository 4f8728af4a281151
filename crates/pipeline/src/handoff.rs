//! # Local Export Handoff
//!
//! When publishing is skipped the final metadata and model files are handed
//! to a local export surface instead. Paths handed off successfully are
//! released from the run's tracker so cleanup keeps them.
//!
//! ## Table of Contents
//! 1. LocalExport / LocalExportSink
//! 2. DirectoryExport - move files into a directory
//! 3. PreviewHandle - transient model owned by whoever presents it

use crate::error::HandoffError;
use crate::tracker::{CleanupReport, ResourceTracker};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ============================================================================
// Sink
// ============================================================================

/// Files produced by a run that skipped publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalExport {
    pub metadata_path: PathBuf,
    pub model_path: PathBuf,
}

/// Share / export surface for finished runs
#[async_trait]
pub trait LocalExportSink: Send + Sync {
    /// Take ownership of the files. Returns where they ended up.
    async fn hand_off(&self, export: &LocalExport) -> Result<LocalExport, HandoffError>;
}

// ============================================================================
// DirectoryExport
// ============================================================================

/// Moves exported files into a destination directory
#[derive(Debug, Clone)]
pub struct DirectoryExport {
    dir: PathBuf,
}

impl DirectoryExport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn move_into(&self, source: &Path) -> Result<PathBuf, HandoffError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| HandoffError::Unavailable(format!("{} has no file name", source.display())))?;
        let destination = self.dir.join(file_name);
        move_file(source, &destination).await?;
        debug!(from = %source.display(), to = %destination.display(), "Moved exported file");
        Ok(destination)
    }
}

async fn move_file(source: &Path, destination: &Path) -> std::io::Result<()> {
    // rename fails across filesystems; fall back to copy + remove
    if tokio::fs::rename(source, destination).await.is_err() {
        tokio::fs::copy(source, destination).await?;
        tokio::fs::remove_file(source).await?;
    }
    Ok(())
}

#[async_trait]
impl LocalExportSink for DirectoryExport {
    async fn hand_off(&self, export: &LocalExport) -> Result<LocalExport, HandoffError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| HandoffError::Unavailable(format!("{}: {}", self.dir.display(), e)))?;

        let metadata_path = self.move_into(&export.metadata_path).await?;
        let model_path = match self.move_into(&export.model_path).await {
            Ok(path) => path,
            Err(e) => {
                // Put the metadata back where the run's tracker expects it
                if let Err(rollback) = move_file(&metadata_path, &export.metadata_path).await {
                    warn!(path = %metadata_path.display(), error = %rollback, "Failed to restore metadata, removing it");
                    let _ = tokio::fs::remove_file(&metadata_path).await;
                }
                return Err(e);
            }
        };

        info!(dir = %self.dir.display(), "Scan exported locally");
        Ok(LocalExport {
            metadata_path,
            model_path,
        })
    }
}

// ============================================================================
// PreviewHandle
// ============================================================================

/// A model file kept alive while it is being presented.
///
/// The presenter owns the handle and calls [`PreviewHandle::dismiss`] when the
/// presentation ends; dropping the handle has the same effect.
#[derive(Debug)]
pub struct PreviewHandle {
    path: PathBuf,
    tracker: ResourceTracker,
}

impl PreviewHandle {
    /// Take `path` over from a run tracker so the run's cleanup leaves it alone
    pub fn adopt(path: impl Into<PathBuf>, run_tracker: &ResourceTracker) -> Self {
        let path = path.into();
        run_tracker.release(&path);
        let tracker = ResourceTracker::new();
        tracker.track(&path);
        Self { path, tracker }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// End the presentation and delete the file
    pub fn dismiss(self) -> CleanupReport {
        self.tracker.cleanup()
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        if !self.tracker.is_empty() {
            self.tracker.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(dir: &Path) -> LocalExport {
        let metadata_path = dir.join("metadata-1.json");
        let model_path = dir.join("model-1-styled.bin");
        std::fs::write(&metadata_path, b"{}").unwrap();
        std::fs::write(&model_path, b"RSCN").unwrap();
        LocalExport { metadata_path, model_path }
    }

    #[tokio::test]
    async fn test_directory_export_moves_files() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let export = files(work.path());

        let sink = DirectoryExport::new(out.path().join("scans"));
        let exported = sink.hand_off(&export).await.unwrap();

        assert_eq!(exported.metadata_path, out.path().join("scans/metadata-1.json"));
        assert!(exported.metadata_path.exists());
        assert!(exported.model_path.exists());
        assert!(!export.metadata_path.exists());
        assert!(!export.model_path.exists());
    }

    #[tokio::test]
    async fn test_directory_export_missing_source() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let export = LocalExport {
            metadata_path: work.path().join("missing.json"),
            model_path: work.path().join("missing.bin"),
        };
        let err = DirectoryExport::new(out.path()).hand_off(&export).await.unwrap_err();
        assert!(matches!(err, HandoffError::Io(_)));
    }

    #[tokio::test]
    async fn test_failed_model_move_restores_metadata() {
        let work = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let export = files(work.path());
        std::fs::remove_file(&export.model_path).unwrap();

        let tracker = ResourceTracker::new();
        tracker.track(&export.metadata_path);
        tracker.track(&export.model_path);

        let err = DirectoryExport::new(out.path()).hand_off(&export).await.unwrap_err();
        assert!(matches!(err, HandoffError::Io(_)));
        assert!(export.metadata_path.exists());
        assert!(!out.path().join("metadata-1.json").exists());

        tracker.cleanup();
        assert!(!export.metadata_path.exists());
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_preview_outlives_run_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.bin");
        std::fs::write(&path, b"RSCN").unwrap();

        let run = ResourceTracker::new();
        run.track(&path);
        let preview = PreviewHandle::adopt(&path, &run);
        run.cleanup();
        assert!(preview.path().exists());

        assert_eq!(preview.dismiss().removed, 1);
        assert!(!path.exists());
    }

    #[test]
    fn test_preview_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.bin");
        std::fs::write(&path, b"RSCN").unwrap();

        drop(PreviewHandle::adopt(&path, &ResourceTracker::new()));
        assert!(!path.exists());
    }
}
