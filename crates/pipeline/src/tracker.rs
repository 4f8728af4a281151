//! # Ephemeral Resource Tracker
//!
//! Records every temporary path created during a pipeline run and deletes
//! them when the run ends. Paths handed to a local export flow are released
//! first so the user keeps them.
//!
//! ## Table of Contents
//! 1. ResourceTracker - shared set of tracked paths
//! 2. CleanupReport - what a cleanup pass did

use crate::error::ResourceError;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Summary of one cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Paths deleted from disk
    pub removed: usize,
    /// Paths that were already gone
    pub missing: usize,
    /// Paths that could not be deleted (still tracked)
    pub failed: usize,
}

/// Temporary paths owned by one pipeline run
///
/// Clones share the same set, so exporter and transformer can track paths
/// from blocking tasks.
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    paths: Arc<Mutex<BTreeSet<PathBuf>>>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `path`; call before creating the file
    pub fn track(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!(path = %path.display(), "Tracking temporary path");
        self.paths.lock().insert(path);
    }

    /// Stop tracking `path` without deleting it. Returns false if it was not tracked.
    pub fn release(&self, path: &Path) -> bool {
        let released = self.paths.lock().remove(path);
        if released {
            debug!(path = %path.display(), "Released temporary path");
        }
        released
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.paths.lock().contains(path)
    }

    /// Snapshot of tracked paths, sorted
    pub fn tracked(&self) -> Vec<PathBuf> {
        self.paths.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.paths.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.lock().is_empty()
    }

    /// Delete every tracked path. Never fails; errors are logged and the
    /// path stays tracked for the next pass.
    pub fn cleanup(&self) -> CleanupReport {
        let paths: Vec<PathBuf> = std::mem::take(&mut *self.paths.lock()).into_iter().collect();
        let mut report = CleanupReport::default();
        let mut retained = Vec::new();

        for path in paths {
            match remove_path(&path) {
                Ok(true) => report.removed += 1,
                Ok(false) => report.missing += 1,
                Err(source) => {
                    let err = ResourceError { path: path.clone(), source };
                    warn!(error = %err, "Temporary file cleanup failed");
                    report.failed += 1;
                    retained.push(path);
                }
            }
        }

        if !retained.is_empty() {
            self.paths.lock().extend(retained);
        }

        debug!(removed = report.removed, missing = report.missing, failed = report.failed, "Cleanup finished");
        report
    }
}

/// Ok(true) if something was deleted, Ok(false) if nothing was there
fn remove_path(path: &Path) -> std::io::Result<bool> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
