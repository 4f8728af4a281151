//! Error types for roomscan-pipeline
//!
//! ## Table of Contents
//! 1. CaptureError - capture runtime / session level
//! 2. ExportError / CatalogError - AssetExporter and its model catalog
//! 3. TransformError - SceneTransformer
//! 4. ResourceError - temporary file cleanup (logged, never propagated)
//! 5. HandoffError - local export surface
//! 6. ConfigError - pipeline configuration
//! 7. ControllerError - CaptureSessionController commands
//!
//! Publish results are not errors; see [`crate::publish::PublishOutcome`].

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Capture
// ============================================================================

/// Errors reported by the capture runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Device cannot capture spaces
    #[error("Capture is not supported on this device")]
    Unsupported,

    /// A single frame could not be processed; scanning continues
    #[error("Frame rejected: {0}")]
    Frame(String),

    /// Tracking was lost or the environment is unsuitable; scanning continues
    #[error("Tracking degraded: {0}")]
    Tracking(String),

    /// The session was interrupted by the system
    #[error("Capture session interrupted")]
    Interrupted,

    /// The runtime failed to start or crashed
    #[error("Capture runtime failed: {0}")]
    Runtime(String),
}

impl CaptureError {
    /// Transient errors only surface a dismissible notice
    pub fn is_transient(&self) -> bool {
        matches!(self, CaptureError::Frame(_) | CaptureError::Tracking(_))
    }
}

// ============================================================================
// Export
// ============================================================================

/// Errors from the asset exporter
#[derive(Error, Debug)]
pub enum ExportError {
    /// Captured space handle is stale or invalid
    #[error("Captured space is no longer available")]
    SourceUnavailable,

    /// Metadata document could not be encoded
    #[error("Failed to encode scan metadata: {0}")]
    SerializationFailed(String),

    /// Metadata document could not be written
    #[error("Failed to write scan metadata to {path}: {source}")]
    MetadataWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Binary model could not be written (disk full, permissions)
    #[error("Failed to write model to {path}: {reason}")]
    ModelWriteFailed { path: PathBuf, reason: String },

    /// Export task panicked or was cancelled
    #[error("Export task failed: {0}")]
    TaskFailed(String),
}

/// Errors from the reference model catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog cannot be used at all; export continues without substitution
    #[error("Model catalog unavailable: {0}")]
    Unavailable(String),

    /// One reference model could not be loaded
    #[error("Failed to load reference model for {category}: {reason}")]
    Load { category: String, reason: String },
}

// ============================================================================
// Transform
// ============================================================================

/// Errors from the scene transformer
#[derive(Error, Debug)]
pub enum TransformError {
    /// Source asset is malformed or unreadable
    #[error("Failed to load scene {path}: {reason}")]
    LoadFailed { path: PathBuf, reason: String },

    /// Texture image for a group could not be read
    #[error("Texture for group '{group}' unavailable ({path}): {reason}")]
    TextureUnavailable {
        group: String,
        path: PathBuf,
        reason: String,
    },

    /// Treatment parameters are unusable (non-positive repeat factor)
    #[error("Invalid treatment for group '{group}': {reason}")]
    InvalidTreatment { group: String, reason: String },

    /// Modified scene could not be written
    #[error("Failed to write transformed scene to {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    /// Transform task panicked or was cancelled
    #[error("Transform task failed: {0}")]
    TaskFailed(String),
}

// ============================================================================
// Resources
// ============================================================================

/// Cleanup failure for a tracked temporary path
#[derive(Error, Debug)]
#[error("Failed to remove temporary path {path}: {source}")]
pub struct ResourceError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

// ============================================================================
// Local export
// ============================================================================

/// Errors from the local export / share surface
#[derive(Error, Debug)]
pub enum HandoffError {
    /// Destination refused the files
    #[error("Export destination unavailable: {0}")]
    Unavailable(String),

    #[error("IO error during export: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Config
// ============================================================================

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A material entry is inconsistent
    #[error("Invalid material entry '{group}': {reason}")]
    Material { group: String, reason: String },

    /// A setting is out of range
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// HTTP client could not be built (TLS backend, invalid timeout)
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(String),
}

// ============================================================================
// Controller
// ============================================================================

/// Errors returned by controller commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Command is not valid in the current state
    #[error("Cannot {action} while {state}")]
    InvalidState { action: &'static str, state: String },

    /// Request was rejected before starting a run
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Capture runtime refused to start
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Controller task has stopped
    #[error("Capture session controller has shut down")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_capture_errors() {
        assert!(CaptureError::Frame("blurred".into()).is_transient());
        assert!(CaptureError::Tracking("low light".into()).is_transient());
        assert!(!CaptureError::Interrupted.is_transient());
        assert!(!CaptureError::Unsupported.is_transient());
    }

    #[test]
    fn test_controller_error_message() {
        let err = ControllerError::InvalidState { action: "process result", state: "Scanning".into() };
        assert_eq!(err.to_string(), "Cannot process result while Scanning");
    }
}
