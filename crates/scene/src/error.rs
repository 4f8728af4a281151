//! Error types for roomscan-scene
//!
//! ## Table of Contents
//! 1. SceneError - Codec and scene graph failures

use thiserror::Error;

/// Errors that can occur when reading or writing scene assets
#[derive(Error, Debug)]
pub enum SceneError {
    /// Scene file does not exist
    #[error("Scene file not found: {0}")]
    NotFound(String),

    /// IO error while reading or writing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a scene asset (bad magic, empty file)
    #[error("Invalid scene format: {0}")]
    InvalidFormat(String),

    /// Scene was written by an incompatible format revision
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    /// Payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Scene could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),
}

/// Result type for scene operations
pub type Result<T> = std::result::Result<T, SceneError>;
