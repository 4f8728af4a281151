//! # Capture Runtime Boundary
//!
//! The sensor/AR capture runtime is external. It is started with
//! [`CaptureRuntime::run`], stopped with [`CaptureRuntime::stop`], and calls
//! back into two capability interfaces while it runs:
//!
//! - [`IntermediateResultHandler`]: "may I accept this intermediate result"
//! - [`FinalResultHandler`]: "final result ready"
//!
//! ## Table of Contents
//! 1. CaptureConfig / Acceptance
//! 2. Callback traits
//! 3. CaptureRuntime trait

pub mod replay;
pub mod space;

pub use replay::ReplayRuntime;
pub use space::{
    CapturedRoom, CapturedSpace, Confidence, DetectedObject, ObjectCategory, Surface, SurfaceCategory,
};

use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Options passed to the runtime when a session starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Show on-screen coaching while scanning
    #[serde(default = "default_true")]
    pub coaching: bool,
    /// Detect furniture and fixtures
    #[serde(default = "default_true")]
    pub detect_objects: bool,
}

fn default_true() -> bool { true }

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            coaching: true,
            detect_objects: true,
        }
    }
}

/// Answer to an intermediate result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accept,
    Reject,
}

/// Called for every intermediate result the runtime wants to present
pub trait IntermediateResultHandler: Send + Sync {
    fn should_accept(&self, error: Option<CaptureError>) -> Acceptance;
}

/// Called once the runtime has a final result (or gave up)
pub trait FinalResultHandler: Send + Sync {
    fn on_final_result(&self, result: Result<CapturedSpace, CaptureError>);
}

/// Both callback interfaces, as handed to the runtime
pub trait CaptureCallbacks: IntermediateResultHandler + FinalResultHandler {}

impl<T: IntermediateResultHandler + FinalResultHandler> CaptureCallbacks for T {}

/// External capture runtime
pub trait CaptureRuntime: Send + Sync {
    /// Start capturing; callbacks may fire from any thread until `stop`
    fn run(&self, config: &CaptureConfig, callbacks: Arc<dyn CaptureCallbacks>) -> Result<(), CaptureError>;

    /// Stop capturing. Safe to call when not running.
    fn stop(&self);
}
