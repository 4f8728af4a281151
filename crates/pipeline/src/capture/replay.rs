//! Replay capture runtime.
//!
//! Delivers a prerecorded [`CapturedRoom`] instead of driving sensors. Used
//! by the CLI and by tests that need to control callback timing.

use super::{Acceptance, CaptureCallbacks, CaptureConfig, CaptureRuntime, CapturedRoom, CapturedSpace};
use crate::error::CaptureError;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Capture runtime backed by recorded room data
#[derive(Default)]
pub struct ReplayRuntime {
    /// Room delivered as the final result on `run`, if any
    room: Option<CapturedRoom>,
    /// Intermediate errors reported before the final result
    frame_errors: Vec<CaptureError>,
    /// Error returned from `run` instead of starting
    start_failure: Option<CaptureError>,
    callbacks: Mutex<Option<Arc<dyn CaptureCallbacks>>>,
    last_space: Mutex<Option<CapturedSpace>>,
    runs: AtomicUsize,
    stops: AtomicUsize,
}

impl ReplayRuntime {
    /// Deliver `room` as soon as a session starts
    pub fn new(room: CapturedRoom) -> Self {
        Self {
            room: Some(room),
            ..Default::default()
        }
    }

    /// Never deliver on its own; drive callbacks with `deliver_*`
    pub fn manual() -> Self {
        Self::default()
    }

    /// Load a room recorded as JSON
    pub fn from_json_file(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let room: CapturedRoom = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self::new(room))
    }

    /// Report `error` as an intermediate result before the final one
    pub fn with_frame_error(mut self, error: CaptureError) -> Self {
        self.frame_errors.push(error);
        self
    }

    /// Make `run` fail
    pub fn with_start_failure(mut self, error: CaptureError) -> Self {
        self.start_failure = Some(error);
        self
    }

    /// Report an intermediate result to the active session
    pub fn deliver_intermediate(&self, error: Option<CaptureError>) -> Option<Acceptance> {
        let callbacks = self.callbacks.lock().clone()?;
        Some(callbacks.should_accept(error))
    }

    /// Report a final result to the active session
    pub fn deliver_final(&self, result: Result<CapturedSpace, CaptureError>) -> bool {
        let Some(callbacks) = self.callbacks.lock().clone() else {
            return false;
        };
        if let Ok(space) = &result {
            *self.last_space.lock() = Some(space.clone());
        }
        callbacks.on_final_result(result);
        true
    }

    /// Handle of the most recently delivered space
    pub fn last_space(&self) -> Option<CapturedSpace> {
        self.last_space.lock().clone()
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl CaptureRuntime for ReplayRuntime {
    fn run(&self, config: &CaptureConfig, callbacks: Arc<dyn CaptureCallbacks>) -> Result<(), CaptureError> {
        if let Some(error) = &self.start_failure {
            return Err(error.clone());
        }

        self.runs.fetch_add(1, Ordering::SeqCst);
        debug!(coaching = config.coaching, detect_objects = config.detect_objects, "Replay capture started");
        *self.callbacks.lock() = Some(callbacks);

        for error in &self.frame_errors {
            self.deliver_intermediate(Some(error.clone()));
        }

        if let Some(room) = &self.room {
            self.deliver_intermediate(None);
            self.deliver_final(Ok(CapturedSpace::new(room.clone())));
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.callbacks.lock().take();
    }
}
