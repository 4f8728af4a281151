//! Session states and snapshots published by the controller.

use crate::error::{CaptureError, ExportError, HandoffError, TransformError};
use crate::handoff::LocalExport;
use crate::publish::PublishOutcome;
use std::fmt;

/// How a run finished successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Upload accepted by the scan service
    Published,
    /// Files handed to the local export surface, at their final location
    Exported(LocalExport),
}

/// What went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Capture runtime gave up
    Capture,
    Export,
    Transform,
    /// Reading exported files for upload
    Io,
    Handoff,
    Validation,
    Network,
    Server { code: u16 },
    /// Needs the upgrade flow before retrying
    SubscriptionRequired,
    /// Needs a new session before retrying
    AuthInvalid,
    /// Pipeline task panicked or was cancelled
    Internal,
}

/// Terminal failure of a run or session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    /// User-facing description
    pub message: String,
    /// `process_result` may be called again as is
    pub retryable: bool,
}

impl Failure {
    fn retryable(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), retryable: true }
    }

    fn fatal(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), retryable: false }
    }

    pub fn capture(error: &CaptureError) -> Self {
        Self::fatal(FailureKind::Capture, error.to_string())
    }

    pub fn export(error: &ExportError) -> Self {
        Self::retryable(FailureKind::Export, error.to_string())
    }

    pub fn transform(error: &TransformError) -> Self {
        Self::retryable(FailureKind::Transform, error.to_string())
    }

    pub fn io(error: &std::io::Error) -> Self {
        Self::retryable(FailureKind::Io, format!("Failed to read exported files: {}", error))
    }

    pub fn handoff(error: &HandoffError) -> Self {
        Self::retryable(FailureKind::Handoff, error.to_string())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::retryable(FailureKind::Internal, message)
    }

    pub fn auth_invalid() -> Self {
        Self::fatal(FailureKind::AuthInvalid, PublishOutcome::AuthInvalid.to_string())
    }

    /// `None` for `Success`
    pub fn from_outcome(outcome: &PublishOutcome) -> Option<Self> {
        let message = outcome.to_string();
        let failure = match outcome {
            PublishOutcome::Success => return None,
            PublishOutcome::SubscriptionRequired => Self::fatal(FailureKind::SubscriptionRequired, message),
            PublishOutcome::AuthInvalid => Self::fatal(FailureKind::AuthInvalid, message),
            PublishOutcome::Validation(_) => Self::retryable(FailureKind::Validation, message),
            PublishOutcome::Network(_) => Self::retryable(FailureKind::Network, message),
            PublishOutcome::ServerError { code, .. } => Self::retryable(FailureKind::Server { code: *code }, message),
        };
        Some(failure)
    }

    /// The caller should present the upgrade flow
    pub fn needs_subscription(&self) -> bool {
        self.kind == FailureKind::SubscriptionRequired
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Controller state machine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Scanning,
    /// A captured space is ready to process
    AwaitingAction,
    Processing,
    Completed(Completion),
    Failed(Failure),
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Scanning => "Scanning",
            SessionState::AwaitingAction => "AwaitingAction",
            SessionState::Processing => "Processing",
            SessionState::Completed(_) => "Completed",
            SessionState::Failed(_) => "Failed",
        }
    }

    /// Completed or failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed(_) | SessionState::Failed(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            SessionState::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Observable controller state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    /// A captured space is held for processing
    pub has_captured_space: bool,
    /// Dismissible message from the capture runtime
    pub notice: Option<String>,
    /// Pipeline runs started over the controller's lifetime
    pub runs_started: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(Failure::from_outcome(&PublishOutcome::Success), None);

        let upgrade = Failure::from_outcome(&PublishOutcome::SubscriptionRequired).unwrap();
        assert!(!upgrade.retryable);
        assert!(upgrade.needs_subscription());

        let auth = Failure::from_outcome(&PublishOutcome::AuthInvalid).unwrap();
        assert_eq!(auth, Failure::auth_invalid());

        let server = Failure::from_outcome(&PublishOutcome::ServerError { code: 503, message: "busy".into() }).unwrap();
        assert!(server.retryable);
        assert_eq!(server.kind, FailureKind::Server { code: 503 });
        assert_eq!(server.message, "Server error (503): busy");

        assert!(Failure::from_outcome(&PublishOutcome::Network("timed out".into())).unwrap().retryable);
        assert!(Failure::from_outcome(&PublishOutcome::Validation("bad".into())).unwrap().retryable);
    }

    #[test]
    fn test_stage_failures_are_retryable() {
        assert!(Failure::export(&ExportError::SourceUnavailable).retryable);
        assert!(Failure::transform(&TransformError::TaskFailed("panic".into())).retryable);
        assert!(!Failure::capture(&CaptureError::Interrupted).retryable);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(SessionState::default().to_string(), "Idle");
        assert!(SessionState::Failed(Failure::internal("x")).is_terminal());
        assert!(!SessionState::Processing.is_terminal());
    }
}
