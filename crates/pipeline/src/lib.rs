//! # Roomscan Pipeline
//!
//! Capture-to-publish pipeline for room scans.
//!
//! ## Modules
//!
//! - `capture`: capture runtime boundary, captured room data, replay runtime
//! - `export`: metadata document and binary model export, model catalog
//! - `transform`: per-group material treatments on exported models
//! - `publish`: multipart upload and response classification, session seam
//! - `handoff`: local export surface and preview ownership
//! - `tracker`: temporary file tracking and cleanup
//! - `controller`: session state machine tying the stages together
//! - `config`: TOML configuration
//!
//! ## Flow
//!
//! ```text
//! CaptureRuntime ──callbacks──▶ CaptureSessionController
//!                                      │ process_result
//!                                      ▼
//!             AssetExporter ──▶ SceneTransformer ──▶ HttpPublisher | LocalExportSink
//!                    └──────────── ResourceTracker ───────────┘
//! ```

pub mod capture;
pub mod config;
pub mod controller;
pub mod error;
pub mod export;
pub mod handoff;
pub mod publish;
pub mod tracker;
pub mod transform;

pub use capture::{CaptureConfig, CaptureRuntime, CapturedRoom, CapturedSpace, ReplayRuntime};
pub use config::{MaterialEntry, PipelineConfig, EXAMPLE_CONFIG};
pub use controller::{
    CaptureSessionController, Completion, ControllerHandle, Delivery, Failure, FailureKind, Pipeline, ProcessAck,
    ProcessRequest, SessionSnapshot, SessionState,
};
pub use error::{
    CaptureError, CatalogError, ConfigError, ControllerError, ExportError, HandoffError, ResourceError, TransformError,
};
pub use export::{AssetExporter, ExportedAsset, ModelCatalog, NoCatalog, ScanMetadata, StaticCatalog};
pub use handoff::{DirectoryExport, LocalExport, LocalExportSink, PreviewHandle};
pub use publish::{
    GeoPoint, HttpPublisher, PendingUpload, PublishOutcome, RequestTemplate, ScanPublisher, SessionProvider,
    StaticSession,
};
pub use tracker::{CleanupReport, ResourceTracker};
pub use transform::{MaterialGroup, MaterialPlan, SceneTransformer, TransformOutput, TransformReport, Treatment};

/// Convenient re-exports for embedding the controller.
pub mod prelude {
    pub use super::capture::{CaptureRuntime, ReplayRuntime};
    pub use super::config::PipelineConfig;
    pub use super::controller::{
        CaptureSessionController, ControllerHandle, Pipeline, ProcessAck, ProcessRequest, SessionState,
    };
    pub use super::publish::{StaticSession, PublishOutcome};
    pub use super::transform::{MaterialGroup, MaterialPlan, Treatment};
}
