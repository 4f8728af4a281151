//! One pipeline run: export, transform, then publish or hand off.
//!
//! Stages are awaited in order and the first failure ends the run. The run's
//! [`ResourceTracker`] is cleaned by the caller once the run has finished,
//! whether it succeeded, failed or panicked.

use super::state::{Completion, Failure};
use crate::capture::CapturedSpace;
use crate::config::PipelineConfig;
use crate::error::ConfigError;
use crate::export::{AssetExporter, ModelCatalog, NoCatalog, StaticCatalog};
use crate::handoff::{LocalExport, LocalExportSink};
use crate::publish::{GeoPoint, HttpPublisher, PendingUpload, RequestTemplate, ScanPublisher, SessionProvider};
use crate::tracker::ResourceTracker;
use crate::transform::{MaterialPlan, SceneTransformer};
use roomscan_scene::{BinarySceneCodec, SceneCodec};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Where a finished run goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Upload to the scan service
    #[default]
    Publish,
    /// Hand files to the local export surface
    LocalExport,
}

/// Arguments of `process_result`
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRequest {
    /// Scan title, must not be blank
    pub name: String,
    pub location: Option<GeoPoint>,
    pub delivery: Delivery,
}

impl ProcessRequest {
    pub fn publish(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
            delivery: Delivery::Publish,
        }
    }

    pub fn local_export(name: impl Into<String>) -> Self {
        Self {
            delivery: Delivery::LocalExport,
            ..Self::publish(name)
        }
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.location = Some(GeoPoint { latitude, longitude });
        self
    }
}

/// Resolved delivery target of one run
pub(crate) enum Target {
    Publish(RequestTemplate),
    Local(Arc<dyn LocalExportSink>),
}

/// Collaborators shared by every run of a controller
#[derive(Clone)]
pub struct Pipeline {
    pub(crate) exporter: AssetExporter,
    pub(crate) transformer: SceneTransformer,
    pub(crate) publisher: Arc<dyn ScanPublisher>,
    pub(crate) session: Arc<dyn SessionProvider>,
    pub(crate) local_sink: Option<Arc<dyn LocalExportSink>>,
    pub(crate) plan: MaterialPlan,
    pub(crate) work_dir: PathBuf,
    pub(crate) upload_path: String,
}

impl Pipeline {
    pub fn new(
        exporter: AssetExporter,
        transformer: SceneTransformer,
        publisher: Arc<dyn ScanPublisher>,
        session: Arc<dyn SessionProvider>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            exporter,
            transformer,
            publisher,
            session,
            local_sink: None,
            plan: MaterialPlan::new(),
            work_dir: work_dir.into(),
            upload_path: "/api/scans".to_string(),
        }
    }

    /// Binary codec, catalog from `catalog_dir`, HTTP publisher and the
    /// configured material plan
    pub fn from_config(config: &PipelineConfig, session: Arc<dyn SessionProvider>) -> Result<Self, ConfigError> {
        config.validate()?;
        let codec: Arc<dyn SceneCodec> = Arc::new(BinarySceneCodec::new());
        let catalog: Arc<dyn ModelCatalog> = match &config.catalog_dir {
            Some(dir) => Arc::new(StaticCatalog::new(dir, codec.clone())),
            None => Arc::new(NoCatalog),
        };
        let publisher = HttpPublisher::new(config.request_timeout())?;

        Ok(Self::new(
            AssetExporter::new(codec.clone(), catalog),
            SceneTransformer::new(codec),
            Arc::new(publisher),
            session,
            &config.work_dir,
        )
        .with_plan(config.material_plan()?)
        .with_upload_path(&config.upload_path))
    }

    pub fn with_plan(mut self, plan: MaterialPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_local_sink(mut self, sink: Arc<dyn LocalExportSink>) -> Self {
        self.local_sink = Some(sink);
        self
    }

    pub fn with_upload_path(mut self, path: impl Into<String>) -> Self {
        self.upload_path = path.into();
        self
    }

    /// Run every stage for `space`. Temporary paths go to `tracker`.
    pub(crate) async fn execute(
        &self,
        run_id: Uuid,
        space: CapturedSpace,
        request: ProcessRequest,
        target: Target,
        tracker: ResourceTracker,
    ) -> Result<Completion, Failure> {
        let exported = self
            .exporter
            .export(&space, &self.work_dir, run_id, &tracker)
            .await
            .map_err(|e| Failure::export(&e))?;

        let transformed = self
            .transformer
            .transform(&exported.model_path, &self.plan, &tracker)
            .await
            .map_err(|e| Failure::transform(&e))?;
        debug!(%run_id, modified = transformed.report.total(), "Transform stage finished");

        match target {
            Target::Publish(template) => {
                let upload = PendingUpload::from_files(
                    request.name,
                    request.location,
                    &exported.metadata_path,
                    &transformed.path,
                )
                .await
                .map_err(|e| Failure::io(&e))?;

                let outcome = self.publisher.publish(upload, template).await;
                match Failure::from_outcome(&outcome) {
                    Some(failure) => Err(failure),
                    None => {
                        info!(%run_id, "Scan published");
                        Ok(Completion::Published)
                    }
                }
            }
            Target::Local(sink) => {
                let export = LocalExport {
                    metadata_path: exported.metadata_path,
                    model_path: transformed.path,
                };
                let delivered = sink.hand_off(&export).await.map_err(|e| Failure::handoff(&e))?;
                tracker.release(&export.metadata_path);
                tracker.release(&export.model_path);
                info!(%run_id, model = %delivered.model_path.display(), "Scan handed off");
                Ok(Completion::Exported(delivered))
            }
        }
    }
}
