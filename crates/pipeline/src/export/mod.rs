//! # Asset Exporter
//!
//! Turns a [`CapturedSpace`] into a metadata document and a binary model
//! file in the run's work directory.
//!
//! ## Table of Contents
//! 1. ExportedAsset - what one export produced
//! 2. AssetExporter - async entry point (runs on the blocking pool)
//! 3. build_scene - captured room to scene graph
//!
//! ## Model layout
//!
//! ```text
//! Scene
//! ├── Architecture_grp
//! │   ├── Wall_grp     Wall0, Wall1, ...
//! │   ├── Floor_grp    Floor0, ...
//! │   ├── Door_grp     Door0, ...
//! │   ├── Window_grp   Window0, ...
//! │   └── Opening_grp  Opening0, ...
//! └── Object_grp       Table0, Bed0, ... (boxes or catalog references)
//! ```

pub mod catalog;
pub mod metadata;

pub use catalog::{ModelCatalog, NoCatalog, StaticCatalog};
pub use metadata::{GeometrySummary, ObjectRecord, ScanMetadata, SurfaceRecord, METADATA_VERSION};

use crate::capture::{CapturedRoom, CapturedSpace, SurfaceCategory};
use crate::error::{CatalogError, ExportError};
use crate::tracker::ResourceTracker;
use roomscan_scene::{Geometry, Material, Rgba, SceneAsset, SceneCodec, SceneNode};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Root node of exported scenes
pub const SCENE_ROOT: &str = "Scene";
/// Parent of all architectural groups
pub const ARCHITECTURE_GROUP: &str = "Architecture_grp";
/// Parent of all furniture and fixtures
pub const OBJECT_GROUP: &str = "Object_grp";

const WALL_COLOR: Rgba = [0.92, 0.91, 0.89, 1.0];
const FLOOR_COLOR: Rgba = [0.55, 0.5, 0.45, 1.0];
const OPENING_COLOR: Rgba = [0.4, 0.6, 0.8, 1.0];
const OBJECT_COLOR: Rgba = [0.7, 0.7, 0.7, 1.0];

/// Group node name for a surface category
pub fn surface_group(category: SurfaceCategory) -> &'static str {
    match category {
        SurfaceCategory::Wall => "Wall_grp",
        SurfaceCategory::Floor => "Floor_grp",
        SurfaceCategory::Door => "Door_grp",
        SurfaceCategory::Window => "Window_grp",
        SurfaceCategory::Opening => "Opening_grp",
    }
}

// ============================================================================
// ExportedAsset
// ============================================================================

/// Files produced by one export
#[derive(Debug, Clone)]
pub struct ExportedAsset {
    pub metadata: ScanMetadata,
    pub metadata_path: PathBuf,
    pub model_path: PathBuf,
    /// Objects replaced by catalog reference models
    pub substituted: usize,
}

// ============================================================================
// AssetExporter
// ============================================================================

/// Writes metadata and model files for a captured space
#[derive(Clone)]
pub struct AssetExporter {
    codec: Arc<dyn SceneCodec>,
    catalog: Arc<dyn ModelCatalog>,
}

impl AssetExporter {
    pub fn new(codec: Arc<dyn SceneCodec>, catalog: Arc<dyn ModelCatalog>) -> Self {
        Self { codec, catalog }
    }

    /// Export `space` into `work_dir` with `run_id`-qualified file names.
    ///
    /// Both paths are tracked before they are written. Nothing is deleted on
    /// failure; the caller cleans up through `tracker`.
    pub async fn export(
        &self,
        space: &CapturedSpace,
        work_dir: &Path,
        run_id: Uuid,
        tracker: &ResourceTracker,
    ) -> Result<ExportedAsset, ExportError> {
        let exporter = self.clone();
        let space = space.clone();
        let work_dir = work_dir.to_path_buf();
        let tracker = tracker.clone();

        tokio::task::spawn_blocking(move || exporter.export_blocking(&space, &work_dir, run_id, &tracker))
            .await
            .map_err(|e| ExportError::TaskFailed(e.to_string()))?
    }

    fn export_blocking(
        &self,
        space: &CapturedSpace,
        work_dir: &Path,
        run_id: Uuid,
        tracker: &ResourceTracker,
    ) -> Result<ExportedAsset, ExportError> {
        if !space.is_available() {
            return Err(ExportError::SourceUnavailable);
        }
        let room = space.room();

        let metadata = ScanMetadata::from_room(room);
        let metadata_bytes = metadata
            .to_json()
            .map_err(|e| ExportError::SerializationFailed(e.to_string()))?;

        std::fs::create_dir_all(work_dir).map_err(|source| ExportError::MetadataWriteFailed {
            path: work_dir.to_path_buf(),
            source,
        })?;

        let metadata_path = work_dir.join(format!("metadata-{}.json", run_id));
        tracker.track(&metadata_path);
        std::fs::write(&metadata_path, &metadata_bytes).map_err(|source| ExportError::MetadataWriteFailed {
            path: metadata_path.clone(),
            source,
        })?;

        let (scene, substituted) = build_scene(room, self.catalog.as_ref());

        let model_path = work_dir.join(format!("model-{}.{}", run_id, self.codec.extension()));
        tracker.track(&model_path);
        self.codec
            .save(&scene, &model_path)
            .map_err(|e| ExportError::ModelWriteFailed {
                path: model_path.clone(),
                reason: e.to_string(),
            })?;

        info!(
            %run_id,
            space = %space.id(),
            surfaces = metadata.surfaces.len(),
            objects = metadata.objects.len(),
            substituted,
            "Captured space exported"
        );

        Ok(ExportedAsset {
            metadata,
            metadata_path,
            model_path,
            substituted,
        })
    }
}

// ============================================================================
// Scene building
// ============================================================================

/// Build the scene graph for `room`. Returns the scene and the number of
/// objects replaced by catalog references.
pub fn build_scene(room: &CapturedRoom, catalog: &dyn ModelCatalog) -> (SceneAsset, usize) {
    let mut surfaces: Vec<_> = room.surfaces.iter().collect();
    surfaces.sort_by_key(|s| (s.category, s.id));

    let mut architecture = SceneNode::group(ARCHITECTURE_GROUP);
    for category in [
        SurfaceCategory::Wall,
        SurfaceCategory::Floor,
        SurfaceCategory::Door,
        SurfaceCategory::Window,
        SurfaceCategory::Opening,
    ] {
        let color = match category {
            SurfaceCategory::Wall => WALL_COLOR,
            SurfaceCategory::Floor => FLOOR_COLOR,
            _ => OPENING_COLOR,
        };
        let nodes = surfaces
            .iter()
            .filter(|s| s.category == category)
            .enumerate()
            .map(|(index, surface)| {
                let geometry = if category == SurfaceCategory::Floor {
                    Geometry::plane(surface.dimensions[0], surface.dimensions[2])
                } else {
                    Geometry::cuboid(surface.dimensions)
                };
                let material = Material::new(category.label().to_lowercase(), color);
                SceneNode::mesh(format!("{}{}", category.label(), index), geometry, material)
                    .with_transform(surface.transform)
            });
        architecture = architecture.with_child(SceneNode::group(surface_group(category)).with_children(nodes));
    }

    let mut objects: Vec<_> = room.objects.iter().collect();
    objects.sort_by_key(|o| (o.category, o.id));

    let mut object_group = SceneNode::group(OBJECT_GROUP);
    let mut counters = HashMap::new();
    let mut catalog_available = true;
    let mut substituted = 0;

    for object in objects {
        let index = counters.entry(object.category).or_insert(0usize);
        let name = format!("{}{}", object.category.label(), index);
        *index += 1;

        let reference = if catalog_available {
            match catalog.reference_model(object.category) {
                Ok(reference) => reference,
                Err(CatalogError::Unavailable(reason)) => {
                    warn!(%reason, "Model catalog unavailable, exporting without substitution");
                    catalog_available = false;
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Reference model skipped");
                    None
                }
            }
        } else {
            None
        };

        let node = match reference {
            Some(reference) => {
                substituted += 1;
                debug!(object = %name, "Substituted reference model");
                SceneNode::group(name).with_transform(object.transform).with_child(reference)
            }
            None => SceneNode::mesh(
                name,
                Geometry::cuboid(object.dimensions),
                Material::new(object.category.key(), OBJECT_COLOR),
            )
            .with_transform(object.transform),
        };
        object_group = object_group.with_child(node);
    }

    let root = SceneNode::group(SCENE_ROOT)
        .with_child(architecture)
        .with_child(object_group);
    (SceneAsset::new(root), substituted)
}

#[cfg(test)]
mod tests {
    use super::catalog::MockModelCatalog;
    use super::*;
    use crate::capture::{CapturedRoom, ObjectCategory};
    use chrono::Utc;
    use roomscan_scene::{BinarySceneCodec, SceneError, Transform};

    fn room() -> CapturedRoom {
        CapturedRoom::new(Utc::now())
            .with_surface(SurfaceCategory::Wall, [4.0, 2.5, 0.1], Transform::at([0.0, 1.25, -1.5]))
            .with_surface(SurfaceCategory::Wall, [3.0, 2.5, 0.1], Transform::at([2.0, 1.25, 0.0]))
            .with_surface(SurfaceCategory::Floor, [4.0, 0.0, 3.0], Transform::default())
            .with_surface(SurfaceCategory::Door, [0.9, 2.0, 0.1], Transform::at([2.0, 1.0, 0.5]))
            .with_object(ObjectCategory::Table, [1.2, 0.75, 0.8], Transform::at([0.5, 0.4, 0.5]))
            .with_object(ObjectCategory::Chair, [0.5, 0.9, 0.5], Transform::at([0.5, 0.45, 1.2]))
            .with_object(ObjectCategory::Chair, [0.5, 0.9, 0.5], Transform::at([0.5, 0.45, -0.2]))
    }

    fn exporter(catalog: impl ModelCatalog + 'static) -> AssetExporter {
        AssetExporter::new(Arc::new(BinarySceneCodec::new()), Arc::new(catalog))
    }

    /// Codec that cannot write anything
    struct ReadOnlyCodec;

    impl SceneCodec for ReadOnlyCodec {
        fn load(&self, path: &Path) -> roomscan_scene::Result<SceneAsset> {
            Err(SceneError::NotFound(path.display().to_string()))
        }
        fn save(&self, _scene: &SceneAsset, path: &Path) -> roomscan_scene::Result<()> {
            std::fs::write(path, b"RS")?;
            Err(SceneError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
        }
        fn extension(&self) -> &str {
            "bin"
        }
        fn name(&self) -> &str {
            "read-only"
        }
    }

    #[test]
    fn test_scene_layout() {
        let (scene, substituted) = build_scene(&room(), &NoCatalog);
        assert_eq!(substituted, 0);
        assert_eq!(scene.find("Wall_grp").unwrap().geometry_count(), 2);
        assert_eq!(scene.find("Floor_grp").unwrap().geometry_count(), 1);
        assert_eq!(scene.find("Window_grp").unwrap().geometry_count(), 0);
        let objects = scene.find(OBJECT_GROUP).unwrap();
        let names: Vec<&str> = objects.children.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Table0", "Chair0", "Chair1"]);
    }

    #[test]
    fn test_catalog_substitution() {
        let mut catalog = MockModelCatalog::new();
        catalog.expect_reference_model().returning(|category| {
            if category == ObjectCategory::Chair {
                Ok(Some(SceneNode::mesh(
                    "ChairReference",
                    Geometry::cuboid([0.5, 0.9, 0.5]),
                    Material::new("oak", [0.6, 0.4, 0.2, 1.0]),
                )))
            } else {
                Ok(None)
            }
        });

        let (scene, substituted) = build_scene(&room(), &catalog);
        assert_eq!(substituted, 2);
        let chair = scene.find("Chair1").unwrap();
        assert!(!chair.has_geometry());
        assert_eq!(chair.children[0].name, "ChairReference");
        assert!(scene.find("Table0").unwrap().has_geometry());
    }

    #[test]
    fn test_unavailable_catalog_is_asked_once() {
        let mut catalog = MockModelCatalog::new();
        catalog
            .expect_reference_model()
            .times(1)
            .returning(|_| Err(CatalogError::Unavailable("offline".into())));

        let (scene, substituted) = build_scene(&room(), &catalog);
        assert_eq!(substituted, 0);
        assert_eq!(scene.find(OBJECT_GROUP).unwrap().geometry_count(), 3);
    }

    #[tokio::test]
    async fn test_export_writes_tracked_files() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ResourceTracker::new();
        let run_id = Uuid::new_v4();
        let space = CapturedSpace::new(room());

        let exported = exporter(NoCatalog).export(&space, dir.path(), run_id, &tracker).await.unwrap();

        assert!(exported.metadata_path.exists());
        assert!(exported.model_path.exists());
        assert!(exported.model_path.to_string_lossy().contains(&run_id.to_string()));
        assert!(tracker.is_tracked(&exported.metadata_path));
        assert!(tracker.is_tracked(&exported.model_path));

        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&exported.metadata_path).unwrap()).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 5);
        assert_eq!(json["identifier"], space.id().to_string());
    }

    #[tokio::test]
    async fn test_stale_space() {
        let dir = tempfile::tempdir().unwrap();
        let space = CapturedSpace::new(room());
        space.invalidate();

        let err = exporter(NoCatalog)
            .export(&space, dir.path(), Uuid::new_v4(), &ResourceTracker::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::SourceUnavailable));
    }

    #[tokio::test]
    async fn test_model_write_failure_leaves_cleanup_to_tracker() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ResourceTracker::new();
        let exporter = AssetExporter::new(Arc::new(ReadOnlyCodec), Arc::new(NoCatalog));

        let err = exporter
            .export(&CapturedSpace::new(room()), dir.path(), Uuid::new_v4(), &tracker)
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::ModelWriteFailed { .. }));
        assert_eq!(tracker.len(), 2);
        tracker.cleanup();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
