//! # Model Catalog
//!
//! Reference models that replace the plain boxes of recognized furniture and
//! fixtures with higher-fidelity geometry.
//!
//! ## Table of Contents
//! 1. ModelCatalog - trait the exporter calls into
//! 2. NoCatalog - always unavailable (degraded export)
//! 3. StaticCatalog - `<category>.bin` files in a directory

use crate::capture::ObjectCategory;
use crate::error::CatalogError;
use parking_lot::Mutex;
use roomscan_scene::{SceneCodec, SceneError, SceneNode};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Source of reference models by object category
#[cfg_attr(test, mockall::automock)]
pub trait ModelCatalog: Send + Sync {
    /// Reference subtree for `category`, `Ok(None)` when the catalog has none
    fn reference_model(&self, category: ObjectCategory) -> Result<Option<SceneNode>, CatalogError>;
}

/// Catalog that is never available
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCatalog;

impl ModelCatalog for NoCatalog {
    fn reference_model(&self, _category: ObjectCategory) -> Result<Option<SceneNode>, CatalogError> {
        Err(CatalogError::Unavailable("no model catalog configured".to_string()))
    }
}

/// Directory of reference model files, one per category
pub struct StaticCatalog {
    dir: PathBuf,
    codec: Arc<dyn SceneCodec>,
    cache: Mutex<HashMap<ObjectCategory, Option<SceneNode>>>,
}

impl StaticCatalog {
    pub fn new(dir: impl Into<PathBuf>, codec: Arc<dyn SceneCodec>) -> Self {
        Self {
            dir: dir.into(),
            codec,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, category: ObjectCategory) -> PathBuf {
        self.dir.join(format!("{}.{}", category.key(), self.codec.extension()))
    }
}

impl ModelCatalog for StaticCatalog {
    fn reference_model(&self, category: ObjectCategory) -> Result<Option<SceneNode>, CatalogError> {
        if !self.dir.is_dir() {
            return Err(CatalogError::Unavailable(format!("{} is not a directory", self.dir.display())));
        }

        if let Some(cached) = self.cache.lock().get(&category) {
            return Ok(cached.clone());
        }

        let path = self.path_for(category);
        let model = match self.codec.load(&path) {
            Ok(scene) => Some(scene.root),
            Err(SceneError::NotFound(_)) => None,
            Err(e) => {
                return Err(CatalogError::Load {
                    category: category.key().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        debug!(category = category.key(), found = model.is_some(), "Catalog lookup");
        self.cache.lock().insert(category, model.clone());
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomscan_scene::{BinarySceneCodec, Geometry, Material, SceneAsset};

    #[test]
    fn test_no_catalog_is_unavailable() {
        let err = NoCatalog.reference_model(ObjectCategory::Sofa).unwrap_err();
        assert!(matches!(err, CatalogError::Unavailable(_)));
    }

    #[test]
    fn test_static_catalog_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let codec = Arc::new(BinarySceneCodec::new());
        let sofa = SceneNode::group("SofaReference").with_child(SceneNode::mesh(
            "Cushion",
            Geometry::cuboid([2.0, 0.4, 0.9]),
            Material::new("fabric", [0.3, 0.3, 0.35, 1.0]),
        ));
        codec.save(&SceneAsset::new(sofa.clone()), &dir.path().join("sofa.bin")).unwrap();

        let catalog = StaticCatalog::new(dir.path(), codec);
        assert_eq!(catalog.reference_model(ObjectCategory::Sofa).unwrap(), Some(sofa));
        assert_eq!(catalog.reference_model(ObjectCategory::Chair).unwrap(), None);
    }

    #[test]
    fn test_static_catalog_missing_dir() {
        let catalog = StaticCatalog::new("/nonexistent/roomscan/catalog", Arc::new(BinarySceneCodec::new()));
        assert!(matches!(
            catalog.reference_model(ObjectCategory::Bed),
            Err(CatalogError::Unavailable(_))
        ));
    }

    #[test]
    fn test_static_catalog_corrupt_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bed.bin"), b"not a scene").unwrap();
        let catalog = StaticCatalog::new(dir.path(), Arc::new(BinarySceneCodec::new()));
        assert!(matches!(
            catalog.reference_model(ObjectCategory::Bed),
            Err(CatalogError::Load { .. })
        ));
    }
}
