//! # Scene Transformer
//!
//! Applies per-group material treatments to an exported model and writes the
//! result to a new file next to the source.
//!
//! ## Table of Contents
//! 1. MaterialGroup / Treatment / MaterialPlan
//! 2. TransformReport
//! 3. apply_plan - pure scene mutation
//! 4. SceneTransformer - load, apply, save on the blocking pool
//!
//! ## Group matching
//!
//! Each group is looked up on its own: the first depth-first node named after
//! the group's node name selects its subtree. Groups are applied outermost
//! first, so a nested group (`Wall_grp` inside `Architecture_grp`) overrides
//! the enclosing group on the geometry they share. Geometry outside every
//! selected subtree is left untouched.

use crate::error::TransformError;
use crate::tracker::ResourceTracker;
use roomscan_scene::{
    ColorInput, LightingModel, Material, Rgba, SceneAsset, SceneCodec, SceneNode, TextureImage, UvTransform,
    WrapMode,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Base color given to geometry that had no material before treatment
const UNTREATED_COLOR: Rgba = [0.8, 0.8, 0.8, 1.0];

// ============================================================================
// Plan types
// ============================================================================

/// Named selector for a scene subtree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialGroup {
    /// Plan key, e.g. "floor"
    pub name: String,
    /// Exact scene node name, e.g. "Floor_grp"
    pub node_name: String,
}

impl MaterialGroup {
    pub fn custom(name: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_name: node_name.into(),
        }
    }

    pub fn floor() -> Self {
        Self::custom("floor", "Floor_grp")
    }

    pub fn walls() -> Self {
        Self::custom("walls", "Wall_grp")
    }

    pub fn doors() -> Self {
        Self::custom("doors", "Door_grp")
    }

    pub fn windows() -> Self {
        Self::custom("windows", "Window_grp")
    }

    pub fn openings() -> Self {
        Self::custom("openings", "Opening_grp")
    }

    pub fn architecture() -> Self {
        Self::custom("architecture", "Architecture_grp")
    }

    pub fn objects() -> Self {
        Self::custom("objects", "Object_grp")
    }

    /// Well-known group by plan key
    pub fn well_known(name: &str) -> Option<Self> {
        match name {
            "floor" => Some(Self::floor()),
            "walls" => Some(Self::walls()),
            "doors" => Some(Self::doors()),
            "windows" => Some(Self::windows()),
            "openings" => Some(Self::openings()),
            "architecture" => Some(Self::architecture()),
            "objects" => Some(Self::objects()),
            _ => None,
        }
    }
}

impl std::fmt::Display for MaterialGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.node_name)
    }
}

/// Tiled image texture
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSpec {
    pub image: PathBuf,
    /// Repeat factor along U and V; (1, 1) covers the surface once
    pub repeat: [f32; 2],
}

/// Flat color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TintSpec {
    pub color: Rgba,
}

/// Visual treatment for one group
#[derive(Debug, Clone, PartialEq)]
pub enum Treatment {
    Texture(TextureSpec),
    Tint(TintSpec),
}

impl Treatment {
    pub fn texture(image: impl Into<PathBuf>, repeat_x: f32, repeat_y: f32) -> Self {
        Treatment::Texture(TextureSpec {
            image: image.into(),
            repeat: [repeat_x, repeat_y],
        })
    }

    pub fn tint(color: Rgba) -> Self {
        Treatment::Tint(TintSpec { color })
    }
}

/// Ordered group to treatment map
pub type MaterialPlan = BTreeMap<MaterialGroup, Treatment>;

/// Treatment with its texture bytes loaded
#[derive(Debug, Clone)]
pub enum ResolvedTreatment {
    Texture { image: TextureImage, repeat: [f32; 2] },
    Tint(Rgba),
}

/// Validate every treatment and read each texture once
pub fn resolve_plan(plan: &MaterialPlan) -> Result<Vec<(MaterialGroup, ResolvedTreatment)>, TransformError> {
    plan.iter()
        .map(|(group, treatment)| {
            let resolved = match treatment {
                Treatment::Texture(spec) => {
                    if spec.repeat.iter().any(|r| !r.is_finite() || *r <= 0.0) {
                        return Err(TransformError::InvalidTreatment {
                            group: group.name.clone(),
                            reason: format!("repeat factor {:?} must be finite and positive", spec.repeat),
                        });
                    }
                    let data = std::fs::read(&spec.image).map_err(|e| TransformError::TextureUnavailable {
                        group: group.name.clone(),
                        path: spec.image.clone(),
                        reason: e.to_string(),
                    })?;
                    let name = spec
                        .image
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| group.name.clone());
                    ResolvedTreatment::Texture {
                        image: TextureImage { name, data },
                        repeat: spec.repeat,
                    }
                }
                Treatment::Tint(spec) => {
                    if spec.color.iter().any(|c| !c.is_finite()) {
                        return Err(TransformError::InvalidTreatment {
                            group: group.name.clone(),
                            reason: "tint color must be finite".to_string(),
                        });
                    }
                    ResolvedTreatment::Tint(spec.color)
                }
            };
            Ok((group.clone(), resolved))
        })
        .collect()
}

// ============================================================================
// TransformReport
// ============================================================================

/// Modified geometry node count per group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub modified: BTreeMap<String, usize>,
}

impl TransformReport {
    /// Nodes modified for `group`, zero if the group was not found
    pub fn count(&self, group: &str) -> usize {
        self.modified.get(group).copied().unwrap_or(0)
    }

    /// Sum over groups; geometry inside nested groups counts once per group
    pub fn total(&self) -> usize {
        self.modified.values().sum()
    }

    /// Groups that modified nothing
    pub fn empty_groups(&self) -> impl Iterator<Item = &str> {
        self.modified
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(group, _)| group.as_str())
    }
}

// ============================================================================
// Scene mutation
// ============================================================================

/// Apply resolved treatments to `scene` in place
pub fn apply_plan(scene: &mut SceneAsset, plan: &[(MaterialGroup, ResolvedTreatment)]) -> TransformReport {
    let mut located: Vec<(usize, usize)> = plan
        .iter()
        .enumerate()
        .filter_map(|(index, (group, _))| match_depth(&scene.root, &group.node_name, 0).map(|depth| (depth, index)))
        .collect();
    // Stable: groups at equal depth keep plan order
    located.sort_by_key(|(depth, _)| *depth);

    let mut counts = vec![0usize; plan.len()];
    for (depth, index) in located {
        let (group, treatment) = &plan[index];
        if let Some(node) = scene.root.find_mut(&group.node_name) {
            counts[index] = treat_subtree(node, group, treatment);
            debug!(group = %group.name, node = %node.name, depth, modified = counts[index], "Group matched");
        }
    }

    TransformReport {
        modified: plan
            .iter()
            .zip(counts)
            .map(|((group, _), count)| (group.name.clone(), count))
            .collect(),
    }
}

/// Depth of the first depth-first node named `name`
fn match_depth(node: &SceneNode, name: &str, depth: usize) -> Option<usize> {
    if node.name == name {
        return Some(depth);
    }
    node.children
        .iter()
        .find_map(|child| match_depth(child, name, depth + 1))
}

fn treat_subtree(root: &mut SceneNode, group: &MaterialGroup, treatment: &ResolvedTreatment) -> usize {
    let mut modified = 0;
    root.visit_mut(&mut |node| {
        if !node.has_geometry() {
            return;
        }
        if node.materials.is_empty() {
            node.materials
                .push(Material::new(format!("{}_material", group.name), UNTREATED_COLOR));
        }
        for material in &mut node.materials {
            treat_material(material, treatment);
        }
        modified += 1;
    });
    modified
}

fn treat_material(material: &mut Material, treatment: &ResolvedTreatment) {
    match treatment {
        ResolvedTreatment::Texture { image, repeat } => {
            material.diffuse = ColorInput::Image(image.clone());
            material.uv_transform = Some(UvTransform::scale(repeat[0], repeat[1]));
            material.wrap_s = WrapMode::Repeat;
            material.wrap_t = WrapMode::Repeat;
        }
        ResolvedTreatment::Tint(color) => {
            material.diffuse = ColorInput::Color(*color);
            material.uv_transform = None;
        }
    }
    material.lighting = LightingModel::PhysicallyBased;
}

// ============================================================================
// SceneTransformer
// ============================================================================

/// Result of a successful transform
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub path: PathBuf,
    pub report: TransformReport,
}

/// Loads, restyles and re-saves exported models
#[derive(Clone)]
pub struct SceneTransformer {
    codec: Arc<dyn SceneCodec>,
}

impl SceneTransformer {
    pub fn new(codec: Arc<dyn SceneCodec>) -> Self {
        Self { codec }
    }

    /// Transform the scene at `source` with `plan`. The output path is
    /// tracked before it is written; `source` is never modified.
    pub async fn transform(
        &self,
        source: &Path,
        plan: &MaterialPlan,
        tracker: &ResourceTracker,
    ) -> Result<TransformOutput, TransformError> {
        let transformer = self.clone();
        let source = source.to_path_buf();
        let plan = plan.clone();
        let tracker = tracker.clone();

        tokio::task::spawn_blocking(move || transformer.transform_blocking(&source, &plan, &tracker))
            .await
            .map_err(|e| TransformError::TaskFailed(e.to_string()))?
    }

    fn transform_blocking(
        &self,
        source: &Path,
        plan: &MaterialPlan,
        tracker: &ResourceTracker,
    ) -> Result<TransformOutput, TransformError> {
        let mut scene = self.codec.load(source).map_err(|e| TransformError::LoadFailed {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;

        let resolved = resolve_plan(plan)?;
        let report = apply_plan(&mut scene, &resolved);
        for group in report.empty_groups() {
            warn!(%group, "Material group not found in scene, nothing modified");
        }

        let path = self.output_path(source);
        tracker.track(&path);
        if let Err(e) = self.codec.save(&scene, &path) {
            if remove_partial(&path) {
                tracker.release(&path);
            }
            return Err(TransformError::WriteFailed {
                path,
                reason: e.to_string(),
            });
        }

        info!(
            source = %source.display(),
            output = %path.display(),
            modified = report.total(),
            "Scene transformed"
        );
        Ok(TransformOutput { path, report })
    }

    fn output_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        let file_name = format!("{}-styled-{}.{}", stem, Uuid::new_v4(), self.codec.extension());
        match source.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        }
    }
}

/// Delete a partial output. `false` leaves it for the run's cleanup.
fn remove_partial(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed partial output");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to remove partial output, left to run cleanup");
            false
        }
    }
}
