//! # Scene Graph
//!
//! In-memory tree of named nodes. Geometry-bearing nodes carry a list of
//! materials; group nodes only organize their children.
//!
//! ## Table of Contents
//! 1. Transform / Geometry
//! 2. SceneNode
//! 3. SceneAsset

use crate::material::Material;
use serde::{Deserialize, Serialize};

/// Current scene format revision
pub const FORMAT_VERSION: &str = "roomscan_scene_v1";

// ============================================================================
// Transform / Geometry
// ============================================================================

/// Local transform of a node relative to its parent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: [f32; 3],
    /// Quaternion: x, y, z, w
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0, 1.0, 1.0],
        }
    }
}

impl Transform {
    pub fn at(position: [f32; 3]) -> Self {
        Self { position, ..Default::default() }
    }

    pub fn with_rotation(mut self, rotation: [f32; 4]) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Primitive shape of a geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Shape {
    Box,
    Plane,
    Mesh { vertex_count: u32, index_count: u32 },
}

/// Renderable geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub shape: Shape,
    /// Width, height, depth in meters
    pub dimensions: [f32; 3],
}

impl Geometry {
    pub fn cuboid(dimensions: [f32; 3]) -> Self {
        Self { shape: Shape::Box, dimensions }
    }

    pub fn plane(width: f32, depth: f32) -> Self {
        Self { shape: Shape::Plane, dimensions: [width, 0.0, depth] }
    }
}

// ============================================================================
// SceneNode
// ============================================================================

/// A node in the scene tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default)]
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Create an empty group node
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            geometry: None,
            materials: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create a geometry node with a single material
    pub fn mesh(name: impl Into<String>, geometry: Geometry, material: Material) -> Self {
        Self {
            geometry: Some(geometry),
            materials: vec![material],
            ..Self::group(name)
        }
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = SceneNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }

    /// First node named `name`, depth-first pre-order (self included)
    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }

    /// Mutable variant of [`SceneNode::find`]
    pub fn find_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        if self.name == name {
            return Some(self);
        }
        for child in &mut self.children {
            if let Some(found) = child.find_mut(name) {
                return Some(found);
            }
        }
        None
    }

    /// Visit this node and every descendant, depth-first pre-order
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a SceneNode)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Mutable variant of [`SceneNode::visit`]
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut SceneNode)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }

    /// Number of geometry-bearing nodes at or below this node
    pub fn geometry_count(&self) -> usize {
        let mut count = 0;
        self.visit(&mut |node| {
            if node.has_geometry() {
                count += 1;
            }
        });
        count
    }
}

// ============================================================================
// SceneAsset
// ============================================================================

/// A complete scene as loaded from or written to a model file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAsset {
    /// Format revision tag
    pub format: String,
    pub root: SceneNode,
}

impl SceneAsset {
    pub fn new(root: SceneNode) -> Self {
        Self {
            format: FORMAT_VERSION.to_string(),
            root,
        }
    }

    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        self.root.find(name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut SceneNode> {
        self.root.find_mut(name)
    }

    pub fn geometry_count(&self) -> usize {
        self.root.geometry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Material;

    fn sample() -> SceneAsset {
        let grey = Material::new("grey", [0.5, 0.5, 0.5, 1.0]);
        SceneAsset::new(
            SceneNode::group("Scene")
                .with_child(
                    SceneNode::group("Architecture_grp").with_child(
                        SceneNode::group("Floor_grp")
                            .with_child(SceneNode::mesh("Floor0", Geometry::plane(4.0, 3.0), grey.clone())),
                    ),
                )
                .with_child(
                    SceneNode::group("Object_grp")
                        .with_child(SceneNode::mesh("Table0", Geometry::cuboid([1.0, 0.8, 1.0]), grey.clone()))
                        .with_child(SceneNode::mesh("Floor_grp", Geometry::cuboid([1.0, 1.0, 1.0]), grey)),
                ),
        )
    }

    #[test]
    fn test_find_is_depth_first() {
        let scene = sample();
        // The architecture branch is visited before the object branch
        let floor = scene.find("Floor_grp").unwrap();
        assert!(!floor.has_geometry());
        assert_eq!(floor.children.len(), 1);
        assert!(scene.find("Missing").is_none());
    }

    #[test]
    fn test_geometry_count() {
        let scene = sample();
        assert_eq!(scene.geometry_count(), 3);
        assert_eq!(scene.find("Object_grp").unwrap().geometry_count(), 2);
    }

    #[test]
    fn test_find_mut_edits_in_place() {
        let mut scene = sample();
        scene.find_mut("Table0").unwrap().materials.clear();
        assert!(scene.find("Table0").unwrap().materials.is_empty());
    }
}
