//! # Materials
//!
//! Surface description attached to geometry-bearing scene nodes.
//!
//! ## Table of Contents
//! 1. LightingModel / WrapMode
//! 2. ColorInput / TextureImage / UvTransform
//! 3. Material

use serde::{Deserialize, Serialize};

/// Linear RGBA color
pub type Rgba = [f32; 4];

// ============================================================================
// Shading
// ============================================================================

/// Lighting model used to shade a material
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightingModel {
    /// Unlit, flat color
    Constant,
    Lambert,
    #[default]
    Blinn,
    /// Metallic/roughness PBR
    PhysicallyBased,
}

/// Texture coordinate wrapping for one axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
    MirroredRepeat,
}

// ============================================================================
// Color inputs
// ============================================================================

/// Encoded image embedded in the scene
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureImage {
    /// Source file name (e.g. "oak.png")
    pub name: String,
    /// Encoded image bytes
    pub data: Vec<u8>,
}

impl std::fmt::Debug for TextureImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureImage")
            .field("name", &self.name)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Primary surface color input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColorInput {
    Color(Rgba),
    Image(TextureImage),
}

impl Default for ColorInput {
    fn default() -> Self {
        ColorInput::Color([0.8, 0.8, 0.8, 1.0])
    }
}

/// 2D scale applied to texture coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvTransform {
    pub scale: [f32; 2],
}

impl UvTransform {
    pub fn scale(x: f32, y: f32) -> Self {
        Self { scale: [x, y] }
    }
}

// ============================================================================
// Material
// ============================================================================

/// Material applied to a geometry node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub lighting: LightingModel,
    /// Primary surface color (diffuse / base color)
    pub diffuse: ColorInput,
    /// Texture coordinate transform, `None` for untransformed coordinates
    pub uv_transform: Option<UvTransform>,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            lighting: LightingModel::default(),
            diffuse: ColorInput::default(),
            uv_transform: None,
            wrap_s: WrapMode::Clamp,
            wrap_t: WrapMode::Clamp,
        }
    }
}

impl Material {
    /// Create a flat-colored material
    pub fn new(name: impl Into<String>, color: Rgba) -> Self {
        Self {
            name: name.into(),
            diffuse: ColorInput::Color(color),
            ..Default::default()
        }
    }

    /// Flat color, if the color input is not an image
    pub fn color(&self) -> Option<Rgba> {
        match &self.diffuse {
            ColorInput::Color(rgba) => Some(*rgba),
            ColorInput::Image(_) => None,
        }
    }

    /// Embedded texture, if any
    pub fn image(&self) -> Option<&TextureImage> {
        match &self.diffuse {
            ColorInput::Image(image) => Some(image),
            ColorInput::Color(_) => None,
        }
    }

    /// True when texture coordinates wrap on both axes
    pub fn wraps(&self) -> bool {
        self.wrap_s == WrapMode::Repeat && self.wrap_t == WrapMode::Repeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_defaults() {
        let material = Material::new("wall", [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(material.color(), Some([1.0, 0.0, 0.0, 1.0]));
        assert!(material.image().is_none());
        assert!(material.uv_transform.is_none());
        assert!(!material.wraps());
        assert_eq!(material.lighting, LightingModel::Blinn);
    }

    #[test]
    fn test_texture_debug_hides_bytes() {
        let image = TextureImage { name: "oak.png".to_string(), data: vec![0u8; 1024] };
        let debug = format!("{:?}", image);
        assert!(debug.contains("oak.png"));
        assert!(debug.contains("1024"));
    }
}
