//! # Roomscan Scene
//!
//! Scene graph model and model-file codec for captured rooms.
//!
//! ## Architecture
//!
//! ```text
//! SceneAsset
//! └── SceneNode "Scene"
//!     ├── SceneNode "Architecture_grp"
//!     │   ├── SceneNode "Wall_grp"   ── geometry nodes + materials
//!     │   └── SceneNode "Floor_grp"  ── geometry nodes + materials
//!     └── SceneNode "Object_grp"     ── geometry nodes + materials
//! ```
//!
//! The pipeline loads and writes scenes only through [`SceneCodec`], so the
//! on-disk format can be swapped without touching the transformer.

pub mod codec;
pub mod error;
pub mod graph;
pub mod material;

pub use codec::{BinarySceneCodec, SceneCodec, MAGIC_BYTES, MODEL_EXTENSION};
pub use error::{Result, SceneError};
pub use graph::{Geometry, SceneAsset, SceneNode, Shape, Transform, FORMAT_VERSION};
pub use material::{ColorInput, LightingModel, Material, Rgba, TextureImage, UvTransform, WrapMode};

/// Convenient re-exports for common scene types.
pub mod prelude {
    pub use super::codec::{BinarySceneCodec, SceneCodec};
    pub use super::graph::{Geometry, SceneAsset, SceneNode, Transform};
    pub use super::material::{ColorInput, LightingModel, Material, UvTransform, WrapMode};
}
