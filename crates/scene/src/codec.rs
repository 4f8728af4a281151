//! # Scene Codec
//!
//! Reads and writes [`SceneAsset`]s to model files. The pipeline only talks
//! to the [`SceneCodec`] trait; [`BinarySceneCodec`] is the default format.
//!
//! ## Binary layout
//! - 4 magic bytes `RSCN`
//! - bincode-encoded [`SceneAsset`]

use crate::error::{Result, SceneError};
use crate::graph::{SceneAsset, FORMAT_VERSION};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Magic bytes at start of the binary format
pub const MAGIC_BYTES: &[u8; 4] = b"RSCN";

/// Default extension for binary model files
pub const MODEL_EXTENSION: &str = "bin";

/// Loads and saves scene assets
pub trait SceneCodec: Send + Sync {
    /// Load a scene from `path`
    fn load(&self, path: &Path) -> Result<SceneAsset>;

    /// Write `scene` to `path`, replacing any existing file
    fn save(&self, scene: &SceneAsset, path: &Path) -> Result<()>;

    /// File extension written by this codec (without dot)
    fn extension(&self) -> &str;

    /// Codec name for logging
    fn name(&self) -> &str;
}

/// bincode-backed scene codec
#[derive(Debug, Default, Clone, Copy)]
pub struct BinarySceneCodec;

impl BinarySceneCodec {
    pub fn new() -> Self {
        Self
    }

    /// Decode a scene from an in-memory buffer
    pub fn decode(bytes: &[u8]) -> Result<SceneAsset> {
        if bytes.len() < MAGIC_BYTES.len() || &bytes[..MAGIC_BYTES.len()] != MAGIC_BYTES {
            return Err(SceneError::InvalidFormat("missing RSCN header".to_string()));
        }

        let scene: SceneAsset = bincode::deserialize(&bytes[MAGIC_BYTES.len()..])
            .map_err(|e| SceneError::Decode(e.to_string()))?;

        if !scene.format.starts_with("roomscan_scene_") {
            return Err(SceneError::VersionMismatch {
                expected: FORMAT_VERSION.to_string(),
                found: scene.format,
            });
        }

        Ok(scene)
    }
}

impl SceneCodec for BinarySceneCodec {
    fn load(&self, path: &Path) -> Result<SceneAsset> {
        if !path.exists() {
            return Err(SceneError::NotFound(path.display().to_string()));
        }

        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }

    fn save(&self, scene: &SceneAsset, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC_BYTES)?;
        bincode::serialize_into(&mut writer, scene).map_err(|e| match *e {
            bincode::ErrorKind::Io(io) => SceneError::Io(io),
            other => SceneError::Encode(other.to_string()),
        })?;
        writer.flush()?;

        tracing::debug!(path = %path.display(), "Scene written");
        Ok(())
    }

    fn extension(&self) -> &str {
        MODEL_EXTENSION
    }

    fn name(&self) -> &str {
        "binary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Geometry, SceneNode};
    use crate::material::Material;

    fn scene() -> SceneAsset {
        SceneAsset::new(SceneNode::group("Scene").with_child(SceneNode::mesh(
            "Wall0",
            Geometry::cuboid([4.0, 2.5, 0.1]),
            Material::new("wall", [0.9, 0.9, 0.9, 1.0]),
        )))
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.bin");
        let codec = BinarySceneCodec::new();

        codec.save(&scene(), &path).unwrap();
        let loaded = codec.load(&path).unwrap();

        assert_eq!(loaded, scene());
        assert_eq!(loaded.format, FORMAT_VERSION);
    }

    #[test]
    fn test_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.bin");
        std::fs::write(&path, b"glTF....").unwrap();

        let err = BinarySceneCodec::new().load(&path).unwrap_err();
        assert!(matches!(err, SceneError::InvalidFormat(_)));
    }

    #[test]
    fn test_truncated_payload() {
        let mut bytes = MAGIC_BYTES.to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let err = BinarySceneCodec::decode(&bytes).unwrap_err();
        assert!(matches!(err, SceneError::Decode(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = BinarySceneCodec::new()
            .load(Path::new("/nonexistent/roomscan/model.bin"))
            .unwrap_err();
        assert!(matches!(err, SceneError::NotFound(_)));
    }
}
