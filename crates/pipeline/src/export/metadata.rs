//! Scan metadata document.
//!
//! Derived deterministically from a [`CapturedRoom`]: no randomness, records
//! sorted by category then id, fields serialized in declaration order.

use crate::capture::{CapturedRoom, Confidence, ObjectCategory, SurfaceCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata document revision
pub const METADATA_VERSION: u32 = 1;

/// Exported description of a captured space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub version: u32,
    pub identifier: Uuid,
    pub summary: GeometrySummary,
    /// Walls, floors and openings
    pub surfaces: Vec<SurfaceRecord>,
    pub objects: Vec<ObjectRecord>,
}

/// Aggregate geometry of the space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometrySummary {
    pub captured_at: DateTime<Utc>,
    pub wall_count: usize,
    pub floor_count: usize,
    pub opening_count: usize,
    pub object_count: usize,
    pub floor_area_m2: f32,
    pub bounds_m: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRecord {
    pub id: Uuid,
    pub category: SurfaceCategory,
    pub dimensions: [f32; 3],
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub confidence: Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: Uuid,
    pub category: ObjectCategory,
    pub dimensions: [f32; 3],
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub confidence: Confidence,
}

impl ScanMetadata {
    pub fn from_room(room: &CapturedRoom) -> Self {
        let mut surfaces: Vec<SurfaceRecord> = room
            .surfaces
            .iter()
            .map(|s| SurfaceRecord {
                id: s.id,
                category: s.category,
                dimensions: s.dimensions,
                position: s.transform.position,
                rotation: s.transform.rotation,
                confidence: s.confidence,
            })
            .collect();
        surfaces.sort_by_key(|s| (s.category, s.id));

        let mut objects: Vec<ObjectRecord> = room
            .objects
            .iter()
            .map(|o| ObjectRecord {
                id: o.id,
                category: o.category,
                dimensions: o.dimensions,
                position: o.transform.position,
                rotation: o.transform.rotation,
                confidence: o.confidence,
            })
            .collect();
        objects.sort_by_key(|o| (o.category, o.id));

        let count = |category: SurfaceCategory| surfaces.iter().filter(|s| s.category == category).count();
        let summary = GeometrySummary {
            captured_at: room.captured_at,
            wall_count: count(SurfaceCategory::Wall),
            floor_count: count(SurfaceCategory::Floor),
            opening_count: surfaces.iter().filter(|s| s.category.is_opening()).count(),
            object_count: objects.len(),
            floor_area_m2: room.floor_area(),
            bounds_m: room.bounds(),
        };

        Self {
            version: METADATA_VERSION,
            identifier: room.identifier,
            summary,
            surfaces,
            objects,
        }
    }

    /// Doors, windows and open passages
    pub fn openings(&self) -> impl Iterator<Item = &SurfaceRecord> {
        self.surfaces.iter().filter(|s| s.category.is_opening())
    }

    /// Pretty-printed JSON, as uploaded in the `metadata_json` part
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}
