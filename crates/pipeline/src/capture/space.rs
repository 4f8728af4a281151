//! # Captured Space
//!
//! Result of one completed scan. The room data is immutable; the handle can
//! be invalidated by the runtime, after which exports fail with
//! `ExportError::SourceUnavailable`.

use chrono::{DateTime, Utc};
use roomscan_scene::Transform;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Categories
// ============================================================================

/// Detection confidence reported by the capture runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

/// Architectural surface kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceCategory {
    Wall,
    Floor,
    Door,
    Window,
    Opening,
}

impl SurfaceCategory {
    /// Doors, windows and open passages
    pub fn is_opening(&self) -> bool {
        matches!(self, SurfaceCategory::Door | SurfaceCategory::Window | SurfaceCategory::Opening)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SurfaceCategory::Wall => "Wall",
            SurfaceCategory::Floor => "Floor",
            SurfaceCategory::Door => "Door",
            SurfaceCategory::Window => "Window",
            SurfaceCategory::Opening => "Opening",
        }
    }
}

/// Furniture and fixture kinds recognized during capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectCategory {
    Storage,
    Refrigerator,
    Stove,
    Bed,
    Sink,
    WasherDryer,
    Toilet,
    Bathtub,
    Oven,
    Dishwasher,
    Table,
    Sofa,
    Chair,
    Fireplace,
    Television,
    Stairs,
}

impl ObjectCategory {
    /// snake_case key, also used for catalog file names
    pub fn key(&self) -> &'static str {
        match self {
            ObjectCategory::Storage => "storage",
            ObjectCategory::Refrigerator => "refrigerator",
            ObjectCategory::Stove => "stove",
            ObjectCategory::Bed => "bed",
            ObjectCategory::Sink => "sink",
            ObjectCategory::WasherDryer => "washer_dryer",
            ObjectCategory::Toilet => "toilet",
            ObjectCategory::Bathtub => "bathtub",
            ObjectCategory::Oven => "oven",
            ObjectCategory::Dishwasher => "dishwasher",
            ObjectCategory::Table => "table",
            ObjectCategory::Sofa => "sofa",
            ObjectCategory::Chair => "chair",
            ObjectCategory::Fireplace => "fireplace",
            ObjectCategory::Television => "television",
            ObjectCategory::Stairs => "stairs",
        }
    }

    /// PascalCase label used for scene node names
    pub fn label(&self) -> &'static str {
        match self {
            ObjectCategory::Storage => "Storage",
            ObjectCategory::Refrigerator => "Refrigerator",
            ObjectCategory::Stove => "Stove",
            ObjectCategory::Bed => "Bed",
            ObjectCategory::Sink => "Sink",
            ObjectCategory::WasherDryer => "WasherDryer",
            ObjectCategory::Toilet => "Toilet",
            ObjectCategory::Bathtub => "Bathtub",
            ObjectCategory::Oven => "Oven",
            ObjectCategory::Dishwasher => "Dishwasher",
            ObjectCategory::Table => "Table",
            ObjectCategory::Sofa => "Sofa",
            ObjectCategory::Chair => "Chair",
            ObjectCategory::Fireplace => "Fireplace",
            ObjectCategory::Television => "Television",
            ObjectCategory::Stairs => "Stairs",
        }
    }
}

// ============================================================================
// Room data
// ============================================================================

/// A wall, floor or opening
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub id: Uuid,
    pub category: SurfaceCategory,
    /// Width, height, depth in meters
    pub dimensions: [f32; 3],
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub confidence: Confidence,
}

/// A recognized piece of furniture or fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub id: Uuid,
    pub category: ObjectCategory,
    /// Width, height, depth in meters
    pub dimensions: [f32; 3],
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub confidence: Confidence,
}

/// Structured room produced by the capture runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedRoom {
    pub identifier: Uuid,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub surfaces: Vec<Surface>,
    #[serde(default)]
    pub objects: Vec<DetectedObject>,
}

impl CapturedRoom {
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            identifier: Uuid::new_v4(),
            captured_at,
            surfaces: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn with_surface(mut self, category: SurfaceCategory, dimensions: [f32; 3], transform: Transform) -> Self {
        self.surfaces.push(Surface {
            id: Uuid::new_v4(),
            category,
            dimensions,
            transform,
            confidence: Confidence::High,
        });
        self
    }

    pub fn with_object(mut self, category: ObjectCategory, dimensions: [f32; 3], transform: Transform) -> Self {
        self.objects.push(DetectedObject {
            id: Uuid::new_v4(),
            category,
            dimensions,
            transform,
            confidence: Confidence::High,
        });
        self
    }

    pub fn surfaces_of(&self, category: SurfaceCategory) -> impl Iterator<Item = &Surface> {
        self.surfaces.iter().filter(move |s| s.category == category)
    }

    /// Floor area in square meters (width x depth of every floor surface)
    pub fn floor_area(&self) -> f32 {
        self.surfaces_of(SurfaceCategory::Floor)
            .map(|s| s.dimensions[0] * s.dimensions[2])
            .sum()
    }

    /// Axis-aligned extent of all surfaces and objects (ignores rotation)
    pub fn bounds(&self) -> [f32; 3] {
        let extents = self
            .surfaces
            .iter()
            .map(|s| (s.transform.position, s.dimensions))
            .chain(self.objects.iter().map(|o| (o.transform.position, o.dimensions)));

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut any = false;
        for (position, dimensions) in extents {
            any = true;
            for axis in 0..3 {
                min[axis] = min[axis].min(position[axis] - dimensions[axis] / 2.0);
                max[axis] = max[axis].max(position[axis] + dimensions[axis] / 2.0);
            }
        }

        if !any {
            return [0.0; 3];
        }
        [max[0] - min[0], max[1] - min[1], max[2] - min[2]]
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Opaque handle to one completed scan
#[derive(Clone)]
pub struct CapturedSpace {
    room: Arc<CapturedRoom>,
    available: Arc<AtomicBool>,
}

impl CapturedSpace {
    pub fn new(room: CapturedRoom) -> Self {
        Self {
            room: Arc::new(room),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.room.identifier
    }

    pub fn room(&self) -> &CapturedRoom {
        &self.room
    }

    /// False once the runtime has released the underlying capture
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Mark this handle (and all clones) stale
    pub fn invalidate(&self) {
        self.available.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for CapturedSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedSpace")
            .field("id", &self.room.identifier)
            .field("surfaces", &self.room.surfaces.len())
            .field("objects", &self.room.objects.len())
            .field("available", &self.is_available())
            .finish()
    }
}
