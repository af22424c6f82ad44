use serde::{Serialize, Deserialize};

/// Why a body left the simulation, or which trail colour a cell carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergeCategory {
    #[default]
    None,
    /// The primary sun took part in the merge.
    SunMerge,
    OtherMerge,
}

impl MergeCategory {
    /// (red, blue) channels used when painting a trail cell.
    pub fn channels(&self) -> (u8, u8) {
        match self {
            MergeCategory::None => (0, 0),
            MergeCategory::SunMerge => (255, 0),
            MergeCategory::OtherMerge => (0, 255),
        }
    }
}

/// Read-only view of one body, handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub merged: bool,
    pub is_sun: bool,
    pub category: MergeCategory,
}

/// Log-normalized trail grid, one RGB pixel per seed cell, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<[u8; 3]>,
}

impl TrailImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// A snapshot of the simulation state at a specific tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    /// Simulation time at which the snapshot was taken.
    pub time: f64,
    pub dt: f64,
    /// View state at the time of the snapshot, so a renderer can replay it.
    pub zoom: f64,
    pub show_trails: bool,
    pub active_count: u32,
    pub merged_count: u32,
    pub bodies: Option<Vec<BodySnapshot>>,
    pub trail: Option<TrailImage>,
}
