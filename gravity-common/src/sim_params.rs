use serde::{Deserialize, Serialize};
use crate::vecmath::Vec2;

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // World & trail grid
    pub world_width: f64,
    pub world_height: f64,
    pub center: Vec2,
    pub grid_width: u32,
    pub grid_height: u32,

    // Physics
    pub density: f64,
    pub gravity_strength: f64,
    pub singularity_epsilon: f64,
    pub planet_radius: f64,

    // Time
    pub dt: f64,
}
