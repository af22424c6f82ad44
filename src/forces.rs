//! Gravitational acceleration restricted to an influencer subset.

use crate::body::Body;
use gravity_common::{InfluencerConfig, SimParams, Vec2};

/// The bodies whose gravity is felt by everyone else.
///
/// With the default (`Suns`) ordinary bodies only feel the two suns, which
/// keeps a tick linear in the number of bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluencerSet {
    indices: Vec<usize>,
}

impl InfluencerSet {
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn resolve(config: &InfluencerConfig, body_count: usize, sun_indices: [usize; 2]) -> Self {
        let indices = match config {
            InfluencerConfig::Suns => sun_indices.to_vec(),
            InfluencerConfig::All => (0..body_count).collect(),
            InfluencerConfig::Bodies(indices) => indices.clone(),
        };
        Self { indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// A source of acceleration on bodies.
pub trait ForceModel: Send + Sync {
    /// Net acceleration on body `idx` (mass `mass`) if it were at `position`.
    ///
    /// Other bodies are read as they are in `bodies`; only members of
    /// `influencers` that are not merged and not `idx` itself contribute.
    fn acceleration(
        &self,
        idx: usize,
        mass: f64,
        position: Vec2,
        bodies: &[Body],
        influencers: &InfluencerSet,
    ) -> Vec2;
}

/// Pairwise Newtonian attraction with a hard zero-force core.
#[derive(Debug, Clone, Copy)]
pub struct NewtonianGravity {
    pub gravity_strength: f64,
    pub singularity_epsilon: f64,
}

impl NewtonianGravity {
    pub fn new(gravity_strength: f64, singularity_epsilon: f64) -> Self {
        Self { gravity_strength, singularity_epsilon }
    }

    pub fn from_params(params: &SimParams) -> Self {
        Self::new(params.gravity_strength, params.singularity_epsilon)
    }
}

impl ForceModel for NewtonianGravity {
    fn acceleration(
        &self,
        idx: usize,
        mass: f64,
        position: Vec2,
        bodies: &[Body],
        influencers: &InfluencerSet,
    ) -> Vec2 {
        let mut accel = Vec2::zero();
        for &other_idx in influencers.indices() {
            if other_idx == idx {
                continue;
            }
            let Some(other) = bodies.get(other_idx) else { continue };
            if other.merged {
                continue;
            }
            let d = other.position() - position;
            let dsq = d.length_squared();
            let dr = dsq.sqrt();
            if dr == 0.0 {
                continue;
            }
            // The "acceleration" carries the target's own mass as well.
            let force = if dsq > self.singularity_epsilon {
                self.gravity_strength * mass * other.mass() / dsq
            } else {
                0.0
            };
            accel += d * (force / dr);
        }
        accel
    }
}
