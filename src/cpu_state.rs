use crate::body::{Body, BodyState};
use crate::forces::InfluencerSet;
use crate::trail::TrailGrid;
use anyhow::Result;
use gravity_common::{SimParams, SimulationConfig};

/// Holds the simulation state on the CPU.
#[derive(Debug)]
pub struct CpuState {
    pub params: SimParams,

    /// The full body collection, insertion order preserved. Merged bodies stay in place.
    pub bodies: Vec<Body>,
    /// Integration output for the current tick (one entry per body).
    /// Written in parallel from `bodies`, then committed in one go.
    pub next_states: Vec<BodyState>,

    /// `[secondary, primary]`; the primary is the last-indexed sun.
    pub sun_indices: [usize; 2],
    pub influencers: InfluencerSet,

    /// Merge history per seed cell.
    pub trail: TrailGrid,
}

impl CpuState {
    /// Creates a new CpuState around an already-seeded body collection.
    pub fn new(bodies: Vec<Body>, sun_indices: [usize; 2], config: &SimulationConfig) -> Result<Self> {
        let sun_count = bodies.iter().filter(|b| b.is_sun).count();
        if sun_count < 2 {
            anyhow::bail!("Body collection needs two anchor suns, found {}.", sun_count);
        }
        for idx in sun_indices {
            if !bodies.get(idx).is_some_and(|b| b.is_sun) {
                anyhow::bail!("Sun index {} does not refer to a sun body.", idx);
            }
        }
        if sun_indices[0] == sun_indices[1] {
            anyhow::bail!("The two suns must be distinct bodies.");
        }

        let params = config.get_sim_params();
        let influencers = InfluencerSet::resolve(&config.physics.influencers, bodies.len(), sun_indices);
        if influencers.is_empty() {
            anyhow::bail!("No bodies are selected as gravitational sources.");
        }
        if let Some(bad) = influencers.indices().iter().find(|&&i| i >= bodies.len()) {
            anyhow::bail!("Influencer index {} is out of range for {} bodies.", bad, bodies.len());
        }
        let trail = TrailGrid::new(params.grid_width, params.grid_height);
        let next_states = bodies.iter().map(|b| b.state).collect();

        Ok(Self {
            params,
            bodies,
            next_states,
            sun_indices,
            influencers,
            trail,
        })
    }

    pub fn primary_sun(&self) -> usize {
        self.sun_indices[1]
    }

    /// Copies the integration output back into the body collection.
    pub fn commit_states(&mut self) {
        for (body, next) in self.bodies.iter_mut().zip(self.next_states.iter()) {
            body.state = *next;
        }
    }

    pub fn active_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_active()).count()
    }

    pub fn merged_count(&self) -> usize {
        self.bodies.len() - self.active_count()
    }
}
