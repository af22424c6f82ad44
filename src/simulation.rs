use crate::body::{mass_from_radius, Body, BodyState};
use crate::collisions::{resolve_collisions, MergeEvent, MergeRules};
use crate::control::ViewState;
use crate::cpu_state::CpuState;
use crate::forces::NewtonianGravity;
use crate::grid::SeedGrid;
use crate::integrator::rk4_step;
use anyhow::Result;
use gravity_common::{
    BodySnapshot, SeedingMode, SimParams, SimulationConfig, Snapshot, TrailImage, Vec2,
};
use log::{debug, info, trace};
use rand::distr::Uniform;
use rand::prelude::*;
use rayon::prelude::*;
use std::path::Path;

/// Manages the state and execution of the gravity simulation on the CPU.
pub struct GravitySimulation {
    /// The simulation configuration, including initial conditions and parameters.
    pub config: SimulationConfig,
    /// The simulation state stored in CPU memory.
    pub state: CpuState,
    /// RNG used by random seeding; reseeded on reset.
    pub rng: StdRng,
    /// Number of completed ticks.
    pub current_time_step: u64,
    time: f64,
    force: NewtonianGravity,
    merge_rules: MergeRules,
    total_merges: usize,
    /// Stores collected simulation data snapshots at record intervals.
    recorded_snapshots: Vec<Snapshot>,
}

impl GravitySimulation {
    /// Creates a new `GravitySimulation`, seeding the bodies and the two suns.
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seeding.seed);

        let (bodies, sun_indices) = place_initial_bodies(&config, &mut rng)?;
        let state = CpuState::new(bodies, sun_indices, &config)?;
        let force = NewtonianGravity::from_params(&state.params);
        let merge_rules = MergeRules {
            policy: config.physics.merge_policy,
            density: state.params.density,
            primary_sun: state.primary_sun(),
        };
        debug!(
            "Seeded {} bodies, suns at {:?}, {} influencers.",
            state.bodies.len(),
            state.sun_indices,
            state.influencers.len()
        );

        Ok(Self {
            config,
            state,
            rng,
            current_time_step: 0,
            time: 0.0,
            force,
            merge_rules,
            total_merges: 0,
            recorded_snapshots: Vec::new(),
        })
    }

    /// Throws away all bodies and merge history and starts over from the configuration.
    /// Recorded snapshots are kept.
    pub fn reset(&mut self) -> Result<()> {
        let recorded = std::mem::take(&mut self.recorded_snapshots);
        *self = Self::new(self.config.clone())?;
        self.recorded_snapshots = recorded;
        info!("Simulation reset ({} bodies).", self.state.bodies.len());
        Ok(())
    }

    /// Advances the simulation by one tick: integrate every free body, then resolve merges.
    pub fn step(&mut self) -> Vec<MergeEvent> {
        self.current_time_step += 1;
        self.time += self.state.params.dt;

        // --- 1. Integrate (Parallel, reads only the previous tick) ---
        self.integrate_parallel();
        self.state.commit_states();

        // --- 2. Resolve merges (Serial) ---
        let events = self.resolve_merges();
        trace!("Tick {}: {} merges.", self.current_time_step, events.len());
        events
    }

    fn resolve_merges(&mut self) -> Vec<MergeEvent> {
        let state = &mut self.state;
        let events = resolve_collisions(
            &mut state.bodies,
            &state.influencers,
            &self.merge_rules,
            self.current_time_step,
            &mut state.trail,
        );
        self.total_merges += events.len();
        events
    }

    fn integrate_parallel(&mut self) {
        let static_suns = self.config.suns.static_suns;
        let t = self.time;
        let dt = self.state.params.dt;
        let force = &self.force;
        let state = &mut self.state;
        let bodies = &state.bodies;
        let influencers = &state.influencers;

        state.next_states
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, next)| {
                let body = &bodies[idx];
                *next = if is_frozen(body, static_suns) {
                    body.state
                } else {
                    rk4_step(idx, bodies, influencers, force, t, dt)
                };
            });
    }

    /// Doubles the timestep. Takes effect on the next tick.
    pub fn speed_up(&mut self) {
        self.state.params.dt *= 2.0;
        info!("dt = {}", self.state.params.dt);
    }

    /// Halves the timestep. Takes effect on the next tick.
    pub fn speed_down(&mut self) {
        self.state.params.dt /= 2.0;
        info!("dt = {}", self.state.params.dt);
    }

    pub fn dt(&self) -> f64 {
        self.state.params.dt
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn bodies(&self) -> &[Body] {
        &self.state.bodies
    }

    pub fn active_count(&self) -> usize {
        self.state.active_count()
    }

    pub fn merged_count(&self) -> usize {
        self.state.merged_count()
    }

    pub fn total_merges(&self) -> usize {
        self.total_merges
    }

    /// Total momentum of the bodies that can still move.
    pub fn total_momentum(&self) -> Vec2 {
        let static_suns = self.config.suns.static_suns;
        self.state
            .bodies
            .iter()
            .filter(|b| !is_frozen(b, static_suns))
            .fold(Vec2::zero(), |acc, b| acc + b.momentum())
    }

    pub fn params(&self) -> &SimParams {
        &self.state.params
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Read-only view of every body, for drawing.
    pub fn body_snapshots(&self) -> Vec<BodySnapshot> {
        self.state.bodies.iter().map(Body::snapshot).collect()
    }

    /// The trail grid after log-normalization, one RGB pixel per seed cell.
    pub fn trail_image(&self) -> TrailImage {
        self.state.trail.image()
    }

    pub fn save_trail_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.state.trail.save_png(path)
    }

    /// Captures the current state and stores it as a Snapshot.
    pub fn snapshot(&self, view: &ViewState) -> Snapshot {
        let output = &self.config.output;
        Snapshot {
            tick: self.current_time_step,
            time: self.time,
            dt: self.state.params.dt,
            zoom: view.zoom,
            show_trails: view.show_trails,
            active_count: self.active_count() as u32,
            merged_count: self.merged_count() as u32,
            bodies: output.bodies_in_snapshot.then(|| self.body_snapshots()),
            trail: output.trail_in_snapshot.then(|| self.trail_image()),
        }
    }

    pub fn record_snapshot(&mut self, view: &ViewState) {
        debug!("Recording snapshot at tick {} (t = {:.2})...", self.current_time_step, self.time);
        let snapshot = self.snapshot(view);
        self.recorded_snapshots.push(snapshot);
    }

    /// Provides access to the recorded snapshots.
    pub fn get_recorded_snapshots(&self) -> &Vec<Snapshot> {
        &self.recorded_snapshots
    }
}

/// Frozen bodies are skipped by the integrator.
fn is_frozen(body: &Body, static_suns: bool) -> bool {
    body.merged || (static_suns && body.is_sun)
}

/// Seeds the ordinary bodies per the configured mode, then appends the
/// secondary and primary suns (in that order, so the primary is last).
fn place_initial_bodies(
    config: &SimulationConfig,
    rng: &mut StdRng,
) -> Result<(Vec<Body>, [usize; 2])> {
    let params = config.get_sim_params();
    let density = params.density;
    let radius = params.planet_radius;

    let mut bodies = match config.seeding.mode {
        SeedingMode::Grid => {
            let grid = SeedGrid::from_config(config);
            grid.cells()
                .map(|cell| {
                    let state = BodyState::new(params.center, grid.launch_velocity(cell));
                    let mut body = Body::with_radius(state, radius, density);
                    body.origin_cell = Some(cell);
                    body
                })
                .collect::<Vec<_>>()
        }
        SeedingMode::Random => {
            let count = config.seeding.planet_count as usize;
            let x_dist = Uniform::new_inclusive(0u32, params.world_width as u32)?;
            let y_dist = Uniform::new_inclusive(0u32, params.world_height as u32)?;
            let v_dist = Uniform::new_inclusive(0u32, 300u32)?;
            (0..count)
                .map(|_| {
                    let position = Vec2::new(rng.sample(&x_dist) as f64, rng.sample(&y_dist) as f64);
                    let velocity = Vec2::new(
                        rng.sample(&v_dist) as f64 / 100.0 - 1.5,
                        rng.sample(&v_dist) as f64 / 100.0 - 1.5,
                    );
                    Body::with_radius(BodyState::new(position, velocity), radius, density)
                })
                .collect()
        }
        SeedingMode::Single => {
            let state = BodyState::new(Vec2::new(150.0, 300.0), Vec2::new(0.0, 2.0));
            vec![Body::with_radius(state, radius, density)]
        }
    };

    let planet_mass = mass_from_radius(radius, density);
    let mut sun_indices = [0usize; 2];
    for (slot, sun) in [&config.suns.secondary, &config.suns.primary].into_iter().enumerate() {
        let state = BodyState::new(params.center + sun.offset, sun.velocity);
        let mut body = Body::with_mass(state, planet_mass * sun.mass_multiplier, density);
        body.is_sun = true;
        sun_indices[slot] = bodies.len();
        bodies.push(body);
    }

    Ok((bodies, sun_indices))
}
