use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::command::ScheduledCommand;
use crate::sim_params::SimParams;
use crate::vecmath::Vec2;
use std::path::Path;

// Configuration for the world extent
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct WorldConfig {
    pub width: f64,
    pub height: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig { width: 900.0, height: 600.0 }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeedingMode {
    /// A (2*MX+1) x (2*MY+1) swarm launched from the world centre.
    Grid,
    /// `planet_count` bodies sprayed uniformly over the world.
    Random,
    /// One planet on a fixed orbit-like start.
    Single,
}

// Initial placement of the ordinary bodies
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SeedingConfig {
    pub mode: SeedingMode,
    pub grid_half_x: u32,
    pub grid_half_y: u32,
    /// Velocity step between neighbouring grid bodies.
    pub velocity_spacing: f64,
    /// Only used in random mode.
    pub planet_count: u32,
    pub planet_radius: f64,
    pub seed: u64,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        SeedingConfig {
            mode: SeedingMode::Grid,
            grid_half_x: 100,
            grid_half_y: 100,
            velocity_spacing: 0.01,
            planet_count: 30,
            planet_radius: 1.5,
            seed: 42,
        }
    }
}

/// Which bodies act as gravitational sources (and collision partners).
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InfluencerConfig {
    /// Only the two suns attract; ordinary bodies ignore each other.
    Suns,
    /// Every body attracts every other body. Quadratic.
    All,
    /// Explicit indices into the body collection.
    Bodies(Vec<usize>),
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Survivor absorbs the loser's mass and momentum.
    MomentumConserving,
    /// Loser is retired, survivor keeps its own mass and velocity.
    SurvivorUnchanged,
}

// Physical constants of the universe
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct PhysicsConfig {
    pub density: f64,
    pub gravity_strength: f64,
    /// Squared distances at or below this produce no force.
    pub singularity_epsilon: f64,
    pub influencers: InfluencerConfig,
    pub merge_policy: MergePolicy,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig {
            density: 0.001,
            gravity_strength: 1.0e4,
            singularity_epsilon: 1.0e-10,
            influencers: InfluencerConfig::Suns,
            merge_policy: MergePolicy::MomentumConserving,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SunConfig {
    /// Start position relative to the world centre.
    pub offset: Vec2,
    pub velocity: Vec2,
    /// Multiplies the mass of an ordinary planet.
    pub mass_multiplier: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct SunsConfig {
    /// Suns are never integrated when set.
    pub static_suns: bool,
    /// Inserted first.
    pub secondary: SunConfig,
    /// Inserted last; merges it takes part in are tagged as sun merges.
    pub primary: SunConfig,
}

impl Default for SunsConfig {
    fn default() -> Self {
        SunsConfig {
            static_suns: false,
            secondary: SunConfig {
                offset: Vec2::new(0.0, -200.0),
                velocity: Vec2::new(-15.0, 0.0),
                mass_multiplier: 500.0,
            },
            primary: SunConfig {
                offset: Vec2::new(0.0, 200.0),
                velocity: Vec2::new(15.0, 0.0),
                mass_multiplier: 250.0,
            },
        }
    }
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct TimingConfig {
    pub dt: f64,
    pub total_ticks: u64,
    pub record_interval_ticks: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig { dt: 1.0, total_ticks: 2000, record_interval_ticks: 10 }
    }
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub base_filename: String,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    pub save_snapshots: bool,
    pub save_final_positions: bool,
    pub bodies_in_snapshot: bool,
    pub trail_in_snapshot: bool,
    pub save_trail_on_exit: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: "gravity_sim".to_string(),
            format: Some("bincode".to_string()),
            save_snapshots: true,
            save_final_positions: false,
            bodies_in_snapshot: true,
            trail_in_snapshot: true,
            save_trail_on_exit: true,
        }
    }
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SimulationConfig {
    pub world: WorldConfig,
    pub seeding: SeedingConfig,
    pub physics: PhysicsConfig,
    pub suns: SunsConfig,
    pub timing: TimingConfig,
    pub output: OutputConfig,
    pub commands: Vec<ScheduledCommand>,
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.world.width > 0.0 && self.world.height > 0.0) {
            anyhow::bail!("world width and height must be positive.");
        }
        if !(self.physics.density > 0.0) {
            anyhow::bail!("density must be positive.");
        }
        if !(self.physics.gravity_strength > 0.0) {
            anyhow::bail!("gravity_strength must be positive.");
        }
        if !(self.physics.singularity_epsilon >= 0.0) {
            anyhow::bail!("singularity_epsilon must not be negative.");
        }
        if !(self.seeding.planet_radius > 0.0) {
            anyhow::bail!("planet_radius must be positive.");
        }
        if self.seeding.mode == SeedingMode::Random && self.seeding.planet_count == 0 {
            anyhow::bail!("planet_count must be greater than 0 in random seeding mode.");
        }
        if !(self.suns.primary.mass_multiplier > 0.0 && self.suns.secondary.mass_multiplier > 0.0) {
            anyhow::bail!("sun mass multipliers must be positive.");
        }
        if !(self.timing.dt > 0.0) || !self.timing.dt.is_finite() {
            anyhow::bail!("dt must be a positive finite number.");
        }
        if let InfluencerConfig::Bodies(indices) = &self.physics.influencers {
            if indices.is_empty() {
                anyhow::bail!("influencer body list must not be empty.");
            }
            let body_count = self.body_count();
            if let Some(bad) = indices.iter().find(|&&i| i >= body_count) {
                anyhow::bail!(
                    "influencer index {} is out of range for {} bodies.",
                    bad,
                    body_count
                );
            }
        }
        Ok(())
    }

    /// Number of ordinary (non-sun) bodies the seeding produces.
    pub fn planet_count(&self) -> usize {
        match self.seeding.mode {
            SeedingMode::Grid => {
                let (w, h) = self.grid_dims();
                w as usize * h as usize
            }
            SeedingMode::Random => self.seeding.planet_count as usize,
            SeedingMode::Single => 1,
        }
    }

    /// Planets plus the two suns.
    pub fn body_count(&self) -> usize {
        self.planet_count() + 2
    }

    pub fn grid_dims(&self) -> (u32, u32) {
        (2 * self.seeding.grid_half_x + 1, 2 * self.seeding.grid_half_y + 1)
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let (grid_width, grid_height) = self.grid_dims();
        SimParams {
            world_width: self.world.width,
            world_height: self.world.height,
            center: Vec2::new(self.world.width / 2.0, self.world.height / 2.0),
            grid_width,
            grid_height,
            density: self.physics.density,
            gravity_strength: self.physics.gravity_strength,
            singularity_epsilon: self.physics.singularity_epsilon,
            planet_radius: self.seeding.planet_radius,
            dt: self.timing.dt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    #[test]
    fn empty_file_uses_reference_defaults() {
        let config = SimulationConfig::from_toml_str("").unwrap();
        assert_eq!(config.world.width, 900.0);
        assert_eq!(config.seeding.mode, SeedingMode::Grid);
        assert_eq!(config.grid_dims(), (201, 201));
        assert_eq!(config.body_count(), 40_403);
        assert_eq!(config.physics.influencers, InfluencerConfig::Suns);
        assert_eq!(config.suns.primary.mass_multiplier, 250.0);
        assert_eq!(config.timing.dt, 1.0);
    }

    #[test]
    fn parses_sections_and_commands() {
        let text = r#"
            [seeding]
            mode = "random"
            planet_count = 12

            [physics]
            influencers = { bodies = [0, 13] }
            merge_policy = "survivor_unchanged"

            [suns]
            static_suns = true

            [[commands]]
            frame = 5
            command = "speed-up"

            [[commands]]
            frame = 9
            command = "save"
        "#;
        let config = SimulationConfig::from_toml_str(text).unwrap();
        assert_eq!(config.planet_count(), 12);
        assert_eq!(config.physics.influencers, InfluencerConfig::Bodies(vec![0, 13]));
        assert_eq!(config.physics.merge_policy, MergePolicy::SurvivorUnchanged);
        assert!(config.suns.static_suns);
        assert_eq!(config.commands.len(), 2);
        assert_eq!(config.commands[0].command, Command::SpeedUp);
        assert_eq!(config.commands[1].frame, 9);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(SimulationConfig::from_toml_str("[physics]\ndensity = 0.0").is_err());
        assert!(SimulationConfig::from_toml_str("[timing]\ndt = -1.0").is_err());
        assert!(SimulationConfig::from_toml_str("[seeding]\nmode = \"random\"\nplanet_count = 0").is_err());
        assert!(SimulationConfig::from_toml_str(
            "[seeding]\nmode = \"single\"\n[physics]\ninfluencers = { bodies = [3] }"
        )
        .is_err());
    }

    #[test]
    fn sim_params_derive_centre_and_grid() {
        let params = SimulationConfig::default().get_sim_params();
        assert_eq!(params.center, Vec2::new(450.0, 300.0));
        assert_eq!((params.grid_width, params.grid_height), (201, 201));
    }
}
