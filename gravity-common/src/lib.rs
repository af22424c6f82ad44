pub mod command;
pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use command::{Command, ScheduledCommand};
pub use config::{
    InfluencerConfig, MergePolicy, OutputConfig, PhysicsConfig, SeedingConfig, SeedingMode,
    SimulationConfig, SunConfig, SunsConfig, TimingConfig, WorldConfig,
};
pub use sim_params::SimParams;
pub use snapshot::{BodySnapshot, MergeCategory, Snapshot, TrailImage};
pub use vecmath::Vec2;
