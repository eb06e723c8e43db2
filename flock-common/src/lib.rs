pub mod config;
pub mod params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    BoundaryConfig, FlockConfig, FlockSettings, OutputConfig, RuleConfig, RulesConfig,
    TimingConfig, WorldConfig,
};
pub use params::FlockParams;
pub use snapshot::{AgentPose, Snapshot};
pub use vecmath::{clamp, heading_of, heading_vec, Vec2};
