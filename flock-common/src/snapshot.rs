use crate::vecmath::Vec2;
use serde::{Deserialize, Serialize};

/// Read-only agent view handed to rendering collaborators: where the boid
/// is, which way it points, and how large to draw it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentPose {
    pub position: Vec2,
    pub heading: f32,
    pub scale: f32,
}

/// A recorded snapshot of flock state and metrics at a specific time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulation time (in seconds) at which the snapshot was taken.
    pub time: f32,
    pub agent_count: u32,
    /// Mean speed over all agents.
    pub mean_speed: f32,
    /// Alignment order parameter: |sum of unit velocities| / n, in [0, 1].
    /// 1.0 means the whole flock flies in the same direction.
    pub polarization: f32,
    /// Optional: full agent poses at the snapshot time.
    /// Included only if `output.save_poses_in_snapshot` is true.
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "poses": null
    pub poses: Option<Vec<AgentPose>>,
}
