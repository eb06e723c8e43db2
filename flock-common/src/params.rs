use serde::{Deserialize, Serialize};

/// Runtime parameters derived from the configuration, read by every kernel
/// evaluation during a step. Immutable while a step is in flight; replaced
/// wholesale on a config hot-swap between steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlockParams {
    // World
    pub world_width: f32,
    pub world_height: f32,

    // Time
    pub dt: f32,

    // Agents
    pub count: u32,
    pub boid_scale: f32,
    pub speed_min: f32,
    pub speed_max: f32,

    // Flocking rules: {active, range, factor} per rule
    pub separation_active: bool,
    pub separation_range: f32,
    pub separation_factor: f32,
    pub alignment_active: bool,
    pub alignment_range: f32,
    pub alignment_factor: f32,
    pub cohesion_active: bool,
    pub cohesion_range: f32,
    pub cohesion_factor: f32,

    // Boundary policy
    pub position_handling: bool,
    pub cyclic_x: bool,
    pub cyclic_y: bool,
    pub wall_active_x: bool,
    pub wall_active_y: bool,
    pub margin: f32,
    pub turn_factor: f32,
}
