//! Boid flocking simulation core.
//!
//! Agents follow three independently toggleable local rules (separation,
//! alignment, cohesion) plus a boundary policy, updated once per tick from
//! an immutable pre-step snapshot. Rendering and input are collaborator
//! concerns; this crate exposes agent poses and recorded snapshots only.

pub mod agent;
pub mod flock;
pub mod kernel;

pub use agent::{Agent, FlockState};
pub use flock::{Flock, Locomotion};
pub use flock_common::{AgentPose, FlockConfig, FlockParams, Snapshot, Vec2};
