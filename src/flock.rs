use crate::agent::{Agent, FlockState};
use crate::kernel;
use anyhow::Result;
use flock_common::{AgentPose, FlockConfig, FlockParams, Snapshot, Vec2};
use log::{debug, info};
use rand::distr::Uniform;
use rand::prelude::*;
use rayon::prelude::*;

/// Locomotion state of the flock as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locomotion {
    Stopped,
    Moving,
}

/// Owns the agent collection and orchestrates simulation steps.
///
/// One step is a single rayon pass mapping the per-agent kernel over the
/// pre-step snapshot into a separate output buffer, swapped in once every
/// agent has been processed. The configuration is read-only while a step is
/// in flight and may be hot-swapped between steps.
pub struct Flock {
    config: FlockConfig,
    params: FlockParams,
    state: FlockState,
    /// Host RNG for spawn and reset placement, seeded from the config.
    rng: StdRng,
    locomotion: Locomotion,
    current_step: u32,
    recorded_snapshots: Vec<Snapshot>,
}

impl Flock {
    /// Builds a flock from a validated configuration, spawning `count`
    /// agents at randomized positions and headings.
    pub fn new(config: FlockConfig) -> Result<Self> {
        config.validate()?;
        let params = config.get_params();
        let mut rng = StdRng::seed_from_u64(config.flock.spawn_seed);
        let agents = spawn_agents(&params, &mut rng)?;
        debug!("Spawned {} agents in a {}x{} world", agents.len(), params.world_width, params.world_height);

        let mut flock = Self {
            config,
            params,
            state: FlockState::new(agents),
            rng,
            locomotion: Locomotion::Stopped,
            current_step: 0,
            recorded_snapshots: Vec::new(),
        };
        if flock.config.flock.start_moving {
            flock.set_moving(true);
        }
        Ok(flock)
    }

    /// Advances the simulation by one tick. While stopped this is a no-op:
    /// velocities stay frozen at zero and positions do not drift.
    pub fn step(&mut self) {
        if self.locomotion == Locomotion::Stopped {
            return;
        }

        let params = &self.params;
        let (snapshot, output) = self.state.buffers();
        output
            .par_iter_mut()
            .enumerate()
            .for_each(|(index, out)| {
                *out = kernel::step_agent(index, snapshot, params);
            });
        self.state.swap_buffers();
        self.current_step += 1;
    }

    /// Accelerate/stop transition. Accelerating relaunches every agent along
    /// its heading at its remembered speed; stopping saves the speed and
    /// zeroes the velocity. Redundant transitions are no-ops.
    pub fn set_moving(&mut self, moving: bool) {
        match (self.locomotion, moving) {
            (Locomotion::Stopped, true) => {
                for agent in self.state.agents_mut() {
                    agent.accelerate();
                }
                self.locomotion = Locomotion::Moving;
                debug!("Flock accelerated at step {}", self.current_step);
            }
            (Locomotion::Moving, false) => {
                for agent in self.state.agents_mut() {
                    agent.stop();
                }
                self.locomotion = Locomotion::Stopped;
                debug!("Flock stopped at step {}", self.current_step);
            }
            _ => {}
        }
    }

    pub fn is_moving(&self) -> bool {
        self.locomotion == Locomotion::Moving
    }

    /// Re-randomizes every agent's position and heading, preserving the
    /// locomotion state. A moving flock keeps moving: velocities are
    /// immediately re-derived from the new headings.
    pub fn reset(&mut self) -> Result<()> {
        let x_dist = Uniform::new(0.0f32, self.params.world_width)?;
        let y_dist = Uniform::new(0.0f32, self.params.world_height)?;
        let heading_dist = Uniform::new(0.0f32, std::f32::consts::TAU)?;

        let moving = self.locomotion == Locomotion::Moving;
        for agent in self.state.agents_mut() {
            agent.position = Vec2::new(self.rng.sample(x_dist), self.rng.sample(y_dist));
            agent.heading = self.rng.sample(heading_dist);
            if moving {
                agent.accelerate();
            }
        }
        info!("Reset {} agents", self.state.len());
        Ok(())
    }

    /// Hot-swaps the configuration, effective on the next step. World
    /// extents and the agent count are fixed for the flock's lifetime, so a
    /// config changing either is rejected.
    pub fn update_config(&mut self, config: FlockConfig) -> Result<()> {
        config.validate()?;
        if config.world.width != self.config.world.width
            || config.world.height != self.config.world.height
        {
            anyhow::bail!("world extents are fixed for the flock's lifetime");
        }
        if config.flock.count != self.config.flock.count {
            anyhow::bail!("agent count is fixed for the flock's lifetime");
        }
        self.params = config.get_params();
        // Geometry scale applies to the live agents right away.
        for agent in self.state.agents_mut() {
            agent.scale = self.params.boid_scale;
        }
        self.config = config;
        debug!("Configuration updated at step {}", self.current_step);
        Ok(())
    }

    /// Read-only pose view for the rendering collaborator.
    pub fn agent_snapshot(&self) -> Vec<AgentPose> {
        self.state
            .agents()
            .iter()
            .map(|agent| AgentPose {
                position: agent.position,
                heading: agent.heading,
                scale: agent.scale,
            })
            .collect()
    }

    /// Collects flock metrics (and optionally full poses) as a timestamped
    /// snapshot. Called by the runner at record intervals.
    pub fn record_snapshot(&mut self) {
        let agents = self.state.agents();
        let n = agents.len() as f32;
        let mean_speed = agents.iter().map(|a| a.velocity.length()).sum::<f32>() / n;
        let polarization = agents
            .iter()
            .fold(Vec2::zero(), |sum, a| sum.add(a.velocity.normalize_or_zero()))
            .length()
            / n;

        let poses = if self.config.output.save_poses_in_snapshot {
            Some(self.agent_snapshot())
        } else {
            None
        };

        let time = self.current_step as f32 * self.params.dt;
        debug!("Recording snapshot at t={time:.2}: mean_speed={mean_speed:.2}, polarization={polarization:.3}");
        self.recorded_snapshots.push(Snapshot {
            time,
            agent_count: agents.len() as u32,
            mean_speed,
            polarization,
            poses,
        });
    }

    pub fn recorded_snapshots(&self) -> &[Snapshot] {
        &self.recorded_snapshots
    }

    /// Current agent states (the snapshot the next step will read).
    pub fn agents(&self) -> &[Agent] {
        self.state.agents()
    }

    pub fn agent_count(&self) -> usize {
        self.state.len()
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }

    pub fn params(&self) -> &FlockParams {
        &self.params
    }

    pub fn config(&self) -> &FlockConfig {
        &self.config
    }
}

/// Places the initial agents uniformly over the world with randomized
/// headings. Velocities start at zero (the flock is built stopped); the
/// remembered speed starts at the bottom of the envelope.
fn spawn_agents(params: &FlockParams, rng: &mut StdRng) -> Result<Vec<Agent>> {
    let x_dist = Uniform::new(0.0f32, params.world_width)?;
    let y_dist = Uniform::new(0.0f32, params.world_height)?;
    let heading_dist = Uniform::new(0.0f32, std::f32::consts::TAU)?;

    let mut agents = Vec::with_capacity(params.count as usize);
    for _ in 0..params.count {
        agents.push(Agent {
            position: Vec2::new(rng.sample(x_dist), rng.sample(y_dist)),
            velocity: Vec2::zero(),
            heading: rng.sample(heading_dist),
            speed: params.speed_min,
            scale: params.boid_scale,
        });
    }
    Ok(agents)
}
