use flock_common::{heading_vec, Vec2};

/// Per-boid simulation state.
#[derive(Debug, Clone, Copy)]
pub struct Agent {
    pub position: Vec2,
    /// Current velocity; its magnitude is the agent's speed while moving.
    pub velocity: Vec2,
    /// Kept consistent with the velocity direction whenever the flock is
    /// moving and the velocity is nonzero.
    pub heading: f32,
    /// Remembered speed magnitude, used to resume locomotion after a stop.
    pub speed: f32,
    /// Rendering geometry size; has no effect on the dynamics.
    pub scale: f32,
}

impl Agent {
    /// Relaunches the agent along its heading at the remembered speed.
    pub fn accelerate(&mut self) {
        self.velocity = heading_vec(self.heading).scale(self.speed);
    }

    /// Freezes the agent, remembering the speed it had for resumption.
    pub fn stop(&mut self) {
        self.speed = self.velocity.length();
        self.velocity = Vec2::zero();
    }
}

/// Ping-pong agent buffers for the parallel step update.
///
/// One step reads exclusively from `agents_in` (the pre-step snapshot) and
/// writes exclusively to `agents_out`; the buffers are swapped once every
/// agent has been processed, so no evaluation ever observes a partially
/// updated neighbor.
#[derive(Debug)]
pub struct FlockState {
    agents_in: Vec<Agent>,
    agents_out: Vec<Agent>,
}

impl FlockState {
    pub fn new(agents: Vec<Agent>) -> Self {
        let agents_out = agents.clone();
        Self { agents_in: agents, agents_out }
    }

    pub fn len(&self) -> usize {
        self.agents_in.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents_in.is_empty()
    }

    /// Current agent state (the snapshot the next step will read).
    pub fn agents(&self) -> &[Agent] {
        &self.agents_in
    }

    /// Mutable access to the current agent state, for transitions applied
    /// between steps (accelerate, stop, reset).
    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents_in
    }

    /// Splits the state into the immutable pre-step snapshot and the output
    /// buffer one step writes into.
    pub fn buffers(&mut self) -> (&[Agent], &mut [Agent]) {
        (&self.agents_in, &mut self.agents_out)
    }

    /// Swaps the input and output buffers after a completed step.
    pub fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.agents_in, &mut self.agents_out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn agent_at(x: f32, y: f32) -> Agent {
        Agent {
            position: Vec2::new(x, y),
            velocity: Vec2::zero(),
            heading: 0.0,
            speed: 2.0,
            scale: 1.0,
        }
    }

    #[test]
    fn accelerate_follows_heading() {
        let mut agent = agent_at(0.0, 0.0);
        agent.heading = FRAC_PI_2;
        agent.accelerate();
        assert!(agent.velocity.x.abs() < 1e-6);
        assert!((agent.velocity.y - 2.0).abs() < 1e-6);
    }

    #[test]
    fn stop_remembers_speed() {
        let mut agent = agent_at(0.0, 0.0);
        agent.velocity = Vec2::new(3.0, 4.0);
        agent.stop();
        assert_eq!(agent.velocity, Vec2::zero());
        assert!((agent.speed - 5.0).abs() < 1e-6);
    }

    #[test]
    fn swap_exchanges_buffers() {
        let mut state = FlockState::new(vec![agent_at(1.0, 1.0)]);
        state.buffers().1[0].position = Vec2::new(9.0, 9.0);
        state.swap_buffers();
        assert_eq!(state.agents()[0].position, Vec2::new(9.0, 9.0));
    }
}
