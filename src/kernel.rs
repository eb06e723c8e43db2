//! Per-agent step kernel: neighbor scan, rule accumulation, velocity
//! synthesis, speed-envelope clamping and boundary handling.
//!
//! Every function here reads only the immutable pre-step snapshot, so the
//! controller is free to evaluate agents serially or as a rayon batch; both
//! strategies run the exact same arithmetic.

use crate::agent::Agent;
use flock_common::{clamp, heading_of, heading_vec, FlockParams, Vec2};

/// Raw per-rule sums from one agent's neighbor scan, not yet normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RuleAccumulators {
    /// Separation: sum of (self - other) over close neighbors.
    pub close_offset: Vec2,
    /// Alignment: sum of neighbor velocities and their count.
    pub velocity_sum: Vec2,
    pub align_neighbors: u32,
    /// Cohesion: sum of neighbor positions and their count.
    pub position_sum: Vec2,
    pub cohesion_neighbors: u32,
}

/// Scans every other agent once and accumulates the sums for all active
/// rules, gated by each rule's range with a strict `<` threshold on the
/// plain Euclidean distance. The agent itself never contributes, and
/// inactive rules are skipped entirely rather than zero-weighted.
pub fn scan_neighbors(
    index: usize,
    position: Vec2,
    agents: &[Agent],
    params: &FlockParams,
) -> RuleAccumulators {
    let mut acc = RuleAccumulators::default();
    for (other_index, other) in agents.iter().enumerate() {
        if other_index == index {
            continue;
        }
        let dist = position.distance(other.position);
        if params.separation_active && dist < params.separation_range {
            acc.close_offset = acc.close_offset.add(position.sub(other.position));
        }
        if params.alignment_active && dist < params.alignment_range {
            acc.velocity_sum = acc.velocity_sum.add(other.velocity);
            acc.align_neighbors += 1;
        }
        if params.cohesion_active && dist < params.cohesion_range {
            acc.position_sum = acc.position_sum.add(other.position);
            acc.cohesion_neighbors += 1;
        }
    }
    acc
}

/// Constant-magnitude steering nudge near world edges, evaluated per axis.
/// The low-margin branch wins when `margin >= extent / 2` makes both sides
/// reachable at once.
pub fn wall_steering(position: Vec2, params: &FlockParams) -> Vec2 {
    let mut nudge = Vec2::zero();
    if params.wall_active_x {
        if position.x < params.margin {
            nudge.x = params.turn_factor;
        } else if position.x > params.world_width - params.margin {
            nudge.x = -params.turn_factor;
        }
    }
    if params.wall_active_y {
        if position.y < params.margin {
            nudge.y = params.turn_factor;
        } else if position.y > params.world_height - params.margin {
            nudge.y = -params.turn_factor;
        }
    }
    nudge
}

/// Combines the rule accumulators and the wall nudge into one velocity
/// delta, then clamps the resultant speed into the configured envelope.
/// Returns the new velocity, heading and remembered speed.
pub fn synthesize_velocity(
    velocity: Vec2,
    heading: f32,
    position: Vec2,
    acc: &RuleAccumulators,
    wall: Vec2,
    params: &FlockParams,
) -> (Vec2, f32, f32) {
    let mut delta = wall;

    // Separation is proportional to neighbor count and proximity: the raw
    // offset sum is scaled, never averaged.
    if params.separation_active {
        delta = delta.add(acc.close_offset.scale(params.separation_factor));
    }
    if params.alignment_active && acc.align_neighbors > 0 {
        let mean_velocity = acc.velocity_sum.scale(1.0 / acc.align_neighbors as f32);
        delta = delta.add(mean_velocity.sub(velocity).scale(params.alignment_factor));
    }
    if params.cohesion_active && acc.cohesion_neighbors > 0 {
        let centroid = acc.position_sum.scale(1.0 / acc.cohesion_neighbors as f32);
        delta = delta.add(centroid.sub(position).scale(params.cohesion_factor));
    }

    clamp_to_envelope(velocity.add(delta), heading, params)
}

/// Direction-preserving clamp of the proposed velocity into
/// `[speed_min, speed_max]`. Returns `(velocity, heading, speed)`, with the
/// heading re-derived from the clamped velocity whenever it is nonzero.
///
/// Rescaling uses the exact `target / speed` ratio, so any nonzero proposed
/// vector keeps its direction no matter how small its magnitude. Only a
/// truly zero vector has no direction to rescale along; that agent is
/// relaunched along its previous heading at `speed_min` (and stays at rest
/// when `speed_min` is zero).
pub fn clamp_to_envelope(proposed: Vec2, heading: f32, params: &FlockParams) -> (Vec2, f32, f32) {
    let speed = proposed.length();
    let (velocity, new_speed) = if speed >= params.speed_max {
        if speed > 0.0 {
            (proposed.scale(params.speed_max / speed), params.speed_max)
        } else {
            // speed == 0 here means speed_max (and thus speed_min) is zero.
            (proposed, 0.0)
        }
    } else if speed < params.speed_min {
        if speed > 0.0 {
            (proposed.scale(params.speed_min / speed), params.speed_min)
        } else {
            (heading_vec(heading).scale(params.speed_min), params.speed_min)
        }
    } else {
        (proposed, speed)
    };
    let new_heading = if velocity.length_squared() > 0.0 {
        heading_of(velocity)
    } else {
        heading
    };
    (velocity, new_heading, new_speed)
}

/// Per-axis position handling applied to the integrated position: a cyclic
/// axis teleports across the world (`>= extent` wraps to 0, `<= 0` wraps to
/// the extent), a non-cyclic axis clamps to `[0, extent]` without touching
/// the velocity.
pub fn apply_position_handling(mut position: Vec2, params: &FlockParams) -> Vec2 {
    if !params.position_handling {
        return position;
    }
    if params.cyclic_x {
        if position.x >= params.world_width {
            position.x = 0.0;
        } else if position.x <= 0.0 {
            position.x = params.world_width;
        }
    } else {
        position.x = clamp(position.x, 0.0, params.world_width);
    }
    if params.cyclic_y {
        if position.y >= params.world_height {
            position.y = 0.0;
        } else if position.y <= 0.0 {
            position.y = params.world_height;
        }
    } else {
        position.y = clamp(position.y, 0.0, params.world_height);
    }
    position
}

/// One agent's full step pipeline against the pre-step snapshot: neighbor
/// scan, velocity synthesis, free-flight integration, then boundary
/// position handling on the integrated position. Folding the wrap at the
/// tail of the step (rather than the head of the next one) keeps every
/// position a scan reads already wrapped, and makes "position in bounds"
/// an unconditional post-step invariant.
pub fn step_agent(index: usize, agents: &[Agent], params: &FlockParams) -> Agent {
    let agent = agents[index];

    let anything_active = params.separation_active
        || params.alignment_active
        || params.cohesion_active
        || params.wall_active_x
        || params.wall_active_y;

    // With nothing active the step degenerates to free flight: the velocity
    // is carried over untouched, without even the envelope clamp.
    let (velocity, heading, speed) = if anything_active {
        let acc = scan_neighbors(index, agent.position, agents, params);
        let wall = wall_steering(agent.position, params);
        synthesize_velocity(agent.velocity, agent.heading, agent.position, &acc, wall, params)
    } else {
        (agent.velocity, agent.heading, agent.speed)
    };

    debug_assert!(
        velocity.x.is_finite() && velocity.y.is_finite(),
        "non-finite velocity for agent {index}"
    );

    let integrated = agent.position.add(velocity.scale(params.dt));
    let position = apply_position_handling(integrated, params);

    Agent { position, velocity, heading, speed, scale: agent.scale }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> FlockParams {
        FlockParams {
            world_width: 1000.0,
            world_height: 1000.0,
            dt: 1.0,
            count: 2,
            boid_scale: 1.0,
            speed_min: 0.0,
            speed_max: 1000.0,
            separation_active: false,
            separation_range: 0.0,
            separation_factor: 0.0,
            alignment_active: false,
            alignment_range: 0.0,
            alignment_factor: 0.0,
            cohesion_active: false,
            cohesion_range: 0.0,
            cohesion_factor: 0.0,
            position_handling: true,
            cyclic_x: false,
            cyclic_y: false,
            wall_active_x: false,
            wall_active_y: false,
            margin: 0.0,
            turn_factor: 0.0,
        }
    }

    fn agent(x: f32, y: f32, vx: f32, vy: f32) -> Agent {
        Agent {
            position: Vec2::new(x, y),
            velocity: Vec2::new(vx, vy),
            heading: 0.0,
            speed: 0.0,
            scale: 1.0,
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn scan_excludes_self_and_uses_strict_threshold() {
        let mut params = base_params();
        params.separation_active = true;
        params.separation_range = 10.0;
        // Agent 1 sits exactly at the range: strictly-less means no contact.
        let agents = vec![agent(100.0, 100.0, 0.0, 0.0), agent(110.0, 100.0, 0.0, 0.0)];
        let acc = scan_neighbors(0, agents[0].position, &agents, &params);
        assert_eq!(acc.close_offset, Vec2::zero());

        // Nudge it inside and it contributes.
        let agents = vec![agent(100.0, 100.0, 0.0, 0.0), agent(109.0, 100.0, 0.0, 0.0)];
        let acc = scan_neighbors(0, agents[0].position, &agents, &params);
        assert!(approx(acc.close_offset.x, -9.0));
        assert_eq!(acc.close_offset.y, 0.0);
    }

    #[test]
    fn separation_sums_offsets_without_averaging() {
        let mut params = base_params();
        params.separation_active = true;
        params.separation_range = 10.0;
        let agents = vec![
            agent(100.0, 100.0, 0.0, 0.0),
            agent(104.0, 100.0, 0.0, 0.0),
            agent(100.0, 103.0, 0.0, 0.0),
        ];
        let acc = scan_neighbors(0, agents[0].position, &agents, &params);
        // Two neighbors, the offsets stack: (-4, 0) + (0, -3).
        assert!(approx(acc.close_offset.x, -4.0));
        assert!(approx(acc.close_offset.y, -3.0));
    }

    #[test]
    fn inactive_rules_accumulate_nothing() {
        let params = base_params();
        let agents = vec![agent(100.0, 100.0, 1.0, 0.0), agent(101.0, 100.0, 2.0, 0.0)];
        let acc = scan_neighbors(0, agents[0].position, &agents, &params);
        assert_eq!(acc, RuleAccumulators::default());
    }

    #[test]
    fn alignment_and_cohesion_are_zero_without_neighbors_in_range() {
        let mut params = base_params();
        params.alignment_active = true;
        params.alignment_range = 5.0;
        params.cohesion_active = true;
        params.cohesion_range = 5.0;
        let agents = vec![agent(0.0, 0.0, 3.0, 0.0), agent(500.0, 500.0, -7.0, 0.0)];
        let acc = scan_neighbors(0, agents[0].position, &agents, &params);
        assert_eq!(acc.align_neighbors, 0);
        assert_eq!(acc.cohesion_neighbors, 0);

        // No neighbors means no contribution at all, not a division by zero.
        let (velocity, _, _) = synthesize_velocity(
            agents[0].velocity,
            agents[0].heading,
            agents[0].position,
            &acc,
            Vec2::zero(),
            &params,
        );
        assert_eq!(velocity, Vec2::new(3.0, 0.0));
    }

    #[test]
    fn wall_steering_nudges_inside_margin() {
        let mut params = base_params();
        params.wall_active_x = true;
        params.margin = 50.0;
        params.turn_factor = 20.0;
        assert_eq!(wall_steering(Vec2::new(10.0, 500.0), &params), Vec2::new(20.0, 0.0));
        assert_eq!(wall_steering(Vec2::new(990.0, 500.0), &params), Vec2::new(-20.0, 0.0));
        assert_eq!(wall_steering(Vec2::new(500.0, 500.0), &params), Vec2::zero());
        // The y axis stays untouched while its wall is inactive.
        assert_eq!(wall_steering(Vec2::new(500.0, 10.0), &params), Vec2::zero());
    }

    #[test]
    fn wall_steering_low_branch_wins_with_oversized_margin() {
        let mut params = base_params();
        params.world_width = 100.0;
        params.wall_active_x = true;
        params.margin = 60.0;
        params.turn_factor = 5.0;
        // Both branches are reachable at x = 50; the low check has precedence.
        assert_eq!(wall_steering(Vec2::new(50.0, 500.0), &params), Vec2::new(5.0, 0.0));
    }

    #[test]
    fn envelope_clamp_is_direction_preserving() {
        let mut params = base_params();
        params.speed_min = 1.0;
        params.speed_max = 4.0;

        let (v, _, s) = clamp_to_envelope(Vec2::new(30.0, 40.0), 0.0, &params);
        assert!(approx(v.length(), 4.0));
        assert!(approx(v.x / v.y, 0.75));
        assert!(approx(s, 4.0));

        let (v, _, s) = clamp_to_envelope(Vec2::new(0.3, 0.4), 0.0, &params);
        assert!(approx(v.length(), 1.0));
        assert!(approx(s, 1.0));

        let (v, _, s) = clamp_to_envelope(Vec2::new(1.2, 1.6), 0.0, &params);
        assert_eq!(v, Vec2::new(1.2, 1.6));
        assert!(approx(s, 2.0));
    }

    #[test]
    fn near_zero_velocity_still_rescales_to_speed_min() {
        let mut params = base_params();
        params.speed_min = 2.0;
        params.speed_max = 4.0;
        // Tiny but nonzero magnitude keeps its direction and lands exactly
        // on the envelope floor, with velocity and speed in agreement.
        let (v, h, s) = clamp_to_envelope(Vec2::new(1e-7, 0.0), 0.0, &params);
        assert!(approx(v.x, 2.0));
        assert!(approx(v.y, 0.0));
        assert!(approx(v.length(), s));
        assert!(approx(s, 2.0));
        assert!(approx(h, 0.0));
    }

    #[test]
    fn degenerate_zero_velocity_relaunches_along_heading() {
        let mut params = base_params();
        params.speed_min = 2.0;
        params.speed_max = 4.0;
        let heading = std::f32::consts::FRAC_PI_2;
        let (v, h, s) = clamp_to_envelope(Vec2::zero(), heading, &params);
        assert!(approx(v.x, 0.0));
        assert!(approx(v.y, 2.0));
        assert!(approx(h, heading));
        assert!(approx(s, 2.0));
    }

    #[test]
    fn degenerate_zero_velocity_stays_at_rest_with_zero_min() {
        let params = base_params();
        let (v, h, s) = clamp_to_envelope(Vec2::zero(), 1.25, &params);
        assert_eq!(v, Vec2::zero());
        assert!(approx(h, 1.25)); // heading held, not recomputed from zero
        assert_eq!(s, 0.0);
    }

    #[test]
    fn position_handling_wraps_and_clamps_per_axis() {
        let mut params = base_params();
        params.cyclic_x = true;
        // x wraps (teleport, not reflect), y clamps.
        let p = apply_position_handling(Vec2::new(1001.0, 1005.0), &params);
        assert_eq!(p, Vec2::new(0.0, 1000.0));
        let p = apply_position_handling(Vec2::new(-3.0, -4.0), &params);
        assert_eq!(p, Vec2::new(1000.0, 0.0));

        params.position_handling = false;
        let p = apply_position_handling(Vec2::new(1001.0, -4.0), &params);
        assert_eq!(p, Vec2::new(1001.0, -4.0));
    }

    #[test]
    fn free_flight_skips_synthesis_entirely() {
        let params = base_params();
        let agents = vec![agent(100.0, 100.0, 3.0, -2.0), agent(101.0, 100.0, 0.0, 0.0)];
        let stepped = step_agent(0, &agents, &params);
        // Velocity untouched (no envelope clamp either), position integrated.
        assert_eq!(stepped.velocity, Vec2::new(3.0, -2.0));
        assert_eq!(stepped.position, Vec2::new(103.0, 98.0));
    }

    /// Straightforward scalar reference loop, written independently of the
    /// batch pipeline, used to pin the kernel's arithmetic.
    fn reference_velocities(agents: &[Agent], params: &FlockParams) -> Vec<Vec2> {
        let mut out = Vec::with_capacity(agents.len());
        for i in 0..agents.len() {
            let (bx, by) = (agents[i].position.x, agents[i].position.y);
            let (bvx, bvy) = (agents[i].velocity.x, agents[i].velocity.y);
            let (mut close_dx, mut close_dy) = (0.0f32, 0.0f32);
            let (mut xvel_avg, mut yvel_avg, mut n_align) = (0.0f32, 0.0f32, 0u32);
            let (mut xpos_avg, mut ypos_avg, mut n_coh) = (0.0f32, 0.0f32, 0u32);
            for j in 0..agents.len() {
                if i == j {
                    continue;
                }
                let (ox, oy) = (agents[j].position.x, agents[j].position.y);
                let d = ((bx - ox).powi(2) + (by - oy).powi(2)).sqrt();
                if params.separation_active && d < params.separation_range {
                    close_dx += bx - ox;
                    close_dy += by - oy;
                }
                if params.alignment_active && d < params.alignment_range {
                    xvel_avg += agents[j].velocity.x;
                    yvel_avg += agents[j].velocity.y;
                    n_align += 1;
                }
                if params.cohesion_active && d < params.cohesion_range {
                    xpos_avg += ox;
                    ypos_avg += oy;
                    n_coh += 1;
                }
            }
            let (mut vx, mut vy) = (bvx, bvy);
            if params.separation_active {
                vx += close_dx * params.separation_factor;
                vy += close_dy * params.separation_factor;
            }
            if n_align > 0 {
                vx += (xvel_avg / n_align as f32 - bvx) * params.alignment_factor;
                vy += (yvel_avg / n_align as f32 - bvy) * params.alignment_factor;
            }
            if n_coh > 0 {
                vx += (xpos_avg / n_coh as f32 - bx) * params.cohesion_factor;
                vy += (ypos_avg / n_coh as f32 - by) * params.cohesion_factor;
            }
            if params.wall_active_x {
                if bx < params.margin {
                    vx += params.turn_factor;
                } else if bx > params.world_width - params.margin {
                    vx -= params.turn_factor;
                }
            }
            if params.wall_active_y {
                if by < params.margin {
                    vy += params.turn_factor;
                } else if by > params.world_height - params.margin {
                    vy -= params.turn_factor;
                }
            }
            let speed = (vx * vx + vy * vy).sqrt();
            let scaled = if speed >= params.speed_max {
                params.speed_max / speed
            } else if speed < params.speed_min && speed > 0.0 {
                params.speed_min / speed
            } else {
                1.0
            };
            out.push(Vec2::new(vx * scaled, vy * scaled));
        }
        out
    }

    #[test]
    fn kernel_matches_reference_loop_within_tolerance() {
        let mut params = base_params();
        params.separation_active = true;
        params.separation_range = 15.0;
        params.separation_factor = 2.0;
        params.alignment_active = true;
        params.alignment_range = 100.0;
        params.alignment_factor = 0.10;
        params.cohesion_active = true;
        params.cohesion_range = 200.0;
        params.cohesion_factor = 0.05;
        params.wall_active_x = true;
        params.wall_active_y = true;
        params.margin = 100.0;
        params.turn_factor = 20.0;
        params.speed_min = 50.0;
        params.speed_max = 300.0;

        // Deterministic pseudo-random placement, no RNG needed here.
        let agents: Vec<Agent> = (0..64)
            .map(|i| {
                let t = i as f32;
                agent(
                    (t * 157.31).rem_euclid(1000.0),
                    (t * 211.17).rem_euclid(1000.0),
                    (t * 0.37).sin() * 120.0,
                    (t * 0.53).cos() * 120.0,
                )
            })
            .collect();

        let expected = reference_velocities(&agents, &params);
        for (i, want) in expected.iter().enumerate() {
            let got = step_agent(i, &agents, &params).velocity;
            let tol = 1e-6 * want.length().max(1.0);
            assert!(
                (got.x - want.x).abs() <= tol && (got.y - want.y).abs() <= tol,
                "agent {i}: got {got:?}, want {want:?}"
            );
        }
    }
}
