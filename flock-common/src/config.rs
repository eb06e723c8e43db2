use crate::params::FlockParams;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// World extents, fixed for the lifetime of a flock
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WorldConfig {
    pub width: f32,
    pub height: f32,
}

// Timing for the headless runner
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub dt: f32,
    pub total_time: f32,
    pub record_interval: f32,
}

// Agent population and speed envelope
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FlockSettings {
    pub count: u32,
    #[serde(default = "default_boid_scale")]
    pub boid_scale: f32,
    pub speed_min: f32,
    pub speed_max: f32,
    #[serde(default)]
    pub start_moving: bool,
    #[serde(default = "default_spawn_seed")]
    pub spawn_seed: u64,
}

/// One independently toggleable flocking rule.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RuleConfig {
    pub active: bool,
    pub range: f32,
    pub factor: f32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RulesConfig {
    pub separation: RuleConfig,
    pub alignment: RuleConfig,
    pub cohesion: RuleConfig,
}

// Boundary policy: per-axis position handling plus margin-based wall steering
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct BoundaryConfig {
    /// Master toggle for position wrap/clamp (wall steering is gated per axis).
    #[serde(default = "default_true")]
    pub position_handling: bool,
    pub cyclic_x: bool,
    pub cyclic_y: bool,
    pub wall_active_x: bool,
    pub wall_active_y: bool,
    pub margin: f32,
    pub turn_factor: f32,
}

// Output settings for the headless runner
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_poses: bool,
    pub save_stats: bool,
    #[serde(default)]
    pub save_poses_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

fn default_boid_scale() -> f32 {
    2.0
}

fn default_spawn_seed() -> u64 {
    42
}

fn default_true() -> bool {
    true
}

/// Main flock configuration, loaded from a TOML file and validated before
/// any simulation state is built.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FlockConfig {
    pub world: WorldConfig,
    pub timing: TimingConfig,
    pub flock: FlockSettings,
    pub rules: RulesConfig,
    pub boundary: BoundaryConfig,
    pub output: OutputConfig,
}

impl Default for FlockConfig {
    // Stock parameter set: a large flock in a screen-sized world.
    fn default() -> Self {
        FlockConfig {
            world: WorldConfig { width: 1900.0, height: 1000.0 },
            timing: TimingConfig {
                dt: 1.0 / 30.0,
                total_time: 30.0,
                record_interval: 1.0,
            },
            flock: FlockSettings {
                count: 1000,
                boid_scale: 2.0,
                speed_min: 200.0,
                speed_max: 400.0,
                start_moving: false,
                spawn_seed: 42,
            },
            rules: RulesConfig {
                separation: RuleConfig { active: true, range: 15.0, factor: 2.0 },
                alignment: RuleConfig { active: true, range: 100.0, factor: 0.10 },
                cohesion: RuleConfig { active: true, range: 200.0, factor: 0.05 },
            },
            boundary: BoundaryConfig {
                position_handling: true,
                cyclic_x: false,
                cyclic_y: false,
                wall_active_x: true,
                wall_active_y: true,
                margin: 100.0,
                turn_factor: 20.0,
            },
            output: OutputConfig {
                base_filename: "flock".to_string(),
                save_poses: true,
                save_stats: true,
                save_poses_in_snapshot: false,
                format: None,
            },
        }
    }
}

impl FlockConfig {
    /// Loads and validates the flock configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: FlockConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects invalid configurations outright. Nothing here is silently
    /// clamped; a flock is never built from a config that fails validation.
    pub fn validate(&self) -> Result<()> {
        if !(self.world.width > 0.0) || !(self.world.height > 0.0) {
            anyhow::bail!(
                "world extents must be positive (got {} x {})",
                self.world.width,
                self.world.height
            );
        }
        if !(self.timing.dt > 0.0) {
            anyhow::bail!("dt must be positive (got {})", self.timing.dt);
        }
        if self.flock.count == 0 {
            anyhow::bail!("count must be greater than 0");
        }
        if !self.flock.speed_min.is_finite() || !self.flock.speed_max.is_finite() {
            anyhow::bail!("speed bounds must be finite");
        }
        if self.flock.speed_min < 0.0 {
            anyhow::bail!("speed_min must be non-negative (got {})", self.flock.speed_min);
        }
        if self.flock.speed_min > self.flock.speed_max {
            anyhow::bail!(
                "speed_min ({}) must not exceed speed_max ({})",
                self.flock.speed_min,
                self.flock.speed_max
            );
        }
        for (name, rule) in [
            ("separation", &self.rules.separation),
            ("alignment", &self.rules.alignment),
            ("cohesion", &self.rules.cohesion),
        ] {
            if rule.range < 0.0 {
                anyhow::bail!("{} range must be non-negative (got {})", name, rule.range);
            }
        }
        if self.boundary.margin < 0.0 {
            anyhow::bail!("boundary margin must be non-negative (got {})", self.boundary.margin);
        }
        Ok(())
    }

    /// Flattens the configuration into the runtime parameter struct.
    pub fn get_params(&self) -> FlockParams {
        FlockParams {
            world_width: self.world.width,
            world_height: self.world.height,
            dt: self.timing.dt,
            count: self.flock.count,
            boid_scale: self.flock.boid_scale,
            speed_min: self.flock.speed_min,
            speed_max: self.flock.speed_max,
            separation_active: self.rules.separation.active,
            separation_range: self.rules.separation.range,
            separation_factor: self.rules.separation.factor,
            alignment_active: self.rules.alignment.active,
            alignment_range: self.rules.alignment.range,
            alignment_factor: self.rules.alignment.factor,
            cohesion_active: self.rules.cohesion.active,
            cohesion_range: self.rules.cohesion.range,
            cohesion_factor: self.rules.cohesion.factor,
            position_handling: self.boundary.position_handling,
            cyclic_x: self.boundary.cyclic_x,
            cyclic_y: self.boundary.cyclic_y,
            wall_active_x: self.boundary.wall_active_x,
            wall_active_y: self.boundary.wall_active_y,
            margin: self.boundary.margin,
            turn_factor: self.boundary.turn_factor,
        }
    }
}
