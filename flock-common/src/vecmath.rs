use serde::{Deserialize, Serialize};

/// Basic 2D vector used for positions and velocities.
#[derive(Copy, Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[inline(always)]
    pub fn new(x: f32, y: f32) -> Self { Self { x, y } }
    #[inline(always)]
    pub fn zero() -> Self { Self::new(0.0, 0.0) }
    #[inline(always)]
    pub fn length_squared(self) -> f32 { self.x * self.x + self.y * self.y }
    #[inline(always)]
    pub fn length(self) -> f32 { self.length_squared().sqrt() }
    #[inline(always)]
    pub fn distance(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
    #[inline(always)]
    pub fn add(self, other: Self) -> Self { Self::new(self.x + other.x, self.y + other.y) }
    #[inline(always)]
    pub fn sub(self, other: Self) -> Self { Self::new(self.x - other.x, self.y - other.y) }
    #[inline(always)]
    pub fn scale(self, scalar: f32) -> Self { Self::new(self.x * scalar, self.y * scalar) }

    /// Normalizes the vector, returning a zero vector if the length is zero or very small.
    pub fn normalize_or_zero(self) -> Vec2 {
        let len_sq = self.length_squared();
        if len_sq > 1e-12 {
            self.scale(1.0 / len_sq.sqrt())
        } else {
            Vec2::zero()
        }
    }
}

/// Velocity vector along a heading angle (unit length before scaling).
#[inline(always)]
pub fn heading_vec(heading: f32) -> Vec2 { Vec2::new(heading.cos(), heading.sin()) }

/// Heading angle of a velocity vector. The boid geometry points along +x at
/// heading zero, so this reduces to the usual `atan2(vy, vx)` written the way
/// the shape convention derives it.
#[inline(always)]
pub fn heading_of(velocity: Vec2) -> f32 {
    (-velocity.x).atan2(velocity.y) + std::f32::consts::FRAC_PI_2
}

#[inline(always)]
pub fn clamp(val: f32, min: f32, max: f32) -> f32 { val.max(min).min(max) }
