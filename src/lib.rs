//! Drift Circuit - a procedurally generated 2D driving simulation
//!
//! Core modules:
//! - `sim`: Deterministic simulation (track generation, car physics, collisions)
//! - `color`: RGB color values used for wall gradients and sensor output
//! - `render`: Renderer capability trait plus an SVG backend
//!
//! The simulation is the product: an external agent reads the car's sensors
//! (`Car::sonar_view`, `Car::eye_view`, `Car::rel_velocity`, `Car::rel_heading`,
//! `World::progress`), writes control fractions (`Car::set_acceleration`,
//! `Car::set_turn`), and drives the loop by calling `World::update` at a fixed
//! timestep.

pub mod color;
pub mod render;
pub mod sim;

pub use color::Color;
pub use sim::{Car, CarDef, Track, TrackSpec, World};

use glam::Vec2;

/// Simulation tuning constants
pub mod consts {
    use std::f32::consts::PI;

    /// Fixed simulation timestep (20 Hz physics)
    pub const STEP_LENGTH_SECS: f32 = 1.0 / 20.0;
    /// Physics steps per agent decision
    pub const STEPS_PER_ACTION: u32 = 5;

    /// Car defaults
    pub const CAR_SIZE: f32 = 0.5;
    pub const CAR_EYE_SEPARATION: f32 = 0.45;
    pub const CAR_TURN_RATE: f32 = PI; // radians per second
    pub const CAR_ACCEL_RATE: f32 = 3.0;

    /// Velocity retained per second of coasting
    pub const CAR_VELOCITY_DECAY: f32 = 0.65;
    /// Velocity retained after a wall hit
    pub const CAR_VELOCITY_COLLISION_DECAY: f32 = 0.1;

    /// Eye (color) sensor
    pub const EYE_FOV: f32 = 2.0 * PI / 3.0; // 120 degrees
    pub const EYE_ROTATION: f32 = PI / 6.0; // outward yaw per eye
    pub const PIXELS_PER_EYE: usize = 30;
    pub const SAMPLES_PER_EYE_PIXEL: usize = 5;

    /// Sonar (distance) sensor
    pub const SONAR_FOV: f32 = 2.0 * PI / 3.0; // 120 degrees
    pub const SONAR_PIXELS: usize = 10;
    pub const SAMPLES_PER_SONAR_PIXEL: usize = 3;
    /// Max sonar range; misses read as this distance
    pub const SONAR_RANGE: f32 = 20.0;

    /// Track defaults
    pub const TRACK_RADIUS: f32 = 15.0;
    pub const TRACK_MIN_WIDTH: f32 = 1.5;
    pub const TRACK_MAX_WIDTH: f32 = 4.0;
    pub const TRACK_MAX_SKEW: f32 = 2.0;
    pub const TRACK_NUM_POINTS: usize = 70;
    pub const TRACK_COLOR_PALETTE: usize = 20;

    /// Reward = progress delta / (max_speed * dt * PROGRESS_REWARD_SCALE)
    pub const PROGRESS_REWARD_SCALE: f32 = 2.0;
    /// Added to the reward on collision steps (shaping hook, currently off)
    pub const COLLISION_PENALTY: f32 = 0.0;
}

/// Rotate a vector counter-clockwise by `theta` radians
#[inline]
pub fn rotated(v: Vec2, theta: f32) -> Vec2 {
    Vec2::from_angle(theta).rotate(v)
}
