//! World: one car on a shared track, with a progress-based reward
//!
//! The world owns the episode state. Each `update` advances the car one
//! timestep and returns a reward proportional to the arc-length progress made
//! along the centerline, normalized so that driving flat-out scores roughly
//! 0.5 per step. Crossing the start/finish seam is unwrapped so the reward
//! never spikes by a full lap.

use glam::Vec2;
use rand_pcg::Pcg32;
use std::sync::Arc;

use super::car::{Car, CarDef};
use super::track::Track;
use crate::consts::{COLLISION_PENALTY, PROGRESS_REWARD_SCALE};
use crate::render::Renderer;

/// HUD eye-pixel strip width in viewport coordinates
const HUD_PIXEL_BAR_SIZE: f32 = 0.6;

pub struct World {
    track: Arc<Track>,
    car: Car,

    prev_progress: f32,
    cur_progress: f32,
}

impl World {
    /// Spawn a car at a random centerline point, facing along the track
    pub fn new(track: Arc<Track>, car_def: &CarDef, rng: &mut Pcg32) -> Self {
        let (start_pos, orientation) = track.start_pos_and_orientation(rng);
        let car = Car::new(car_def.clone(), start_pos, orientation);

        let progress = track.distance_along_track(car.pos());
        Self {
            track,
            car,
            prev_progress: progress,
            cur_progress: progress,
        }
    }

    /// Advance the simulation by `seconds` and return the step reward
    pub fn update(&mut self, seconds: f32) -> f32 {
        let collided = self.car.update(seconds, &self.track);

        self.prev_progress = self.cur_progress;
        self.cur_progress = self.track.distance_along_track(self.car.pos());

        let delta = progress_delta(
            self.prev_progress,
            self.cur_progress,
            self.track.track_length(),
        );

        let mut reward = delta / (self.car.max_speed() * seconds * PROGRESS_REWARD_SCALE);
        if collided {
            reward += COLLISION_PENALTY;
        }
        reward
    }

    /// Fraction of the track covered, in [0, 1)
    pub fn progress(&self) -> f32 {
        self.cur_progress / self.track.track_length()
    }

    pub fn car(&self) -> &Car {
        &self.car
    }

    pub fn car_mut(&mut self) -> &mut Car {
        &mut self.car
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    /// Draw the track, the car, and the eye pixels as a HUD strip
    pub fn render(&self, renderer: &mut dyn Renderer) {
        self.track.render(renderer);
        self.car.render(renderer);

        let (left_eye, right_eye) = self.car.eye_view(&self.track);
        let pixel_size = HUD_PIXEL_BAR_SIZE / left_eye.len() as f32;

        for (i, color) in left_eye.iter().enumerate() {
            renderer.draw_hud_circle(
                Vec2::new(-0.75 + i as f32 * pixel_size, -0.9),
                pixel_size / 2.0,
                *color,
            );
        }
        for (i, color) in right_eye.iter().enumerate() {
            renderer.draw_hud_circle(
                Vec2::new(0.75 - HUD_PIXEL_BAR_SIZE + i as f32 * pixel_size, -0.9),
                pixel_size / 2.0,
                *color,
            );
        }
    }
}

/// Signed progress change between two arc-length positions, unwrapped across
/// the start/finish seam: a jump of more than half the track length is a seam
/// crossing, not real movement.
fn progress_delta(prev: f32, cur: f32, track_length: f32) -> f32 {
    let mut delta = cur - prev;
    if delta.abs() > track_length / 2.0 {
        if cur < prev {
            delta += track_length;
        } else {
            delta -= track_length;
        }
    }
    delta
}
