//! Car physics and sensors
//!
//! The car is a disc with a heading. Controls are two fractions in [-1, 1]:
//! acceleration along the heading and turn rate. Velocity decays
//! exponentially while coasting, which gives the car a closed-form top speed.
//! Sensors are ray fans against the track walls: two color eyes and a
//! distance sonar.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

use super::collision::reflect;
use super::geometry::{self, EPSILON};
use super::track::Track;
use crate::color::Color;
use crate::consts::{
    CAR_VELOCITY_COLLISION_DECAY, CAR_VELOCITY_DECAY, EYE_FOV, EYE_ROTATION, PIXELS_PER_EYE,
    SAMPLES_PER_EYE_PIXEL, SAMPLES_PER_SONAR_PIXEL, SONAR_FOV, SONAR_PIXELS, SONAR_RANGE,
    STEP_LENGTH_SECS,
};
use crate::render::Renderer;
use crate::rotated;

const CAR_CIRCLE_COLOR: Color = Color::new(1.0, 0.5, 0.5);
const CAR_ARROW_COLOR: Color = Color::WHITE;
const CAR_ACCEL_COLOR: Color = Color::RED;
const CAR_TURN_COLOR: Color = Color::GREEN;

/// Sharp concave wall pairs can push the car from one wall into the other, so
/// displacement resolution runs up to this many rounds.
const MAX_DISPLACEMENT_ITERATIONS: u32 = 3;

/// Lower bound on the approach cosine used for ray push-out; a grazing hit
/// must not catapult the body along the near-parallel ray.
const MIN_RAY_APPROACH: f32 = 0.05;

const FOV_PER_EYE_PIXEL: f32 = EYE_FOV / PIXELS_PER_EYE as f32;
const FOV_PER_EYE_SAMPLE: f32 = FOV_PER_EYE_PIXEL / SAMPLES_PER_EYE_PIXEL as f32;

const FOV_PER_SONAR_PIXEL: f32 = SONAR_FOV / SONAR_PIXELS as f32;
const FOV_PER_SONAR_SAMPLE: f32 = FOV_PER_SONAR_PIXEL / SAMPLES_PER_SONAR_PIXEL as f32;

/// Car physical parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarDef {
    /// Body diameter
    pub size: f32,
    /// Distance between the two eyes, along the car's left axis
    pub eye_separation: f32,
    /// Max turn rate in radians per second
    pub turn_rate: f32,
    /// Max acceleration in units per second squared
    pub accel_rate: f32,
}

impl CarDef {
    pub fn new(size: f32, eye_separation: f32, turn_rate: f32, accel_rate: f32) -> Self {
        let def = Self {
            size,
            eye_separation,
            turn_rate,
            accel_rate,
        };
        def.validate();
        def
    }

    pub fn validate(&self) {
        assert!(self.size > 0.0, "car size must be positive");
        assert!(
            self.eye_separation > 0.0,
            "eye separation must be positive"
        );
        assert!(self.turn_rate > 0.0, "turn rate must be positive");
        assert!(self.accel_rate > 0.0, "accel rate must be positive");
    }
}

impl Default for CarDef {
    fn default() -> Self {
        use crate::consts::*;
        Self::new(CAR_SIZE, CAR_EYE_SEPARATION, CAR_TURN_RATE, CAR_ACCEL_RATE)
    }
}

/// A car on a track
#[derive(Debug, Clone)]
pub struct Car {
    def: CarDef,

    pos: Vec2,
    velocity: Vec2,

    forward: Vec2,
    /// Forward rotated 90 degrees; used for eye positions and HUD
    left: Vec2,

    turn_frac: f32,
    accel_frac: f32,
}

impl Car {
    pub fn new(def: CarDef, start_pos: Vec2, start_orientation: Vec2) -> Self {
        def.validate();
        Self {
            def,
            pos: start_pos,
            velocity: Vec2::ZERO,
            forward: start_orientation,
            left: rotated(start_orientation, FRAC_PI_2),
            turn_frac: 0.0,
            accel_frac: 0.0,
        }
    }

    /// Set the acceleration fraction, clamped to [-1, 1]
    pub fn set_acceleration(&mut self, amount: f32) {
        self.accel_frac = amount.clamp(-1.0, 1.0);
    }

    /// Set the turn fraction, clamped to [-1, 1]; positive turns left
    pub fn set_turn(&mut self, amount: f32) {
        self.turn_frac = amount.clamp(-1.0, 1.0);
    }

    pub fn pos(&self) -> Vec2 {
        self.pos
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn forward(&self) -> Vec2 {
        self.forward
    }

    /// Advance the car by `seconds`, resolving wall collisions.
    ///
    /// Returns true if the car hit a wall this step.
    pub fn update(&mut self, seconds: f32, track: &Track) -> bool {
        self.forward = rotated(self.forward, seconds * self.turn_frac * self.def.turn_rate);
        self.left = rotated(self.forward, FRAC_PI_2);

        self.velocity += self.forward * (seconds * self.accel_frac * self.def.accel_rate);
        self.velocity *= CAR_VELOCITY_DECAY.powf(seconds);

        let prev_pos = self.pos;
        self.pos += self.velocity * seconds;

        self.check_collisions(track, prev_pos)
    }

    /// Top speed implied by the accel/decay fixed point at the standard
    /// timestep: v = a * accel * dt / (1 - a) where a = decay^dt.
    pub fn max_speed(&self) -> f32 {
        let a = CAR_VELOCITY_DECAY.powf(STEP_LENGTH_SECS);
        a * self.def.accel_rate * STEP_LENGTH_SECS / (1.0 - a)
    }

    /// Velocity in the car's frame: +x is forward, +y is left
    pub fn rel_velocity(&self) -> Vec2 {
        let angle = self.forward.y.atan2(self.forward.x);
        rotated(self.velocity, -angle)
    }

    /// Signed angle of a world-frame direction relative to the car's heading,
    /// in radians. Positive means the direction points to the car's left.
    pub fn rel_heading(&self, dir: Vec2) -> f32 {
        let angle = self.forward.y.atan2(self.forward.x);
        let corrected = rotated(dir, -angle);
        corrected.y.atan2(corrected.x)
    }

    fn check_collisions(&mut self, track: &Track, prev_pos: Vec2) -> bool {
        let mut have_collision = self.check_collisions_ray(track, prev_pos);
        have_collision |= self.check_collisions_displacement(track);
        if have_collision {
            self.velocity *= CAR_VELOCITY_COLLISION_DECAY;
        }
        have_collision
    }

    /// Ray pass: catches tunneling through a wall in one step. Casts along
    /// the displacement and, if the hit lies within a body radius of the
    /// traveled segment, reflects the velocity and backs the body off the
    /// wall by a radius plus a small margin.
    fn check_collisions_ray(&mut self, track: &Track, prev_pos: Vec2) -> bool {
        let displacement = self.pos - prev_pos;
        if displacement.length_squared() < EPSILON {
            return false;
        }
        let dir = match displacement.try_normalize() {
            Some(dir) => dir,
            None => return false,
        };

        let hit = match track.intersect_ray(prev_pos, dir) {
            Some(hit) => hit,
            None => return false,
        };
        let (_, dist) = geometry::point_segment_dist(hit.pos, prev_pos, self.pos);
        if dist > self.def.size / 2.0 {
            return false;
        }

        self.velocity = reflect(self.velocity, hit.normal);

        let h = push_out_distance(self.def.size, -dir.dot(hit.normal));
        self.pos = hit.pos - dir * h;

        true
    }

    /// Displacement pass: pushes the body out of any wall it overlaps, along
    /// the wall normal. Iterated in case resolving one wall shoves the body
    /// into a neighbouring one, then the velocity is reflected off the net
    /// displacement direction.
    fn check_collisions_displacement(&mut self, track: &Track) -> bool {
        let radius = self.def.size / 2.0;
        let mut net_displacement = Vec2::ZERO;
        let mut have_collision = false;

        for _ in 0..MAX_DISPLACEMENT_ITERATIONS {
            let collisions = track.intersect_sphere(self.pos, radius);
            let Some(c) = collisions.first() else {
                break;
            };

            let normal_dist = (self.pos - c.point).dot(c.normal);
            debug_assert!(normal_dist <= radius + EPSILON);

            let displacement = c.normal * (radius - normal_dist);
            self.pos += displacement;

            net_displacement += displacement;
            have_collision = true;
        }

        if have_collision && net_displacement.length_squared() > EPSILON {
            if let Some(n) = net_displacement.try_normalize() {
                self.velocity = reflect(self.velocity, n);
            }
        }

        have_collision
    }

    /// Distance readings from a fan of rays around the heading, one value per
    /// sonar pixel, normalized to [0, 1] by the sonar range. Sub-rays that
    /// miss every wall read as max range.
    pub fn sonar_view(&self, track: &Track) -> Vec<f32> {
        let mut result = Vec::with_capacity(SONAR_PIXELS);

        let mut pixel_ray = rotated(self.forward, SONAR_FOV / 2.0 - FOV_PER_SONAR_PIXEL / 2.0);
        for _ in 0..SONAR_PIXELS {
            let mut sum = 0.0;

            let mut sample_ray =
                rotated(pixel_ray, FOV_PER_SONAR_PIXEL / 2.0 - FOV_PER_SONAR_SAMPLE / 2.0);
            for _ in 0..SAMPLES_PER_SONAR_PIXEL {
                sum += match track.intersect_ray(self.pos, sample_ray) {
                    Some(hit) => hit.pos.distance(self.pos).min(SONAR_RANGE),
                    None => SONAR_RANGE,
                };
                sample_ray = rotated(sample_ray, -FOV_PER_SONAR_SAMPLE);
            }

            result.push(sum / SAMPLES_PER_SONAR_PIXEL as f32 / SONAR_RANGE);
            pixel_ray = rotated(pixel_ray, -FOV_PER_SONAR_PIXEL);
        }

        result
    }

    /// Per-pixel averaged wall colors seen by the left and right eyes.
    ///
    /// Each eye sits off the body centre along the left axis and is yawed
    /// outward; pixels with no hits read black.
    pub fn eye_view(&self, track: &Track) -> (Vec<Color>, Vec<Color>) {
        let left_eye_pos = self.pos + self.left * (self.def.eye_separation / 2.0);
        let right_eye_pos = self.pos - self.left * (self.def.eye_separation / 2.0);

        (
            self.sample_from_eye(track, EYE_ROTATION, left_eye_pos),
            self.sample_from_eye(track, -EYE_ROTATION, right_eye_pos),
        )
    }

    fn sample_from_eye(&self, track: &Track, forward_rot: f32, eye_pos: Vec2) -> Vec<Color> {
        let eye_forward = rotated(self.forward, forward_rot);

        let mut pixels = Vec::with_capacity(PIXELS_PER_EYE);
        let mut pixel_ray = rotated(eye_forward, EYE_FOV / 2.0 - FOV_PER_EYE_PIXEL / 2.0);
        for _ in 0..PIXELS_PER_EYE {
            let mut color = Color::BLACK;
            let mut num_samples = 0u32;

            let mut sample_ray =
                rotated(pixel_ray, FOV_PER_EYE_PIXEL / 2.0 - FOV_PER_EYE_SAMPLE / 2.0);
            for _ in 0..SAMPLES_PER_EYE_PIXEL {
                if let Some(hit) = track.intersect_ray(eye_pos, sample_ray) {
                    color += hit.color;
                    num_samples += 1;
                }
                sample_ray = rotated(sample_ray, -FOV_PER_EYE_SAMPLE);
            }

            color *= 1.0 / num_samples.max(1) as f32;
            pixels.push(color);

            pixel_ray = rotated(pixel_ray, -FOV_PER_EYE_PIXEL);
        }

        pixels
    }

    /// Draw the body, a heading arrow, and the control indicators
    pub fn render(&self, renderer: &mut dyn Renderer) {
        let radius = self.def.size / 2.0;
        renderer.draw_circle(self.pos, radius, CAR_CIRCLE_COLOR);

        let arrow_radius = 0.8 * radius;
        let arrow_angle = 140.0f32.to_radians();
        let f_point = self.pos + self.forward * arrow_radius;
        let l_point = self.pos + rotated(self.forward, arrow_angle) * arrow_radius;
        let r_point = self.pos + rotated(self.forward, -arrow_angle) * arrow_radius;

        renderer.draw_line((f_point, CAR_ARROW_COLOR), (l_point, CAR_ARROW_COLOR));
        renderer.draw_line((f_point, CAR_ARROW_COLOR), (r_point, CAR_ARROW_COLOR));

        let sign = if self.accel_frac > 0.0 { 1.0 } else { -1.0 };
        let accel_start = self.pos + self.forward * (sign * radius);
        let accel_end = accel_start + self.forward * (self.accel_frac * self.def.size * 0.7);
        renderer.draw_line((accel_start, CAR_ACCEL_COLOR), (accel_end, CAR_ACCEL_COLOR));

        let sign = if self.turn_frac > 0.0 { 1.0 } else { -1.0 };
        let turn_start = self.pos + self.left * (sign * radius);
        let turn_end = turn_start + self.left * (self.turn_frac * self.def.size * 0.7);
        renderer.draw_line((turn_start, CAR_TURN_COLOR), (turn_end, CAR_TURN_COLOR));
    }
}

/// Back-off distance along the incoming ray so the body clears the wall:
/// body radius over the approach cosine, plus a small margin. The cosine is
/// clamped from below so the result stays within a few body lengths even
/// when the ray grazes the wall nearly parallel.
fn push_out_distance(size: f32, approach: f32) -> f32 {
    size / 2.0 / approach.max(MIN_RAY_APPROACH) + 0.05 * size
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts;
    use crate::sim::track::TrackSpec;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    /// A huge near-circular track; the car can run for a long time without
    /// getting near a wall.
    fn open_track() -> Track {
        let spec = TrackSpec::new(200.0, 150.0, 150.0, 100, 2, 0.0);
        let mut rng = Pcg32::seed_from_u64(1);
        Track::new(&spec, &mut rng)
    }

    fn test_car(pos: Vec2, forward: Vec2) -> Car {
        Car::new(CarDef::default(), pos, forward)
    }

    #[test]
    fn test_push_out_distance_bounded_for_grazing_hits() {
        // Head-on: radius plus the 5% margin
        let head_on = push_out_distance(0.5, 1.0);
        assert!((head_on - 0.275).abs() < 1e-6);

        // Near-parallel approach stays within a few body lengths instead of
        // diverging with 1/cos
        let grazing = push_out_distance(0.5, 1e-7);
        assert!(grazing >= head_on);
        assert!(grazing <= 0.5 * 11.0, "grazing push-out too large: {grazing}");
    }

    #[test]
    fn test_controls_clamped() {
        let mut car = test_car(Vec2::ZERO, Vec2::X);
        car.set_acceleration(5.0);
        car.set_turn(-3.0);
        assert_eq!(car.accel_frac, 1.0);
        assert_eq!(car.turn_frac, -1.0);
    }

    #[test]
    fn test_speed_converges_to_max_speed() {
        let track = open_track();
        let mut rng = Pcg32::seed_from_u64(2);
        let (pos, orient) = track.start_pos_and_orientation(&mut rng);

        let mut car = test_car(pos, orient);
        car.set_acceleration(1.0);

        let mut prev_speed = 0.0;
        for _ in 0..250 {
            let collided = car.update(consts::STEP_LENGTH_SECS, &track);
            assert!(!collided, "car should stay clear of the walls");

            let speed = car.velocity().length();
            assert!(speed + 1e-4 >= prev_speed, "speed must not drop");
            prev_speed = speed;
        }

        let max = car.max_speed();
        assert!(
            (prev_speed - max).abs() < max * 0.01,
            "speed {prev_speed} should be within 1% of max {max}"
        );
    }

    #[test]
    fn test_max_speed_matches_recurrence() {
        let car = test_car(Vec2::ZERO, Vec2::X);
        let dt = consts::STEP_LENGTH_SECS;
        let decay = consts::CAR_VELOCITY_DECAY.powf(dt);

        let mut v = 0.0f32;
        for _ in 0..500 {
            v = (v + car.def.accel_rate * dt) * decay;
        }

        assert!((v - car.max_speed()).abs() < 1e-3);
    }

    #[test]
    fn test_turn_rotates_heading() {
        let track = open_track();
        let mut car = test_car(Vec2::new(200.0, 0.0), Vec2::X);
        car.set_turn(1.0);

        // Full turn rate of PI rad/s for a quarter second: 45 degrees left
        for _ in 0..5 {
            car.update(consts::STEP_LENGTH_SECS, &track);
        }

        let angle = car.forward().y.atan2(car.forward().x);
        assert!((angle - std::f32::consts::FRAC_PI_4).abs() < 1e-3);
        assert!((car.forward().length() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_rel_velocity_forward_is_x() {
        let mut car = test_car(Vec2::ZERO, Vec2::new(0.0, 1.0));
        car.velocity = Vec2::new(0.0, 2.0);

        let rel = car.rel_velocity();
        assert!((rel.x - 2.0).abs() < 1e-4);
        assert!(rel.y.abs() < 1e-4);
    }

    #[test]
    fn test_rel_heading_signs() {
        let car = test_car(Vec2::ZERO, Vec2::X);

        // A direction to the left is positive, to the right negative
        assert!(car.rel_heading(Vec2::new(1.0, 1.0)) > 0.0);
        assert!(car.rel_heading(Vec2::new(1.0, -1.0)) < 0.0);
        assert!(car.rel_heading(Vec2::new(5.0, 0.0)).abs() < 1e-5);
    }

    #[test]
    fn test_sonar_view_shape_and_range() {
        let track = open_track();
        let mut rng = Pcg32::seed_from_u64(3);
        let (pos, orient) = track.start_pos_and_orientation(&mut rng);

        let car = test_car(pos, orient);
        let sonar = car.sonar_view(&track);

        assert_eq!(sonar.len(), consts::SONAR_PIXELS);
        for v in &sonar {
            assert!((0.0..=1.0).contains(v), "sonar reading {v} out of range");
        }
    }

    #[test]
    fn test_sonar_open_space_reads_max() {
        // Walls are 75 units away but sonar range is 20; everything maxes out
        let track = open_track();
        let mut rng = Pcg32::seed_from_u64(4);
        let (pos, orient) = track.start_pos_and_orientation(&mut rng);

        let car = test_car(pos, orient);
        for v in car.sonar_view(&track) {
            assert!((v - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_eye_view_shape() {
        let track = open_track();
        let mut rng = Pcg32::seed_from_u64(5);
        let (pos, orient) = track.start_pos_and_orientation(&mut rng);

        let car = test_car(pos, orient);
        let (left, right) = car.eye_view(&track);
        assert_eq!(left.len(), consts::PIXELS_PER_EYE);
        assert_eq!(right.len(), consts::PIXELS_PER_EYE);
    }

    #[test]
    fn test_wall_collision_reported_and_resolved() {
        // Tight track, car driven straight: it must hit a wall eventually,
        // and collision resolution must keep the position finite.
        let spec = TrackSpec::new(15.0, 1.5, 4.0, 70, 20, 2.0);
        let mut rng = Pcg32::seed_from_u64(6);
        let track = Track::new(&spec, &mut rng);
        let (pos, orient) = track.start_pos_and_orientation(&mut rng);

        let mut car = test_car(pos, orient);
        car.set_acceleration(1.0);

        let mut hit = false;
        for _ in 0..500 {
            hit |= car.update(consts::STEP_LENGTH_SECS, &track);
            assert!(car.pos().is_finite());
            assert!(car.velocity().is_finite());
        }
        assert!(hit, "a straight-driving car must hit a wall");
    }

    #[test]
    fn test_collision_kills_speed() {
        let spec = TrackSpec::new(15.0, 1.5, 4.0, 70, 20, 2.0);
        let mut rng = Pcg32::seed_from_u64(8);
        let track = Track::new(&spec, &mut rng);
        let (pos, orient) = track.start_pos_and_orientation(&mut rng);

        let mut car = test_car(pos, orient);
        car.set_acceleration(1.0);

        for _ in 0..500 {
            let speed_before = car.velocity().length();
            if car.update(consts::STEP_LENGTH_SECS, &track) {
                // Collision decay leaves a small fraction of the reflected speed
                assert!(car.velocity().length() <= speed_before * 0.2 + 1e-3);
                return;
            }
        }
        panic!("expected at least one collision");
    }

    #[test]
    #[should_panic]
    fn test_invalid_def_panics() {
        let _ = CarDef::new(0.0, 0.45, 1.0, 1.0);
    }
}
