//! Headless demo: drive a scripted car around procedurally generated tracks.
//!
//! Generates a track from a seed, spawns a car, and steers it toward the next
//! centerline waypoint for a fixed number of ticks per episode, logging the
//! reward totals. Optionally dumps the final frame of the last episode as an
//! SVG. Pass a JSON config path as the first argument to override the
//! defaults.

use std::sync::Arc;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use drift_circuit::consts::{STEP_LENGTH_SECS, STEPS_PER_ACTION};
use drift_circuit::render::{Renderer, SvgRenderer};
use drift_circuit::sim::{CarDef, Track, TrackSpec, World};

/// How many world units of track to show around the car in frame dumps
const VIEWPORT_WIDTH: f32 = 40.0;
/// Steering gain: full lock when the waypoint is 45 degrees off the nose
const STEERING_GAIN: f32 = 4.0 / std::f32::consts::PI;

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct SimConfig {
    seed: u64,
    episodes: u32,
    ticks_per_episode: u32,
    track: TrackSpec,
    car: CarDef,
    svg_output: Option<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            episodes: 3,
            ticks_per_episode: 1000,
            track: TrackSpec::default(),
            car: CarDef::default(),
            svg_output: Some("frame.svg".to_string()),
        }
    }
}

fn load_config() -> SimConfig {
    let Some(path) = std::env::args().nth(1) else {
        log::info!("no config given, using defaults");
        return SimConfig::default();
    };

    match std::fs::read_to_string(&path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("bad config {path}: {err}; using defaults");
                SimConfig::default()
            }
        },
        Err(err) => {
            log::warn!("cannot read config {path}: {err}; using defaults");
            SimConfig::default()
        }
    }
}

fn run_episode(world: &mut World, ticks: u32) -> (f32, f32) {
    let mut total_reward = 0.0;
    let mut max_progress = world.progress();

    for tick in 0..ticks {
        // Re-plan at the agent's decision rate, not every physics step
        if tick % STEPS_PER_ACTION == 0 {
            let waypoint = world.track().next_waypoint(world.car().pos());
            let heading = world.car().rel_heading(waypoint - world.car().pos());

            let car = world.car_mut();
            car.set_turn(heading * STEERING_GAIN);
            car.set_acceleration(1.0);
        }

        total_reward += world.update(STEP_LENGTH_SECS);
        max_progress = max_progress.max(world.progress());
    }

    (total_reward, max_progress)
}

fn main() {
    env_logger::init();

    let config = load_config();
    log::info!(
        "seed {}, {} episodes of {} ticks",
        config.seed,
        config.episodes,
        config.ticks_per_episode
    );

    let mut rng = Pcg32::seed_from_u64(config.seed);
    let track = Arc::new(Track::new(&config.track, &mut rng));
    log::info!(
        "track length {:.1}, {} walls",
        track.track_length(),
        track.walls().len()
    );

    let mut last_world: Option<World> = None;
    for episode in 0..config.episodes {
        let mut world = World::new(Arc::clone(&track), &config.car, &mut rng);
        let (reward, max_progress) = run_episode(&mut world, config.ticks_per_episode);

        log::info!(
            "episode {episode}: total reward {reward:.2}, peak progress {:.1}%",
            max_progress * 100.0
        );
        last_world = Some(world);
    }

    if let (Some(path), Some(world)) = (&config.svg_output, &last_world) {
        let mut renderer = SvgRenderer::new(1024, 1024);
        renderer.focus(world.car().pos(), VIEWPORT_WIDTH);
        world.render(&mut renderer);
        renderer.swap_buffers();

        if let Some(frame) = renderer.take_frame() {
            match std::fs::write(path, frame) {
                Ok(()) => log::info!("wrote final frame to {path}"),
                Err(err) => log::error!("failed to write {path}: {err}"),
            }
        }
    }

    if let Some(world) = &last_world {
        let sonar = world.car().sonar_view(world.track());
        log::debug!(
            "final sonar: {}",
            sonar
                .iter()
                .map(|v| format!("{v:.2}"))
                .collect::<Vec<_>>()
                .join(" ")
        );
        log::debug!("final position: {:?}", world.car().pos());
    }
}
