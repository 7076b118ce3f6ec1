//! Deterministic driving simulation
//!
//! Everything here is pure with respect to its inputs: track generation and
//! car spawning draw from an explicit seeded RNG, and stepping is a fixed
//! timestep with no hidden state. Two worlds built from the same seeds and
//! fed the same controls stay bit-identical.

pub mod car;
pub mod collision;
pub mod geometry;
pub mod track;
pub mod world;

pub use car::{Car, CarDef};
pub use collision::{Contact, LineSegment, Sphere, reflect};
pub use track::{RayHit, Track, TrackSpec, WallSegment};
pub use world::World;
