//! 2D geometry primitives
//!
//! Segment distance and intersection queries shared by the collision
//! primitives and the track queries. Misses are `None`/`false`, never errors:
//! they are the common case on every tick.

use glam::Vec2;

/// Tolerance for parallel-line rejection and segment parameter bounds
pub const EPSILON: f32 = 1e-5;

/// Closest point on the segment `start..end` to `point`, and the distance to it.
///
/// The projection parameter is clamped to [0, 1], so the result is always on
/// the segment proper.
pub fn point_segment_dist(point: Vec2, start: Vec2, end: Vec2) -> (Vec2, f32) {
    let v = end - start;
    let w = point - start;

    let c1 = w.dot(v);
    if c1 <= 0.0 {
        return (start, w.length());
    }

    let c2 = v.dot(v);
    if c2 <= c1 {
        return (end, point.distance(end));
    }

    let b = c1 / c2;
    let pb = start + v * b;
    (pb, point.distance(pb))
}

/// Intersection point of two segments, if they cross.
///
/// Solves the 2x2 linear system; near-parallel segments (determinant within
/// EPSILON) never intersect. The segment parameters are allowed a little
/// slack beyond [0, 1] so endpoint-touching cases still count.
pub fn intersect_lines(start1: Vec2, end1: Vec2, start2: Vec2, end2: Vec2) -> Option<Vec2> {
    let denominator =
        (end2.y - start2.y) * (end1.x - start1.x) - (end2.x - start2.x) * (end1.y - start1.y);

    if denominator.abs() < EPSILON {
        return None;
    }

    let numerator1 =
        (end2.x - start2.x) * (start1.y - start2.y) - (end2.y - start2.y) * (start1.x - start2.x);
    let numerator2 =
        (end1.x - start1.x) * (start1.y - start2.y) - (end1.y - start1.y) * (start1.x - start2.x);

    let u1 = numerator1 / denominator;
    let u2 = numerator2 / denominator;

    if u1 < -EPSILON || u1 > 1.0 + EPSILON || u2 < -EPSILON || u2 > 1.0 + EPSILON {
        return None;
    }

    Some(start1 + (end1 - start1) * u1)
}

/// Boolean variant of `intersect_lines`, same tolerances
pub fn lines_intersect(start1: Vec2, end1: Vec2, start2: Vec2, end2: Vec2) -> bool {
    intersect_lines(start1, end1, start2, end2).is_some()
}

/// Shortest absolute angular difference, wrapping at 2*pi
pub fn angle_diff(angle0: f32, angle1: f32) -> f32 {
    use std::f32::consts::TAU;
    let d = (angle0 - angle1).abs();
    d.min((d - TAU).abs())
}
