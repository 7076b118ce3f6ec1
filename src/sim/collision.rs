//! Exact 2D collision primitives
//!
//! Sphere and line-segment shapes with contact-point/normal queries. These are
//! pure functions of their geometric inputs; the track layers its own
//! broad-phase and normal overrides on top.

use glam::Vec2;

use super::geometry::{self, EPSILON};

/// A contact produced by a collision query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Point of contact
    pub point: Vec2,
    /// Unit surface normal at the contact
    pub normal: Vec2,
}

/// A circle used for collision queries (the car body, historically "sphere")
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub centre: Vec2,
    pub radius: f32,
}

impl Sphere {
    /// Panics if `radius` is negative; that is a programmer error, not a
    /// runtime condition.
    pub fn new(centre: Vec2, radius: f32) -> Self {
        assert!(radius >= 0.0, "sphere radius must be non-negative");
        Self { centre, radius }
    }

    /// Overlap test against another sphere
    pub fn intersects_sphere(&self, other: &Sphere) -> bool {
        let combined = self.radius + other.radius;
        self.centre.distance_squared(other.centre) <= combined * combined
    }

    /// Contact with another sphere: point on this sphere's surface toward the
    /// other, normal along the centre-to-centre direction.
    pub fn intersect_sphere(&self, other: &Sphere) -> Option<Contact> {
        if !self.intersects_sphere(other) {
            return None;
        }
        let to_target = (other.centre - self.centre).try_normalize()?;
        Some(Contact {
            point: self.centre + to_target * self.radius,
            normal: to_target,
        })
    }

    /// Overlap test against a segment
    pub fn intersects_segment(&self, line: &LineSegment) -> bool {
        geometry::point_segment_dist(self.centre, line.start(), line.end()).1 < self.radius
    }

    /// Contact with a segment.
    ///
    /// The contact is the nearest segment point and the normal points from it
    /// back toward the sphere centre. When the centre lies on the segment the
    /// normal degenerates; fall back to a perpendicular of the segment
    /// direction so callers never see a NaN.
    pub fn intersect_segment(&self, line: &LineSegment) -> Option<Contact> {
        let (nearest, dist) = geometry::point_segment_dist(self.centre, line.start(), line.end());
        if dist >= self.radius {
            return None;
        }

        let normal = if dist < EPSILON {
            (line.end() - line.start()).try_normalize()?.perp()
        } else {
            (self.centre - nearest).try_normalize()?
        };

        Some(Contact {
            point: nearest,
            normal,
        })
    }
}

/// A line segment with cached midpoint and length.
///
/// The cached values are only ever recomputed through `set`, so they cannot
/// drift from the endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    start: Vec2,
    end: Vec2,
    mid_point: Vec2,
    length: f32,
}

impl LineSegment {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self {
            start,
            end,
            mid_point: (start + end) * 0.5,
            length: start.distance(end),
        }
    }

    /// Replace both endpoints, refreshing the cached midpoint and length
    pub fn set(&mut self, start: Vec2, end: Vec2) {
        *self = Self::new(start, end);
    }

    #[inline]
    pub fn start(&self) -> Vec2 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Vec2 {
        self.end
    }

    #[inline]
    pub fn mid_point(&self) -> Vec2 {
        self.mid_point
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Overlap test against another segment
    pub fn intersects_segment(&self, other: &LineSegment) -> bool {
        geometry::lines_intersect(self.start, self.end, other.start, other.end)
    }

    /// Contact with another segment.
    ///
    /// The normal is the other segment's direction rotated 90 degrees. That is
    /// an approximation of the true contact normal at oblique angles, kept
    /// deliberately: downstream behavior is tuned against it.
    pub fn intersect_segment(&self, other: &LineSegment) -> Option<Contact> {
        let point = geometry::intersect_lines(self.start, self.end, other.start, other.end)?;
        let normal = (other.end - other.start).try_normalize()?.perp();
        Some(Contact { point, normal })
    }
}

/// Reflect a vector off a surface: v' = v - 2(v.n)n
#[inline]
pub fn reflect(v: Vec2, normal: Vec2) -> Vec2 {
    v - 2.0 * v.dot(normal) * normal
}
