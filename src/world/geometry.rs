//! Vector and plane algebra shared by the MAP and BSP pipelines.
//!
//! Everything here works in the *output* space: right-handed, Y-up.  Use
//! [`to_y_up`] on any position read from a file before handing it in.

use glam::Vec3;

/// Below this length a plane normal is considered degenerate.
pub const NORMAL_EPSILON: f32 = 1e-6;

/// Quake space (left-handed, Z-up) → output space (right-handed, Y-up).
#[inline]
pub fn to_y_up(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, -v.y)
}

/// Inverse of [`to_y_up`].
#[inline]
pub fn from_y_up(v: Vec3) -> Vec3 {
    Vec3::new(v.x, -v.z, v.y)
}

/// `n · x + d = 0`.  A point is *outside* when `n · x + d > 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Plane {
    pub n: Vec3,
    pub d: f32,
}

impl Plane {
    pub const fn new(n: Vec3, d: f32) -> Self {
        Self { n, d }
    }

    /// Plane through three points, normal along `(p1 - p0) × (p2 - p0)`.
    ///
    /// Collinear input yields the zero plane (see [`Plane::is_degenerate`]).
    pub fn from_points(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        let n = (p1 - p0).cross(p2 - p0);
        let len = n.length();
        if len <= NORMAL_EPSILON {
            return Self::default();
        }
        let n = n / len;
        Self { n, d: -n.dot(p0) }
    }

    #[inline]
    pub fn signed_distance(&self, x: Vec3) -> f32 {
        self.n.dot(x) + self.d
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.n.length_squared() <= NORMAL_EPSILON * NORMAL_EPSILON
    }
}

/// Unique point shared by three planes, `None` when `det` is exactly zero.
///
/// Near-parallel triples are *not* rejected here; the brush half-space
/// filter throws their far-away vertices out.
pub fn intersect_three_planes(p1: &Plane, p2: &Plane, p3: &Plane) -> Option<Vec3> {
    let n23 = p2.n.cross(p3.n);
    let det = p1.n.dot(n23);
    if det == 0.0 {
        return None;
    }
    let n31 = p3.n.cross(p1.n);
    let n12 = p1.n.cross(p2.n);
    Some((n23 * -p1.d + n31 * -p2.d + n12 * -p3.d) / det)
}

/// Arithmetic mean of `points` (origin for an empty slice).
pub fn centroid(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::ZERO;
    }
    points.iter().copied().sum::<Vec3>() / points.len() as f32
}

/// Newell normal of a closed polygon, normalised (zero if degenerate).
pub fn newell_normal(points: &[Vec3]) -> Vec3 {
    let mut n = Vec3::ZERO;
    for (i, vi) in points.iter().enumerate() {
        let vj = points[(i + 1) % points.len()];
        n.x += (vi.y - vj.y) * (vi.z + vj.z);
        n.y += (vi.z - vj.z) * (vi.x + vj.x);
        n.z += (vi.x - vj.x) * (vi.y + vj.y);
    }
    n.normalize_or_zero()
}

/// Flat normal of triangle `a b c`, counter-clockwise front face.
#[inline]
pub fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (b - a).cross(c - a).normalize_or_zero()
}

/// Unsigned angle between `a` and `b` in radians, `atan2(|a×b|, a·b)`.
#[inline]
pub fn angle_between(a: Vec3, b: Vec3) -> f32 {
    a.cross(b).length().atan2(a.dot(b))
}

/// Axis-aligned bounding box in output space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Tight box around `points`, `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(rest.iter().fold(
            Self {
                min: *first,
                max: *first,
            },
            |bb, p| Self {
                min: bb.min.min(*p),
                max: bb.max.max(*p),
            },
        ))
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}
