//! Per-vertex texture coordinates for both source formats.
//!
//! * `.MAP` faces: Quake "base axis" projection picked from the face normal,
//!   then offset / scale from the face line.
//! * BSP faces: explicit u/v axes plus offsets from the `TEXINFO` record.
//!
//! Both return coordinates already normalised by the texture size.

use glam::{Vec2, Vec3};

/// `(normal, u axis, v axis)` for floor, ceiling, west, east, south, north.
const BASE_AXES: [[Vec3; 3]; 6] = [
    [Vec3::Z, Vec3::X, Vec3::NEG_Y],
    [Vec3::NEG_Z, Vec3::X, Vec3::NEG_Y],
    [Vec3::X, Vec3::Y, Vec3::NEG_Z],
    [Vec3::NEG_X, Vec3::Y, Vec3::NEG_Z],
    [Vec3::Y, Vec3::X, Vec3::NEG_Z],
    [Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z],
];

/// Texture placement read from one `.MAP` face line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TexturePlacement {
    pub offset: Vec2,
    /// Degrees.  Parsed and kept, not applied by [`project_map`].
    pub rotation: f32,
    pub scale: Vec2,
}

impl Default for TexturePlacement {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }
}

/// Pick the base `(u, v)` pair whose reference normal best matches `normal`.
///
/// Ties keep the earlier table entry.
pub fn base_axes(normal: Vec3) -> (Vec3, Vec3) {
    let mut best = f32::MIN;
    let mut axes = (BASE_AXES[0][1], BASE_AXES[0][2]);
    for [n, u, v] in BASE_AXES {
        let d = normal.dot(n);
        if d > best {
            best = d;
            axes = (u, v);
        }
    }
    axes
}

/// UVs of a `.MAP` polygon lying on a plane with `normal`.
///
/// `uv = (offset + (p·u, p·v) / scale) / size`.  A zero scale component is
/// read as 1, the way the Quake tools treat it.
pub fn project_map(
    vertices: &[Vec3],
    normal: Vec3,
    placement: &TexturePlacement,
    size: Vec2,
) -> Vec<Vec2> {
    let (u_axis, v_axis) = base_axes(normal);
    let scale = Vec2::select(placement.scale.cmpeq(Vec2::ZERO), Vec2::ONE, placement.scale);
    vertices
        .iter()
        .map(|p| {
            let raw = Vec2::new(p.dot(u_axis), p.dot(v_axis));
            (placement.offset + raw / scale) / size
        })
        .collect()
}

/// Texture axes of a BSP face (file space).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TexAxes {
    pub u_axis: Vec3,
    pub u_offset: f32,
    pub v_axis: Vec3,
    pub v_offset: f32,
}

impl TexAxes {
    /// UV of one *file-space* vertex for a texture of `size` texels.
    #[inline]
    pub fn project(&self, p: Vec3, size: Vec2) -> Vec2 {
        Vec2::new(
            p.dot(self.u_axis) + self.u_offset,
            p.dot(self.v_axis) + self.v_offset,
        ) / size
    }
}
