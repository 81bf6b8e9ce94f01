//! CPU-side triangle soup handed to the external uploader.
//!
//! No index buffer and no vertex welding: every triangle owns its three
//! vertices and a flat normal copied to each of them.

use glam::{Vec2, Vec3};

use super::{geometry::triangle_normal, texture::TextureId};

/// Vertex order of a convex polygon fed to [`Mesh::push_polygon`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Winding {
    /// Counter-clockwise about the front normal (brush polygons).
    /// Fans `(0, i, i + 1)`.
    CounterClockwise,
    /// Clockwise about the front normal (BSP edge loops).
    /// Fans `(last, i, i - 1)` for `i = len - 2 ..= 1`.
    Clockwise,
}

/// Triangle list: `positions.len() == uvs.len() == normals.len()`, a
/// multiple of three.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
}

/// A mesh plus the texture it is drawn with.
#[derive(Clone, Debug, PartialEq)]
pub struct TexturedMesh {
    pub texture: String,
    /// Id of `texture` in the level's [`TextureBank`](super::texture::TextureBank).
    pub texture_id: TextureId,
    pub mesh: Mesh,
}

/// Triangles emitted for a convex polygon of `vertex_count` corners.
#[inline]
pub fn fan_triangle_count(vertex_count: usize) -> usize {
    vertex_count.saturating_sub(2)
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Fan-triangulate one convex polygon; each triangle faces the front.
    ///
    /// Polygons with fewer than three corners add nothing.
    pub fn push_polygon(&mut self, positions: &[Vec3], uvs: &[Vec2], winding: Winding) {
        debug_assert_eq!(positions.len(), uvs.len());
        let n = positions.len().min(uvs.len());
        if n < 3 {
            return;
        }
        self.reserve(fan_triangle_count(n) * 3);

        match winding {
            Winding::CounterClockwise => {
                for i in 1..n - 1 {
                    self.push_triangle([0, i, i + 1], positions, uvs);
                }
            }
            Winding::Clockwise => {
                let last = n - 1;
                for i in (1..=n - 2).rev() {
                    self.push_triangle([last, i, i - 1], positions, uvs);
                }
            }
        }
    }

    fn push_triangle(&mut self, idx: [usize; 3], positions: &[Vec3], uvs: &[Vec2]) {
        let [a, b, c] = idx.map(|i| positions[i]);
        let normal = triangle_normal(a, b, c);
        for i in idx {
            self.positions.push(positions[i]);
            self.uvs.push(uvs[i]);
            self.normals.push(normal);
        }
    }

    fn reserve(&mut self, additional: usize) {
        self.positions.reserve(additional);
        self.uvs.reserve(additional);
        self.normals.reserve(additional);
    }

    /// Sum of triangle areas; handy to check coverage.
    pub fn area(&self) -> f32 {
        self.positions
            .chunks_exact(3)
            .map(|t| (t[1] - t[0]).cross(t[2] - t[0]).length() * 0.5)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hexagon() -> Vec<Vec3> {
        (0..6)
            .map(|i| {
                let a = i as f32 * std::f32::consts::TAU / 6.0;
                Vec3::new(a.cos(), a.sin(), 0.0)
            })
            .collect()
    }

    #[test]
    fn ccw_fan_covers_polygon_once() {
        let poly = hexagon();
        let uvs = vec![Vec2::ZERO; poly.len()];
        let mut mesh = Mesh::new();
        mesh.push_polygon(&poly, &uvs, Winding::CounterClockwise);

        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.normals.len(), 12);
        let hex_area = 3.0 * 3f32.sqrt() / 2.0;
        assert!((mesh.area() - hex_area).abs() < 1e-5);
        assert!(mesh.normals.iter().all(|n| n.abs_diff_eq(Vec3::Z, 1e-6)));
    }

    #[test]
    fn clockwise_fan_uses_last_vertex_as_apex() {
        let quad = [Vec3::ZERO, Vec3::Y, Vec3::new(1.0, 1.0, 0.0), Vec3::X];
        let uvs = [Vec2::ZERO, Vec2::Y, Vec2::ONE, Vec2::X];
        let mut mesh = Mesh::new();
        mesh.push_polygon(&quad, &uvs, Winding::Clockwise);

        assert_eq!(
            mesh.positions,
            vec![quad[3], quad[2], quad[1], quad[3], quad[1], quad[0]]
        );
        assert_eq!(mesh.uvs[1], Vec2::ONE);
        // clockwise source loop about +Z → triangles face +Z
        assert!(mesh.normals.iter().all(|n| n.abs_diff_eq(Vec3::Z, 1e-6)));
        assert!((mesh.area() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn short_polygons_are_ignored() {
        let mut mesh = Mesh::new();
        mesh.push_polygon(&[Vec3::ZERO, Vec3::X], &[Vec2::ZERO; 2], Winding::CounterClockwise);
        assert!(mesh.is_empty());
        assert_eq!(fan_triangle_count(2), 0);
        assert_eq!(fan_triangle_count(7), 5);
    }
}
