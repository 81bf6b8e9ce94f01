//! Brush polygonisation: half-space planes → one convex polygon per face.
//!
//! 1. Every plane triple is intersected; a corner survives only if it is
//!    inside (or on) every half-space of the brush, its own three included.
//! 2. Each face's corner set is sorted counter-clockwise around the face
//!    normal and flipped if the Newell normal disagrees.
//!
//! No epsilon is applied in the half-space filter, so slightly malformed
//! brushes may produce co-located duplicate corners.  Callers live with it.

use glam::Vec3;
use log::debug;
use smallvec::SmallVec;
use thiserror::Error;

use super::geometry::{Aabb, Plane, angle_between, centroid, intersect_three_planes, newell_normal};

/// Corner list of a single face; most faces of real brushes have ≤ 8.
pub type Corners = SmallVec<[Vec3; 8]>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolygonError {
    /// No face of the brush kept three or more corners.
    #[error("degenerate brush: no face has three or more vertices ({planes} planes)")]
    DegenerateBrush { planes: usize },
}

/// Convex boundary of one brush face, counter-clockwise about the plane
/// normal.
#[derive(Clone, Debug, PartialEq)]
pub struct FacePolygon {
    /// Index of the plane (and MAP face) this polygon lies on.
    pub face_index: usize,
    pub vertices: Vec<Vec3>,
    pub bbox: Aabb,
}

/// All surviving faces of one brush plus the brush bounds.
#[derive(Clone, Debug)]
pub struct BrushPolygons {
    pub faces: Vec<FacePolygon>,
    pub bbox: Aabb,
}

/// Polygonise one brush.
///
/// Faces with fewer than three corners are dropped silently; if *every* face
/// is dropped the brush is reported as degenerate.
pub fn polygonise(planes: &[Plane]) -> Result<BrushPolygons, PolygonError> {
    let mut corners: Vec<Corners> = vec![Corners::new(); planes.len()];

    /*----- 1. corner candidates ------------------------------------------*/
    for i in 0..planes.len() {
        for j in i + 1..planes.len() {
            for k in j + 1..planes.len() {
                let Some(v) = intersect_three_planes(&planes[i], &planes[j], &planes[k]) else {
                    continue;
                };
                let inside = planes.iter().all(|p| p.signed_distance(v) <= 0.0);
                if inside {
                    corners[i].push(v);
                    corners[j].push(v);
                    corners[k].push(v);
                }
            }
        }
    }

    /*----- 2. order + orient each face -----------------------------------*/
    let mut faces = Vec::with_capacity(planes.len());
    for (face_index, (pts, plane)) in corners.into_iter().zip(planes).enumerate() {
        if pts.len() < 3 {
            debug!("face {face_index}: {} corner(s), dropped", pts.len());
            continue;
        }
        let vertices = sort_polygon(pts, plane.n);
        // len ≥ 3 so the box always exists
        let Some(bbox) = Aabb::from_points(&vertices) else {
            continue;
        };
        faces.push(FacePolygon {
            face_index,
            vertices,
            bbox,
        });
    }

    let bbox = faces
        .iter()
        .map(|f| f.bbox)
        .reduce(|a, b| a.union(&b))
        .ok_or(PolygonError::DegenerateBrush {
            planes: planes.len(),
        })?;

    Ok(BrushPolygons { faces, bbox })
}

/// Angular sort followed by the orientation fix.
pub fn sort_polygon(points: Corners, normal: Vec3) -> Vec<Vec3> {
    let mut v = points.into_vec();
    let center = centroid(&v);

    // `i + 2 < len`: the last slot is whatever remains
    for i in 0..v.len().saturating_sub(2) {
        let pivot = v[i] - center;
        // plane through (v_i, c, c + n); its positive side is the
        // counter-clockwise half around `normal`
        let split = Plane::from_points(v[i], center, center + normal);

        let mut best = i + 1;
        for j in i + 2..v.len() {
            if closer_ccw(&split, pivot, center, v[j], v[best]) {
                best = j;
            }
        }
        v.swap(i + 1, best);
    }

    if newell_normal(&v).dot(normal) < 0.0 {
        v.reverse();
    }
    v
}

/// `a` precedes `b` as the next counter-clockwise neighbour of the pivot.
///
/// Points behind the splitting plane never win; among the rest the smaller
/// angle to the pivot direction does.  Equal candidates keep the earlier one.
fn closer_ccw(split: &Plane, pivot: Vec3, center: Vec3, a: Vec3, b: Vec3) -> bool {
    if split.signed_distance(a) < 0.0 {
        return false;
    }
    if split.signed_distance(b) < 0.0 {
        return true;
    }
    angle_between(pivot, a - center) < angle_between(pivot, b - center)
}
