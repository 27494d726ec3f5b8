// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Extrusion of 2D sets into boundary meshes

use super::{Mesh, Polygon2d, Resolution, Triangle};
use crate::error::InvalidParameter;
use crate::utils::math::{cos_degrees, lerp, sin_degrees};
use geo::orient::{Direction, Orient};
use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// `linear_extrude` parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearExtrude {
    pub height: f64,
    pub center: bool,
    /// Total twist in degrees, clockwise seen from above
    pub twist: f64,
    pub slices: u32,
    /// Scale of the top outline relative to the bottom
    pub scale: Vector2<f64>,
}

impl LinearExtrude {
    pub fn new(height: f64) -> Self {
        Self {
            height,
            center: false,
            twist: 0.0,
            slices: 1,
            scale: Vector2::new(1.0, 1.0),
        }
    }

    pub fn validate(&self) -> Result<(), InvalidParameter> {
        if !self.height.is_finite() || !self.twist.is_finite() {
            return Err(InvalidParameter("linear_extrude() parameters must be finite".into()));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(InvalidParameter(format!(
                "linear_extrude() scale must be non-negative, got [{}, {}]",
                self.scale.x, self.scale.y
            )));
        }
        Ok(())
    }

    /// Sweep a sanitized polygon set along +Z
    pub fn apply(&self, polygon: &Polygon2d) -> Mesh {
        let mut mesh = Mesh::new();
        if polygon.is_empty() || self.height <= 0.0 {
            return mesh;
        }

        let slices = self.slices.max(1);
        let z0 = if self.center { -self.height / 2.0 } else { 0.0 };
        let place = |p: &Point2<f64>, level: u32| -> Point3<f64> {
            let t = level as f64 / slices as f64;
            let angle = -self.twist * t;
            let (c, s) = (cos_degrees(angle), sin_degrees(angle));
            let x = (p.x * c - p.y * s) * lerp(1.0, self.scale.x, t);
            let y = (p.x * s + p.y * c) * lerp(1.0, self.scale.y, t);
            Point3::new(x, y, z0 + self.height * t)
        };

        for ring in oriented_rings(polygon) {
            let n = ring.len();
            for level in 0..slices {
                for i in 0..n {
                    let j = (i + 1) % n;
                    let (bi, bj) = (place(&ring[i], level), place(&ring[j], level));
                    let (ti, tj) = (place(&ring[i], level + 1), place(&ring[j], level + 1));
                    push_triangle(&mut mesh, bi, bj, tj);
                    push_triangle(&mut mesh, bi, tj, ti);
                }
            }
        }

        let top_collapsed = self.scale.x == 0.0 || self.scale.y == 0.0;
        for [a, b, c] in polygon.triangulate() {
            push_triangle(&mut mesh, place(&a, 0), place(&c, 0), place(&b, 0));
            if !top_collapsed {
                push_triangle(&mut mesh, place(&a, slices), place(&b, slices), place(&c, slices));
            }
        }
        mesh
    }
}

/// `rotate_extrude` parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotateExtrude {
    /// Sweep angle in degrees; values outside (-360, 360] mean a full turn
    pub angle: f64,
    pub resolution: Resolution,
}

impl Default for RotateExtrude {
    fn default() -> Self {
        Self {
            angle: 360.0,
            resolution: Resolution::default(),
        }
    }
}

impl RotateExtrude {
    /// Revolve a sanitized XY profile around the Z axis. The profile's Y
    /// becomes Z; every point must lie on one side of the axis.
    pub fn apply(&self, polygon: &Polygon2d) -> Result<Mesh, InvalidParameter> {
        let mut mesh = Mesh::new();
        if polygon.is_empty() {
            return Ok(mesh);
        }
        if !self.angle.is_finite() {
            return Err(InvalidParameter("rotate_extrude() angle must be finite".into()));
        }

        let (min_x, max_x) = polygon
            .points()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
        if min_x < 0.0 && max_x > 0.0 {
            return Err(InvalidParameter(format!(
                "all points for rotate_extrude() must have the same X coordinate sign (range is {:.2} -> {:.2})",
                min_x, max_x
            )));
        }

        let mut angle = self.angle;
        if angle <= -360.0 || angle > 360.0 {
            angle = 360.0;
        }
        if angle == 0.0 {
            return Ok(mesh);
        }
        let full = angle.abs() == 360.0;
        let sweep = angle.abs();

        // Profiles left of the axis are mirrored and start half a turn later
        let mut profile = polygon.clone();
        let mut start = 0.0;
        if max_x <= 0.0 {
            profile.transform(&nalgebra::Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0));
            start = 180.0;
        }

        let radius = min_x.abs().max(max_x.abs());
        let fragments = ((self.resolution.fragments(radius) as f64 * sweep / 360.0).ceil() as u32).max(1);
        let angle_at = |k: u32| -> f64 {
            if full && k == fragments {
                start
            } else {
                start + sweep * k as f64 / fragments as f64
            }
        };
        let place = |p: &Point2<f64>, phi: f64| Point3::new(p.x * cos_degrees(phi), p.x * sin_degrees(phi), p.y);

        for ring in oriented_rings(&profile) {
            let n = ring.len();
            for k in 0..fragments {
                let (phi0, phi1) = (angle_at(k), angle_at(k + 1));
                for i in 0..n {
                    let j = (i + 1) % n;
                    let (pi, pj) = (place(&ring[i], phi0), place(&ring[j], phi0));
                    let (qi, qj) = (place(&ring[i], phi1), place(&ring[j], phi1));
                    push_triangle(&mut mesh, pi, qj, pj);
                    push_triangle(&mut mesh, pi, qi, qj);
                }
            }
        }

        if !full {
            let end = angle_at(fragments);
            for [a, b, c] in profile.triangulate() {
                push_triangle(&mut mesh, place(&a, start), place(&b, start), place(&c, start));
                push_triangle(&mut mesh, place(&a, end), place(&c, end), place(&b, end));
            }
        }

        if angle < 0.0 {
            mesh.transform(&Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, -1.0, 1.0)));
        }
        Ok(mesh)
    }
}

/// Rings of a sanitized set with exteriors counter-clockwise and holes
/// clockwise, closing point removed
fn oriented_rings(polygon: &Polygon2d) -> Vec<Vec<Point2<f64>>> {
    let multi = polygon.to_multipolygon().orient(Direction::Default);
    let mut rings = Vec::new();
    for poly in &multi.0 {
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
            let points = super::polygon2d::from_line_string(ring);
            if points.len() >= 3 {
                rings.push(points);
            }
        }
    }
    rings
}

fn push_triangle(mesh: &mut Mesh, a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) {
    if Mesh::triangle_normal(&[a, b, c]).is_none() {
        return;
    }
    let i = mesh.add_vertex(a);
    let j = mesh.add_vertex(b);
    let k = mesh.add_vertex(c);
    mesh.add_triangle(Triangle::new([i, j, k]));
}
