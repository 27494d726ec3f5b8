// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric primitives generator

use super::{Geometry, Mesh, Outline2d, Polygon2d, Triangle};
use crate::error::InvalidParameter;
use crate::utils::math::{cos_degrees, fragments, sin_degrees};
use nalgebra::{Point2, Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Circle subdivision settings (`$fn`, `$fa`, `$fs`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub fn_: u32,
    pub fa: f64,
    pub fs: f64,
}

impl Resolution {
    pub fn segments(fn_: u32) -> Self {
        Self {
            fn_,
            ..Self::default()
        }
    }

    pub fn fragments(&self, r: f64) -> u32 {
        fragments(r, self.fn_, self.fa, self.fs)
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            fn_: 0,
            fa: 12.0,
            fs: 2.0,
        }
    }
}

/// Leaf shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Cube {
        size: Vector3<f64>,
        center: bool,
    },
    Sphere {
        r: f64,
        resolution: Resolution,
    },
    Cylinder {
        h: f64,
        r1: f64,
        r2: f64,
        center: bool,
        resolution: Resolution,
    },
    /// Faces list point indices clockwise seen from outside
    Polyhedron {
        points: Vec<Point3<f64>>,
        faces: Vec<Vec<usize>>,
    },
    Square {
        size: Vector2<f64>,
        center: bool,
    },
    Circle {
        r: f64,
        resolution: Resolution,
    },
    /// An empty `paths` list means one outline through all points
    Polygon {
        points: Vec<Point2<f64>>,
        paths: Vec<Vec<usize>>,
    },
}

impl Primitive {
    pub fn cube(size: Vector3<f64>, center: bool) -> Self {
        Self::Cube { size, center }
    }

    pub fn sphere(r: f64, fn_: u32) -> Self {
        Self::Sphere {
            r,
            resolution: Resolution::segments(fn_),
        }
    }

    pub fn cylinder(h: f64, r: f64, fn_: u32) -> Self {
        Self::cone(h, r, r, fn_)
    }

    pub fn cone(h: f64, r1: f64, r2: f64, fn_: u32) -> Self {
        Self::Cylinder {
            h,
            r1,
            r2,
            center: false,
            resolution: Resolution::segments(fn_),
        }
    }

    pub fn square(size: Vector2<f64>, center: bool) -> Self {
        Self::Square { size, center }
    }

    pub fn circle(r: f64, fn_: u32) -> Self {
        Self::Circle {
            r,
            resolution: Resolution::segments(fn_),
        }
    }

    pub fn polygon(points: Vec<Point2<f64>>) -> Self {
        Self::Polygon {
            points,
            paths: Vec::new(),
        }
    }

    pub fn is_2d(&self) -> bool {
        matches!(self, Self::Square { .. } | Self::Circle { .. } | Self::Polygon { .. })
    }

    pub fn to_geometry(&self) -> Result<Geometry, InvalidParameter> {
        match self {
            Self::Cube { size, center } => {
                if size.iter().any(|s| *s <= 0.0 || !s.is_finite()) {
                    return Ok(Geometry::Mesh(Mesh::empty()));
                }
                Ok(Geometry::Mesh(generate_cube_mesh(*size, *center)))
            }
            Self::Sphere { r, resolution } => {
                if *r <= 0.0 || !r.is_finite() {
                    return Ok(Geometry::Mesh(Mesh::empty()));
                }
                Ok(Geometry::Mesh(generate_sphere_mesh(*r, resolution.fragments(*r))))
            }
            Self::Cylinder {
                h,
                r1,
                r2,
                center,
                resolution,
            } => {
                if *h <= 0.0 || *r1 < 0.0 || *r2 < 0.0 || (*r1 == 0.0 && *r2 == 0.0) {
                    return Ok(Geometry::Mesh(Mesh::empty()));
                }
                let segments = resolution.fragments(r1.max(*r2));
                Ok(Geometry::Mesh(generate_cone_mesh(*h, *r1, *r2, *center, segments)))
            }
            Self::Polyhedron { points, faces } => generate_polyhedron_mesh(points, faces).map(Geometry::Mesh),
            Self::Square { size, center } => {
                if size.iter().any(|s| *s <= 0.0 || !s.is_finite()) {
                    return Ok(Geometry::Polygon2d(Polygon2d::empty()));
                }
                Ok(Geometry::Polygon2d(generate_square(*size, *center)))
            }
            Self::Circle { r, resolution } => {
                if *r <= 0.0 || !r.is_finite() {
                    return Ok(Geometry::Polygon2d(Polygon2d::empty()));
                }
                Ok(Geometry::Polygon2d(generate_circle(*r, resolution.fragments(*r))))
            }
            Self::Polygon { points, paths } => generate_polygon(points, paths).map(Geometry::Polygon2d),
        }
    }
}

fn generate_cube_mesh(size: Vector3<f64>, center: bool) -> Mesh {
    let min = if center { -size / 2.0 } else { Vector3::zeros() };
    let max = min + size;
    let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);

    // Each face counter-clockwise seen from outside
    let faces = [
        [p(min.x, min.y, min.z), p(min.x, max.y, min.z), p(max.x, max.y, min.z), p(max.x, min.y, min.z)],
        [p(min.x, min.y, max.z), p(max.x, min.y, max.z), p(max.x, max.y, max.z), p(min.x, max.y, max.z)],
        [p(min.x, min.y, min.z), p(max.x, min.y, min.z), p(max.x, min.y, max.z), p(min.x, min.y, max.z)],
        [p(min.x, max.y, min.z), p(min.x, max.y, max.z), p(max.x, max.y, max.z), p(max.x, max.y, min.z)],
        [p(min.x, min.y, min.z), p(min.x, min.y, max.z), p(min.x, max.y, max.z), p(min.x, max.y, min.z)],
        [p(max.x, min.y, min.z), p(max.x, max.y, min.z), p(max.x, max.y, max.z), p(max.x, min.y, max.z)],
    ];

    let mut mesh = Mesh::with_capacity(24, 12);
    for face in &faces {
        mesh.add_face(face);
    }
    mesh
}

fn generate_sphere_mesh(radius: f64, segments: u32) -> Mesh {
    let slices = segments.max(3) as usize;
    let stacks = (slices / 2).max(2);
    let mut mesh = Mesh::new();

    let north = mesh.add_vertex(Point3::new(0.0, 0.0, radius));
    let mut rings: Vec<Vec<usize>> = Vec::with_capacity(stacks - 1);
    for i in 1..stacks {
        let phi = 180.0 * i as f64 / stacks as f64;
        let z = radius * cos_degrees(phi);
        let rho = radius * sin_degrees(phi);
        let ring = (0..slices)
            .map(|j| {
                let theta = 360.0 * j as f64 / slices as f64;
                mesh.add_vertex(Point3::new(rho * cos_degrees(theta), rho * sin_degrees(theta), z))
            })
            .collect();
        rings.push(ring);
    }
    let south = mesh.add_vertex(Point3::new(0.0, 0.0, -radius));

    let first = &rings[0];
    for j in 0..slices {
        let next = (j + 1) % slices;
        mesh.add_triangle(Triangle::new([north, first[j], first[next]]));
    }
    for pair in rings.windows(2) {
        let (upper, lower) = (&pair[0], &pair[1]);
        for j in 0..slices {
            let next = (j + 1) % slices;
            mesh.add_triangle(Triangle::new([upper[j], lower[j], lower[next]]));
            mesh.add_triangle(Triangle::new([upper[j], lower[next], upper[next]]));
        }
    }
    let last = &rings[rings.len() - 1];
    for j in 0..slices {
        let next = (j + 1) % slices;
        mesh.add_triangle(Triangle::new([south, last[next], last[j]]));
    }

    mesh
}

fn generate_cone_mesh(height: f64, r1: f64, r2: f64, center: bool, segments: u32) -> Mesh {
    let segments = segments.max(3) as usize;
    let z0 = if center { -height / 2.0 } else { 0.0 };
    let z1 = z0 + height;
    let mut mesh = Mesh::new();

    let bottom_center = mesh.add_vertex(Point3::new(0.0, 0.0, z0));
    let top_center = mesh.add_vertex(Point3::new(0.0, 0.0, z1));
    let mut bottom = Vec::with_capacity(segments);
    let mut top = Vec::with_capacity(segments);
    for i in 0..segments {
        let angle = 360.0 * i as f64 / segments as f64;
        let (c, s) = (cos_degrees(angle), sin_degrees(angle));
        bottom.push(mesh.add_vertex(Point3::new(r1 * c, r1 * s, z0)));
        top.push(mesh.add_vertex(Point3::new(r2 * c, r2 * s, z1)));
    }

    for i in 0..segments {
        let next = (i + 1) % segments;
        if r1 > 0.0 {
            mesh.add_triangle(Triangle::new([bottom_center, bottom[next], bottom[i]]));
            mesh.add_triangle(Triangle::new([bottom[i], bottom[next], top[next]]));
        }
        if r2 > 0.0 {
            mesh.add_triangle(Triangle::new([top_center, top[i], top[next]]));
            mesh.add_triangle(Triangle::new([bottom[i], top[next], top[i]]));
        }
    }

    mesh
}

fn generate_polyhedron_mesh(points: &[Point3<f64>], faces: &[Vec<usize>]) -> Result<Mesh, InvalidParameter> {
    let mut mesh = Mesh::with_capacity(points.len(), faces.len() * 2);
    mesh.vertices.extend_from_slice(points);
    for (face_index, face) in faces.iter().enumerate() {
        if let Some(bad) = face.iter().find(|&&i| i >= points.len()) {
            return Err(InvalidParameter(format!(
                "polyhedron face {} references point {} of {}",
                face_index,
                bad,
                points.len()
            )));
        }
        if face.len() < 3 {
            continue;
        }
        // Reverse the clockwise input while fanning
        for i in 1..face.len() - 1 {
            mesh.add_triangle(Triangle::new([face[0], face[i + 1], face[i]]));
        }
    }
    Ok(mesh)
}

fn generate_square(size: Vector2<f64>, center: bool) -> Polygon2d {
    let min = if center { -size / 2.0 } else { Vector2::zeros() };
    let max = min + size;
    let mut polygon = Polygon2d::new();
    polygon.add_outline(Outline2d::new(vec![
        Point2::new(min.x, min.y),
        Point2::new(max.x, min.y),
        Point2::new(max.x, max.y),
        Point2::new(min.x, max.y),
    ]));
    polygon
}

fn generate_circle(r: f64, segments: u32) -> Polygon2d {
    let vertices = (0..segments)
        .map(|i| {
            let angle = 360.0 * i as f64 / segments as f64;
            Point2::new(r * cos_degrees(angle), r * sin_degrees(angle))
        })
        .collect();
    let mut polygon = Polygon2d::new();
    polygon.add_outline(Outline2d::new(vertices));
    polygon
}

fn generate_polygon(points: &[Point2<f64>], paths: &[Vec<usize>]) -> Result<Polygon2d, InvalidParameter> {
    if paths.is_empty() {
        return Ok(Polygon2d::from_outlines(vec![Outline2d::new(points.to_vec())]));
    }
    let mut outlines = Vec::with_capacity(paths.len());
    for path in paths {
        let vertices = path
            .iter()
            .map(|&i| {
                points.get(i).copied().ok_or_else(|| {
                    InvalidParameter(format!("polygon path references point {} of {}", i, points.len()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        outlines.push(Outline2d::new(vertices));
    }
    Ok(Polygon2d::from_outlines(outlines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mesh_of(primitive: Primitive) -> Mesh {
        match primitive.to_geometry().unwrap() {
            Geometry::Mesh(mesh) => mesh,
            other => panic!("expected mesh, got {:?}", other.dim()),
        }
    }

    #[test]
    fn test_cube_generation() {
        let mesh = mesh_of(Primitive::cube(Vector3::new(10.0, 10.0, 10.0), false));
        assert_eq!(mesh.triangle_count(), 12);
        assert_relative_eq!(mesh.volume(), 1000.0, epsilon = 1e-9);
        let bbox = mesh.bounding_box();
        assert_eq!(bbox.min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(bbox.max, Point3::new(10.0, 10.0, 10.0));
    }

    #[test]
    fn test_centered_cube() {
        let mesh = mesh_of(Primitive::cube(Vector3::new(2.0, 4.0, 6.0), true));
        assert_eq!(mesh.bounding_box().min, Point3::new(-1.0, -2.0, -3.0));
        assert_relative_eq!(mesh.volume(), 48.0, epsilon = 1e-9);
    }

    #[test]
    fn test_cylinder_faces_outwards() {
        let mesh = mesh_of(Primitive::cylinder(10.0, 5.0, 32));
        let volume = mesh.volume();
        let exact = std::f64::consts::PI * 25.0 * 10.0;
        assert!(volume > 0.95 * exact && volume < exact, "volume {}", volume);
    }

    #[test]
    fn test_cone_to_apex() {
        let mesh = mesh_of(Primitive::cone(3.0, 1.0, 0.0, 24));
        assert!(mesh.volume() > 0.0);
        assert_eq!(mesh.triangle_count(), 48);
    }

    #[test]
    fn test_sphere_faces_outwards() {
        let mesh = mesh_of(Primitive::sphere(2.0, 24));
        assert!(mesh.volume() > 0.0);
        let bbox = mesh.bounding_box();
        assert_relative_eq!(bbox.max.z, 2.0);
        assert_relative_eq!(bbox.min.z, -2.0);
    }

    #[test]
    fn test_polyhedron_face_index_checked() {
        let bad = Primitive::Polyhedron {
            points: vec![Point3::origin()],
            faces: vec![vec![0, 1, 2]],
        };
        assert!(bad.to_geometry().is_err());
    }

    #[test]
    fn test_square_and_circle() {
        let square = Primitive::square(Vector2::new(2.0, 3.0), true).to_geometry().unwrap();
        assert_relative_eq!(square.measure(), 6.0);
        let circle = Primitive::circle(1.0, 6).to_geometry().unwrap();
        assert_eq!(circle.vertex_count(), 6);
        assert!(circle.measure() > 2.5 && circle.measure() < std::f64::consts::PI);
    }

    #[test]
    fn test_zero_resolution_limits_are_clamped() {
        let circle = Primitive::Circle {
            r: 1.0,
            resolution: Resolution {
                fn_: 0,
                fa: 0.0,
                fs: 0.0,
            },
        };
        assert_eq!(circle.to_geometry().unwrap().vertex_count(), 629);
    }

    #[test]
    fn test_degenerate_sizes_yield_empty() {
        assert!(Primitive::cube(Vector3::new(0.0, 1.0, 1.0), false)
            .to_geometry()
            .unwrap()
            .is_empty());
        assert!(Primitive::circle(-1.0, 8).to_geometry().unwrap().is_empty());
    }
}
