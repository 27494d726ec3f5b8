// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boundary mesh representation

use super::BoundingBox;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Triangle defined by three vertex indices, counter-clockwise seen from
/// outside the solid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [usize; 3],
}

impl Triangle {
    pub fn new(indices: [usize; 3]) -> Self {
        Self { indices }
    }
}

/// Indexed triangle mesh. The fast 3D form produced by primitives and sweeps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
        }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Point3<f64>) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    /// Add a planar convex face by fanning from its first vertex
    pub fn add_face(&mut self, points: &[Point3<f64>]) {
        if points.len() < 3 {
            return;
        }
        let base = self.vertices.len();
        self.vertices.extend_from_slice(points);
        for i in 1..points.len() - 1 {
            self.add_triangle(Triangle::new([base, base + i, base + i + 1]));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle_points(&self) -> impl Iterator<Item = [Point3<f64>; 3]> + '_ {
        self.triangles.iter().map(move |t| {
            [
                self.vertices[t.indices[0]],
                self.vertices[t.indices[1]],
                self.vertices[t.indices[2]],
            ]
        })
    }

    /// Transform all vertices by a matrix. Mirroring transforms reverse the
    /// winding so faces keep pointing outwards.
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for vertex in &mut self.vertices {
            *vertex = matrix.transform_point(vertex);
        }
        if super::is_mirroring(matrix) {
            self.reverse_winding();
        }
    }

    pub fn reverse_winding(&mut self) {
        for triangle in &mut self.triangles {
            triangle.indices.swap(1, 2);
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.vertices)
    }

    /// Enclosed volume, positive for outward-facing triangles
    pub fn volume(&self) -> f64 {
        self.triangle_points()
            .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)) / 6.0)
            .sum()
    }

    /// Unit normal of a triangle, `None` when degenerate
    pub fn triangle_normal(points: &[Point3<f64>; 3]) -> Option<Vector3<f64>> {
        let n = (points[1] - points[0]).cross(&(points[2] - points[0]));
        let len = n.norm();
        if len < 1e-12 || !len.is_finite() {
            None
        } else {
            Some(n / len)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetrahedron() -> Mesh {
        let mut mesh = Mesh::new();
        let o = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let x = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let y = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        let z = mesh.add_vertex(Point3::new(0.0, 0.0, 1.0));
        mesh.add_triangle(Triangle::new([o, y, x]));
        mesh.add_triangle(Triangle::new([o, x, z]));
        mesh.add_triangle(Triangle::new([o, z, y]));
        mesh.add_triangle(Triangle::new([x, y, z]));
        mesh
    }

    #[test]
    fn test_volume_of_tetrahedron() {
        assert_relative_eq!(tetrahedron().volume(), 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mirror_keeps_volume_positive() {
        let mut mesh = tetrahedron();
        mesh.transform(&Matrix4::new_nonuniform_scaling(&Vector3::new(-1.0, 1.0, 1.0)));
        assert_relative_eq!(mesh.volume(), 1.0 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(mesh.bounding_box().min.x, -1.0);
    }
}
