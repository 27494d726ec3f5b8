// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyhedron form used by the boolean kernel

use super::BoundingBox;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Planar convex face, counter-clockwise seen from outside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub vertices: Vec<Point3<f64>>,
}

impl Face {
    pub fn new(vertices: Vec<Point3<f64>>) -> Self {
        Self { vertices }
    }

    /// Newell normal scaled by twice the face area
    pub fn area_vector(&self) -> Vector3<f64> {
        let mut n = Vector3::zeros();
        let count = self.vertices.len();
        for i in 0..count {
            let a = &self.vertices[i];
            let b = &self.vertices[(i + 1) % count];
            n.x += (a.y - b.y) * (a.z + b.z);
            n.y += (a.z - b.z) * (a.x + b.x);
            n.z += (a.x - b.x) * (a.y + b.y);
        }
        n
    }

    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.area_vector();
        let len = n.norm();
        (len > 1e-12 && len.is_finite()).then(|| n / len)
    }
}

/// Closed solid as a list of faces.
///
/// This is the form every 3D operand is coerced into before boolean
/// combination. Faces are independent polygons; the kernel does not rely on
/// shared vertex indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyhedron {
    faces: Vec<Face>,
}

impl Polyhedron {
    pub fn new() -> Self {
        Self { faces: Vec::new() }
    }

    pub fn empty() -> Self {
        Self::new()
    }

    pub fn from_faces(faces: Vec<Face>) -> Self {
        Self { faces }
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn into_faces(self) -> Vec<Face> {
        self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn points(&self) -> impl Iterator<Item = &Point3<f64>> {
        self.faces.iter().flat_map(|f| f.vertices.iter())
    }

    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        let mirror = super::is_mirroring(matrix);
        for face in &mut self.faces {
            for v in &mut face.vertices {
                *v = matrix.transform_point(v);
            }
            if mirror {
                face.vertices.reverse();
            }
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.points())
    }

    pub fn volume(&self) -> f64 {
        let mut total = 0.0;
        for face in &self.faces {
            let v = &face.vertices;
            for i in 1..v.len().saturating_sub(1) {
                total += v[0].coords.dot(&v[i].coords.cross(&v[i + 1].coords));
            }
        }
        total / 6.0
    }

    /// True when no vertex lies in front of any face plane
    pub fn is_convex(&self, epsilon: f64) -> bool {
        self.faces.iter().all(|face| {
            let Some(normal) = face.normal() else {
                return true;
            };
            let w = normal.dot(&face.vertices[0].coords);
            self.points().all(|p| normal.dot(&p.coords) - w <= epsilon)
        })
    }
}
