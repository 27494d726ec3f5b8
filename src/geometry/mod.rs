// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - evaluated values and mesh generation

mod bbox;
mod mesh;
pub(crate) mod polygon2d;
mod polyhedron;
mod primitives;
pub mod sweep;

pub use bbox::BoundingBox;
pub use mesh::{Mesh, Triangle};
pub use polygon2d::{Outline2d, Polygon2d};
pub use polyhedron::{Face, Polyhedron};
pub use primitives::{Primitive, Resolution};

use nalgebra::{Matrix3, Matrix4};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Published geometry, shared read-only between the cache and parents
pub type SharedGeometry = Arc<Geometry>;

/// Dimensionality of a geometry value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dim {
    Two,
    Three,
}

/// Evaluated geometry of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Polygon2d(Polygon2d),
    /// Fast boundary mesh
    Mesh(Mesh),
    /// Form required by the boolean kernel
    Polyhedron(Polyhedron),
}

impl Geometry {
    /// Empty value of the given dimensionality
    pub fn empty(dim: Dim) -> Self {
        match dim {
            Dim::Two => Geometry::Polygon2d(Polygon2d::empty()),
            Dim::Three => Geometry::Polyhedron(Polyhedron::empty()),
        }
    }

    pub fn dim(&self) -> Dim {
        match self {
            Geometry::Polygon2d(_) => Dim::Two,
            Geometry::Mesh(_) | Geometry::Polyhedron(_) => Dim::Three,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Polygon2d(p) => p.is_empty(),
            Geometry::Mesh(m) => m.is_empty(),
            Geometry::Polyhedron(p) => p.is_empty(),
        }
    }

    /// Whether a 3D value is already in the kernel's polyhedron form
    pub fn is_exact(&self) -> bool {
        matches!(self, Geometry::Polyhedron(_))
    }

    pub fn as_polygon2d(&self) -> Option<&Polygon2d> {
        match self {
            Geometry::Polygon2d(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match self {
            Geometry::Mesh(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_polyhedron(&self) -> Option<&Polyhedron> {
        match self {
            Geometry::Polyhedron(p) => Some(p),
            _ => None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        match self {
            Geometry::Polygon2d(p) => p.vertex_count(),
            Geometry::Mesh(m) => m.vertex_count(),
            Geometry::Polyhedron(p) => p.points().count(),
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Geometry::Polygon2d(p) => p.bounding_box(),
            Geometry::Mesh(m) => m.bounding_box(),
            Geometry::Polyhedron(p) => p.bounding_box(),
        }
    }

    /// Area for 2D values, volume for 3D values
    pub fn measure(&self) -> f64 {
        match self {
            Geometry::Polygon2d(p) => p.area(),
            Geometry::Mesh(m) => m.volume(),
            Geometry::Polyhedron(p) => p.volume(),
        }
    }

    /// Representation-independent comparison: same dimension, bounds and
    /// measure within `tolerance`
    pub fn canonical_eq(&self, other: &Geometry, tolerance: f64) -> bool {
        self.dim() == other.dim()
            && self.is_empty() == other.is_empty()
            && self.bounding_box().approx_eq(&other.bounding_box(), tolerance)
            && (self.measure() - other.measure()).abs() < tolerance
    }

    /// Apply an affine matrix; 2D values use its XY part
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        match self {
            Geometry::Polygon2d(p) => p.transform(&planar_part(matrix)),
            Geometry::Mesh(m) => m.transform(matrix),
            Geometry::Polyhedron(p) => p.transform(matrix),
        }
    }
}

/// Result of one operator, before it is published.
///
/// `Owned` values belong to the computing frame and may still be modified;
/// `Shared` values were handed through unchanged (for example a single
/// child of a union) and are never copied unless a mutation is needed.
#[derive(Debug)]
pub(crate) enum Outcome {
    Owned(Geometry),
    Shared(SharedGeometry),
}

impl Outcome {
    pub(crate) fn empty(dim: Dim) -> Self {
        Outcome::Owned(Geometry::empty(dim))
    }

    pub(crate) fn geometry(&self) -> &Geometry {
        match self {
            Outcome::Owned(g) => g,
            Outcome::Shared(g) => g,
        }
    }

    /// Take ownership, copying only if the value is still shared elsewhere
    pub(crate) fn into_owned(self) -> Geometry {
        match self {
            Outcome::Owned(g) => g,
            Outcome::Shared(g) => Arc::unwrap_or_clone(g),
        }
    }

    /// The single conversion point into shared form
    pub(crate) fn publish(self) -> SharedGeometry {
        match self {
            Outcome::Owned(g) => Arc::new(g),
            Outcome::Shared(g) => g,
        }
    }
}

/// XY affine part of a 3D matrix as a homogeneous 2D matrix
#[rustfmt::skip]
pub fn planar_part(m: &Matrix4<f64>) -> Matrix3<f64> {
    Matrix3::new(
        m[(0, 0)], m[(0, 1)], m[(0, 3)],
        m[(1, 0)], m[(1, 1)], m[(1, 3)],
        0.0, 0.0, 1.0,
    )
}

pub(crate) fn is_mirroring(m: &Matrix4<f64>) -> bool {
    m.fixed_view::<3, 3>(0, 0).clone_owned().determinant() < 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Vector2, Vector3};

    #[test]
    fn test_empty_keeps_dimension() {
        assert_eq!(Geometry::empty(Dim::Two).dim(), Dim::Two);
        assert_eq!(Geometry::empty(Dim::Three).dim(), Dim::Three);
        assert!(Geometry::empty(Dim::Three).is_empty());
        assert!(Geometry::empty(Dim::Three).is_exact());
    }

    #[test]
    fn test_outcome_publish_reuses_shared_value() {
        let shared: SharedGeometry = Arc::new(Geometry::empty(Dim::Two));
        let published = Outcome::Shared(shared.clone()).publish();
        assert!(Arc::ptr_eq(&shared, &published));
    }

    #[test]
    fn test_outcome_into_owned_copies_only_when_shared() {
        let geometry = Primitive::square(Vector2::new(1.0, 1.0), false).to_geometry().unwrap();
        let shared = Arc::new(geometry);
        let keep = shared.clone();
        let mut owned = Outcome::Shared(shared).into_owned();
        owned.transform(&Matrix4::new_translation(&Vector3::new(5.0, 0.0, 0.0)));
        assert_eq!(keep.bounding_box().min.x, 0.0);
        assert_eq!(owned.bounding_box().min.x, 5.0);
    }

    #[test]
    fn test_canonical_eq_ignores_representation() {
        let mesh = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_geometry().unwrap();
        let other = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_geometry().unwrap();
        assert!(mesh.canonical_eq(&other, 1e-9));
        assert!(!mesh.canonical_eq(&Geometry::empty(Dim::Three), 1e-9));
    }
}
