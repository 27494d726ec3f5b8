// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry kernel capability.
//!
//! The evaluator never combines geometry itself; every boolean, hull,
//! Minkowski sum, offset and representation change goes through a
//! [`GeometryKernel`]. [`DefaultKernel`] is the bundled implementation:
//! BSP-tree booleans for solids, `geo` clipping for polygon sets and
//! `parry3d` for 3D hulls. It works in floating point and makes no
//! robustness guarantees.

mod bsp;
mod clipper;
mod hull;
mod minkowski;
mod offset;

pub use offset::{JoinType, OffsetParams};

use crate::error::KernelError;
use crate::geometry::{Face, Mesh, Polygon2d, Polyhedron, Triangle};
use ahash::AHashMap;
use clipper::ClipOp;
use nalgebra::{Point2, Point3};

pub type KernelResult<T> = Result<T, KernelError>;

/// Operations the evaluator delegates to a geometry kernel
pub trait GeometryKernel: Send + Sync {
    fn union3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron>;
    fn intersection3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron>;
    fn difference3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron>;
    fn hull3d(&self, points: &[Point3<f64>]) -> KernelResult<Polyhedron>;
    fn minkowski3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron>;

    /// Mesh to exact form
    fn to_polyhedron(&self, mesh: &Mesh) -> KernelResult<Polyhedron>;
    /// Exact form to mesh
    fn to_mesh(&self, solid: &Polyhedron) -> Mesh;

    fn union2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d>;
    fn intersection2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d>;
    fn difference2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d>;
    fn hull2d(&self, points: &[Point2<f64>]) -> KernelResult<Polygon2d>;
    fn minkowski2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d>;
    fn offset2d(&self, polygon: &Polygon2d, params: &OffsetParams) -> KernelResult<Polygon2d>;

    /// Resolve overlaps and orientation of an even-odd polygon set
    fn sanitize2d(&self, polygon: &Polygon2d) -> KernelResult<Polygon2d>;

    /// Union of many polygon sets
    fn union2d_all(&self, parts: &[&Polygon2d]) -> KernelResult<Polygon2d> {
        let mut iter = parts.iter();
        let Some(first) = iter.next() else {
            return Ok(Polygon2d::empty());
        };
        let mut result = self.sanitize2d(first)?;
        for part in iter {
            result = self.union2d(&result, part)?;
        }
        Ok(result)
    }
}

/// Bundled floating-point kernel
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultKernel;

impl DefaultKernel {
    pub fn new() -> Self {
        Self
    }
}

fn check_solid(solid: &Polyhedron) -> KernelResult<()> {
    if solid.points().any(|p| p.iter().any(|c| !c.is_finite())) {
        return Err(KernelError::NonFinite("solid"));
    }
    Ok(())
}

impl GeometryKernel for DefaultKernel {
    fn union3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron> {
        check_solid(a)?;
        check_solid(b)?;
        Ok(bsp::union(a, b))
    }

    fn intersection3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron> {
        check_solid(a)?;
        check_solid(b)?;
        Ok(bsp::intersection(a, b))
    }

    fn difference3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron> {
        check_solid(a)?;
        check_solid(b)?;
        Ok(bsp::difference(a, b))
    }

    fn hull3d(&self, points: &[Point3<f64>]) -> KernelResult<Polyhedron> {
        hull::hull3d(points)
    }

    fn minkowski3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron> {
        check_solid(a)?;
        check_solid(b)?;
        minkowski::minkowski3d(a, b)
    }

    fn to_polyhedron(&self, mesh: &Mesh) -> KernelResult<Polyhedron> {
        if mesh.vertices.iter().any(|p| p.iter().any(|c| !c.is_finite())) {
            return Err(KernelError::NonFinite("mesh"));
        }
        let count = mesh.vertex_count();
        if let Some(bad) = mesh.triangles.iter().find(|t| t.indices.iter().any(|&i| i >= count)) {
            return Err(KernelError::Degenerate(format!(
                "triangle {:?} indexes past {} vertices",
                bad.indices, count
            )));
        }
        let faces = mesh
            .triangle_points()
            .filter(|points| Mesh::triangle_normal(points).is_some())
            .map(|points| Face::new(points.to_vec()))
            .collect();
        Ok(Polyhedron::from_faces(faces))
    }

    fn to_mesh(&self, solid: &Polyhedron) -> Mesh {
        let mut mesh = Mesh::with_capacity(solid.face_count() * 2, solid.face_count() * 2);
        let mut index: AHashMap<[u64; 3], usize> = AHashMap::new();
        for face in solid.faces() {
            let ids: Vec<usize> = face
                .vertices
                .iter()
                .map(|p| {
                    *index
                        .entry([p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
                        .or_insert_with(|| mesh.add_vertex(*p))
                })
                .collect();
            for i in 1..ids.len().saturating_sub(1) {
                mesh.add_triangle(Triangle::new([ids[0], ids[i], ids[i + 1]]));
            }
        }
        mesh
    }

    fn union2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d> {
        clipper::clip(a, b, ClipOp::Union)
    }

    fn intersection2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d> {
        clipper::clip(a, b, ClipOp::Intersection)
    }

    fn difference2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d> {
        clipper::clip(a, b, ClipOp::Difference)
    }

    fn hull2d(&self, points: &[Point2<f64>]) -> KernelResult<Polygon2d> {
        hull::hull2d(points)
    }

    fn minkowski2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d> {
        minkowski::minkowski2d(a, b)
    }

    fn offset2d(&self, polygon: &Polygon2d, params: &OffsetParams) -> KernelResult<Polygon2d> {
        offset::offset(polygon, params)
    }

    fn sanitize2d(&self, polygon: &Polygon2d) -> KernelResult<Polygon2d> {
        if polygon.is_sanitized() {
            return Ok(polygon.clone());
        }
        Ok(Polygon2d::from_multipolygon(&clipper::to_geo(polygon)?))
    }

    fn union2d_all(&self, parts: &[&Polygon2d]) -> KernelResult<Polygon2d> {
        let multis = parts.iter().map(|p| clipper::to_geo(p)).collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon2d::from_multipolygon(&clipper::union_all(multis)?))
    }
}
