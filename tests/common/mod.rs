// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Shared helpers for the integration tests

#![allow(dead_code)]

use geomeval::kernel::{KernelResult, OffsetParams};
use geomeval::{DefaultKernel, GeometryKernel, KernelError, Mesh, Polygon2d, Polyhedron};
use nalgebra::{Point2, Point3};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Kernel that forwards to [`DefaultKernel`] and counts every call.
/// Operations named in `failing` return a degenerate-input error instead.
#[derive(Default)]
pub struct CountingKernel {
    inner: DefaultKernel,
    calls: Mutex<BTreeMap<&'static str, usize>>,
    failing: Vec<&'static str>,
}

impl CountingKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(operations: &[&'static str]) -> Self {
        Self {
            failing: operations.to_vec(),
            ..Self::default()
        }
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls.lock().unwrap().get(operation).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn record(&self, operation: &'static str) -> KernelResult<()> {
        *self.calls.lock().unwrap().entry(operation).or_insert(0) += 1;
        if self.failing.contains(&operation) {
            return Err(KernelError::Degenerate(format!("{} refused by test kernel", operation)));
        }
        Ok(())
    }
}

impl GeometryKernel for CountingKernel {
    fn union3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron> {
        self.record("union3d")?;
        self.inner.union3d(a, b)
    }

    fn intersection3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron> {
        self.record("intersection3d")?;
        self.inner.intersection3d(a, b)
    }

    fn difference3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron> {
        self.record("difference3d")?;
        self.inner.difference3d(a, b)
    }

    fn hull3d(&self, points: &[Point3<f64>]) -> KernelResult<Polyhedron> {
        self.record("hull3d")?;
        self.inner.hull3d(points)
    }

    fn minkowski3d(&self, a: &Polyhedron, b: &Polyhedron) -> KernelResult<Polyhedron> {
        self.record("minkowski3d")?;
        self.inner.minkowski3d(a, b)
    }

    fn to_polyhedron(&self, mesh: &Mesh) -> KernelResult<Polyhedron> {
        self.record("to_polyhedron")?;
        self.inner.to_polyhedron(mesh)
    }

    fn to_mesh(&self, solid: &Polyhedron) -> Mesh {
        let _ = self.record("to_mesh");
        self.inner.to_mesh(solid)
    }

    fn union2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d> {
        self.record("union2d")?;
        self.inner.union2d(a, b)
    }

    fn intersection2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d> {
        self.record("intersection2d")?;
        self.inner.intersection2d(a, b)
    }

    fn difference2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d> {
        self.record("difference2d")?;
        self.inner.difference2d(a, b)
    }

    fn hull2d(&self, points: &[Point2<f64>]) -> KernelResult<Polygon2d> {
        self.record("hull2d")?;
        self.inner.hull2d(points)
    }

    fn minkowski2d(&self, a: &Polygon2d, b: &Polygon2d) -> KernelResult<Polygon2d> {
        self.record("minkowski2d")?;
        self.inner.minkowski2d(a, b)
    }

    fn offset2d(&self, polygon: &Polygon2d, params: &OffsetParams) -> KernelResult<Polygon2d> {
        self.record("offset2d")?;
        self.inner.offset2d(polygon, params)
    }

    fn sanitize2d(&self, polygon: &Polygon2d) -> KernelResult<Polygon2d> {
        self.record("sanitize2d")?;
        self.inner.sanitize2d(polygon)
    }

    fn union2d_all(&self, parts: &[&Polygon2d]) -> KernelResult<Polygon2d> {
        self.record("union2d_all")?;
        self.inner.union2d_all(parts)
    }
}
