// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Convex hulls

use crate::error::KernelError;
use crate::geometry::{Face, Polygon2d, Polyhedron};
use ahash::{AHashMap, AHashSet};
use std::collections::hash_map::Entry;
use geo::{Area, ConvexHull, MultiPoint, MultiPolygon, Point as GeoPoint};
use nalgebra::{Point2, Point3};
use parry3d::transformation::try_convex_hull;

/// Relative tolerance for flat or collinear point sets
const FLATNESS: f64 = 1e-9;

pub(crate) fn hull2d(points: &[Point2<f64>]) -> Result<Polygon2d, KernelError> {
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(KernelError::NonFinite("hull points"));
    }
    if points.len() < 3 {
        return Ok(Polygon2d::empty());
    }
    let multi: MultiPoint<f64> = points.iter().map(|p| GeoPoint::new(p.x, p.y)).collect();
    let hull = multi.convex_hull();
    if hull.unsigned_area() <= 0.0 {
        return Ok(Polygon2d::empty());
    }
    Ok(Polygon2d::from_multipolygon(&MultiPolygon::new(vec![hull])))
}

pub(crate) fn hull3d(points: &[Point3<f64>]) -> Result<Polyhedron, KernelError> {
    if points.iter().any(|p| p.iter().any(|c| !c.is_finite())) {
        return Err(KernelError::NonFinite("hull points"));
    }
    let unique = unique_points(points.iter());
    if !spans_volume(&unique) {
        return Ok(Polyhedron::empty());
    }

    // Points that collide in single precision share one entry; the first
    // one seen stands for the rest
    let mut originals = AHashMap::with_capacity(unique.len());
    let mut input = Vec::with_capacity(unique.len());
    for p in &unique {
        let narrow = p.cast::<f32>();
        if let Entry::Vacant(slot) = originals.entry(f32_key(&narrow)) {
            slot.insert(*p);
            input.push(narrow);
        }
    }
    let (vertices, indices) =
        try_convex_hull(&input).map_err(|e| KernelError::Degenerate(format!("convex hull: {:?}", e)))?;

    // Hull vertices are copies of input points; recover full precision
    let snapped = vertices
        .iter()
        .map(|v| {
            originals
                .get(&f32_key(v))
                .copied()
                .ok_or_else(|| KernelError::Degenerate("convex hull invented a vertex".to_string()))
        })
        .collect::<Result<Vec<Point3<f64>>, _>>()?;
    let centroid = snapped.iter().fold(Point3::origin(), |acc, p| acc + p.coords) / snapped.len() as f64;

    let mut faces = Vec::with_capacity(indices.len());
    for [i, j, k] in indices {
        let (a, b, c) = (snapped[i as usize], snapped[j as usize], snapped[k as usize]);
        let normal = (b - a).cross(&(c - a));
        if normal.norm_squared() == 0.0 {
            continue;
        }
        if normal.dot(&(a - centroid)) < 0.0 {
            faces.push(Face::new(vec![a, c, b]));
        } else {
            faces.push(Face::new(vec![a, b, c]));
        }
    }
    Ok(Polyhedron::from_faces(faces))
}

/// Distinct points, in first-seen order
pub(crate) fn unique_points<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> Vec<Point3<f64>> {
    let mut seen = AHashSet::new();
    points
        .filter(|p| seen.insert([p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]))
        .copied()
        .collect()
}

/// Whether the points contain four that are not coplanar
fn spans_volume(points: &[Point3<f64>]) -> bool {
    let Some(&p0) = points.first() else {
        return false;
    };
    let extent = points.iter().map(|p| (p - p0).norm()).fold(0.0, f64::max);
    if extent == 0.0 {
        return false;
    }
    let tolerance = FLATNESS * extent;

    let Some(&p1) = points.iter().max_by(|a, b| (*a - p0).norm().total_cmp(&(*b - p0).norm())) else {
        return false;
    };
    let axis = p1 - p0;
    let Some(&p2) = points
        .iter()
        .max_by(|a, b| axis.cross(&(*a - p0)).norm().total_cmp(&axis.cross(&(*b - p0)).norm()))
    else {
        return false;
    };
    let normal = axis.cross(&(p2 - p0));
    if normal.norm() <= tolerance * extent {
        return false;
    }
    let normal = normal.normalize();
    points.iter().any(|p| normal.dot(&(p - p0)).abs() > tolerance)
}

fn f32_key(p: &Point3<f32>) -> [u32; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}
