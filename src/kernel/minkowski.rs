// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Minkowski sums built from convex pieces

use super::clipper::{to_geo, union_all};
use super::hull::{hull2d, hull3d, unique_points};
use super::bsp;
use crate::error::KernelError;
use crate::geometry::{Polygon2d, Polyhedron};
use nalgebra::{Matrix4, Point2, Point3};
use tracing::trace;

const CONVEXITY_TOLERANCE: f64 = 1e-7;

pub(crate) fn minkowski2d(a: &Polygon2d, b: &Polygon2d) -> Result<Polygon2d, KernelError> {
    let (parts_a, parts_b) = (convex_parts(a)?, convex_parts(b)?);
    if parts_a.is_empty() || parts_b.is_empty() {
        return Ok(Polygon2d::empty());
    }

    let mut pieces = Vec::with_capacity(parts_a.len() * parts_b.len());
    for x in &parts_a {
        for y in &parts_b {
            let sums: Vec<Point2<f64>> = x.iter().flat_map(|p| y.iter().map(move |q| p + q.coords)).collect();
            let hull = hull2d(&sums)?;
            if !hull.is_empty() {
                pieces.push(hull.to_multipolygon());
            }
        }
    }
    trace!(pieces = pieces.len(), "minkowski2d");
    Ok(Polygon2d::from_multipolygon(&union_all(pieces)?))
}

/// Convex vertex sets covering the polygon: the outline itself when there is
/// a single convex one, otherwise its triangulation
fn convex_parts(polygon: &Polygon2d) -> Result<Vec<Vec<Point2<f64>>>, KernelError> {
    let outlines: Vec<_> = polygon.outlines().iter().filter(|o| !o.vertices.is_empty()).collect();
    if let [single] = outlines.as_slice() {
        if is_convex_loop(&single.vertices) {
            return Ok(vec![single.vertices.clone()]);
        }
    }
    let sanitized = if polygon.is_sanitized() {
        polygon.clone()
    } else {
        Polygon2d::from_multipolygon(&to_geo(polygon)?)
    };
    Ok(sanitized.triangulate().into_iter().map(|t| t.to_vec()).collect())
}

fn is_convex_loop(vertices: &[Point2<f64>]) -> bool {
    let n = vertices.len();
    if n <= 3 {
        return true;
    }
    let (mut positive, mut negative) = (false, false);
    for i in 0..n {
        let (a, b, c) = (vertices[i], vertices[(i + 1) % n], vertices[(i + 2) % n]);
        let cross = (b - a).perp(&(c - b));
        positive |= cross > CONVEXITY_TOLERANCE;
        negative |= cross < -CONVEXITY_TOLERANCE;
    }
    !(positive && negative)
}

pub(crate) fn minkowski3d(a: &Polyhedron, b: &Polyhedron) -> Result<Polyhedron, KernelError> {
    if a.is_empty() || b.is_empty() {
        return Ok(Polyhedron::empty());
    }
    match (a.is_convex(CONVEXITY_TOLERANCE), b.is_convex(CONVEXITY_TOLERANCE)) {
        (true, true) => hull3d(&sums3d(a.points(), &unique_points(b.points()))),
        (false, true) => boundary_sweep(a, b),
        (true, false) => boundary_sweep(b, a),
        (false, false) => Err(KernelError::Unsupported(
            "minkowski sum of two non-convex solids".into(),
        )),
    }
}

fn sums3d<'a>(points: impl Iterator<Item = &'a Point3<f64>>, offsets: &[Point3<f64>]) -> Vec<Point3<f64>> {
    let base = unique_points(points);
    base.iter().flat_map(|p| offsets.iter().map(move |q| p + q.coords)).collect()
}

/// `S + C` for a convex `C` as `(S + c0)` united with the hull of every face
/// of `S` swept over `C`
fn boundary_sweep(solid: &Polyhedron, convex: &Polyhedron) -> Result<Polyhedron, KernelError> {
    let offsets = unique_points(convex.points());
    let Some(anchor) = offsets.first() else {
        return Ok(Polyhedron::empty());
    };

    let mut translated = solid.clone();
    translated.transform(&Matrix4::new_translation(&anchor.coords));

    let mut pieces = vec![translated];
    for face in solid.faces() {
        let piece = hull3d(&sums3d(face.vertices.iter(), &offsets))?;
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }
    trace!(pieces = pieces.len(), "minkowski3d boundary sweep");

    while pieces.len() > 1 {
        let mut next = Vec::with_capacity(pieces.len().div_ceil(2));
        let mut iter = pieces.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => next.push(bsp::union(&first, &second)),
                None => next.push(first),
            }
        }
        pieces = next;
    }
    Ok(pieces.pop().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Face, Outline2d};
    use approx::assert_relative_eq;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon2d {
        let mut set = Polygon2d::new();
        set.add_outline(Outline2d::new(vec![
            Point2::new(x0, y0),
            Point2::new(x0 + size, y0),
            Point2::new(x0 + size, y0 + size),
            Point2::new(x0, y0 + size),
        ]));
        set
    }

    fn box_solid(min: Point3<f64>, max: Point3<f64>) -> Polyhedron {
        let p = Point3::new;
        let (a, b) = (min, max);
        Polyhedron::from_faces(vec![
            Face::new(vec![p(a.x, a.y, a.z), p(a.x, b.y, a.z), p(b.x, b.y, a.z), p(b.x, a.y, a.z)]),
            Face::new(vec![p(a.x, a.y, b.z), p(b.x, a.y, b.z), p(b.x, b.y, b.z), p(a.x, b.y, b.z)]),
            Face::new(vec![p(a.x, a.y, a.z), p(b.x, a.y, a.z), p(b.x, a.y, b.z), p(a.x, a.y, b.z)]),
            Face::new(vec![p(a.x, b.y, a.z), p(a.x, b.y, b.z), p(b.x, b.y, b.z), p(b.x, b.y, a.z)]),
            Face::new(vec![p(a.x, a.y, a.z), p(a.x, a.y, b.z), p(a.x, b.y, b.z), p(a.x, b.y, a.z)]),
            Face::new(vec![p(b.x, a.y, a.z), p(b.x, b.y, a.z), p(b.x, b.y, b.z), p(b.x, a.y, b.z)]),
        ])
    }

    #[test]
    fn test_minkowski2d_of_squares() {
        let result = minkowski2d(&square(0.0, 0.0, 2.0), &square(-0.5, -0.5, 1.0)).unwrap();
        assert_relative_eq!(result.area(), 9.0, epsilon = 1e-9);
        assert_relative_eq!(result.bounding_box().min.x, -0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_minkowski2d_with_origin_point_is_identity() {
        let point = Polygon2d::from_outlines(vec![Outline2d::new(vec![Point2::origin()])]);
        let result = minkowski2d(&square(1.0, 1.0, 2.0), &point).unwrap();
        assert_relative_eq!(result.area(), 4.0, epsilon = 1e-9);
        assert_relative_eq!(result.bounding_box().min.y, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_minkowski2d_non_convex() {
        // L shape, area 3
        let mut l_shape = Polygon2d::new();
        l_shape.add_outline(Outline2d::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
        ]));
        let result = minkowski2d(&l_shape, &square(0.0, 0.0, 1.0)).unwrap();
        // L grown by one unit to the upper right: 3x3 minus the 1x1 notch
        assert_relative_eq!(result.area(), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_minkowski3d_convex_boxes() {
        let a = box_solid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let b = box_solid(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0));
        let result = minkowski3d(&a, &b).unwrap();
        assert_relative_eq!(result.volume(), 2.0 * 3.0 * 4.0, epsilon = 1e-6);
    }

    #[test]
    fn test_minkowski3d_non_convex_pair_unsupported() {
        let a = box_solid(Point3::new(0.0, 0.0, 0.0), Point3::new(3.0, 3.0, 3.0));
        let hole = box_solid(Point3::new(1.0, 1.0, -1.0), Point3::new(2.0, 2.0, 4.0));
        let tube = bsp::difference(&a, &hole);
        assert!(matches!(minkowski3d(&tube, &tube), Err(KernelError::Unsupported(_))));
    }
}
