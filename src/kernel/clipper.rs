// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polygon clipping over `geo` multipolygons

use crate::error::KernelError;
use crate::geometry::polygon2d::to_line_string;
use crate::geometry::Polygon2d;
use geo::{BooleanOps, MultiPolygon, Polygon as GeoPolygon};
use std::panic::{catch_unwind, AssertUnwindSafe};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClipOp {
    Union,
    Intersection,
    Difference,
}

/// Structured, validated view of a polygon set. Unsanitized sets are
/// resolved with the even-odd rule.
pub(crate) fn to_geo(polygon: &Polygon2d) -> Result<MultiPolygon<f64>, KernelError> {
    if polygon.points().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(KernelError::NonFinite("polygon"));
    }
    if polygon.is_sanitized() {
        return Ok(polygon.to_multipolygon());
    }
    let mut result = MultiPolygon::new(Vec::new());
    for outline in polygon.outlines() {
        if outline.vertices.len() < 3 {
            continue;
        }
        let ring = MultiPolygon::new(vec![GeoPolygon::new(to_line_string(&outline.vertices), Vec::new())]);
        result = guarded(|| result.xor(&ring))?;
    }
    Ok(result)
}

pub(crate) fn clip(a: &Polygon2d, b: &Polygon2d, op: ClipOp) -> Result<Polygon2d, KernelError> {
    let (a, b) = (to_geo(a)?, to_geo(b)?);
    let result = guarded(|| match op {
        ClipOp::Union => a.union(&b),
        ClipOp::Intersection => a.intersection(&b),
        ClipOp::Difference => a.difference(&b),
    })?;
    Ok(Polygon2d::from_multipolygon(&result))
}

/// Union of many multipolygons, pairing neighbours so intermediate results
/// stay small
pub(crate) fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> Result<MultiPolygon<f64>, KernelError> {
    if parts.is_empty() {
        return Ok(MultiPolygon::new(Vec::new()));
    }
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => next.push(guarded(|| first.union(&second))?),
                None => next.push(first),
            }
        }
        parts = next;
    }
    Ok(parts.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new())))
}

/// The sweep-line clipper panics on some degenerate inputs; surface that as
/// a kernel error instead of tearing down the worker
pub(crate) fn guarded<T>(op: impl FnOnce() -> T) -> Result<T, KernelError> {
    catch_unwind(AssertUnwindSafe(op))
        .map_err(|_| KernelError::Degenerate("polygon clipping did not converge".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Outline2d;
    use approx::assert_relative_eq;
    use nalgebra::Point2;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon2d {
        let mut set = Polygon2d::new();
        set.add_outline(Outline2d::new(vec![
            Point2::new(x0, y0),
            Point2::new(x1, y0),
            Point2::new(x1, y1),
            Point2::new(x0, y1),
        ]));
        set
    }

    #[test]
    fn test_clip_ops() {
        let a = rect(0.0, 0.0, 2.0, 2.0);
        let b = rect(1.0, 1.0, 3.0, 3.0);
        assert_relative_eq!(clip(&a, &b, ClipOp::Union).unwrap().area(), 7.0, epsilon = 1e-9);
        assert_relative_eq!(clip(&a, &b, ClipOp::Intersection).unwrap().area(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(clip(&a, &b, ClipOp::Difference).unwrap().area(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unsanitized_set_is_even_odd() {
        let nested = Polygon2d::from_outlines(vec![
            rect(0.0, 0.0, 4.0, 4.0).outlines()[0].clone(),
            rect(1.0, 1.0, 3.0, 3.0).outlines()[0].clone(),
        ]);
        let multi = to_geo(&nested).unwrap();
        assert_eq!(multi.0.len(), 1);
        assert_eq!(multi.0[0].interiors().len(), 1);
    }

    #[test]
    fn test_non_finite_rejected() {
        let bad = rect(0.0, 0.0, f64::NAN, 1.0);
        assert!(matches!(to_geo(&bad), Err(KernelError::NonFinite(_))));
    }

    #[test]
    fn test_union_all_merges_neighbours() {
        let parts = (0..5)
            .map(|i| rect(i as f64, 0.0, i as f64 + 1.5, 1.0).to_multipolygon())
            .collect();
        let merged = union_all(parts).unwrap();
        assert_eq!(merged.0.len(), 1);
    }
}
