// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polygon offsetting

use super::clipper::{guarded, to_geo, union_all};
use crate::error::KernelError;
use crate::geometry::polygon2d::{from_line_string, to_line_string};
use crate::geometry::{Polygon2d, Resolution};
use crate::utils::math::{cos_degrees, sin_degrees};
use geo::orient::{Direction, Orient};
use geo::{BooleanOps, MultiPolygon, Polygon as GeoPolygon};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// How offset outlines meet at a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Round,
    Miter,
    Square,
}

/// `offset` parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetParams {
    /// Positive grows, negative shrinks
    pub delta: f64,
    pub join: JoinType,
    /// Largest miter length, as a multiple of `delta`, before a miter join
    /// is squared off
    pub miter_limit: f64,
    pub resolution: Resolution,
}

impl OffsetParams {
    /// `offset(r = ...)`
    pub fn round(r: f64, resolution: Resolution) -> Self {
        Self {
            delta: r,
            join: JoinType::Round,
            miter_limit: 2.0,
            resolution,
        }
    }

    /// `offset(delta = ..., chamfer = ...)`
    pub fn delta(delta: f64, chamfer: bool) -> Self {
        Self {
            delta,
            join: if chamfer { JoinType::Square } else { JoinType::Miter },
            miter_limit: 2.0,
            resolution: Resolution::default(),
        }
    }
}

/// Grow by uniting with the stroke of the outline, shrink by subtracting it
pub(crate) fn offset(polygon: &Polygon2d, params: &OffsetParams) -> Result<Polygon2d, KernelError> {
    if !params.delta.is_finite() {
        return Err(KernelError::NonFinite("offset distance"));
    }
    let multi = to_geo(polygon)?.orient(Direction::Default);
    if params.delta == 0.0 || multi.0.is_empty() {
        return Ok(Polygon2d::from_multipolygon(&multi));
    }

    let d = params.delta.abs();
    let side = params.delta.signum();
    let mut parts = Vec::new();
    for poly in &multi.0 {
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
            let ring = from_line_string(ring);
            stroke_ring(&ring, d, side, params, &mut parts);
        }
    }

    let stroke = union_all(parts)?;
    let result = guarded(|| {
        if params.delta > 0.0 {
            multi.union(&stroke)
        } else {
            multi.difference(&stroke)
        }
    })?;
    Ok(Polygon2d::from_multipolygon(&result))
}

fn stroke_ring(ring: &[Point2<f64>], d: f64, side: f64, params: &OffsetParams, parts: &mut Vec<MultiPolygon<f64>>) {
    let n = ring.len();
    if n < 2 {
        return;
    }
    let outward = |a: &Point2<f64>, b: &Point2<f64>| -> Option<(Vector2<f64>, Vector2<f64>)> {
        let e = b - a;
        let len = e.norm();
        (len > 1e-12).then(|| (e / len, Vector2::new(e.y, -e.x) / len))
    };

    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        if let Some((_, normal)) = outward(&a, &b) {
            let offset = normal * d;
            parts.push(piece(vec![a + offset, b + offset, b - offset, a - offset]));
        }
    }

    for i in 0..n {
        let (prev, v, next) = (ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]);
        match params.join {
            JoinType::Round => {
                let segments = params.resolution.fragments(d);
                let circle = (0..segments)
                    .map(|k| {
                        let angle = 360.0 * k as f64 / segments as f64;
                        v + Vector2::new(d * cos_degrees(angle), d * sin_degrees(angle))
                    })
                    .collect();
                parts.push(piece(circle));
            }
            JoinType::Miter | JoinType::Square => {
                let (Some((dir1, n1)), Some((dir2, n2))) = (outward(&prev, &v), outward(&v, &next)) else {
                    continue;
                };
                // Only the side the offset moves towards needs filling, and
                // only where the outline turns away from that side
                let turn = dir1.perp(&dir2);
                if turn * side <= 0.0 {
                    continue;
                }
                let theta = n1.dot(&n2).clamp(-1.0, 1.0).acos();
                if theta < 1e-9 {
                    continue;
                }
                let (f1, f2) = (v + n1 * side * d, v + n2 * side * d);
                let miter_ratio = 1.0 / (theta / 2.0).cos();
                if params.join == JoinType::Miter && miter_ratio <= params.miter_limit {
                    let tip = f1 + dir1 * d * (theta / 2.0).tan();
                    parts.push(piece(vec![v, f1, tip, f2]));
                } else {
                    let reach = d * (theta / 4.0).tan();
                    parts.push(piece(vec![v, f1, f1 + dir1 * reach, f2 - dir2 * reach, f2]));
                }
            }
        }
    }
}

fn piece(vertices: Vec<Point2<f64>>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![GeoPolygon::new(to_line_string(&vertices), Vec::new())]).orient(Direction::Default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Outline2d;
    use approx::assert_relative_eq;

    fn square(size: f64) -> Polygon2d {
        let mut set = Polygon2d::new();
        set.add_outline(Outline2d::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(size, 0.0),
            Point2::new(size, size),
            Point2::new(0.0, size),
        ]));
        set
    }

    #[test]
    fn test_miter_grow_keeps_corners() {
        let result = offset(&square(2.0), &OffsetParams::delta(1.0, false)).unwrap();
        assert_relative_eq!(result.area(), 16.0, epsilon = 1e-9);
        assert_relative_eq!(result.bounding_box().min.x, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_chamfer_cuts_corners() {
        let result = offset(&square(2.0), &OffsetParams::delta(1.0, true)).unwrap();
        // Each corner loses a right triangle with legs 2 - sqrt(2)
        let leg = 2.0 - std::f64::consts::SQRT_2;
        assert_relative_eq!(result.area(), 16.0 - 4.0 * leg * leg / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_round_grow_area() {
        let result = offset(&square(2.0), &OffsetParams::round(1.0, Resolution::segments(64))).unwrap();
        let exact = 4.0 + 8.0 + std::f64::consts::PI;
        assert!(result.area() < exact && result.area() > exact - 0.02);
    }

    #[test]
    fn test_shrink() {
        let result = offset(&square(4.0), &OffsetParams::delta(-1.0, false)).unwrap();
        assert_relative_eq!(result.area(), 4.0, epsilon = 1e-9);
        let round = offset(&square(4.0), &OffsetParams::round(-1.0, Resolution::segments(32))).unwrap();
        assert_relative_eq!(round.area(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_shrink_past_width_is_empty() {
        let result = offset(&square(1.0), &OffsetParams::delta(-1.0, false)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_zero_delta_is_identity() {
        let result = offset(&square(3.0), &OffsetParams::delta(0.0, false)).unwrap();
        assert_relative_eq!(result.area(), 9.0);
    }
}
