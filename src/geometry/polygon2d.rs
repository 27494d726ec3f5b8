// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! 2D polygon sets

use super::BoundingBox;
use geo::orient::{Direction, Orient};
use geo::{Coord, LineString, MultiPolygon, Polygon as GeoPolygon, TriangulateEarcut};
use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};

/// One closed vertex loop. The closing edge from the last vertex back to the
/// first is implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outline2d {
    pub vertices: Vec<Point2<f64>>,
    /// `false` for holes of a sanitized set
    pub positive: bool,
}

impl Outline2d {
    pub fn new(vertices: Vec<Point2<f64>>) -> Self {
        Self {
            vertices,
            positive: true,
        }
    }

    /// Shoelace area, positive for counter-clockwise loops
    pub fn signed_area(&self) -> f64 {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum / 2.0
    }
}

/// A set of outlines in the XY plane.
///
/// A sanitized set has non-intersecting outlines where each positive
/// (counter-clockwise) outline is followed by the holes (clockwise) it
/// contains. Unsanitized sets are read with the even-odd rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon2d {
    outlines: Vec<Outline2d>,
    sanitized: bool,
}

impl Polygon2d {
    pub fn new() -> Self {
        Self {
            outlines: Vec::new(),
            sanitized: true,
        }
    }

    pub fn empty() -> Self {
        Self::new()
    }

    /// Outlines of unknown orientation or overlap, read even-odd
    pub fn from_outlines(outlines: Vec<Outline2d>) -> Self {
        Self {
            outlines,
            sanitized: false,
        }
    }

    pub fn add_outline(&mut self, outline: Outline2d) {
        self.outlines.push(outline);
    }

    pub fn outlines(&self) -> &[Outline2d] {
        &self.outlines
    }

    pub fn is_empty(&self) -> bool {
        self.outlines.iter().all(|o| o.vertices.is_empty())
    }

    pub fn is_sanitized(&self) -> bool {
        self.sanitized
    }

    pub fn set_sanitized(&mut self, sanitized: bool) {
        self.sanitized = sanitized;
    }

    pub fn vertex_count(&self) -> usize {
        self.outlines.iter().map(|o| o.vertices.len()).sum()
    }

    pub fn points(&self) -> impl Iterator<Item = &Point2<f64>> {
        self.outlines.iter().flat_map(|o| o.vertices.iter())
    }

    /// Net area of a sanitized set (holes subtract)
    pub fn area(&self) -> f64 {
        self.outlines.iter().map(|o| o.signed_area()).sum()
    }

    /// Apply a homogeneous 2D affine matrix. Loops are reversed under
    /// mirroring so their orientation survives.
    pub fn transform(&mut self, matrix: &Matrix3<f64>) {
        for outline in &mut self.outlines {
            for v in &mut outline.vertices {
                *v = matrix.transform_point(v);
            }
        }
        let det = matrix[(0, 0)] * matrix[(1, 1)] - matrix[(0, 1)] * matrix[(1, 0)];
        if det < 0.0 {
            for outline in &mut self.outlines {
                outline.vertices.reverse();
            }
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        for p in self.points() {
            bbox.expand_to_include(&Point3::new(p.x, p.y, 0.0));
        }
        bbox
    }

    /// Structured view of a sanitized set
    pub fn to_multipolygon(&self) -> MultiPolygon<f64> {
        let mut polygons: Vec<GeoPolygon<f64>> = Vec::new();
        for outline in &self.outlines {
            if outline.vertices.len() < 3 {
                continue;
            }
            let ring = to_line_string(&outline.vertices);
            match (outline.positive, polygons.last_mut()) {
                (false, Some(last)) => last.interiors_push(ring),
                _ => polygons.push(GeoPolygon::new(ring, Vec::new())),
            }
        }
        MultiPolygon::new(polygons)
    }

    /// Build a sanitized set: exteriors counter-clockwise, holes clockwise
    pub fn from_multipolygon(multi: &MultiPolygon<f64>) -> Self {
        let mut result = Self::new();
        for polygon in multi.orient(Direction::Default).0 {
            let exterior = from_line_string(polygon.exterior());
            if exterior.len() < 3 {
                continue;
            }
            result.add_outline(Outline2d {
                vertices: exterior,
                positive: true,
            });
            for interior in polygon.interiors() {
                let hole = from_line_string(interior);
                if hole.len() >= 3 {
                    result.add_outline(Outline2d {
                        vertices: hole,
                        positive: false,
                    });
                }
            }
        }
        result
    }

    /// Ear-cut triangulation of a sanitized set. Every triangle is returned
    /// counter-clockwise; degenerate ears are dropped.
    pub fn triangulate(&self) -> Vec<[Point2<f64>; 3]> {
        let mut triangles = Vec::new();
        for polygon in &self.to_multipolygon().0 {
            let raw = polygon.earcut_triangles_raw();
            let vertex = |i: usize| Point2::new(raw.vertices[2 * i], raw.vertices[2 * i + 1]);
            for tri in raw.triangle_indices.chunks_exact(3) {
                let (a, b, c) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2]));
                let cross = (b - a).perp(&(c - a));
                if cross > 0.0 {
                    triangles.push([a, b, c]);
                } else if cross < 0.0 {
                    triangles.push([a, c, b]);
                }
            }
        }
        triangles
    }
}

impl Default for Polygon2d {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn to_line_string(vertices: &[Point2<f64>]) -> LineString<f64> {
    LineString::new(vertices.iter().map(|p| Coord { x: p.x, y: p.y }).collect())
}

/// Ring coordinates without the repeated closing point
pub(crate) fn from_line_string(ring: &LineString<f64>) -> Vec<Point2<f64>> {
    let mut points: Vec<Point2<f64>> = ring.coords().map(|c| Point2::new(c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Outline2d {
        Outline2d::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ])
    }

    #[test]
    fn test_signed_area_orientation() {
        let mut outline = unit_square();
        assert_relative_eq!(outline.signed_area(), 1.0);
        outline.vertices.reverse();
        assert_relative_eq!(outline.signed_area(), -1.0);
    }

    #[test]
    fn test_multipolygon_round_trip_keeps_holes() {
        let outer = GeoPolygon::new(
            to_line_string(&[
                Point2::new(0.0, 0.0),
                Point2::new(4.0, 0.0),
                Point2::new(4.0, 4.0),
                Point2::new(0.0, 4.0),
            ]),
            vec![to_line_string(&[
                Point2::new(1.0, 1.0),
                Point2::new(3.0, 1.0),
                Point2::new(3.0, 3.0),
                Point2::new(1.0, 3.0),
            ])],
        );
        let set = Polygon2d::from_multipolygon(&MultiPolygon::new(vec![outer]));

        assert!(set.is_sanitized());
        assert_eq!(set.outlines().len(), 2);
        assert!(set.outlines()[0].positive);
        assert!(!set.outlines()[1].positive);
        assert_relative_eq!(set.area(), 12.0);
        assert_eq!(set.to_multipolygon().0[0].interiors().len(), 1);
    }

    #[test]
    fn test_triangulate_square_with_hole() {
        let mut set = Polygon2d::new();
        set.add_outline(Outline2d::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
        ]));
        set.add_outline(Outline2d {
            vertices: vec![
                Point2::new(1.0, 1.0),
                Point2::new(1.0, 3.0),
                Point2::new(3.0, 3.0),
                Point2::new(3.0, 1.0),
            ],
            positive: false,
        });
        let triangles = set.triangulate();
        let area: f64 = triangles.iter().map(|[a, b, c]| (b - a).perp(&(c - a)) / 2.0).sum();
        assert_relative_eq!(area, 12.0, epsilon = 1e-9);
        assert!(triangles.iter().all(|[a, b, c]| (b - a).perp(&(c - a)) > 0.0));
    }

    #[test]
    fn test_mirror_keeps_orientation() {
        let mut set = Polygon2d::new();
        set.add_outline(unit_square());
        let mirror = Matrix3::new(-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        set.transform(&mirror);
        assert_relative_eq!(set.area(), 1.0);
        assert_relative_eq!(set.bounding_box().min.x, -1.0);
    }
}
