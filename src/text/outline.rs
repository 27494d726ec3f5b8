// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Glyph outline tracer

use super::{Glyph, PathCommand};
use crate::geometry::{Outline2d, Polygon2d};
use nalgebra::{Point2, Vector2};

/// Turns pen commands into closed outlines, one polygon set per glyph.
///
/// Every vertex is placed at `point + glyph offset + accumulated advance`.
/// Quadratic and cubic segments are sampled at `fn` uniform parameter steps,
/// so each curve call appends exactly `fn` vertices.
#[derive(Debug, Clone)]
pub struct OutlineTracer {
    segments: u32,
    pen: Point2<f64>,
    offset: Vector2<f64>,
    advance: Vector2<f64>,
    outline: Vec<Point2<f64>>,
    glyph_outlines: Vec<Outline2d>,
    result: Vec<Polygon2d>,
}

impl OutlineTracer {
    pub fn new(segments: u32) -> Self {
        Self {
            segments: segments.max(1),
            pen: Point2::origin(),
            offset: Vector2::zeros(),
            advance: Vector2::zeros(),
            outline: Vec::new(),
            glyph_outlines: Vec::new(),
            result: Vec::new(),
        }
    }

    pub fn segments(&self) -> u32 {
        self.segments
    }

    /// Begin a new glyph. Closed outlines from an unfinished glyph are
    /// discarded; an outline still open keeps collecting points.
    pub fn start_glyph(&mut self) {
        self.glyph_outlines.clear();
    }

    /// Close the open outline and keep the glyph if it traced anything
    pub fn finish_glyph(&mut self) {
        self.close_outline();
        if !self.glyph_outlines.is_empty() {
            let outlines = std::mem::take(&mut self.glyph_outlines);
            self.result.push(Polygon2d::from_outlines(outlines));
        }
    }

    pub fn set_glyph_offset(&mut self, x: f64, y: f64) {
        self.offset = Vector2::new(x, y);
    }

    pub fn add_glyph_advance(&mut self, x: f64, y: f64) {
        self.advance += Vector2::new(x, y);
    }

    pub fn move_to(&mut self, to: Point2<f64>) {
        self.close_outline();
        self.outline.push(self.place(to));
        self.pen = to;
    }

    pub fn line_to(&mut self, to: Point2<f64>) {
        self.outline.push(self.place(to));
        self.pen = to;
    }

    /// Quadratic Bezier from the pen through `control` to `to`
    pub fn curve_to(&mut self, control: Point2<f64>, to: Point2<f64>) {
        let from = self.pen;
        for i in 1..=self.segments {
            let a = i as f64 / self.segments as f64;
            let b = 1.0 - a;
            let p = from.coords * (b * b) + control.coords * (2.0 * a * b) + to.coords * (a * a);
            self.outline.push(self.place(Point2::from(p)));
        }
        self.pen = to;
    }

    /// Cubic Bezier from the pen through `c1` and `c2` to `to`
    pub fn cubic_to(&mut self, c1: Point2<f64>, c2: Point2<f64>, to: Point2<f64>) {
        let from = self.pen;
        for i in 1..=self.segments {
            let a = i as f64 / self.segments as f64;
            let b = 1.0 - a;
            let p = from.coords * (b * b * b)
                + c1.coords * (3.0 * a * b * b)
                + c2.coords * (3.0 * a * a * b)
                + to.coords * (a * a * a);
            self.outline.push(self.place(Point2::from(p)));
        }
        self.pen = to;
    }

    /// Polygon sets of every non-empty glyph finished so far
    pub fn result(&self) -> &[Polygon2d] {
        &self.result
    }

    pub fn into_result(self) -> Vec<Polygon2d> {
        self.result
    }

    /// Replay a text run: each glyph is traced at its offset, then the
    /// advance moves the origin of the next one
    pub fn trace_glyphs(&mut self, glyphs: &[Glyph]) {
        for glyph in glyphs {
            self.start_glyph();
            self.set_glyph_offset(glyph.offset.x, glyph.offset.y);
            for command in &glyph.commands {
                match *command {
                    PathCommand::MoveTo(to) => self.move_to(to),
                    PathCommand::LineTo(to) => self.line_to(to),
                    PathCommand::CurveTo { control, to } => self.curve_to(control, to),
                    PathCommand::CubicTo { c1, c2, to } => self.cubic_to(c1, c2, to),
                }
            }
            self.finish_glyph();
            self.add_glyph_advance(glyph.advance.x, glyph.advance.y);
        }
    }

    fn place(&self, p: Point2<f64>) -> Point2<f64> {
        p + self.offset + self.advance
    }

    fn close_outline(&mut self) {
        if !self.outline.is_empty() {
            let vertices = std::mem::take(&mut self.outline);
            self.glyph_outlines.push(Outline2d::new(vertices));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_square_glyph_is_one_outline() {
        let mut tracer = OutlineTracer::new(4);
        tracer.start_glyph();
        tracer.move_to(Point2::new(0.0, 0.0));
        tracer.line_to(Point2::new(1.0, 0.0));
        tracer.line_to(Point2::new(1.0, 1.0));
        tracer.line_to(Point2::new(0.0, 1.0));
        tracer.finish_glyph();

        let result = tracer.result();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].outlines().len(), 1);
        assert_eq!(result[0].outlines()[0].vertices.len(), 4);
    }

    #[test]
    fn test_open_outline_carries_into_next_glyph() {
        let mut tracer = OutlineTracer::new(4);
        tracer.start_glyph();
        tracer.move_to(Point2::new(0.0, 0.0));
        tracer.line_to(Point2::new(1.0, 0.0));
        tracer.line_to(Point2::new(1.0, 1.0));
        tracer.start_glyph();
        tracer.line_to(Point2::new(0.0, 1.0));
        tracer.finish_glyph();

        let result = tracer.result();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].outlines().len(), 1);
        assert_eq!(result[0].outlines()[0].vertices.len(), 4);
    }

    #[test]
    fn test_glyph_without_move_to_is_discarded() {
        let mut tracer = OutlineTracer::new(4);
        tracer.start_glyph();
        tracer.finish_glyph();
        assert!(tracer.result().is_empty());
    }

    #[test]
    fn test_single_segment_curve_is_straight() {
        let mut tracer = OutlineTracer::new(1);
        tracer.start_glyph();
        tracer.move_to(Point2::new(0.0, 0.0));
        tracer.curve_to(Point2::new(5.0, 5.0), Point2::new(2.0, 0.0));
        tracer.cubic_to(Point2::new(9.0, 9.0), Point2::new(-9.0, 9.0), Point2::new(2.0, 2.0));
        tracer.finish_glyph();

        let vertices = &tracer.result()[0].outlines()[0].vertices;
        assert_eq!(vertices, &vec![Point2::new(0.0, 0.0), Point2::new(2.0, 0.0), Point2::new(2.0, 2.0)]);
    }

    #[test]
    fn test_curve_adds_fn_vertices() {
        for fn_ in 1..6 {
            let mut tracer = OutlineTracer::new(fn_);
            tracer.start_glyph();
            tracer.move_to(Point2::new(0.0, 0.0));
            tracer.curve_to(Point2::new(1.0, 1.0), Point2::new(2.0, 0.0));
            tracer.finish_glyph();
            assert_eq!(tracer.result()[0].vertex_count(), 1 + fn_ as usize);
        }
    }

    #[test]
    fn test_curve_converges() {
        // Max distance of the polyline vertices' midpoints from the true
        // quadratic shrinks as segments increase
        let deviation = |fn_: u32| {
            let mut tracer = OutlineTracer::new(fn_);
            tracer.start_glyph();
            tracer.move_to(Point2::new(0.0, 0.0));
            tracer.curve_to(Point2::new(1.0, 2.0), Point2::new(2.0, 0.0));
            tracer.finish_glyph();
            let v = &tracer.result()[0].outlines()[0].vertices;
            // Apex of the curve is (1, 1)
            v.windows(2)
                .filter(|w| w[0].x <= 1.0 && w[1].x >= 1.0)
                .map(|w| {
                    let t = if w[1].x == w[0].x { 0.0 } else { (1.0 - w[0].x) / (w[1].x - w[0].x) };
                    1.0 - (w[0].y + t * (w[1].y - w[0].y))
                })
                .fold(0.0, f64::max)
        };
        assert!(deviation(3) > deviation(5));
        assert!(deviation(5) > deviation(9));
    }

    #[test]
    fn test_offset_and_advance() {
        let mut tracer = OutlineTracer::new(2);
        let triangle = |tracer: &mut OutlineTracer| {
            tracer.move_to(Point2::new(0.0, 0.0));
            tracer.line_to(Point2::new(1.0, 0.0));
            tracer.line_to(Point2::new(0.0, 1.0));
        };

        tracer.start_glyph();
        tracer.set_glyph_offset(0.5, 0.0);
        triangle(&mut tracer);
        tracer.finish_glyph();
        tracer.add_glyph_advance(10.0, 0.0);

        tracer.start_glyph();
        tracer.set_glyph_offset(0.0, 0.0);
        triangle(&mut tracer);
        tracer.finish_glyph();
        tracer.add_glyph_advance(10.0, 0.0);

        let result = tracer.into_result();
        assert_eq!(result.len(), 2);
        assert_relative_eq!(result[0].outlines()[0].vertices[0].x, 0.5);
        assert_relative_eq!(result[1].outlines()[0].vertices[0].x, 10.0);
        assert_relative_eq!(result[1].outlines()[0].vertices[1].x, 11.0);
    }
}
