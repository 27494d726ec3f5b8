// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Text support: glyph pen commands and the outline tracer

mod outline;

pub use outline::OutlineTracer;

use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// One pen movement of a glyph outline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathCommand {
    MoveTo(Point2<f64>),
    LineTo(Point2<f64>),
    /// Quadratic Bezier segment
    CurveTo { control: Point2<f64>, to: Point2<f64> },
    /// Cubic Bezier segment
    CubicTo {
        c1: Point2<f64>,
        c2: Point2<f64>,
        to: Point2<f64>,
    },
}

/// A shaped glyph: its outline commands, where it sits relative to the pen
/// and how far it moves the pen afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Glyph {
    pub commands: Vec<PathCommand>,
    pub offset: Vector2<f64>,
    pub advance: Vector2<f64>,
}

impl Glyph {
    pub fn new(commands: Vec<PathCommand>, advance: f64) -> Self {
        Self {
            commands,
            offset: Vector2::zeros(),
            advance: Vector2::new(advance, 0.0),
        }
    }
}

/// Parameters of a text node. Glyph shaping happens upstream; the node
/// carries the shaped run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextParams {
    pub glyphs: Vec<Glyph>,
    /// Straight segments per curve
    pub segments: u32,
}

impl TextParams {
    pub fn new(glyphs: Vec<Glyph>, segments: u32) -> Self {
        Self { glyphs, segments }
    }
}
