// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geomeval
//!
//! Memoized, parallel evaluation of OpenSCAD-style CSG trees into 2D polygon
//! sets and 3D solids. A [`Tree`] describes the design; a
//! [`GeometryEvaluator`] computes every shared subtree once, runs sibling
//! subtrees concurrently and hands the actual geometry work to a
//! [`GeometryKernel`].

pub mod ast;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod geometry;
pub mod kernel;
pub mod text;
pub mod utils;

pub use ast::{CacheKey, Modifiers, Node, NodeId, NodeKind, TransformOp, Tree};
pub use config::{EvaluatorConfig, Scheduling};
pub use error::{EvalError, InvalidParameter, KernelError};
pub use evaluator::{CacheStats, Diagnostic, DiagnosticKind, GeometryCache, GeometryEvaluator};
pub use geometry::{Dim, Geometry, Mesh, Polygon2d, Polyhedron, Primitive, SharedGeometry};
pub use kernel::{DefaultKernel, GeometryKernel};

use std::sync::Arc;

/// Evaluate the root of `tree` with the bundled kernel and the
/// configuration from [`EvaluatorConfig::load`]
pub fn evaluate(tree: &Tree) -> anyhow::Result<Option<SharedGeometry>> {
    let config = EvaluatorConfig::load()?;
    let evaluator = GeometryEvaluator::with_config(tree, Arc::new(DefaultKernel::new()), config)?;
    Ok(evaluator.evaluate_root(false)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_basic_cube() {
        let mut tree = Tree::new();
        tree.leaf(Primitive::cube(Vector3::new(10.0, 10.0, 10.0), false));
        let evaluator = GeometryEvaluator::new(&tree);
        let result = evaluator.evaluate_root(false).unwrap().unwrap();
        assert_eq!(result.dim(), Dim::Three);
        assert!(!result.is_empty());
    }
}
