// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG tree node definitions

use crate::geometry::sweep::{LinearExtrude, RotateExtrude};
use crate::geometry::Primitive;
use crate::kernel::OffsetParams;
use crate::text::TextParams;
use nalgebra::{Matrix4, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a node within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Modifier characters attached to a node: `%` background, `*` disabled,
/// `!` root and `#` highlight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub background: bool,
    pub disabled: bool,
    pub root: bool,
    pub highlight: bool,
}

impl Modifiers {
    pub fn background() -> Self {
        Self {
            background: true,
            ..Self::default()
        }
    }

    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    pub fn root() -> Self {
        Self {
            root: true,
            ..Self::default()
        }
    }

    pub fn highlight() -> Self {
        Self {
            highlight: true,
            ..Self::default()
        }
    }

    /// Whether a parent leaves this child out of its result
    pub fn is_excluded(&self) -> bool {
        self.background || self.disabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CsgOp {
    Union,
    Intersection,
    Difference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CgaladvOp {
    Hull,
    Minkowski,
    /// Scale to `newsize` on every axis where it is positive; `autosize`
    /// axes follow the largest selected scale
    Resize {
        newsize: Vector3<f64>,
        autosize: [bool; 3],
    },
}

/// Node operation and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Group,
    Leaf(Primitive),
    Csg(CsgOp),
    Transform(Matrix4<f64>),
    LinearExtrude(LinearExtrude),
    RotateExtrude(RotateExtrude),
    Offset(OffsetParams),
    /// Outline of the solid seen from above, or its section at z = 0
    Projection { cut: bool },
    Render,
    Cgaladv(CgaladvOp),
    Text(TextParams),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::Leaf(_) => "leaf",
            NodeKind::Csg(CsgOp::Union) => "union",
            NodeKind::Csg(CsgOp::Intersection) => "intersection",
            NodeKind::Csg(CsgOp::Difference) => "difference",
            NodeKind::Transform(_) => "multmatrix",
            NodeKind::LinearExtrude(_) => "linear_extrude",
            NodeKind::RotateExtrude(_) => "rotate_extrude",
            NodeKind::Offset(_) => "offset",
            NodeKind::Projection { .. } => "projection",
            NodeKind::Render => "render",
            NodeKind::Cgaladv(CgaladvOp::Hull) => "hull",
            NodeKind::Cgaladv(CgaladvOp::Minkowski) => "minkowski",
            NodeKind::Cgaladv(CgaladvOp::Resize { .. }) => "resize",
            NodeKind::Text(_) => "text",
        }
    }
}

/// One element of a CSG tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub modifiers: Modifiers,
}

impl Node {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Transformation operations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransformOp {
    Translate(Vector3<f64>),
    /// Euler angles in degrees, applied X then Y then Z
    Rotate(Vector3<f64>),
    Scale(Vector3<f64>),
    /// Reflection across the plane through the origin with this normal
    Mirror(Vector3<f64>),
    Multmatrix(Matrix4<f64>),
}

impl TransformOp {
    /// Convert transformation to a 4x4 matrix
    pub fn to_matrix(&self) -> Matrix4<f64> {
        match self {
            TransformOp::Translate(v) => Matrix4::new_translation(v),
            TransformOp::Rotate(angles) => {
                let rx = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), angles.x.to_radians());
                let ry = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), angles.y.to_radians());
                let rz = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angles.z.to_radians());
                (rz * ry * rx).to_homogeneous()
            }
            TransformOp::Scale(s) => Matrix4::new_nonuniform_scaling(s),
            TransformOp::Mirror(normal) => {
                let length = normal.norm();
                if length == 0.0 || !length.is_finite() {
                    return Matrix4::identity();
                }
                let n = normal / length;
                let mut m = Matrix4::identity();
                m.fixed_view_mut::<3, 3>(0, 0)
                    .copy_from(&(nalgebra::Matrix3::identity() - n * n.transpose() * 2.0));
                m
            }
            TransformOp::Multmatrix(m) => *m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_rotate_quarter_turn() {
        let m = TransformOp::Rotate(Vector3::new(0.0, 0.0, 90.0)).to_matrix();
        let p = m.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mirror_across_diagonal() {
        let m = TransformOp::Mirror(Vector3::new(1.0, -1.0, 0.0)).to_matrix();
        let p = m.transform_point(&Point3::new(2.0, 0.0, 3.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);
        assert_relative_eq!(p.z, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_excluded_modifiers() {
        assert!(Modifiers::background().is_excluded());
        assert!(Modifiers::disabled().is_excluded());
        assert!(!Modifiers::highlight().is_excluded());
        assert!(!Modifiers::root().is_excluded());
    }
}
