// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Per-operator combination routines
//!
//! Every `do_*` function runs inside one node's job. It waits on the
//! children's futures, combines the results and returns a fresh
//! [`Outcome`]. Kernel failures and bad parameters are turned into a
//! diagnostic plus empty geometry; only [`EvalError`]s escape.

use super::cache::Form;
use super::diagnostics::DiagnosticKind;
use super::{Ctx, GeometryFuture};
use crate::ast::{CgaladvOp, CsgOp, NodeId};
use crate::error::{EvalError, InvalidParameter, KernelError, Result};
use crate::geometry::sweep::{LinearExtrude, RotateExtrude};
use crate::geometry::{
    planar_part, Dim, Face, Geometry, Outcome, Outline2d, Polygon2d, Polyhedron, Primitive, SharedGeometry,
};
use crate::kernel::{KernelResult, OffsetParams};
use crate::text::{OutlineTracer, TextParams};
use nalgebra::{Matrix4, Point2, Point3, Vector3};
use std::sync::Arc;

/// A child's identity and its eventual result
pub(crate) type Child = (NodeId, GeometryFuture);

/// Half thickness of the slab used to cut sections
const SECTION_SLAB: f64 = 1e-4;

enum Failure {
    Fatal(EvalError),
    Kernel(KernelError),
    Invalid(InvalidParameter),
}

impl From<EvalError> for Failure {
    fn from(e: EvalError) -> Self {
        Failure::Fatal(e)
    }
}

impl From<KernelError> for Failure {
    fn from(e: KernelError) -> Self {
        Failure::Kernel(e)
    }
}

impl From<InvalidParameter> for Failure {
    fn from(e: InvalidParameter) -> Self {
        Failure::Invalid(e)
    }
}

type OpResult = std::result::Result<Outcome, Failure>;

/// Run `f`, publishing empty geometry of `dim` with a diagnostic when it
/// fails recoverably
fn recover(ctx: Ctx<'_>, node: NodeId, dim: Dim, f: impl FnOnce() -> OpResult) -> Result<Outcome> {
    match f() {
        Ok(outcome) => Ok(outcome),
        Err(Failure::Fatal(e)) => Err(e),
        Err(Failure::Kernel(e)) => {
            ctx.diagnostics.report(node, DiagnosticKind::KernelFailure, e.to_string());
            Ok(Outcome::empty(dim))
        }
        Err(Failure::Invalid(e)) => {
            ctx.diagnostics.report(node, DiagnosticKind::InvalidParameter, e.0);
            Ok(Outcome::empty(dim))
        }
    }
}

fn dim_name(dim: Dim) -> &'static str {
    match dim {
        Dim::Two => "2D",
        Dim::Three => "3D",
    }
}

fn corruption(node: NodeId, expected: &str) -> Failure {
    Failure::Fatal(EvalError::CacheCorruption(format!(
        "result of {} is not a {} value",
        node, expected
    )))
}

/// A child result ready to be combined
struct Operand {
    node: NodeId,
    geometry: SharedGeometry,
}

impl Operand {
    fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }

    fn polygon(&self) -> std::result::Result<&Polygon2d, Failure> {
        self.geometry.as_polygon2d().ok_or_else(|| corruption(self.node, "2D"))
    }

    /// The polyhedron form, converted once and memoized in the child's
    /// cache slot
    fn exact(&self, ctx: Ctx<'_>) -> std::result::Result<SharedGeometry, Failure> {
        let key = ctx.tree.key(self.node).ok_or(EvalError::UnknownNode(self.node))?;
        let slot = ctx.cache.slot(&key).ok_or_else(|| {
            EvalError::CacheCorruption(format!("operand {} has no cache entry", self.node))
        })?;
        let exact = slot.derived(&self.geometry, Form::Exact, |geometry| match geometry {
            Geometry::Mesh(mesh) => ctx.kernel.to_polyhedron(mesh).map(Geometry::Polyhedron),
            other => Ok(other.clone()),
        })?;
        if !exact.is_exact() {
            return Err(corruption(self.node, "3D"));
        }
        Ok(exact)
    }
}

/// Wait for every child in declared order and drop those whose dimension
/// disagrees with `expected`, or with the first non-empty child when no
/// dimension is expected.
///
/// Empty children of the other dimension stay in place as empty operands of
/// the chosen one, so an empty minuend still empties a difference.
fn collect_children(
    ctx: Ctx<'_>,
    node: NodeId,
    children: &[Child],
    expected: Option<Dim>,
) -> Result<(Dim, Vec<Operand>)> {
    let mut ready = Vec::with_capacity(children.len());
    for (child, future) in children {
        ready.push(Operand {
            node: *child,
            geometry: future.wait()?,
        });
    }

    let dim = expected
        .or_else(|| ready.iter().find(|o| !o.is_empty()).map(|o| o.geometry.dim()))
        .or_else(|| ready.first().map(|o| o.geometry.dim()))
        .unwrap_or(Dim::Three);

    let mut operands = Vec::with_capacity(ready.len());
    for operand in ready {
        if operand.geometry.dim() == dim {
            operands.push(operand);
        } else if operand.is_empty() {
            operands.push(Operand {
                node: operand.node,
                geometry: Arc::new(Geometry::empty(dim)),
            });
        } else {
            ctx.diagnostics.report(
                node,
                DiagnosticKind::DimensionMismatch,
                format!(
                    "ignoring {} child {} of a {} operation",
                    dim_name(operand.geometry.dim()),
                    operand.node,
                    dim_name(dim)
                ),
            );
        }
    }
    Ok((dim, operands))
}

fn collect_children_2d(ctx: Ctx<'_>, node: NodeId, children: &[Child]) -> Result<Vec<Operand>> {
    Ok(collect_children(ctx, node, children, Some(Dim::Two))?.1)
}

fn collect_children_3d(ctx: Ctx<'_>, node: NodeId, children: &[Child]) -> Result<Vec<Operand>> {
    Ok(collect_children(ctx, node, children, Some(Dim::Three))?.1)
}

fn non_empty(operands: Vec<Operand>) -> Vec<Operand> {
    operands.into_iter().filter(|o| !o.is_empty()).collect()
}

/// Left fold over at least two items
fn fold_pairs<T>(items: &[&T], f: impl Fn(&T, &T) -> KernelResult<T>) -> KernelResult<T> {
    let mut acc = f(items[0], items[1])?;
    for item in &items[2..] {
        acc = f(&acc, *item)?;
    }
    Ok(acc)
}

fn apply_csg(ctx: Ctx<'_>, op: CsgOp, dim: Dim, operands: Vec<Operand>) -> OpResult {
    let operands = match op {
        CsgOp::Union => non_empty(operands),
        CsgOp::Intersection => {
            if operands.is_empty() || operands.iter().any(Operand::is_empty) {
                return Ok(Outcome::empty(dim));
            }
            operands
        }
        CsgOp::Difference => {
            let mut iter = operands.into_iter();
            match iter.next() {
                Some(minuend) if !minuend.is_empty() => {
                    std::iter::once(minuend).chain(iter.filter(|o| !o.is_empty())).collect()
                }
                _ => return Ok(Outcome::empty(dim)),
            }
        }
    };

    match operands.as_slice() {
        [] => Ok(Outcome::empty(dim)),
        [single] => Ok(Outcome::Shared(Arc::clone(&single.geometry))),
        _ => match dim {
            Dim::Two => csg_2d(ctx, op, &operands),
            Dim::Three => csg_3d(ctx, op, &operands),
        },
    }
}

fn csg_2d(ctx: Ctx<'_>, op: CsgOp, operands: &[Operand]) -> OpResult {
    let polygons = operands.iter().map(Operand::polygon).collect::<std::result::Result<Vec<_>, _>>()?;
    let result = match op {
        CsgOp::Union => ctx.kernel.union2d_all(&polygons)?,
        CsgOp::Intersection => fold_pairs(&polygons, |a, b| ctx.kernel.intersection2d(a, b))?,
        CsgOp::Difference => fold_pairs(&polygons, |a, b| ctx.kernel.difference2d(a, b))?,
    };
    Ok(Outcome::Owned(Geometry::Polygon2d(result)))
}

fn csg_3d(ctx: Ctx<'_>, op: CsgOp, operands: &[Operand]) -> OpResult {
    let exact = operands
        .iter()
        .map(|o| o.exact(ctx))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let solids: Vec<&Polyhedron> = exact.iter().filter_map(|g| g.as_polyhedron()).collect();
    let result = fold_pairs(&solids, |a, b| match op {
        CsgOp::Union => ctx.kernel.union3d(a, b),
        CsgOp::Intersection => ctx.kernel.intersection3d(a, b),
        CsgOp::Difference => ctx.kernel.difference3d(a, b),
    })?;
    Ok(Outcome::Owned(Geometry::Polyhedron(result)))
}

/// Union of non-empty solids in exact form
fn union_exact(ctx: Ctx<'_>, solids: &[Operand]) -> std::result::Result<SharedGeometry, Failure> {
    match solids {
        [] => Ok(Arc::new(Geometry::empty(Dim::Three))),
        [single] => single.exact(ctx),
        _ => Ok(csg_3d(ctx, CsgOp::Union, solids)?.publish()),
    }
}

/// Union of the non-empty 2D operands, or `None` after reporting that
/// there were none
fn union_profile(
    ctx: Ctx<'_>,
    node: NodeId,
    operands: &[Operand],
) -> std::result::Result<Option<Polygon2d>, Failure> {
    let polygons = operands
        .iter()
        .filter(|o| !o.is_empty())
        .map(Operand::polygon)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if polygons.is_empty() {
        ctx.diagnostics.report(node, DiagnosticKind::EmptyOperand, "no 2D children to operate on");
        return Ok(None);
    }
    Ok(Some(ctx.kernel.union2d_all(&polygons)?))
}

pub(crate) fn do_leaf_node(ctx: Ctx<'_>, node: NodeId, primitive: &Primitive) -> Result<Outcome> {
    let dim = if primitive.is_2d() { Dim::Two } else { Dim::Three };
    recover(ctx, node, dim, || Ok(Outcome::Owned(primitive.to_geometry()?)))
}

pub(crate) fn do_group_node(ctx: Ctx<'_>, node: NodeId, children: &[Child]) -> Result<Outcome> {
    let (dim, operands) = collect_children(ctx, node, children, None)?;
    recover(ctx, node, dim, || apply_csg(ctx, CsgOp::Union, dim, operands))
}

pub(crate) fn do_csg_node(ctx: Ctx<'_>, node: NodeId, op: CsgOp, children: &[Child]) -> Result<Outcome> {
    let (dim, operands) = collect_children(ctx, node, children, None)?;
    recover(ctx, node, dim, || apply_csg(ctx, op, dim, operands))
}

pub(crate) fn do_transform_node(
    ctx: Ctx<'_>,
    node: NodeId,
    matrix: &Matrix4<f64>,
    children: &[Child],
) -> Result<Outcome> {
    let (dim, operands) = collect_children(ctx, node, children, None)?;
    recover(ctx, node, dim, || {
        let determinant = match dim {
            Dim::Two => planar_part(matrix).determinant(),
            Dim::Three => matrix.fixed_view::<3, 3>(0, 0).clone_owned().determinant(),
        };
        if matrix.iter().any(|v| !v.is_finite()) || determinant == 0.0 || !determinant.is_finite() {
            return Err(InvalidParameter(format!(
                "transformation matrix is singular or not finite; removing {} object",
                dim_name(dim)
            ))
            .into());
        }
        let united = apply_csg(ctx, CsgOp::Union, dim, operands)?;
        if united.geometry().is_empty() {
            return Ok(united);
        }
        let mut geometry = united.into_owned();
        geometry.transform(matrix);
        Ok(Outcome::Owned(geometry))
    })
}

pub(crate) fn do_linear_extrude(
    ctx: Ctx<'_>,
    node: NodeId,
    params: &LinearExtrude,
    children: &[Child],
) -> Result<Outcome> {
    let operands = collect_children_2d(ctx, node, children)?;
    recover(ctx, node, Dim::Three, || {
        params.validate()?;
        let Some(profile) = union_profile(ctx, node, &operands)? else {
            return Ok(Outcome::empty(Dim::Three));
        };
        Ok(Outcome::Owned(Geometry::Mesh(params.apply(&profile))))
    })
}

pub(crate) fn do_rotate_extrude(
    ctx: Ctx<'_>,
    node: NodeId,
    params: &RotateExtrude,
    children: &[Child],
) -> Result<Outcome> {
    let operands = collect_children_2d(ctx, node, children)?;
    recover(ctx, node, Dim::Three, || {
        let Some(profile) = union_profile(ctx, node, &operands)? else {
            return Ok(Outcome::empty(Dim::Three));
        };
        Ok(Outcome::Owned(Geometry::Mesh(params.apply(&profile)?)))
    })
}

pub(crate) fn do_offset_node(
    ctx: Ctx<'_>,
    node: NodeId,
    params: &OffsetParams,
    children: &[Child],
) -> Result<Outcome> {
    let operands = collect_children_2d(ctx, node, children)?;
    recover(ctx, node, Dim::Two, || {
        let Some(profile) = union_profile(ctx, node, &operands)? else {
            return Ok(Outcome::empty(Dim::Two));
        };
        Ok(Outcome::Owned(Geometry::Polygon2d(ctx.kernel.offset2d(&profile, params)?)))
    })
}

pub(crate) fn do_projection_node(ctx: Ctx<'_>, node: NodeId, cut: bool, children: &[Child]) -> Result<Outcome> {
    let solids = non_empty(collect_children_3d(ctx, node, children)?);
    recover(ctx, node, Dim::Two, || {
        if solids.is_empty() {
            ctx.diagnostics.report(node, DiagnosticKind::EmptyOperand, "no 3D children to project");
            return Ok(Outcome::empty(Dim::Two));
        }
        let parts = if cut { section(ctx, &solids)? } else { shadow(&solids) };
        let parts: Vec<&Polygon2d> = parts.iter().collect();
        Ok(Outcome::Owned(Geometry::Polygon2d(ctx.kernel.union2d_all(&parts)?)))
    })
}

fn triangle(points: [Point2<f64>; 3]) -> Polygon2d {
    let mut polygon = Polygon2d::new();
    polygon.add_outline(Outline2d::new(points.to_vec()));
    polygon
}

/// Triangles of a 3D value in either form
fn triangles(geometry: &Geometry) -> Vec<[Point3<f64>; 3]> {
    match geometry {
        Geometry::Mesh(mesh) => mesh.triangle_points().collect(),
        Geometry::Polyhedron(solid) => solid
            .faces()
            .iter()
            .flat_map(|face| {
                let v = &face.vertices;
                (1..v.len().saturating_sub(1)).map(move |i| [v[0], v[i], v[i + 1]])
            })
            .collect(),
        Geometry::Polygon2d(_) => Vec::new(),
    }
}

/// Upward-facing triangles seen from above
fn shadow(solids: &[Operand]) -> Vec<Polygon2d> {
    let xy = |p: &Point3<f64>| Point2::new(p.x, p.y);
    solids
        .iter()
        .flat_map(|o| triangles(&o.geometry))
        .filter(|t| {
            let n = (t[1] - t[0]).cross(&(t[2] - t[0]));
            n.z > 1e-12
        })
        .map(|[a, b, c]| triangle([xy(&a), xy(&b), xy(&c)]))
        .collect()
}

/// Cross-section at z = 0: the top faces of the solid clipped to a thin
/// slab just below the plane
fn section(ctx: Ctx<'_>, solids: &[Operand]) -> std::result::Result<Vec<Polygon2d>, Failure> {
    let union = union_exact(ctx, solids)?;
    let solid = union.as_polyhedron().ok_or_else(|| corruption(solids[0].node, "3D"))?;
    let bbox = solid.bounding_box();
    if bbox.is_empty() || bbox.min.z > 0.0 || bbox.max.z < 0.0 {
        return Ok(Vec::new());
    }
    let slab = box_solid(
        Point3::new(bbox.min.x - 1.0, bbox.min.y - 1.0, -SECTION_SLAB),
        Point3::new(bbox.max.x + 1.0, bbox.max.y + 1.0, 0.0),
    );
    let clipped = ctx.kernel.intersection3d(solid, &slab)?;
    Ok(clipped
        .faces()
        .iter()
        .filter(|face| {
            face.normal().is_some_and(|n| n.z > 0.5)
                && face.vertices.iter().all(|v| v.z.abs() < SECTION_SLAB / 2.0)
        })
        .map(|face| {
            let vertices = face.vertices.iter().map(|v| Point2::new(v.x, v.y)).collect();
            let mut polygon = Polygon2d::new();
            polygon.add_outline(Outline2d::new(vertices));
            polygon
        })
        .collect())
}

/// Axis-aligned box with outward faces
#[rustfmt::skip]
fn box_solid(min: Point3<f64>, max: Point3<f64>) -> Polyhedron {
    let p = |x: f64, y: f64, z: f64| Point3::new(x, y, z);
    let (x0, y0, z0, x1, y1, z1) = (min.x, min.y, min.z, max.x, max.y, max.z);
    Polyhedron::from_faces(vec![
        Face::new(vec![p(x0, y0, z0), p(x0, y1, z0), p(x1, y1, z0), p(x1, y0, z0)]),
        Face::new(vec![p(x0, y0, z1), p(x1, y0, z1), p(x1, y1, z1), p(x0, y1, z1)]),
        Face::new(vec![p(x0, y0, z0), p(x1, y0, z0), p(x1, y0, z1), p(x0, y0, z1)]),
        Face::new(vec![p(x0, y1, z0), p(x0, y1, z1), p(x1, y1, z1), p(x1, y1, z0)]),
        Face::new(vec![p(x0, y0, z0), p(x0, y0, z1), p(x0, y1, z1), p(x0, y1, z0)]),
        Face::new(vec![p(x1, y0, z0), p(x1, y1, z0), p(x1, y1, z1), p(x1, y0, z1)]),
    ])
}

pub(crate) fn do_render_node(ctx: Ctx<'_>, node: NodeId, children: &[Child]) -> Result<Outcome> {
    let (dim, operands) = collect_children(ctx, node, children, None)?;
    recover(ctx, node, dim, || match dim {
        Dim::Two => apply_csg(ctx, CsgOp::Union, dim, operands),
        Dim::Three => {
            let solids = non_empty(operands);
            if solids.is_empty() {
                ctx.diagnostics.report(node, DiagnosticKind::EmptyOperand, "nothing to render");
                return Ok(Outcome::empty(Dim::Three));
            }
            Ok(Outcome::Shared(union_exact(ctx, &solids)?))
        }
    })
}

pub(crate) fn do_cgaladv_node(ctx: Ctx<'_>, node: NodeId, op: &CgaladvOp, children: &[Child]) -> Result<Outcome> {
    let (dim, operands) = collect_children(ctx, node, children, None)?;
    recover(ctx, node, dim, || match op {
        CgaladvOp::Hull => apply_hull(ctx, node, dim, &operands),
        CgaladvOp::Minkowski => apply_minkowski(ctx, node, dim, operands),
        CgaladvOp::Resize { newsize, autosize } => apply_resize(ctx, node, dim, operands, newsize, autosize),
    })
}

fn apply_hull(ctx: Ctx<'_>, node: NodeId, dim: Dim, operands: &[Operand]) -> OpResult {
    match dim {
        Dim::Two => {
            let points: Vec<Point2<f64>> = operands
                .iter()
                .filter_map(|o| o.geometry.as_polygon2d())
                .flat_map(|p| p.points().copied())
                .collect();
            if points.is_empty() {
                ctx.diagnostics.report(node, DiagnosticKind::EmptyOperand, "hull of nothing");
                return Ok(Outcome::empty(dim));
            }
            Ok(Outcome::Owned(Geometry::Polygon2d(ctx.kernel.hull2d(&points)?)))
        }
        Dim::Three => {
            let mut points: Vec<Point3<f64>> = Vec::new();
            for operand in operands {
                match operand.geometry.as_ref() {
                    Geometry::Mesh(mesh) => points.extend_from_slice(&mesh.vertices),
                    Geometry::Polyhedron(solid) => points.extend(solid.points().copied()),
                    Geometry::Polygon2d(_) => {}
                }
            }
            if points.is_empty() {
                ctx.diagnostics.report(node, DiagnosticKind::EmptyOperand, "hull of nothing");
                return Ok(Outcome::empty(dim));
            }
            Ok(Outcome::Owned(Geometry::Polyhedron(ctx.kernel.hull3d(&points)?)))
        }
    }
}

fn apply_minkowski(ctx: Ctx<'_>, node: NodeId, dim: Dim, operands: Vec<Operand>) -> OpResult {
    let operands = non_empty(operands);
    match operands.as_slice() {
        [] => {
            ctx.diagnostics.report(node, DiagnosticKind::EmptyOperand, "minkowski sum of nothing");
            Ok(Outcome::empty(dim))
        }
        [single] => Ok(Outcome::Shared(Arc::clone(&single.geometry))),
        _ => match dim {
            Dim::Two => {
                let polygons = operands.iter().map(Operand::polygon).collect::<std::result::Result<Vec<_>, _>>()?;
                let sum = fold_pairs(&polygons, |a, b| ctx.kernel.minkowski2d(a, b))?;
                Ok(Outcome::Owned(Geometry::Polygon2d(sum)))
            }
            Dim::Three => {
                let exact = operands
                    .iter()
                    .map(|o| o.exact(ctx))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                let solids: Vec<&Polyhedron> = exact.iter().filter_map(|g| g.as_polyhedron()).collect();
                let sum = fold_pairs(&solids, |a, b| ctx.kernel.minkowski3d(a, b))?;
                Ok(Outcome::Owned(Geometry::Polyhedron(sum)))
            }
        },
    }
}

fn apply_resize(
    ctx: Ctx<'_>,
    node: NodeId,
    dim: Dim,
    operands: Vec<Operand>,
    newsize: &Vector3<f64>,
    autosize: &[bool; 3],
) -> OpResult {
    let united = apply_csg(ctx, CsgOp::Union, dim, operands)?;
    if united.geometry().is_empty() {
        ctx.diagnostics.report(node, DiagnosticKind::EmptyOperand, "nothing to resize");
        return Ok(united);
    }
    let axes = match dim {
        Dim::Two => 2,
        Dim::Three => 3,
    };
    let size = united.geometry().bounding_box().size();

    let mut scale = Vector3::repeat(1.0);
    let mut autoscale: Option<f64> = None;
    for i in 0..axes {
        if newsize[i] > 0.0 {
            if size[i] <= f64::EPSILON {
                ctx.diagnostics.report(
                    node,
                    DiagnosticKind::InvalidParameter,
                    format!("resize along axis {} is impossible for an object of zero extent", i),
                );
                return Ok(united);
            }
            scale[i] = newsize[i] / size[i];
            autoscale = Some(autoscale.map_or(scale[i], |s| s.max(scale[i])));
        }
    }
    if let Some(autoscale) = autoscale {
        for i in 0..axes {
            if autosize[i] && newsize[i] <= 0.0 {
                scale[i] = autoscale;
            }
        }
    }

    let mut geometry = united.into_owned();
    geometry.transform(&Matrix4::new_nonuniform_scaling(&scale));
    Ok(Outcome::Owned(geometry))
}

pub(crate) fn do_text_node(ctx: Ctx<'_>, node: NodeId, params: &TextParams) -> Result<Outcome> {
    let mut tracer = OutlineTracer::new(params.segments);
    tracer.trace_glyphs(&params.glyphs);
    let glyphs = tracer.into_result();
    recover(ctx, node, Dim::Two, || {
        if glyphs.is_empty() {
            return Ok(Outcome::empty(Dim::Two));
        }
        let parts: Vec<&Polygon2d> = glyphs.iter().collect();
        Ok(Outcome::Owned(Geometry::Polygon2d(ctx.kernel.union2d_all(&parts)?)))
    })
}
