// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Memoized tree evaluator
//!
//! [`GeometryEvaluator`] walks a [`Tree`] with a pre- and postfix visitor.
//! On the way down, subtrees that are already cached or in flight are
//! pruned. On the way up, each remaining node reserves a cache slot and is
//! scheduled as one job that waits on its children's futures, runs the
//! node's operator and fulfils the slot's promise. The future is handed to
//! the parent frame immediately, so a parent is scheduled before its
//! children have finished.
//!
//! With [`Scheduling::Parallel`] jobs run on a rayon pool in the order they
//! were queued. Children are always queued before their parents, so the
//! oldest unfinished job never waits on a job that has not started.

mod cache;
mod diagnostics;
mod future;
mod ops;

pub use cache::{CacheSlot, CacheStats, Form, GeometryCache};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use future::{GeometryFuture, Promise};

use crate::ast::{find_root, traverse, CgaladvOp, CsgOp, Node, NodeId, NodeVisitor, Response, State, TraversalType, Tree};
use crate::config::{EvaluatorConfig, Scheduling};
use crate::error::{EvalError, Result};
use crate::geometry::sweep::{LinearExtrude, RotateExtrude};
use crate::geometry::{Geometry, Outcome, Primitive, SharedGeometry};
use crate::kernel::{DefaultKernel, GeometryKernel, OffsetParams};
use crate::text::TextParams;
use ahash::AHashMap;
use cache::Reservation;
use diagnostics::DiagnosticLog;
use nalgebra::Matrix4;
use ops::Child;
use rayon::{ScopeFifo, ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, trace};

/// Everything a job needs, borrowed from the evaluator
#[derive(Clone, Copy)]
pub(crate) struct Ctx<'e> {
    pub tree: &'e Tree,
    pub kernel: &'e dyn GeometryKernel,
    pub cache: &'e GeometryCache,
    pub diagnostics: &'e DiagnosticLog,
}

/// Evaluates nodes of one tree into geometry.
///
/// The cache lives as long as the evaluator, so repeated requests for the
/// same subtree, or for a structurally equal one, are answered without
/// recomputation.
pub struct GeometryEvaluator<'a> {
    tree: &'a Tree,
    kernel: Arc<dyn GeometryKernel>,
    cache: GeometryCache,
    config: EvaluatorConfig,
    pool: Option<ThreadPool>,
    diagnostics: DiagnosticLog,
}

impl<'a> GeometryEvaluator<'a> {
    /// Inline evaluator with the bundled kernel
    pub fn new(tree: &'a Tree) -> Self {
        Self::with_kernel(tree, Arc::new(DefaultKernel::new()))
    }

    /// Inline evaluator with a custom kernel
    pub fn with_kernel(tree: &'a Tree, kernel: Arc<dyn GeometryKernel>) -> Self {
        let config = EvaluatorConfig::inline();
        Self {
            tree,
            kernel,
            cache: GeometryCache::new(),
            diagnostics: DiagnosticLog::new(config.log_diagnostics),
            config,
            pool: None,
        }
    }

    pub fn with_config(tree: &'a Tree, kernel: Arc<dyn GeometryKernel>, config: EvaluatorConfig) -> Result<Self> {
        let pool = match config.scheduling {
            Scheduling::Inline => None,
            Scheduling::Parallel => {
                let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("geomeval-{}", i));
                if let Some(threads) = config.threads {
                    builder = builder.num_threads(threads);
                }
                Some(builder.build().map_err(|e| EvalError::WorkerPool(e.to_string()))?)
            }
        };
        Ok(Self {
            tree,
            kernel,
            cache: GeometryCache::new(),
            diagnostics: DiagnosticLog::new(config.log_diagnostics),
            config,
            pool,
        })
    }

    /// Start from an existing cache, for example one taken from an earlier
    /// evaluator with [`GeometryEvaluator::into_cache`]
    pub fn with_cache(mut self, cache: GeometryCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate the subtree rooted at `node`.
    ///
    /// With `allow_exact` unset, a 3D result is returned as a mesh; the mesh
    /// form is memoized next to the exact one. Recoverable problems become
    /// [`Diagnostic`]s and empty geometry; only fatal errors are returned.
    #[instrument(skip(self), fields(scheduling = ?self.config.scheduling))]
    pub fn evaluate_geometry(&self, node: NodeId, allow_exact: bool) -> Result<SharedGeometry> {
        let key = self.tree.key(node).ok_or(EvalError::UnknownNode(node))?;
        let ctx = self.ctx();
        let start = Instant::now();

        let future = match &self.pool {
            None => run_traversal(ctx, node, Scheduler::Inline)?,
            Some(pool) => pool.scope_fifo(|scope| run_traversal(ctx, node, Scheduler::Parallel(scope)))?,
        };

        let value = match future.wait() {
            Ok(value) => value,
            Err(e) => {
                let purged = self.cache.purge_failed();
                debug!(%node, purged, "evaluation failed: {}", e);
                return Err(e);
            }
        };
        debug!(%node, elapsed_ms = start.elapsed().as_millis() as u64, "evaluated");

        if allow_exact || !value.is_exact() {
            return Ok(value);
        }
        let slot = self
            .cache
            .slot(&key)
            .ok_or_else(|| EvalError::CacheCorruption(format!("no cache entry for evaluated node {}", node)))?;
        slot.derived(&value, Form::Mesh, |geometry| match geometry {
            Geometry::Polyhedron(solid) => Ok(Geometry::Mesh(self.kernel.to_mesh(solid))),
            other => Ok::<_, EvalError>(other.clone()),
        })
    }

    /// Evaluate the tree root, or the first `!` node below it
    pub fn evaluate_root(&self, allow_exact: bool) -> Result<Option<SharedGeometry>> {
        match find_root(self.tree)? {
            Some(root) => self.evaluate_geometry(root, allow_exact).map(Some),
            None => Ok(None),
        }
    }

    /// Diagnostics recorded so far
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.snapshot()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    pub fn cache(&self) -> &GeometryCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn into_cache(self) -> GeometryCache {
        self.cache
    }

    fn ctx(&self) -> Ctx<'_> {
        Ctx {
            tree: self.tree,
            kernel: self.kernel.as_ref(),
            cache: &self.cache,
            diagnostics: &self.diagnostics,
        }
    }
}

enum Scheduler<'s, 'scope> {
    Inline,
    Parallel(&'s ScopeFifo<'scope>),
}

fn run_traversal<'e: 'scope, 'scope>(
    ctx: Ctx<'e>,
    root: NodeId,
    scheduler: Scheduler<'_, 'scope>,
) -> Result<GeometryFuture> {
    let mut visitor = EvalVisitor {
        ctx,
        scheduler,
        visited_children: AHashMap::new(),
        root_future: None,
        error: None,
    };
    traverse(ctx.tree, root, TraversalType::PreAndPostfix, &mut visitor)?;
    if let Some(e) = visitor.error {
        return Err(e);
    }
    visitor
        .root_future
        .ok_or_else(|| EvalError::CacheCorruption(format!("traversal of {} produced no result", root)))
}

struct EvalVisitor<'e, 's, 'scope> {
    ctx: Ctx<'e>,
    scheduler: Scheduler<'s, 'scope>,
    /// Futures of the children visited so far, per parent, in child order
    visited_children: AHashMap<NodeId, Vec<Child>>,
    root_future: Option<GeometryFuture>,
    error: Option<EvalError>,
}

impl<'e: 'scope, 's, 'scope> EvalVisitor<'e, 's, 'scope> {
    /// Shared visit logic. `op` computes the node from its children's
    /// futures and is only invoked if the node is not cached.
    fn handle<F>(&mut self, state: &State, node: &'e Node, op: F) -> Response
    where
        F: FnOnce(Ctx<'e>, NodeId, &[Child]) -> Result<Outcome> + Send + 'e,
    {
        let excluded = state.parent().is_some() && node.modifiers.is_excluded();

        if state.is_prefix() {
            if excluded {
                return Response::PruneTraversal;
            }
            if let Some(key) = self.ctx.tree.key(node.id) {
                if self.ctx.cache.contains(&key) {
                    debug!(node = %node.id, %key, "pruning cached subtree");
                    return Response::PruneTraversal;
                }
            }
            return Response::ContinueTraversal;
        }

        if excluded {
            return Response::ContinueTraversal;
        }
        let children = self.visited_children.remove(&node.id).unwrap_or_default();
        match self.reserve_and_schedule(node, children, op) {
            Ok(future) => {
                self.add_to_parent(state, node.id, future);
                Response::ContinueTraversal
            }
            Err(e) => {
                self.error = Some(e);
                Response::AbortTraversal
            }
        }
    }

    fn reserve_and_schedule<F>(&mut self, node: &'e Node, children: Vec<Child>, op: F) -> Result<GeometryFuture>
    where
        F: FnOnce(Ctx<'e>, NodeId, &[Child]) -> Result<Outcome> + Send + 'e,
    {
        let key = self.ctx.tree.key(node.id).ok_or(EvalError::UnknownNode(node.id))?;
        match self.ctx.cache.reserve(key, node.id, node.name())? {
            Reservation::Existing(slot) => Ok(slot.future().clone()),
            Reservation::New(promise, slot) => {
                let future = slot.future().clone();
                let ctx = self.ctx;
                let job = move || {
                    let start = Instant::now();
                    let result = op(ctx, node.id, &children).map(Outcome::publish);
                    trace!(
                        node = %node.id,
                        kind = node.name(),
                        elapsed_us = start.elapsed().as_micros() as u64,
                        ok = result.is_ok(),
                        "computed"
                    );
                    promise.fulfil(result);
                };
                match self.scheduler {
                    Scheduler::Inline => job(),
                    Scheduler::Parallel(scope) => {
                        debug!(node = %node.id, kind = node.name(), "scheduled");
                        scope.spawn_fifo(move |_| job());
                    }
                }
                Ok(future)
            }
        }
    }

    /// Register a child's future with the frame of its parent
    fn add_to_parent(&mut self, state: &State, node: NodeId, future: GeometryFuture) {
        match state.parent() {
            Some(parent) => self.visited_children.entry(parent).or_default().push((node, future)),
            None => self.root_future = Some(future),
        }
    }
}

impl<'e: 'scope, 's, 'scope> NodeVisitor<'e> for EvalVisitor<'e, 's, 'scope> {
    fn visit(&mut self, state: &State, node: &'e Node) -> Response {
        self.handle(state, node, |ctx, id, children| ops::do_group_node(ctx, id, children))
    }

    fn visit_leaf(&mut self, state: &State, node: &'e Node, primitive: &'e Primitive) -> Response {
        self.handle(state, node, move |ctx, id, _| ops::do_leaf_node(ctx, id, primitive))
    }

    fn visit_csg(&mut self, state: &State, node: &'e Node, op: CsgOp) -> Response {
        self.handle(state, node, move |ctx, id, children| ops::do_csg_node(ctx, id, op, children))
    }

    fn visit_transform(&mut self, state: &State, node: &'e Node, matrix: &'e Matrix4<f64>) -> Response {
        self.handle(state, node, move |ctx, id, children| {
            ops::do_transform_node(ctx, id, matrix, children)
        })
    }

    fn visit_linear_extrude(&mut self, state: &State, node: &'e Node, params: &'e LinearExtrude) -> Response {
        self.handle(state, node, move |ctx, id, children| {
            ops::do_linear_extrude(ctx, id, params, children)
        })
    }

    fn visit_rotate_extrude(&mut self, state: &State, node: &'e Node, params: &'e RotateExtrude) -> Response {
        self.handle(state, node, move |ctx, id, children| {
            ops::do_rotate_extrude(ctx, id, params, children)
        })
    }

    fn visit_offset(&mut self, state: &State, node: &'e Node, params: &'e OffsetParams) -> Response {
        self.handle(state, node, move |ctx, id, children| {
            ops::do_offset_node(ctx, id, params, children)
        })
    }

    fn visit_projection(&mut self, state: &State, node: &'e Node, cut: bool) -> Response {
        self.handle(state, node, move |ctx, id, children| {
            ops::do_projection_node(ctx, id, cut, children)
        })
    }

    fn visit_render(&mut self, state: &State, node: &'e Node) -> Response {
        self.handle(state, node, |ctx, id, children| ops::do_render_node(ctx, id, children))
    }

    fn visit_cgaladv(&mut self, state: &State, node: &'e Node, op: &'e CgaladvOp) -> Response {
        self.handle(state, node, move |ctx, id, children| {
            ops::do_cgaladv_node(ctx, id, op, children)
        })
    }

    fn visit_text(&mut self, state: &State, node: &'e Node, params: &'e TextParams) -> Response {
        self.handle(state, node, move |ctx, id, _| ops::do_text_node(ctx, id, params))
    }
}
