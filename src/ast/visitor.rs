// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Tree traversal with per-kind visitor dispatch

use super::node::{CgaladvOp, CsgOp, Node, NodeId, NodeKind};
use super::tree::Tree;
use crate::error::EvalError;
use crate::geometry::sweep::{LinearExtrude, RotateExtrude};
use crate::geometry::Primitive;
use crate::kernel::OffsetParams;
use crate::text::TextParams;
use nalgebra::Matrix4;

/// Per-frame traversal state, copied from the parent frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct State {
    prefix: bool,
    postfix: bool,
    parent: Option<NodeId>,
    matrix: Matrix4<f64>,
    background: bool,
    highlight: bool,
    root_object: bool,
}

impl State {
    pub fn new(parent: Option<NodeId>) -> Self {
        Self {
            prefix: false,
            postfix: false,
            parent,
            matrix: Matrix4::identity(),
            background: false,
            highlight: false,
            root_object: false,
        }
    }

    pub fn is_prefix(&self) -> bool {
        self.prefix
    }

    pub fn is_postfix(&self) -> bool {
        self.postfix
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Product of the transforms of all ancestors
    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// Inside a `%` subtree
    pub fn is_background(&self) -> bool {
        self.background
    }

    /// Inside a `#` subtree
    pub fn is_highlight(&self) -> bool {
        self.highlight
    }

    /// The node is the `!` root of the design
    pub fn is_root_object(&self) -> bool {
        self.root_object
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    ContinueTraversal,
    /// Stop the whole traversal
    AbortTraversal,
    /// Skip the children of this node; its postfix visit still happens
    PruneTraversal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalType {
    Prefix,
    Postfix,
    PreAndPostfix,
}

/// Visitor with one entry point per node kind. Every method defaults to
/// [`NodeVisitor::visit`].
pub trait NodeVisitor<'a> {
    fn visit(&mut self, state: &State, node: &'a Node) -> Response;

    fn visit_group(&mut self, state: &State, node: &'a Node) -> Response {
        self.visit(state, node)
    }

    fn visit_leaf(&mut self, state: &State, node: &'a Node, _primitive: &'a Primitive) -> Response {
        self.visit(state, node)
    }

    fn visit_csg(&mut self, state: &State, node: &'a Node, _op: CsgOp) -> Response {
        self.visit(state, node)
    }

    fn visit_transform(&mut self, state: &State, node: &'a Node, _matrix: &'a Matrix4<f64>) -> Response {
        self.visit(state, node)
    }

    fn visit_linear_extrude(&mut self, state: &State, node: &'a Node, _params: &'a LinearExtrude) -> Response {
        self.visit(state, node)
    }

    fn visit_rotate_extrude(&mut self, state: &State, node: &'a Node, _params: &'a RotateExtrude) -> Response {
        self.visit(state, node)
    }

    fn visit_offset(&mut self, state: &State, node: &'a Node, _params: &'a OffsetParams) -> Response {
        self.visit(state, node)
    }

    fn visit_projection(&mut self, state: &State, node: &'a Node, _cut: bool) -> Response {
        self.visit(state, node)
    }

    fn visit_render(&mut self, state: &State, node: &'a Node) -> Response {
        self.visit(state, node)
    }

    fn visit_cgaladv(&mut self, state: &State, node: &'a Node, _op: &'a CgaladvOp) -> Response {
        self.visit(state, node)
    }

    fn visit_text(&mut self, state: &State, node: &'a Node, _params: &'a TextParams) -> Response {
        self.visit(state, node)
    }
}

impl Node {
    /// Dispatch to the visitor method for this node's kind
    pub fn accept<'a, V>(&'a self, state: &State, visitor: &mut V) -> Response
    where
        V: NodeVisitor<'a> + ?Sized,
    {
        match &self.kind {
            NodeKind::Group => visitor.visit_group(state, self),
            NodeKind::Leaf(primitive) => visitor.visit_leaf(state, self, primitive),
            NodeKind::Csg(op) => visitor.visit_csg(state, self, *op),
            NodeKind::Transform(matrix) => visitor.visit_transform(state, self, matrix),
            NodeKind::LinearExtrude(params) => visitor.visit_linear_extrude(state, self, params),
            NodeKind::RotateExtrude(params) => visitor.visit_rotate_extrude(state, self, params),
            NodeKind::Offset(params) => visitor.visit_offset(state, self, params),
            NodeKind::Projection { cut } => visitor.visit_projection(state, self, *cut),
            NodeKind::Render => visitor.visit_render(state, self),
            NodeKind::Cgaladv(op) => visitor.visit_cgaladv(state, self, op),
            NodeKind::Text(params) => visitor.visit_text(state, self, params),
        }
    }
}

/// Depth-first traversal from `root`, children in declared order
pub fn traverse<'a, V>(
    tree: &'a Tree,
    root: NodeId,
    traversal: TraversalType,
    visitor: &mut V,
) -> Result<Response, EvalError>
where
    V: NodeVisitor<'a> + ?Sized,
{
    traverse_node(tree, root, &State::new(None), traversal, visitor)
}

fn traverse_node<'a, V>(
    tree: &'a Tree,
    id: NodeId,
    state: &State,
    traversal: TraversalType,
    visitor: &mut V,
) -> Result<Response, EvalError>
where
    V: NodeVisitor<'a> + ?Sized,
{
    let node = tree.get(id).ok_or(EvalError::UnknownNode(id))?;

    let mut state = *state;
    state.background |= node.modifiers.background;
    state.highlight |= node.modifiers.highlight;
    state.root_object = node.modifiers.root;

    let mut response = Response::ContinueTraversal;
    if traversal != TraversalType::Postfix {
        state.prefix = true;
        state.postfix = false;
        response = node.accept(&state, visitor);
    }

    match response {
        Response::AbortTraversal => return Ok(response),
        Response::ContinueTraversal => {
            let mut child_state = state;
            child_state.parent = Some(id);
            if let NodeKind::Transform(m) = &node.kind {
                child_state.matrix = state.matrix * m;
            }
            for &child in &node.children {
                if traverse_node(tree, child, &child_state, traversal, visitor)? == Response::AbortTraversal {
                    return Ok(Response::AbortTraversal);
                }
            }
        }
        Response::PruneTraversal => {}
    }

    if traversal != TraversalType::Prefix {
        state.prefix = false;
        state.postfix = true;
        response = node.accept(&state, visitor);
    }
    Ok(response)
}

/// Finds the first `!` node in prefix order
#[derive(Debug, Default)]
struct RootFinder {
    found: Option<NodeId>,
}

impl<'a> NodeVisitor<'a> for RootFinder {
    fn visit(&mut self, state: &State, node: &'a Node) -> Response {
        if node.modifiers.disabled {
            return Response::PruneTraversal;
        }
        if state.is_root_object() {
            self.found = Some(node.id);
            return Response::AbortTraversal;
        }
        Response::ContinueTraversal
    }
}

/// The node evaluation should start from: the first `!` node below the
/// tree root, or the tree root itself
pub fn find_root(tree: &Tree) -> Result<Option<NodeId>, EvalError> {
    let Some(root) = tree.root() else {
        return Ok(None);
    };
    let mut finder = RootFinder::default();
    traverse(tree, root, TraversalType::Prefix, &mut finder)?;
    Ok(Some(finder.found.unwrap_or(root)))
}

/// A `#` or `%` node together with its placement in the design
#[derive(Debug, Clone, PartialEq)]
pub struct MarkedNode {
    pub node: NodeId,
    pub matrix: Matrix4<f64>,
    pub highlight: bool,
    pub background: bool,
}

#[derive(Debug, Default)]
struct ModifierCollector {
    marked: Vec<MarkedNode>,
}

impl<'a> NodeVisitor<'a> for ModifierCollector {
    fn visit(&mut self, state: &State, node: &'a Node) -> Response {
        if node.modifiers.disabled {
            return Response::PruneTraversal;
        }
        if node.modifiers.highlight || node.modifiers.background {
            self.marked.push(MarkedNode {
                node: node.id,
                matrix: *state.matrix(),
                highlight: node.modifiers.highlight,
                background: node.modifiers.background,
            });
            // Nested marks are drawn as part of this one
            return Response::PruneTraversal;
        }
        Response::ContinueTraversal
    }
}

/// Highlighted and background subtrees below `root`, for a consumer to
/// draw separately from the design
pub fn collect_marked(tree: &Tree, root: NodeId) -> Result<Vec<MarkedNode>, EvalError> {
    let mut collector = ModifierCollector::default();
    traverse(tree, root, TraversalType::Prefix, &mut collector)?;
    Ok(collector.marked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Modifiers, TransformOp};
    use nalgebra::Vector3;

    #[derive(Default)]
    struct Recorder {
        events: Vec<(NodeId, bool)>,
        prune: Option<NodeId>,
    }

    impl<'a> NodeVisitor<'a> for Recorder {
        fn visit(&mut self, state: &State, node: &'a Node) -> Response {
            self.events.push((node.id, state.is_prefix()));
            if state.is_prefix() && Some(node.id) == self.prune {
                return Response::PruneTraversal;
            }
            Response::ContinueTraversal
        }
    }

    fn sample() -> (Tree, [NodeId; 4]) {
        let mut tree = Tree::new();
        let a = tree.leaf(Primitive::sphere(1.0, 8));
        let b = tree.leaf(Primitive::sphere(2.0, 8));
        let u = tree.union(vec![a, b]).unwrap();
        let g = tree.group(vec![u]).unwrap();
        (tree, [a, b, u, g])
    }

    #[test]
    fn test_prefix_and_postfix_order() {
        let (tree, [a, b, u, g]) = sample();
        let mut recorder = Recorder::default();
        traverse(&tree, g, TraversalType::PreAndPostfix, &mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec![
                (g, true),
                (u, true),
                (a, true),
                (a, false),
                (b, true),
                (b, false),
                (u, false),
                (g, false),
            ]
        );
    }

    #[test]
    fn test_prune_skips_children_but_not_postfix() {
        let (tree, [_, _, u, g]) = sample();
        let mut recorder = Recorder {
            prune: Some(u),
            ..Recorder::default()
        };
        traverse(&tree, g, TraversalType::PreAndPostfix, &mut recorder).unwrap();
        assert_eq!(recorder.events, vec![(g, true), (u, true), (u, false), (g, false)]);
    }

    #[test]
    fn test_find_root_honours_root_modifier() {
        let mut tree = Tree::new();
        let a = tree.leaf(Primitive::sphere(1.0, 8));
        let b = tree.leaf(Primitive::sphere(2.0, 8));
        tree.set_modifiers(b, Modifiers::root()).unwrap();
        let g = tree.group(vec![a, b]).unwrap();
        assert_eq!(find_root(&tree).unwrap(), Some(b));
        tree.set_root(a).unwrap();
        assert_eq!(find_root(&tree).unwrap(), Some(a));
        tree.set_root(g).unwrap();
        assert_eq!(find_root(&tree).unwrap(), Some(b));
    }

    #[test]
    fn test_collect_marked_accumulates_matrix() {
        let mut tree = Tree::new();
        let a = tree.leaf(Primitive::sphere(1.0, 8));
        tree.set_modifiers(a, Modifiers::highlight()).unwrap();
        let t = tree
            .transform(TransformOp::Translate(Vector3::new(1.0, 2.0, 3.0)), vec![a])
            .unwrap();
        let marked = collect_marked(&tree, t).unwrap();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].node, a);
        assert!(marked[0].highlight);
        assert_eq!(marked[0].matrix[(1, 3)], 2.0);
    }
}
