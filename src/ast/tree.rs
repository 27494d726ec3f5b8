// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Node arena with content-addressed keys

use super::node::{CgaladvOp, CsgOp, Modifiers, Node, NodeId, NodeKind, TransformOp};
use crate::error::EvalError;
use crate::geometry::sweep::{LinearExtrude, RotateExtrude};
use crate::geometry::Primitive;
use crate::kernel::OffsetParams;
use crate::text::TextParams;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of a subtree's structure.
///
/// Two nodes get the same key when their kinds and parameters are equal and
/// their children have pairwise equal keys and inclusion. A node's own
/// modifiers do not change its geometry and are not part of its key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..6] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CacheKey({})", self)
    }
}

/// CSG tree stored as an arena.
///
/// Children must be added before their parents, so every tree is acyclic.
/// A node may be the child of any number of parents.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    keys: Vec<CacheKey>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: NodeKind, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add_with_modifiers(kind, children, Modifiers::default())
    }

    pub fn add_with_modifiers(
        &mut self,
        kind: NodeKind,
        children: Vec<NodeId>,
        modifiers: Modifiers,
    ) -> Result<NodeId, EvalError> {
        if let Some(&missing) = children.iter().find(|c| c.0 >= self.nodes.len()) {
            return Err(EvalError::UnknownNode(missing));
        }
        Ok(self.push(kind, children, modifiers))
    }

    pub fn leaf(&mut self, primitive: Primitive) -> NodeId {
        self.push(NodeKind::Leaf(primitive), Vec::new(), Modifiers::default())
    }

    pub fn group(&mut self, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Group, children)
    }

    pub fn union(&mut self, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Csg(CsgOp::Union), children)
    }

    pub fn intersection(&mut self, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Csg(CsgOp::Intersection), children)
    }

    pub fn difference(&mut self, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Csg(CsgOp::Difference), children)
    }

    pub fn transform(&mut self, op: TransformOp, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Transform(op.to_matrix()), children)
    }

    pub fn linear_extrude(&mut self, params: LinearExtrude, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::LinearExtrude(params), children)
    }

    pub fn rotate_extrude(&mut self, params: RotateExtrude, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::RotateExtrude(params), children)
    }

    pub fn offset(&mut self, params: OffsetParams, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Offset(params), children)
    }

    pub fn projection(&mut self, cut: bool, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Projection { cut }, children)
    }

    pub fn render(&mut self, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Render, children)
    }

    pub fn hull(&mut self, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Cgaladv(CgaladvOp::Hull), children)
    }

    pub fn minkowski(&mut self, children: Vec<NodeId>) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Cgaladv(CgaladvOp::Minkowski), children)
    }

    pub fn resize(
        &mut self,
        newsize: nalgebra::Vector3<f64>,
        autosize: [bool; 3],
        children: Vec<NodeId>,
    ) -> Result<NodeId, EvalError> {
        self.add(NodeKind::Cgaladv(CgaladvOp::Resize { newsize, autosize }), children)
    }

    pub fn text(&mut self, params: TextParams) -> NodeId {
        self.push(NodeKind::Text(params), Vec::new(), Modifiers::default())
    }

    /// Change the modifiers of a node that has no parents yet
    pub fn set_modifiers(&mut self, id: NodeId, modifiers: Modifiers) -> Result<(), EvalError> {
        if self.nodes.iter().any(|n| n.children.contains(&id)) {
            return Err(EvalError::CacheCorruption(format!(
                "modifiers of {} changed after it was attached to a parent",
                id
            )));
        }
        let node = self.nodes.get_mut(id.0).ok_or(EvalError::UnknownNode(id))?;
        node.modifiers = modifiers;
        Ok(())
    }

    pub fn set_root(&mut self, id: NodeId) -> Result<(), EvalError> {
        if id.0 >= self.nodes.len() {
            return Err(EvalError::UnknownNode(id));
        }
        self.root = Some(id);
        Ok(())
    }

    /// Explicit root, or the most recently added node
    pub fn root(&self) -> Option<NodeId> {
        self.root.or_else(|| self.nodes.last().map(|n| n.id))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn key(&self, id: NodeId) -> Option<CacheKey> {
        self.keys.get(id.0).copied()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, kind: NodeKind, children: Vec<NodeId>, modifiers: Modifiers) -> NodeId {
        let id = NodeId(self.nodes.len());
        let key = self.content_key(&kind, &children);
        self.keys.push(key);
        self.nodes.push(Node {
            id,
            kind,
            children,
            modifiers,
        });
        id
    }

    fn content_key(&self, kind: &NodeKind, children: &[NodeId]) -> CacheKey {
        let mut hasher = Sha256::new();
        // Debug output stands in for kinds JSON cannot encode
        let encoded = serde_json::to_vec(kind).unwrap_or_else(|_| format!("{:?}", kind).into_bytes());
        hasher.update((encoded.len() as u64).to_le_bytes());
        hasher.update(&encoded);
        for child in children {
            let node = &self.nodes[child.0];
            hasher.update(self.keys[child.0].as_bytes());
            hasher.update([node.modifiers.is_excluded() as u8]);
        }
        CacheKey(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Vector2, Vector3};

    #[test]
    fn test_identical_subtrees_share_key() {
        let mut tree = Tree::new();
        let a = tree.leaf(Primitive::cube(Vector3::new(1.0, 2.0, 3.0), false));
        let b = tree.leaf(Primitive::cube(Vector3::new(1.0, 2.0, 3.0), false));
        let c = tree.leaf(Primitive::cube(Vector3::new(1.0, 2.0, 4.0), false));
        assert_ne!(a, b);
        assert_eq!(tree.key(a), tree.key(b));
        assert_ne!(tree.key(a), tree.key(c));

        let ua = tree.union(vec![a]).unwrap();
        let ub = tree.union(vec![b]).unwrap();
        let uc = tree.union(vec![c]).unwrap();
        assert_eq!(tree.key(ua), tree.key(ub));
        assert_ne!(tree.key(ua), tree.key(uc));
    }

    #[test]
    fn test_child_order_and_exclusion_change_key() {
        let mut tree = Tree::new();
        let a = tree.leaf(Primitive::square(Vector2::new(1.0, 1.0), false));
        let b = tree.leaf(Primitive::circle(1.0, 8));
        let ab = tree.difference(vec![a, b]).unwrap();
        let ba = tree.difference(vec![b, a]).unwrap();
        assert_ne!(tree.key(ab), tree.key(ba));

        let hidden = tree.leaf(Primitive::circle(1.0, 8));
        tree.set_modifiers(hidden, Modifiers::background()).unwrap();
        let with_hidden = tree.difference(vec![a, hidden]).unwrap();
        assert_ne!(tree.key(ab), tree.key(with_hidden));
    }

    #[test]
    fn test_children_must_exist() {
        let mut tree = Tree::new();
        assert_eq!(tree.group(vec![NodeId(3)]), Err(EvalError::UnknownNode(NodeId(3))));
    }

    #[test]
    fn test_root_defaults_to_last_node() {
        let mut tree = Tree::new();
        assert_eq!(tree.root(), None);
        let a = tree.leaf(Primitive::sphere(1.0, 8));
        let g = tree.group(vec![a]).unwrap();
        assert_eq!(tree.root(), Some(g));
        tree.set_root(a).unwrap();
        assert_eq!(tree.root(), Some(a));
    }

    #[test]
    fn test_modifiers_frozen_once_attached() {
        let mut tree = Tree::new();
        let a = tree.leaf(Primitive::sphere(1.0, 8));
        tree.group(vec![a]).unwrap();
        assert!(tree.set_modifiers(a, Modifiers::highlight()).is_err());
    }
}
