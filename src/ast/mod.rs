// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG tree
//!
//! Nodes are stored in a [`Tree`] arena and addressed by [`NodeId`]. Each
//! node carries a content-derived [`CacheKey`] so that structurally equal
//! subtrees share one cache entry.

mod node;
mod tree;
mod visitor;

pub use node::{CgaladvOp, CsgOp, Modifiers, Node, NodeId, NodeKind, TransformOp};
pub use tree::{CacheKey, Tree};
pub use visitor::{collect_marked, find_root, traverse, MarkedNode, NodeVisitor, Response, State, TraversalType};
