// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Single-completion shared futures for node results

use crate::ast::NodeId;
use crate::error::EvalError;
use crate::geometry::SharedGeometry;
use std::sync::{Arc, OnceLock};

type Completion = Result<SharedGeometry, EvalError>;

/// Handle to a node result that may still be computing.
///
/// Any number of clones may wait on it; all of them observe the single
/// completion.
#[derive(Debug, Clone)]
pub struct GeometryFuture {
    slot: Arc<OnceLock<Completion>>,
}

impl GeometryFuture {
    /// Future that is already complete
    pub fn ready(value: SharedGeometry) -> Self {
        Self {
            slot: Arc::new(OnceLock::from(Ok(value))),
        }
    }

    /// Block until the value is available
    pub fn wait(&self) -> Completion {
        self.slot.wait().clone()
    }

    /// The completed value, without blocking
    pub fn try_get(&self) -> Option<Completion> {
        self.slot.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.slot.get(), Some(Err(_)))
    }
}

/// Write side of a [`GeometryFuture`].
///
/// Dropping an unfulfilled promise completes its future with
/// [`EvalError::Abandoned`], so waiters never block forever.
#[derive(Debug)]
pub struct Promise {
    node: NodeId,
    slot: Arc<OnceLock<Completion>>,
}

impl Promise {
    pub fn new(node: NodeId) -> (Promise, GeometryFuture) {
        let slot = Arc::new(OnceLock::new());
        let future = GeometryFuture {
            slot: Arc::clone(&slot),
        };
        (Promise { node, slot }, future)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn fulfil(self, result: Completion) {
        // First completion wins; the drop below then finds the slot set
        let _ = self.slot.set(result);
    }
}

impl Drop for Promise {
    fn drop(&mut self) {
        let _ = self.slot.set(Err(EvalError::Abandoned(self.node)));
    }
}
