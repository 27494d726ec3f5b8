// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Recoverable problems found while evaluating

use crate::ast::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A child of the wrong dimensionality was dropped
    DimensionMismatch,
    /// The kernel could not complete; the node published empty geometry
    KernelFailure,
    InvalidParameter,
    /// The operator had no usable children
    EmptyOperand,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::DimensionMismatch => "dimension mismatch",
            DiagnosticKind::KernelFailure => "kernel failure",
            DiagnosticKind::InvalidParameter => "invalid parameter",
            DiagnosticKind::EmptyOperand => "empty operand",
        };
        f.write_str(name)
    }
}

/// A warning attributed to the node that caused it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub node: NodeId,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at node {}: {}", self.kind, self.node, self.message)
    }
}

#[derive(Debug, Default)]
pub(crate) struct DiagnosticLog {
    entries: Mutex<Vec<Diagnostic>>,
    log: bool,
}

impl DiagnosticLog {
    pub(crate) fn new(log: bool) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            log,
        }
    }

    pub(crate) fn report(&self, node: NodeId, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            node,
            kind,
            message: message.into(),
        };
        if self.log {
            warn!(node = %diagnostic.node, kind = %diagnostic.kind, "{}", diagnostic.message);
        }
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(diagnostic);
    }

    pub(crate) fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
