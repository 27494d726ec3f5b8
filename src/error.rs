// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types

use crate::ast::NodeId;
use thiserror::Error;

/// A node parameter that cannot produce geometry
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct InvalidParameter(pub String);

/// Failure of one geometry kernel operation.
///
/// Kernel failures are never fatal to an evaluation: the evaluator records a
/// diagnostic and publishes empty geometry for the failing node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("degenerate input: {0}")]
    Degenerate(String),

    #[error("non-finite coordinate in {0}")]
    NonFinite(&'static str),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("triangulation failed: {0}")]
    Triangulation(String),
}

/// Fatal evaluation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("node {0} does not belong to this tree")]
    UnknownNode(NodeId),

    #[error("cache corruption: {0}")]
    CacheCorruption(String),

    #[error("computation of node {0} was abandoned")]
    Abandoned(NodeId),

    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, EvalError>;
