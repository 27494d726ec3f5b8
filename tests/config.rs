// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use geomeval::{DefaultKernel, EvaluatorConfig, GeometryEvaluator, Primitive, Scheduling, Tree};
use nalgebra::Vector3;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("geomeval.toml");

    let config = EvaluatorConfig {
        scheduling: Scheduling::Parallel,
        threads: Some(3),
        log_diagnostics: false,
    };
    config.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("scheduling = \"parallel\""));
    assert_eq!(EvaluatorConfig::from_file(&path).unwrap(), config);
}

#[test]
fn test_missing_and_malformed_files() {
    let dir = TempDir::new().unwrap();
    assert!(EvaluatorConfig::from_file(dir.path().join("absent.toml")).is_err());

    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "scheduling = \"eventually\"").unwrap();
    let error = EvaluatorConfig::from_file(&path).unwrap_err();
    assert!(error.to_string().contains("Failed to parse config file"));
}

#[test]
fn test_loaded_config_drives_evaluator() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("geomeval.toml");
    std::fs::write(&path, "scheduling = \"inline\"\nlog_diagnostics = false\n").unwrap();
    let config = EvaluatorConfig::from_file(&path).unwrap();
    assert_eq!(config.threads, None);

    let mut tree = Tree::new();
    let root = tree.leaf(Primitive::cube(Vector3::new(2.0, 2.0, 2.0), false));
    let evaluator = GeometryEvaluator::with_config(&tree, Arc::new(DefaultKernel::new()), config).unwrap();
    assert_eq!(evaluator.config().scheduling, Scheduling::Inline);
    assert!(!evaluator.evaluate_geometry(root, false).unwrap().is_empty());
}
