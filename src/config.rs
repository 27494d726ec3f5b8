// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Evaluator configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up by [`EvaluatorConfig::load`]
pub const CONFIG_FILE: &str = "geomeval.toml";

/// Where node computations run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheduling {
    /// Every node on the calling thread, children first
    Inline,
    /// Sibling subtrees on a worker pool
    #[default]
    Parallel,
}

impl std::str::FromStr for Scheduling {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Scheduling::Inline),
            "parallel" => Ok(Scheduling::Parallel),
            other => anyhow::bail!("unknown scheduling mode: {:?}", other),
        }
    }
}

/// Evaluator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub scheduling: Scheduling,
    /// Worker threads for parallel scheduling
    pub threads: Option<usize>,
    /// Emit every diagnostic as a `tracing` warning
    pub log_diagnostics: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            scheduling: Scheduling::Parallel,
            threads: None, // rayon picks
            log_diagnostics: true,
        }
    }
}

impl EvaluatorConfig {
    pub fn inline() -> Self {
        Self {
            scheduling: Scheduling::Inline,
            ..Self::default()
        }
    }

    pub fn parallel(threads: usize) -> Self {
        Self {
            scheduling: Scheduling::Parallel,
            threads: Some(threads),
            ..Self::default()
        }
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: EvaluatorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load `geomeval.toml` if present, then apply `GEOMEVAL_SCHEDULING`
    /// and `GEOMEVAL_THREADS`
    pub fn load() -> Result<Self> {
        let path = PathBuf::from(CONFIG_FILE);
        let config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides read through `lookup` (normally the environment)
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(scheduling) = lookup("GEOMEVAL_SCHEDULING") {
            self.scheduling = scheduling.parse().context("Invalid GEOMEVAL_SCHEDULING")?;
        }

        if let Some(threads) = lookup("GEOMEVAL_THREADS") {
            let threads: usize = threads.trim().parse().context("Invalid GEOMEVAL_THREADS")?;
            self.threads = (threads > 0).then_some(threads);
        }

        Ok(self)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }
}
