// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Analysis configuration: defaults, environment overrides, TOML files and
//! a process-wide copy for the binary.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::RwLock;
use thiserror::Error;

/// Analyses that can be selected for a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Globals,
    Syscalls,
    Classified,
    Private,
    PrivilegedCalls,
    AccessOrigin,
    CreationPoints,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 7] = [
        AnalysisKind::Globals,
        AnalysisKind::Syscalls,
        AnalysisKind::Classified,
        AnalysisKind::Private,
        AnalysisKind::PrivilegedCalls,
        AnalysisKind::AccessOrigin,
        AnalysisKind::CreationPoints,
    ];
}

impl FromStr for AnalysisKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "globals" | "vars" => Ok(AnalysisKind::Globals),
            "syscalls" | "caps" => Ok(AnalysisKind::Syscalls),
            "classified" => Ok(AnalysisKind::Classified),
            "private" => Ok(AnalysisKind::Private),
            "privileged_calls" | "privcalls" => Ok(AnalysisKind::PrivilegedCalls),
            "access_origin" | "origin" => Ok(AnalysisKind::AccessOrigin),
            "creation_points" | "creation" => Ok(AnalysisKind::CreationPoints),
            other => Err(ConfigError::UnknownAnalysis(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Options shared by every analysis of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub context_insensitive: bool,
    /// Report every occurrence rather than once per (function, subject).
    pub pedantic: bool,
    pub infer_fp_targets: bool,
    pub output_traces: bool,
    /// Collapse repeated trace frames.
    pub summarise_traces: bool,
    pub analyses: Vec<AnalysisKind>,
    pub report_format: ReportFormat,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            context_insensitive: false,
            pedantic: false,
            infer_fp_targets: false,
            output_traces: false,
            summarise_traces: true,
            analyses: AnalysisKind::ALL.to_vec(),
            report_format: ReportFormat::Text,
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl AnalysisConfig {
    /// Defaults overridden by `SOAAP_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg
    }

    pub fn apply_env(&mut self) {
        if let Some(v) = env_flag("SOAAP_CONTEXT_INSENSITIVE") {
            self.context_insensitive = v;
        }
        if let Some(v) = env_flag("SOAAP_PEDANTIC") {
            self.pedantic = v;
        }
        if let Some(v) = env_flag("SOAAP_INFER_FP_TARGETS") {
            self.infer_fp_targets = v;
        }
        if let Some(v) = env_flag("SOAAP_TRACES") {
            self.output_traces = v;
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn enabled(&self, kind: AnalysisKind) -> bool {
        self.analyses.contains(&kind)
    }
}

static CONFIG: Lazy<RwLock<AnalysisConfig>> = Lazy::new(|| RwLock::new(AnalysisConfig::from_env()));

/// Errors produced by config operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("analysis config lock poisoned")]
    LockPoisoned,
    #[error("cannot read config: {0}")]
    Io(String),
    #[error("invalid config: {0}")]
    Parse(String),
    #[error("unknown analysis {0:?}")]
    UnknownAnalysis(String),
}

/// Replace the global analysis configuration.
pub fn set_config(cfg: AnalysisConfig) -> Result<(), ConfigError> {
    let mut guard = CONFIG.write().map_err(|_| ConfigError::LockPoisoned)?;
    *guard = cfg;
    Ok(())
}

/// Get a clone of the current configuration.
pub fn get_config() -> Result<AnalysisConfig, ConfigError> {
    CONFIG
        .read()
        .map_err(|_| ConfigError::LockPoisoned)
        .map(|g| g.clone())
}
