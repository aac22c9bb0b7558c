// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Checks that need neither dataflow engine.

pub mod privileged_calls;

pub use privileged_calls::PrivilegedCallAnalysis;

use crate::call_graph::CallGraph;
use crate::infoflow::AnalysisEnv;
use crate::sandbox::validate_creation_points;
use crate::validator::Report;

/// Entry points reached before their sandbox is created.
#[derive(Debug, Default)]
pub struct CreationPointAnalysis;

impl CreationPointAnalysis {
    pub fn do_analysis(&self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        validate_creation_points(env.module, cg, env.sandboxes, report, env.config.summarise_traces);
    }
}
