// CLASSIFICATION: COMMUNITY
// Filename: traits.rs v2.0
// Date Modified: 2026-10-19
// Author: Lukas Bower

//! Defines the core trait for analysis passes.

use crate::call_graph::CallGraph;
use crate::error::SoaapResult;
use crate::infoflow::AnalysisEnv;
use crate::validator::Report;

/// Everything a pass may look at or extend while it runs.
pub struct PassContext<'a, 'e> {
    pub env: AnalysisEnv<'e>,
    pub cg: &'a mut CallGraph,
    pub report: &'a mut Report,
}

/// Trait for any analysis pass run over the program model.
pub trait AnalysisPass {
    /// Returns the unique name of the pass, used for logging and identification.
    fn name(&self) -> &'static str;

    /// A short description of what this pass checks.
    fn description(&self) -> &'static str {
        "(undocumented analysis pass)"
    }

    /// Executes the pass. Violations go to the report; only internal
    /// failures are returned as errors.
    fn run(&mut self, ctx: &mut PassContext<'_, '_>) -> SoaapResult<()>;
}
