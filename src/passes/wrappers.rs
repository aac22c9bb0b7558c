// CLASSIFICATION: COMMUNITY
// Filename: wrappers.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Adapters that let every analysis run under the pass manager.

use crate::analysis::{CreationPointAnalysis, PrivilegedCallAnalysis};
use crate::cfgflow::CfgFlow;
use crate::error::SoaapResult;
use crate::infoflow::InfoFlow;
use crate::pass_framework::{AnalysisPass, PassContext};

pub struct InfoFlowPass<A> {
    analysis: A,
    description: &'static str,
}

impl<A: InfoFlow> InfoFlowPass<A> {
    pub fn new(analysis: A, description: &'static str) -> Self {
        InfoFlowPass { analysis, description }
    }

    pub fn analysis(&self) -> &A {
        &self.analysis
    }
}

impl<A: InfoFlow> AnalysisPass for InfoFlowPass<A> {
    fn name(&self) -> &'static str {
        self.analysis.name()
    }

    fn description(&self) -> &'static str {
        self.description
    }

    fn run(&mut self, ctx: &mut PassContext<'_, '_>) -> SoaapResult<()> {
        self.analysis.do_analysis(&ctx.env, ctx.cg, ctx.report)
    }
}

pub struct CfgFlowPass<A> {
    analysis: A,
}

impl<A: CfgFlow> CfgFlowPass<A> {
    pub fn new(analysis: A) -> Self {
        CfgFlowPass { analysis }
    }
}

impl<A: CfgFlow> AnalysisPass for CfgFlowPass<A> {
    fn name(&self) -> &'static str {
        self.analysis.name()
    }

    fn description(&self) -> &'static str {
        "shared global variable permissions and lost updates"
    }

    fn run(&mut self, ctx: &mut PassContext<'_, '_>) -> SoaapResult<()> {
        self.analysis.do_analysis(&ctx.env, ctx.cg, ctx.report)
    }
}

impl AnalysisPass for PrivilegedCallAnalysis {
    fn name(&self) -> &'static str {
        "privileged-calls"
    }

    fn description(&self) -> &'static str {
        "calls from sandboxes to privileged functions that are not callgates"
    }

    fn run(&mut self, ctx: &mut PassContext<'_, '_>) -> SoaapResult<()> {
        self.do_analysis(&ctx.env, ctx.cg, ctx.report);
        Ok(())
    }
}

impl AnalysisPass for CreationPointAnalysis {
    fn name(&self) -> &'static str {
        "creation-points"
    }

    fn description(&self) -> &'static str {
        "entry points reachable before their sandbox is created"
    }

    fn run(&mut self, ctx: &mut PassContext<'_, '_>) -> SoaapResult<()> {
        self.do_analysis(&ctx.env, ctx.cg, ctx.report);
        Ok(())
    }
}
