// CLASSIFICATION: COMMUNITY
// Filename: driver.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! One complete run: call graph, sandbox discovery, function-pointer
//! resolution and the selected analyses.

use crate::call_graph::{CallGraph, DynamicEdge};
use crate::config::AnalysisConfig;
use crate::error::SoaapResult;
use crate::infoflow::{AnalysisEnv, AnnotatedFpTargets, InferredFpTargets, InfoFlow};
use crate::ir::Module;
use crate::pass_framework::PassContext;
use crate::passes::PassRegistry;
use crate::sandbox::SandboxModel;
use crate::validator::Report;
use log::info;

/// Results of a run, kept together for callers that want to inspect the
/// model behind the diagnostics.
pub struct Outcome {
    pub report: Report,
    pub sandboxes: SandboxModel,
    pub call_graph: CallGraph,
}

pub fn run(module: &Module, config: &AnalysisConfig) -> SoaapResult<Outcome> {
    run_with_edges(module, config, &[])
}

/// Like [`run`], seeding the call graph with profiling edges first.
pub fn run_with_edges(module: &Module, config: &AnalysisConfig, edges: &[DynamicEdge]) -> SoaapResult<Outcome> {
    let mut cg = CallGraph::new(module);
    if !edges.is_empty() {
        cg.load_dynamic_edges(module, edges)?;
    }
    let mut report = Report::new(config.pedantic);
    let mut sandboxes = SandboxModel::discover(module, &cg, &mut report)?;
    info!("discovered {} sandboxes", sandboxes.sandboxes().len());

    let before = cg.version();
    {
        let env = AnalysisEnv::new(module, &sandboxes, config);
        AnnotatedFpTargets::new(module).do_analysis(&env, &mut cg, &mut report)?;
        if config.infer_fp_targets {
            InferredFpTargets::new(module, config.context_insensitive).do_analysis(&env, &mut cg, &mut report)?;
        }
    }
    if cg.version() != before {
        info!("function-pointer targets added call edges; recomputing sandboxes");
        sandboxes.reinit(module, &cg);
    }

    let mut manager = PassRegistry::from_config(config).into_manager();
    {
        let mut ctx = PassContext {
            env: AnalysisEnv::new(module, &sandboxes, config),
            cg: &mut cg,
            report: &mut report,
        };
        manager.run_all(&mut ctx)?;
    }
    info!("{} diagnostics", report.len());
    Ok(Outcome {
        report,
        sandboxes,
        call_graph: cg,
    })
}
