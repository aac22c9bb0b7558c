// CLASSIFICATION: COMMUNITY
// Filename: global_vars.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Global-variable access checks and lost-update detection.

use crate::call_graph::CallGraph;
use crate::cfgflow::{CfgEngine, CfgFlow};
use crate::infoflow::AnalysisEnv;
use crate::ir::{GlobalId, Module, Opcode, Value};
use crate::validator::{Diagnostic, DiagnosticKind, Report};
use log::debug;

/// The global a load or store pointer refers to, looking through casts and
/// one address computation.
fn accessed_global(module: &Module, ptr: Value) -> Option<GlobalId> {
    let mut v = module.strip_casts(ptr);
    if let Value::Inst(i) = v {
        if let Opcode::Gep { base, .. } = &module.inst(i).opcode {
            v = module.strip_casts(*base);
        }
    }
    v.as_global()
}

fn declared_at(module: &Module, g: GlobalId) -> String {
    module
        .global(g)
        .loc
        .as_ref()
        .map(|l| format!(" ({}:{})", l.file, l.line))
        .unwrap_or_default()
}

#[derive(Default)]
pub struct GlobalVariableAnalysis;

impl GlobalVariableAnalysis {
    pub fn new() -> Self {
        GlobalVariableAnalysis
    }

    fn check_sandboxed_accesses(&self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        let module = env.module;
        for sandbox in env.sandboxes.sandboxes() {
            for &f in &sandbox.functions {
                let fname = &module.function(f).name;
                for inst in module.instructions(f) {
                    let (kind, g, verb, hint) = match &module.inst(inst).opcode {
                        Opcode::Load { ptr } => match accessed_global(module, *ptr) {
                            Some(g) if !sandbox.can_read(g) => (DiagnosticKind::GlobalRead, g, "read", "__soaap_var_read"),
                            _ => continue,
                        },
                        Opcode::Store { ptr, .. } => match accessed_global(module, *ptr) {
                            Some(g) if !module.global(g).external && !sandbox.can_write(g) => {
                                (DiagnosticKind::GlobalWrite, g, "wrote to", "__soaap_var_write")
                            }
                            _ => continue,
                        },
                        _ => continue,
                    };
                    let gname = &module.global(g).name;
                    report.push(
                        Diagnostic::new(
                            kind,
                            format!(
                                "Sandboxed method \"{}\" [{}] {} global variable \"{}\"{} but is not allowed to. \
                                 If the access is intended, the variable needs to be annotated with {}.",
                                fname,
                                sandbox.name,
                                verb,
                                gname,
                                declared_at(module, g),
                                hint
                            ),
                        )
                        .in_function(fname.clone())
                        .with_sandboxes(vec![sandbox.name.clone()])
                        .at(module.inst(inst).loc.as_ref())
                        .about(gname.clone())
                        .with_trace(env.trace_to(cg, Some(sandbox), f)),
                    );
                }
            }
        }
    }

    /// Sandboxes allowed to read `g`, as a mask.
    fn readers(env: &AnalysisEnv<'_>, g: GlobalId) -> u32 {
        env.sandboxes
            .sandboxes()
            .iter()
            .filter(|s| s.shared_vars.contains_key(&g) && s.can_read(g))
            .fold(0, |mask, s| mask | s.mask())
    }

    fn check_lost_updates(&self, engine: &CfgEngine<'_>, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        let module = env.module;
        for &f in env.sandboxes.privileged_methods() {
            let fname = &module.function(f).name;
            for inst in module.instructions(f) {
                let Opcode::Store { ptr, .. } = &module.inst(inst).opcode else {
                    continue;
                };
                let Value::Global(g) = module.strip_casts(*ptr) else {
                    continue;
                };
                let stale = Self::readers(env, g) & engine.fact(inst);
                if stale == 0 {
                    continue;
                }
                let gname = &module.global(g).name;
                debug!("store %{} to {} after creating {:#x}", inst.0, gname, engine.fact(inst));
                report.push(
                    Diagnostic::new(
                        DiagnosticKind::LostUpdate,
                        format!(
                            "Write to shared variable \"{}\"{} outside sandbox in method \"{}\" will not be seen by the sandboxes: {}. \
                             Synchronisation is needed to propagate this update to the sandboxes.",
                            gname,
                            declared_at(module, g),
                            fname,
                            env.sandboxes.stringify_sandbox_names(stale)
                        ),
                    )
                    .in_function(fname.clone())
                    .with_sandboxes(env.sandboxes.sandbox_names(stale))
                    .at(module.inst(inst).loc.as_ref())
                    .about(gname.clone())
                    .with_trace(env.trace_to(cg, None, f)),
                );
            }
        }
    }
}

impl CfgFlow for GlobalVariableAnalysis {
    fn name(&self) -> &'static str {
        "global-variables"
    }

    fn initialise(&mut self, engine: &mut CfgEngine<'_>, env: &AnalysisEnv<'_>) {
        for sandbox in env.sandboxes.sandboxes() {
            for &point in &sandbox.creation_points {
                engine.seed(point, sandbox.mask());
            }
        }
    }

    fn post_analysis(&mut self, engine: &CfgEngine<'_>, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        self.check_sandboxed_accesses(env, cg, report);
        self.check_lost_updates(engine, env, cg, report);
    }
}
