// CLASSIFICATION: COMMUNITY
// Filename: privileged_calls.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Sandboxes may only call `SOAAP_PRIVILEGED` functions through callgates.

use crate::call_graph::CallGraph;
use crate::infoflow::AnalysisEnv;
use crate::ir::FuncId;
use crate::sandbox::annotations::PRIVILEGED;
use crate::validator::{Diagnostic, DiagnosticKind, Report};
use log::info;

#[derive(Debug, Default)]
pub struct PrivilegedCallAnalysis {
    privileged: Vec<FuncId>,
}

impl PrivilegedCallAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Functions annotated privileged, as found by the last run.
    pub fn privileged_functions(&self) -> &[FuncId] {
        &self.privileged
    }

    pub fn do_analysis(&mut self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        let module = env.module;
        self.privileged = module
            .function_ids()
            .filter(|f| module.function(*f).annotations.iter().any(|a| a == PRIVILEGED))
            .collect();
        for &target in &self.privileged {
            let tname = &module.function(target).name;
            info!("privileged function: {}", tname);
            for call in cg.callers(target) {
                let caller = module.enclosing_function(call);
                for sandbox in env.sandboxes.sandboxes() {
                    if sandbox.is_callgate(target) || !sandbox.contains_instruction(module, call) {
                        continue;
                    }
                    report.push(
                        Diagnostic::new(
                            DiagnosticKind::PrivilegedCall,
                            format!(
                                "Sandbox \"{}\" calls privileged function \"{}\" that they are not allowed to. \
                                 If intended, annotate this permission using the __soaap_callgates annotation.",
                                sandbox.name, tname
                            ),
                        )
                        .in_function(module.function(caller).name.clone())
                        .with_sandboxes(vec![sandbox.name.clone()])
                        .at(module.inst(call).loc.as_ref())
                        .about(format!("{}@{}", tname, call.0))
                        .with_trace(env.trace_to(cg, Some(sandbox), caller)),
                    );
                }
            }
        }
    }
}
