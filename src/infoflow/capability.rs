// CLASSIFICATION: COMMUNITY
// Filename: capability.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Descriptor capabilities: which system calls a sandbox may perform on a
//! file descriptor it was handed.

use crate::call_graph::CallGraph;
use crate::context::Context;
use crate::error::SoaapResult;
use crate::infoflow::engine::Engine;
use crate::infoflow::fact::SyscallSet;
use crate::infoflow::state::FactState;
use crate::infoflow::{AnalysisEnv, InfoFlow, Settings};
use crate::ir::Opcode;
use crate::syscalls::SysCallTable;
use crate::validator::{Diagnostic, DiagnosticKind, Report};
use log::{debug, warn};

pub struct CapabilityAnalysis {
    settings: Settings,
    state: FactState<SyscallSet>,
}

impl CapabilityAnalysis {
    pub fn new(context_insensitive: bool) -> Self {
        CapabilityAnalysis {
            settings: Settings::must(context_insensitive),
            state: FactState::new(),
        }
    }

    fn context_for(&self, sandbox: usize) -> Context {
        if self.settings.context_insensitive {
            Context::Single
        } else {
            Context::Sandbox(sandbox)
        }
    }
}

impl InfoFlow for CapabilityAnalysis {
    type Fact = SyscallSet;

    fn name(&self) -> &'static str {
        "capability"
    }

    fn settings(&self) -> Settings {
        self.settings
    }

    fn initialise(&mut self, engine: &mut Engine<'_, SyscallSet>, env: &AnalysisEnv<'_>, _cg: &mut CallGraph) -> SoaapResult<()> {
        let table = SysCallTable::get();
        for sandbox in env.sandboxes.sandboxes() {
            for (value, syscalls) in &sandbox.capabilities {
                let mut allowed = SyscallSet::default();
                for name in syscalls {
                    match table.index(name) {
                        Some(idx) => {
                            allowed.0.insert(idx);
                        }
                        None => warn!("sandbox {}: {} takes no descriptor, ignored", sandbox.name, name),
                    }
                }
                debug!("capability seed {} in {}: {:?}", env.module.value_name(*value), sandbox.name, syscalls);
                engine.seed(*value, Context::Sandbox(sandbox.id), allowed);
            }
        }
        Ok(())
    }

    fn post_analysis(&mut self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        let module = env.module;
        let table = SysCallTable::get();
        for sandbox in env.sandboxes.sandboxes() {
            let ctx = self.context_for(sandbox.id);
            for &f in &sandbox.functions {
                for &call in cg.calls_in(f) {
                    let Opcode::Call { args, .. } = &module.inst(call).opcode else {
                        continue;
                    };
                    for callee in cg.callees(call) {
                        let name = &module.function(callee).name;
                        let (Some(sys_idx), Some(fd_idx)) = (table.index(name), table.fd_arg(name)) else {
                            continue;
                        };
                        let Some(&fd) = args.get(fd_idx) else {
                            continue;
                        };
                        let allowed = self.state.get(ctx, fd).map_or(false, |s| s.allows(sys_idx));
                        if !allowed {
                            report.push(
                                Diagnostic::new(
                                    DiagnosticKind::SyscallNotAllowed,
                                    format!(
                                        "Sandbox \"{}\" performs system call \"{}\" but is not allowed to for the given fd arg.",
                                        sandbox.name, name
                                    ),
                                )
                                .in_function(module.function(f).name.clone())
                                .with_sandboxes(vec![sandbox.name.clone()])
                                .at(module.inst(call).loc.as_ref())
                                .about(format!("{}@{}", name, call.0))
                                .with_trace(env.trace_to(cg, Some(sandbox), f)),
                            );
                        }
                    }
                }
            }
        }
    }

    fn state(&self) -> &FactState<SyscallSet> {
        &self.state
    }

    fn set_state(&mut self, state: FactState<SyscallSet>) {
        self.state = state;
    }
}
