// CLASSIFICATION: COMMUNITY
// Filename: access_origin.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Tracks values privileged code received back from sandbox entry points
//! and flags privileged indirect calls through them.

use crate::call_graph::CallGraph;
use crate::context::Context;
use crate::error::SoaapResult;
use crate::infoflow::engine::Engine;
use crate::infoflow::fact::OriginMask;
use crate::infoflow::state::FactState;
use crate::infoflow::{AnalysisEnv, InfoFlow, Settings};
use crate::ir::{FuncId, InstId, Opcode, Value};
use crate::validator::{trace_from_calls, Diagnostic, DiagnosticKind, Report, TraceFrame};
use log::debug;

pub struct AccessOriginAnalysis {
    settings: Settings,
    state: FactState<OriginMask>,
    untrusted_sources: Vec<InstId>,
}

impl AccessOriginAnalysis {
    pub fn new(context_insensitive: bool) -> Self {
        AccessOriginAnalysis {
            settings: Settings::may(context_insensitive),
            state: FactState::new(),
            untrusted_sources: Vec::new(),
        }
    }

    /// Privileged calls into sandbox entry points.
    pub fn untrusted_sources(&self) -> &[InstId] {
        &self.untrusted_sources
    }

    fn privileged_context(&self) -> Context {
        if self.settings.context_insensitive {
            Context::Single
        } else {
            Context::Privileged
        }
    }

    fn origin(&self, v: Value) -> u32 {
        self.state.get(self.privileged_context(), v).map_or(0, |m| m.0)
    }

    /// main -> caller of the entry point -> `target`, following only calls
    /// that pass an untrusted value along in the second leg.
    fn untrusted_trace(&self, env: &AnalysisEnv<'_>, cg: &CallGraph, target: FuncId) -> Vec<TraceFrame> {
        if !env.config.output_traces {
            return Vec::new();
        }
        let module = env.module;
        let Some(main) = module.function_by_name("main") else {
            return Vec::new();
        };
        let carries_origin = |call: InstId| match &module.inst(call).opcode {
            Opcode::Call { args, .. } => args.iter().any(|a| self.origin(module.strip_casts(*a)) != 0),
            _ => false,
        };
        for &source in &self.untrusted_sources {
            let via = module.enclosing_function(source);
            let Some(head) = cg.find_path_to_func(main, via, None) else {
                continue;
            };
            let Some(tail) = cg.find_path_to_func(via, target, Some(&carries_origin)) else {
                continue;
            };
            let calls: Vec<InstId> = head.into_iter().chain(tail).collect();
            return trace_from_calls(module, &calls, env.config.summarise_traces);
        }
        debug!("no trace to {}", module.function(target).name);
        Vec::new()
    }
}

impl InfoFlow for AccessOriginAnalysis {
    type Fact = OriginMask;

    fn name(&self) -> &'static str {
        "access-origin"
    }

    fn settings(&self) -> Settings {
        self.settings
    }

    fn initialise(&mut self, engine: &mut Engine<'_, OriginMask>, env: &AnalysisEnv<'_>, cg: &mut CallGraph) -> SoaapResult<()> {
        let module = env.module;
        let ctx = self.privileged_context();
        self.untrusted_sources.clear();
        for &f in env.sandboxes.privileged_methods() {
            for &call in cg.calls_in(f) {
                let origin = cg
                    .callees(call)
                    .into_iter()
                    .filter_map(|callee| env.sandboxes.sandbox_for_entry_point(callee))
                    .fold(0, |mask, s| mask | s.mask());
                if origin == 0 {
                    continue;
                }
                debug!(
                    "{} receives values from {}",
                    module.function(f).name,
                    env.sandboxes.stringify_sandbox_names(origin)
                );
                engine.seed(Value::Inst(call), ctx, OriginMask(origin));
                self.untrusted_sources.push(call);
            }
        }
        Ok(())
    }

    fn post_analysis(&mut self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        let module = env.module;
        for &f in env.sandboxes.privileged_methods() {
            for &call in cg.calls_in(f) {
                if !CallGraph::is_indirect_call(module, call) {
                    continue;
                }
                let Opcode::Call { callee, .. } = &module.inst(call).opcode else {
                    continue;
                };
                let origin = self.origin(*callee);
                if origin == 0 {
                    continue;
                }
                let fname = module.function(f).name.clone();
                report.push(
                    Diagnostic::new(
                        DiagnosticKind::UntrustedFunctionPointer,
                        format!("Untrusted function pointer call in {}", fname),
                    )
                    .in_function(fname)
                    .with_sandboxes(env.sandboxes.sandbox_names(origin))
                    .at(module.inst(call).loc.as_ref())
                    .about(format!("call@{}", call.0))
                    .with_trace(self.untrusted_trace(env, cg, f)),
                );
            }
        }
    }

    fn state(&self) -> &FactState<OriginMask> {
        &self.state
    }

    fn set_state(&mut self, state: FactState<OriginMask>) {
        self.state = state;
    }
}
