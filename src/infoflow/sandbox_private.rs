// CLASSIFICATION: COMMUNITY
// Filename: sandbox_private.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Sandbox-private data.
//!
//! Values annotated `SANDBOX_PRIVATE_<name>` belong to that sandbox. The
//! validator reports reads of the data from anywhere else, and every way
//! the owning sandbox could hand it out: shared globals, environment
//! variables, library calls, callgates, other sandboxes' entry points and
//! the sandbox's own return values. Values the declassifier marked are
//! propagation barriers.

use crate::call_graph::CallGraph;
use crate::context::Context;
use crate::error::SoaapResult;
use crate::infoflow::declassifier::DeclassifierAnalysis;
use crate::infoflow::engine::Engine;
use crate::infoflow::fact::SandboxMask;
use crate::infoflow::state::FactState;
use crate::infoflow::{AnalysisEnv, InfoFlow, Settings};
use crate::ir::{Constant, FuncId, Module, Opcode, Value};
use crate::sandbox::Sandbox;
use crate::validator::{Diagnostic, DiagnosticKind, Report};
use log::debug;

pub struct SandboxPrivateAnalysis {
    settings: Settings,
    state: FactState<SandboxMask>,
    declassifier: DeclassifierAnalysis,
}

impl SandboxPrivateAnalysis {
    pub fn new(context_insensitive: bool) -> Self {
        SandboxPrivateAnalysis {
            settings: Settings::may(context_insensitive),
            state: FactState::new(),
            declassifier: DeclassifierAnalysis::new(),
        }
    }

    pub fn declassifier(&self) -> &DeclassifierAnalysis {
        &self.declassifier
    }

    fn privileged_context(&self) -> Context {
        if self.settings.context_insensitive {
            Context::Single
        } else {
            Context::Privileged
        }
    }

    fn sandbox_context(&self, sandbox: &Sandbox) -> Context {
        if self.settings.context_insensitive {
            Context::Single
        } else {
            Context::Sandbox(sandbox.id)
        }
    }

    fn mask(&self, ctx: Context, v: Value) -> u32 {
        self.state.get(ctx, v).map_or(0, |m| m.0)
    }

    fn check_privileged_reads(&self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        let module = env.module;
        let ctx = self.privileged_context();
        for &f in env.sandboxes.privileged_methods() {
            for inst in module.instructions(f) {
                let Opcode::Load { ptr } = module.inst(inst).opcode else {
                    continue;
                };
                let v = module.strip_casts(ptr);
                let owners = self.mask(ctx, v);
                if owners == 0 {
                    continue;
                }
                let fname = module.function(f).name.clone();
                report.push(
                    Diagnostic::new(
                        DiagnosticKind::PrivateRead,
                        format!(
                            "Privileged method \"{}\" read data value belonging to sandboxes: {}",
                            fname,
                            env.sandboxes.stringify_sandbox_names(owners)
                        ),
                    )
                    .in_function(fname)
                    .with_sandboxes(env.sandboxes.sandbox_names(owners))
                    .at(module.inst(inst).loc.as_ref())
                    .about(module.value_name(v))
                    .with_trace(env.trace_to(cg, None, f)),
                );
            }
        }
    }

    fn check_sandboxed_reads(&self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        let module = env.module;
        for sandbox in env.sandboxes.sandboxes() {
            let ctx = self.sandbox_context(sandbox);
            let own = sandbox.mask();
            for &f in &sandbox.functions {
                for inst in module.instructions(f) {
                    let Opcode::Load { ptr } = module.inst(inst).opcode else {
                        continue;
                    };
                    let v = module.strip_casts(ptr);
                    let owners = self.mask(ctx, v);
                    if owners == 0 || owners & own == owners {
                        continue;
                    }
                    let fname = module.function(f).name.clone();
                    report.push(
                        Diagnostic::new(
                            DiagnosticKind::PrivateRead,
                            format!(
                                "Sandboxed method \"{}\" read data value belonging to sandboxes: {} but it executes in sandboxes: {}",
                                fname,
                                env.sandboxes.stringify_sandbox_names(owners),
                                env.sandboxes.stringify_sandbox_names(own)
                            ),
                        )
                        .in_function(fname)
                        .with_sandboxes(vec![sandbox.name.clone()])
                        .at(module.inst(inst).loc.as_ref())
                        .about(module.value_name(v))
                        .with_trace(env.trace_to(cg, Some(sandbox), f)),
                    );
                }
            }
        }
    }

    fn check_leaks(&self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        let module = env.module;
        for sandbox in env.sandboxes.sandboxes() {
            let ctx = self.sandbox_context(sandbox);
            let own = sandbox.mask();
            let leaks = |v: Value| self.mask(ctx, v) & own != 0;
            for &f in &sandbox.functions {
                let fname = &module.function(f).name;
                let prefix = format!(
                    "Sandboxed method \"{}\" executing in sandboxes: {} may leak private data",
                    fname,
                    env.sandboxes.stringify_sandbox_names(own)
                );
                for inst in module.instructions(f) {
                    let leak = match &module.inst(inst).opcode {
                        Opcode::Store { value, ptr } => match module.strip_casts(*ptr) {
                            Value::Global(g) if leaks(*value) => {
                                let name = &module.global(g).name;
                                Some((format!("{} through global variable {}", prefix, name), name.clone()))
                            }
                            _ => None,
                        },
                        Opcode::Call { args, .. } => cg
                            .callees(inst)
                            .into_iter()
                            .find_map(|callee| self.leak_through_call(env, sandbox, callee, args, &prefix, &leaks)),
                        Opcode::Ret { value: Some(rv) } if sandbox.is_entry_point(f) && leaks(*rv) => Some((
                            format!(
                                "Sandbox \"{}\" may leak private data when returning a value from entrypoint \"{}\"",
                                sandbox.name, fname
                            ),
                            format!("return@{}", inst.0),
                        )),
                        _ => None,
                    };
                    if let Some((message, subject)) = leak {
                        report.push(
                            Diagnostic::new(DiagnosticKind::PrivateLeak, message)
                                .in_function(fname.clone())
                                .with_sandboxes(vec![sandbox.name.clone()])
                                .at(module.inst(inst).loc.as_ref())
                                .about(subject)
                                .with_trace(env.trace_to(cg, Some(sandbox), f)),
                        );
                    }
                }
            }
        }
    }

    /// Leak message and dedup subject for a call from `sandbox` that may
    /// reach `callee`, if it hands private data across the boundary.
    fn leak_through_call(
        &self,
        env: &AnalysisEnv<'_>,
        sandbox: &Sandbox,
        callee: FuncId,
        args: &[Value],
        prefix: &str,
        leaks: &dyn Fn(Value) -> bool,
    ) -> Option<(String, String)> {
        let module = env.module;
        let func = module.function(callee);
        if func.name.starts_with("__soaap_") {
            return None;
        }
        if func.name == "setenv" {
            let value = *args.get(1)?;
            if !leaks(value) {
                return None;
            }
            let var = args.first().map(|a| env_var_name(module, *a)).unwrap_or_default();
            return Some((format!("{} through env var \"{}\"", prefix, var), format!("setenv:{}", var)));
        }
        if func.is_declaration() {
            return args.iter().any(|a| leaks(*a)).then(|| {
                (
                    format!("{} through the extern function \"{}\"", prefix, func.name),
                    func.name.clone(),
                )
            });
        }
        if sandbox.is_callgate(callee) {
            return args
                .iter()
                .any(|a| leaks(*a))
                .then(|| (format!("{} through callgate \"{}\"", prefix, func.name), func.name.clone()));
        }
        match env.sandboxes.sandbox_for_entry_point(callee) {
            Some(other) if other.id != sandbox.id && args.iter().any(|a| leaks(*a)) => Some((
                format!("{} through a cross-sandbox call into [{}]", prefix, other.name),
                func.name.clone(),
            )),
            _ => None,
        }
    }
}

fn env_var_name(module: &Module, v: Value) -> String {
    let text = match module.strip_casts(v) {
        Value::Global(g) => module.global(g).initializer.map(|init| module.strip_casts(init)),
        other => Some(other),
    };
    match text {
        Some(Value::Const(c)) => match module.constant(c) {
            Constant::Str(s) => s.clone(),
            _ => module.value_name(v),
        },
        _ => module.value_name(v),
    }
}

impl InfoFlow for SandboxPrivateAnalysis {
    type Fact = SandboxMask;

    fn name(&self) -> &'static str {
        "sandbox-private"
    }

    fn settings(&self) -> Settings {
        self.settings
    }

    fn initialise(&mut self, engine: &mut Engine<'_, SandboxMask>, env: &AnalysisEnv<'_>, cg: &mut CallGraph) -> SoaapResult<()> {
        let mut scratch = Report::new(true);
        self.declassifier.do_analysis(env, cg, &mut scratch)?;
        for v in self.declassifier.declassified_values() {
            engine.add_barrier(v);
        }

        let module = env.module;
        let contexts = *engine.contexts();
        for sandbox in env.sandboxes.sandboxes() {
            let bit = SandboxMask(sandbox.mask());
            for &v in &sandbox.private_data {
                match v {
                    Value::Inst(inst) => {
                        let f = module.enclosing_function(inst);
                        let target = match &module.inst(inst).opcode {
                            Opcode::VarAnnotation { var, .. } => module.strip_casts(*var),
                            Opcode::PtrAnnotation { .. } => v,
                            _ => continue,
                        };
                        for ctx in contexts.contexts_for_method(f) {
                            debug!("private to {}: {} in {}", sandbox.name, module.value_name(target), ctx);
                            engine.seed(target, ctx, bit);
                        }
                    }
                    Value::Global(_) => engine.seed(v, Context::NoContext, bit),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn post_analysis(&mut self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        self.check_privileged_reads(env, cg, report);
        self.check_sandboxed_reads(env, cg, report);
        self.check_leaks(env, cg, report);
    }

    fn state(&self) -> &FactState<SandboxMask> {
        &self.state
    }

    fn set_state(&mut self, state: FactState<SandboxMask>) {
        self.state = state;
    }
}
