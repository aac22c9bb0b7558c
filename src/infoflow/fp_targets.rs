// CLASSIFICATION: COMMUNITY
// Filename: fp_targets.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Function-pointer target analyses. Both feed the call graph with the
//! targets they find for indirect calls.

use crate::call_graph::CallGraph;
use crate::context::Context;
use crate::error::SoaapResult;
use crate::infoflow::engine::Engine;
use crate::infoflow::fact::FunctionTargets;
use crate::infoflow::state::FactState;
use crate::infoflow::{AnalysisEnv, InfoFlow, Settings};
use crate::ir::{Constant, FuncId, GlobalId, InstId, Module, Opcode, Type, Value};
use crate::sandbox::annotations::{split_names, FP};
use crate::validator::Report;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};

/// Dense numbering of the functions that can be pointer targets.
#[derive(Clone, Debug, Default)]
pub struct FpTargetIndex {
    funcs: Vec<FuncId>,
    idx: HashMap<FuncId, usize>,
}

impl FpTargetIndex {
    /// Defined functions that are address-taken or named by an `SOAAP_FP_`
    /// annotation.
    pub fn new(module: &Module) -> Self {
        let mut named: HashSet<FuncId> = HashSet::new();
        for f in module.function_ids() {
            for inst in module.instructions(f) {
                if let Some(list) = fp_annotation(&module.inst(inst).opcode) {
                    named.extend(split_names(list).iter().filter_map(|n| module.function_by_name(n)));
                }
            }
        }
        let mut index = FpTargetIndex::default();
        for f in module.function_ids() {
            if module.function(f).is_declaration() {
                continue;
            }
            if module.address_taken(f) || named.contains(&f) {
                index.idx.insert(f, index.funcs.len());
                index.funcs.push(f);
            }
        }
        index
    }

    pub fn index_of(&self, f: FuncId) -> Option<usize> {
        self.idx.get(&f).copied()
    }

    pub fn function(&self, idx: usize) -> Option<FuncId> {
        self.funcs.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    pub fn targets_of(&self, f: FuncId) -> Option<FunctionTargets> {
        self.index_of(f).map(FunctionTargets::single)
    }

    pub fn functions(&self, fact: &FunctionTargets) -> Vec<FuncId> {
        fact.indices().filter_map(|i| self.function(i)).collect()
    }

    /// Drop targets whose signature does not fit the call site from `fact`,
    /// then add the rest to `cg`.
    fn add_compatible_callees(&self, module: &Module, cg: &mut CallGraph, call: InstId, fact: &mut FunctionTargets) {
        let Opcode::Call { sig, .. } = &module.inst(call).opcode else {
            return;
        };
        let (compatible, rejected): (Vec<FuncId>, Vec<FuncId>) = self
            .functions(fact)
            .into_iter()
            .partition(|f| module.function(*f).ty.compatible_with(sig));
        for f in rejected {
            if let Some(idx) = self.index_of(f) {
                debug!("call %{}: {} does not fit the call signature", call.0, module.function(f).name);
                fact.0.remove(idx);
            }
        }
        if cg.add_callees(call, compatible.iter().copied()) {
            debug!("call %{} may now reach {} functions", call.0, cg.callees(call).len());
        }
    }

    fn compatible_targets(&self, module: &Module, call: InstId, fact: Option<&FunctionTargets>) -> Vec<FuncId> {
        let (Some(fact), Opcode::Call { sig, .. }) = (fact, &module.inst(call).opcode) else {
            return Vec::new();
        };
        self.functions(fact)
            .into_iter()
            .filter(|f| module.function(*f).ty.compatible_with(sig))
            .collect()
    }
}

fn fp_annotation(opcode: &Opcode) -> Option<&str> {
    match opcode {
        Opcode::VarAnnotation { annotation, .. } | Opcode::PtrAnnotation { annotation, .. } => {
            annotation.strip_prefix(FP)
        }
        _ => None,
    }
}

fn callee_operand(module: &Module, call: InstId) -> Option<Value> {
    match &module.inst(call).opcode {
        Opcode::Call { callee, .. } => Some(*callee),
        _ => None,
    }
}

/// Targets inferred from assignments of functions to pointers.
pub struct InferredFpTargets {
    settings: Settings,
    state: FactState<FunctionTargets>,
    index: FpTargetIndex,
}

impl InferredFpTargets {
    pub fn new(module: &Module, context_insensitive: bool) -> Self {
        InferredFpTargets {
            settings: Settings::may(context_insensitive),
            state: FactState::new(),
            index: FpTargetIndex::new(module),
        }
    }

    pub fn index(&self) -> &FpTargetIndex {
        &self.index
    }

    /// Signature-compatible functions the callee operand of `call` may hold
    /// under `ctx`.
    pub fn inferred_targets(&self, module: &Module, call: InstId, ctx: Context) -> Vec<FuncId> {
        let Some(callee) = callee_operand(module, call) else {
            return Vec::new();
        };
        self.index.compatible_targets(module, call, self.state.get(ctx, callee))
    }

    fn defined_target(&self, module: &Module, v: Value) -> Option<FunctionTargets> {
        module
            .strip_casts(v)
            .as_function()
            .and_then(|f| self.index.targets_of(f))
    }

    /// Every function reachable through a global's constant initializer.
    fn scan_initializer(&self, module: &Module, v: Value, visited: &mut HashSet<Value>, out: &mut FunctionTargets) {
        if !visited.insert(v) {
            return;
        }
        match v {
            Value::Function(f) => {
                if let Some(idx) = self.index.index_of(f) {
                    out.0.insert(idx);
                }
            }
            Value::Const(c) => match module.constant(c) {
                Constant::Aggregate(items) => {
                    for item in items {
                        self.scan_initializer(module, *item, visited, out);
                    }
                }
                Constant::Expr(inner) => self.scan_initializer(module, *inner, visited, out),
                Constant::Str(_) => {}
            },
            _ => {}
        }
    }

    fn seed_global(&self, engine: &mut Engine<'_, FunctionTargets>, module: &Module, g: GlobalId) {
        let Some(init) = module.global(g).initializer else {
            return;
        };
        let mut found = FunctionTargets::default();
        self.scan_initializer(module, init, &mut HashSet::new(), &mut found);
        if found.indices().next().is_some() {
            debug!("global {} holds function pointers", module.global(g).name);
            engine.seed(Value::Global(g), Context::NoContext, found);
        }
    }
}

impl InfoFlow for InferredFpTargets {
    type Fact = FunctionTargets;

    fn name(&self) -> &'static str {
        "fp-inferred-targets"
    }

    fn settings(&self) -> Settings {
        self.settings
    }

    fn initialise(
        &mut self,
        engine: &mut Engine<'_, FunctionTargets>,
        env: &AnalysisEnv<'_>,
        cg: &mut CallGraph,
    ) -> SoaapResult<()> {
        let module = env.module;
        let contexts = *engine.contexts();
        info!("{} possible function-pointer targets", self.index.len());
        for f in module.function_ids() {
            if module.function(f).is_declaration() {
                continue;
            }
            for inst in module.instructions(f) {
                let ctxs = contexts.contexts_for_instruction(inst);
                match &module.inst(inst).opcode {
                    Opcode::Store { value, ptr } => {
                        let Some(fact) = self.defined_target(module, *value) else {
                            continue;
                        };
                        let slot = module.strip_casts(*ptr);
                        for &ctx in &ctxs {
                            engine.seed(slot, ctx, fact.clone());
                            engine.rewind(slot, ctx, cg);
                        }
                    }
                    Opcode::Select { on_true, on_false, .. } => {
                        for arm in [on_true, on_false] {
                            if let Some(fact) = self.defined_target(module, *arm) {
                                for &ctx in &ctxs {
                                    engine.seed(Value::Inst(inst), ctx, fact.clone());
                                }
                            }
                        }
                    }
                    Opcode::Call { args, sig, .. } => {
                        let Some(callee) = CallGraph::direct_callee(module, inst) else {
                            continue;
                        };
                        let callee_fn = module.function(callee);
                        if callee_fn.is_declaration() {
                            // a library call returning a function pointer may hand back
                            // any function it was given
                            if !matches!(&*sig.ret, Type::Ptr(inner) if matches!(**inner, Type::Func(_))) {
                                continue;
                            }
                            for arg in args {
                                if let Some(fact) = self.defined_target(module, *arg) {
                                    for &ctx in &ctxs {
                                        engine.seed(Value::Inst(inst), ctx, fact.clone());
                                    }
                                }
                            }
                            continue;
                        }
                        for (i, arg) in args.iter().enumerate().take(callee_fn.param_count()) {
                            if let Some(fact) = self.defined_target(module, *arg) {
                                for &ctx in &ctxs {
                                    engine.seed(Value::Param(callee, i as u32), ctx, fact.clone());
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        for g in module.global_ids() {
            self.seed_global(engine, module, g);
        }
        Ok(())
    }

    fn state_changed_for_function_pointer(
        &mut self,
        module: &Module,
        cg: &mut CallGraph,
        call: InstId,
        _ctx: Context,
        fact: &mut FunctionTargets,
    ) {
        self.index.add_compatible_callees(module, cg, call, fact);
    }

    fn post_analysis(&mut self, env: &AnalysisEnv<'_>, cg: &CallGraph, _report: &mut Report) {
        let module = env.module;
        let resolved = module
            .function_ids()
            .flat_map(|f| cg.calls_in(f).iter().copied())
            .filter(|c| CallGraph::is_indirect_call(module, *c) && !cg.callees(*c).is_empty())
            .count();
        info!("{}: {} indirect calls resolved", self.name(), resolved);
    }

    fn state(&self) -> &FactState<FunctionTargets> {
        &self.state
    }

    fn set_state(&mut self, state: FactState<FunctionTargets>) {
        self.state = state;
    }
}

/// Targets listed explicitly with `SOAAP_FP_<f,g>`.
pub struct AnnotatedFpTargets {
    state: FactState<FunctionTargets>,
    index: FpTargetIndex,
}

impl AnnotatedFpTargets {
    pub fn new(module: &Module) -> Self {
        AnnotatedFpTargets {
            state: FactState::new(),
            index: FpTargetIndex::new(module),
        }
    }

    pub fn targets(&self, module: &Module, call: InstId) -> Vec<FuncId> {
        let Some(callee) = callee_operand(module, call) else {
            return Vec::new();
        };
        self.index
            .compatible_targets(module, call, self.state.get(Context::Single, callee))
    }
}

impl InfoFlow for AnnotatedFpTargets {
    type Fact = FunctionTargets;

    fn name(&self) -> &'static str {
        "fp-annotated-targets"
    }

    fn settings(&self) -> Settings {
        Settings::may(true)
    }

    fn initialise(
        &mut self,
        engine: &mut Engine<'_, FunctionTargets>,
        env: &AnalysisEnv<'_>,
        _cg: &mut CallGraph,
    ) -> SoaapResult<()> {
        let module = env.module;
        for f in module.function_ids() {
            for inst in module.instructions(f) {
                let opcode = &module.inst(inst).opcode;
                let Some(list) = fp_annotation(opcode) else {
                    continue;
                };
                let mut fact = FunctionTargets::default();
                for name in split_names(list) {
                    match module.function_by_name(&name).and_then(|t| self.index.index_of(t)) {
                        Some(idx) => {
                            fact.0.insert(idx);
                        }
                        None => warn!("{}: unknown function pointer target {}", module.function(f).name, name),
                    }
                }
                let annotated = match opcode {
                    Opcode::VarAnnotation { var, .. } => module.strip_casts(*var),
                    _ => Value::Inst(inst),
                };
                engine.seed(annotated, Context::Single, fact);
            }
        }
        Ok(())
    }

    fn state_changed_for_function_pointer(
        &mut self,
        module: &Module,
        cg: &mut CallGraph,
        call: InstId,
        _ctx: Context,
        fact: &mut FunctionTargets,
    ) {
        self.index.add_compatible_callees(module, cg, call, fact);
    }

    fn post_analysis(&mut self, _env: &AnalysisEnv<'_>, _cg: &CallGraph, _report: &mut Report) {}

    fn state(&self) -> &FactState<FunctionTargets> {
        &self.state
    }

    fn set_state(&mut self, state: FactState<FunctionTargets>) {
        self.state = state;
    }
}
