// CLASSIFICATION: COMMUNITY
// Filename: engine.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Context-sensitive interprocedural fixed-point propagation.
//!
//! Work items are `(value, context)` pairs. Popping one pushes its fact
//! to every use of the value; a destination is re-queued exactly when its
//! stored fact changed. Facts only grow (may) or only shrink (must), and
//! every table is finite, so the loop terminates.

use crate::call_graph::CallGraph;
use crate::context::{Context, ContextModel};
use crate::infoflow::externs::{self, extern_target};
use crate::infoflow::fact::Fact;
use crate::infoflow::queue_set::QueueSet;
use crate::infoflow::state::FactState;
use crate::infoflow::{InfoFlow, Mode, Settings};
use crate::ir::ops::{categorize, opcode_name, OpcodeCategory};
use crate::ir::{FuncId, InstId, Module, Opcode, User, Value};
use crate::syscalls::SysCallTable;
use log::{debug, info, trace, warn};
use std::collections::{HashMap, HashSet};

pub struct Engine<'a, F: Fact> {
    name: &'static str,
    module: &'a Module,
    contexts: ContextModel<'a>,
    settings: Settings,
    state: FactState<F>,
    worklist: QueueSet<(Value, Context)>,
    barriers: HashSet<Value>,
    warned_externs: HashSet<String>,
}

impl<'a, F: Fact> Engine<'a, F> {
    pub fn new(name: &'static str, module: &'a Module, contexts: ContextModel<'a>, settings: Settings) -> Self {
        Engine {
            name,
            module,
            contexts,
            settings,
            state: FactState::new(),
            worklist: QueueSet::new(),
            barriers: HashSet::new(),
            warned_externs: HashSet::new(),
        }
    }

    pub fn contexts(&self) -> &ContextModel<'a> {
        &self.contexts
    }

    pub fn state(&self) -> &FactState<F> {
        &self.state
    }

    pub fn into_state(self) -> FactState<F> {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.worklist.len()
    }

    /// Add `fact` to `v` under `ctx` and queue the pair.
    pub fn seed(&mut self, v: Value, ctx: Context, fact: F) {
        match self.state.get_mut(ctx, v) {
            Some(existing) => {
                existing.union(&fact);
            }
            None => self.state.set(ctx, v, fact),
        }
        self.worklist.push((v, ctx));
    }

    /// Give the object `v` points into the fact already seeded on `v`.
    pub fn rewind(&mut self, v: Value, ctx: Context, cg: &CallGraph) {
        self.propagate_to_aggregate(v, ctx, v, ctx, cg);
    }

    /// Facts never flow out of `v`.
    pub fn add_barrier(&mut self, v: Value) {
        self.barriers.insert(v);
    }

    /// Iterate to the fixed point. `analysis` receives the function-pointer
    /// hook; `cg` may gain edges while this runs.
    pub fn run<A>(&mut self, analysis: &mut A, cg: &mut CallGraph)
    where
        A: InfoFlow<Fact = F>,
    {
        if self.settings.context_insensitive {
            self.merge_into_single();
        }
        let mut steps = 0usize;
        while let Some((v, ctx)) = self.worklist.pop() {
            steps += 1;
            debug!(
                "{}: {} in {} = {}",
                self.name,
                self.module.value_name(v),
                ctx,
                self.state.fact_or_bottom(ctx, v).describe()
            );
            self.process(v, ctx, analysis, cg);
        }
        if self.settings.context_insensitive {
            self.broadcast_single();
        }
        info!("{}: fixed point after {} steps, {} facts", self.name, steps, self.state.len());
    }

    fn process<A>(&mut self, v: Value, ctx: Context, analysis: &mut A, cg: &mut CallGraph)
    where
        A: InfoFlow<Fact = F>,
    {
        let module = self.module;
        let users: Vec<User> = module.users(v).to_vec();
        for user in users {
            match user {
                User::Const(c) => {
                    let target = Value::Const(c);
                    if self.propagate_union(v, target, ctx) {
                        self.worklist.push((target, ctx));
                    }
                }
                User::Inst(inst) => self.process_use(v, ctx, inst, analysis, cg),
            }
        }
    }

    fn process_use<A>(&mut self, v: Value, ctx: Context, inst: InstId, analysis: &mut A, cg: &mut CallGraph)
    where
        A: InfoFlow<Fact = F>,
    {
        let module = self.module;
        if ctx == Context::NoContext {
            let f = module.enclosing_function(inst);
            for c2 in self.contexts.contexts_for_method(f) {
                self.propagate(v, v, Context::NoContext, c2);
                self.worklist.push((v, c2));
            }
            return;
        }
        if !self.contexts.executes_in(inst, ctx) {
            return;
        }
        let opcode = &module.inst(inst).opcode;
        trace!("{}: use of {} by {} %{}", self.name, module.value_name(v), opcode_name(opcode), inst.0);
        let target = match opcode {
            Opcode::Store { ptr, .. } => {
                if *ptr == v {
                    return;
                }
                *ptr
            }
            Opcode::PtrAnnotation { .. } => Value::Inst(inst),
            Opcode::VarAnnotation { .. } | Opcode::Annotation { .. } => return,
            Opcode::Call { callee, args, .. } => {
                if let Some(f) = CallGraph::direct_callee(module, inst) {
                    if module.function(f).is_declaration() {
                        self.propagate_extern(v, ctx, inst, f, args, cg);
                        return;
                    }
                }
                let mut all_args = false;
                if *callee == v {
                    let mut fact = self.state.fact_or_bottom(ctx, v);
                    analysis.state_changed_for_function_pointer(module, cg, inst, ctx, &mut fact);
                    if self.state.contains(ctx, v) {
                        self.state.set(ctx, v, fact);
                    }
                    all_args = true;
                }
                self.propagate_to_callees(inst, v, ctx, all_args, cg);
                return;
            }
            Opcode::Ret { .. } => {
                self.propagate_to_callers(inst, v, ctx, cg);
                return;
            }
            Opcode::Binary { .. } => {
                let target = Value::Inst(inst);
                if self.merge(target, ctx, &F::bottom()) {
                    self.worklist.push((target, ctx));
                }
                return;
            }
            op if categorize(op) == OpcodeCategory::Merge && self.settings.mode == Mode::Must => {
                self.meet_incoming(inst, ctx);
                return;
            }
            _ => Value::Inst(inst),
        };
        if self.propagate(v, target, ctx, ctx) {
            self.worklist.push((target, ctx));
            if matches!(opcode, Opcode::Store { .. }) && !self.is_root(target) {
                self.propagate_to_aggregate(v, ctx, target, ctx, cg);
            }
        }
    }

    /// Stack slots and globals are where aggregate rewinding stops.
    fn is_root(&self, v: Value) -> bool {
        match self.module.strip_casts(v) {
            Value::Global(_) => true,
            Value::Inst(i) => matches!(self.module.inst(i).opcode, Opcode::Alloca { .. }),
            _ => false,
        }
    }

    fn propagate_extern(
        &mut self,
        v: Value,
        ctx: Context,
        call: InstId,
        callee: FuncId,
        args: &[Value],
        cg: &CallGraph,
    ) {
        let name = &self.module.function(callee).name;
        let Some(flow) = externs::extern_flow(name) else {
            if SysCallTable::get().is_syscall(name) || name.starts_with("__soaap_") {
                return;
            }
            if self.warned_externs.insert(name.clone()) {
                warn!("{}: no dataflow model for external function {}, facts stop there", self.name, name);
            }
            return;
        };
        if let Some(target) = extern_target(flow, call, v, args) {
            if self.propagate(v, target, ctx, ctx) {
                self.worklist.push((target, ctx));
                if target != Value::Inst(call) && !self.is_root(target) {
                    self.propagate_to_aggregate(v, ctx, target, ctx, cg);
                }
            }
        }
    }

    /// Follow an address computation back to the object it points into
    /// and give that object the fact too. Every node on the way, including
    /// actual arguments at the callers of a parameter, receives it as well.
    fn propagate_to_aggregate(&mut self, from: Value, from_ctx: Context, node: Value, to_ctx: Context, cg: &CallGraph) {
        let module = self.module;
        let mut visited: HashSet<(Value, Context)> = HashSet::new();
        let mut pending = vec![(node, to_ctx)];
        while let Some((node, ctx)) = pending.pop() {
            let node = module.strip_casts(node);
            if !visited.insert((node, ctx)) {
                continue;
            }
            match node {
                Value::Global(_) => {}
                Value::Param(f, idx) => {
                    for call in cg.callers(f) {
                        let Opcode::Call { args, .. } = &module.inst(call).opcode else {
                            continue;
                        };
                        let Some(&actual) = args.get(idx as usize) else {
                            continue;
                        };
                        for c2 in self.contexts.caller_contexts(f, call, ctx) {
                            pending.push((actual, c2));
                        }
                    }
                }
                Value::Inst(i) => match &module.inst(i).opcode {
                    Opcode::Gep { base, .. } => pending.push((*base, ctx)),
                    Opcode::Load { ptr } | Opcode::PtrAnnotation { ptr, .. } => pending.push((*ptr, ctx)),
                    Opcode::Call { args, .. } => {
                        let aliasing = CallGraph::direct_callee(module, i)
                            .map_or(false, |f| externs::returns_alias(&module.function(f).name));
                        if let (true, Some(&first)) = (aliasing, args.first()) {
                            pending.push((first, ctx));
                        }
                    }
                    Opcode::Select { on_true, on_false, .. } => {
                        pending.push((*on_true, ctx));
                        pending.push((*on_false, ctx));
                    }
                    Opcode::Phi { incoming } => pending.extend(incoming.iter().map(|(value, _)| (*value, ctx))),
                    _ => {}
                },
                _ => continue,
            }
            self.propagate_and_queue(from, node, from_ctx, ctx);
        }
    }

    fn propagate_to_callees(&mut self, call: InstId, v: Value, ctx: Context, all_args: bool, cg: &CallGraph) {
        let module = self.module;
        let Opcode::Call { args, .. } = &module.inst(call).opcode else {
            return;
        };
        let callees = cg.callees(call);
        for (idx, &arg) in args.iter().enumerate() {
            if !all_args && arg != v {
                continue;
            }
            for &callee in &callees {
                let func = module.function(callee);
                if func.is_declaration() {
                    continue;
                }
                let c2 = self.contexts.callee_context(ctx, callee);
                let param = if idx >= func.param_count() {
                    match module.va_list_slot(callee) {
                        Some(slot) => Value::Inst(slot),
                        None => continue,
                    }
                } else {
                    Value::Param(callee, idx as u32)
                };
                let changed = match self.settings.mode {
                    Mode::Must => {
                        let met = self.meet_over_callers(callee, idx, ctx, cg);
                        met.map_or(false, |fact| self.merge(param, c2, &fact))
                    }
                    Mode::May => {
                        let from = if all_args { arg } else { v };
                        if all_args && !self.state.contains(ctx, from) {
                            continue;
                        }
                        self.propagate(from, param, ctx, c2)
                    }
                };
                if changed {
                    self.worklist.push((param, c2));
                }
            }
        }
    }

    /// Meet of argument `idx` over every call of `callee` executing in `ctx`.
    fn meet_over_callers(&self, callee: FuncId, idx: usize, ctx: Context, cg: &CallGraph) -> Option<F> {
        let module = self.module;
        let mut acc: Option<F> = None;
        for caller in cg.callers(callee) {
            if !self.contexts.executes_in(caller, ctx) {
                continue;
            }
            let Opcode::Call { args, .. } = &module.inst(caller).opcode else {
                continue;
            };
            let Some(&arg) = args.get(idx) else {
                continue;
            };
            let Some(fact) = self.must_operand(ctx, arg) else {
                continue;
            };
            acc = Some(match acc {
                None => fact,
                Some(mut a) => {
                    a.meet(&fact);
                    a
                }
            });
        }
        acc
    }

    fn propagate_to_callers(&mut self, ret: InstId, v: Value, ctx: Context, cg: &CallGraph) {
        let module = self.module;
        let f = module.enclosing_function(ret);
        for call in cg.callers(f) {
            let target = Value::Inst(call);
            for c2 in self.contexts.caller_contexts(f, call, ctx) {
                let changed = match self.settings.mode {
                    Mode::May => self.propagate(v, target, ctx, c2),
                    Mode::Must => {
                        let met = self.meet_over_returns(call, ctx, cg);
                        met.map_or(false, |fact| self.merge(target, c2, &fact))
                    }
                };
                if changed {
                    self.worklist.push((target, c2));
                }
            }
        }
    }

    /// Meet of the returned values of every possible callee of `call`.
    fn meet_over_returns(&self, call: InstId, ctx: Context, cg: &CallGraph) -> Option<F> {
        let module = self.module;
        let mut acc: Option<F> = None;
        for callee in cg.callees(call) {
            for inst in module.instructions(callee) {
                if let Opcode::Ret { value: Some(rv) } = &module.inst(inst).opcode {
                    let Some(fact) = self.must_operand(ctx, *rv) else {
                        continue;
                    };
                    acc = Some(match acc {
                        None => fact,
                        Some(mut a) => {
                            a.meet(&fact);
                            a
                        }
                    });
                }
            }
        }
        acc
    }

    /// Fact an operand contributes to a must-meet. Values the worklist has
    /// not reached yet are absent (top) and yield `None`; literals and
    /// barriers carry nothing.
    fn must_operand(&self, ctx: Context, v: Value) -> Option<F> {
        if self.barriers.contains(&v) {
            return Some(F::bottom());
        }
        match self.state.get(ctx, v) {
            Some(fact) => Some(fact.clone()),
            None if matches!(v, Value::Int(_) | Value::Null | Value::Function(_)) => Some(F::bottom()),
            None => None,
        }
    }

    /// Must-mode phi/select: the result is the meet of every incoming value.
    fn meet_incoming(&mut self, inst: InstId, ctx: Context) {
        let incoming: Vec<Value> = match &self.module.inst(inst).opcode {
            Opcode::Phi { incoming } => incoming.iter().map(|(v, _)| *v).collect(),
            Opcode::Select { on_true, on_false, .. } => vec![*on_true, *on_false],
            _ => return,
        };
        let mut acc: Option<F> = None;
        for v in incoming {
            let Some(fact) = self.must_operand(ctx, v) else {
                continue;
            };
            acc = Some(match acc {
                None => fact,
                Some(mut a) => {
                    a.meet(&fact);
                    a
                }
            });
        }
        let target = Value::Inst(inst);
        if let Some(fact) = acc {
            if self.merge(target, ctx, &fact) {
                self.worklist.push((target, ctx));
            }
        }
    }

    fn propagate_and_queue(&mut self, from: Value, to: Value, from_ctx: Context, to_ctx: Context) {
        if self.propagate(from, to, from_ctx, to_ctx) {
            self.worklist.push((to, to_ctx));
        }
    }

    /// Combine the fact of `from` into `to` with the analysis's operator.
    /// Returns whether the fact of `to` changed.
    fn propagate(&mut self, from: Value, to: Value, from_ctx: Context, to_ctx: Context) -> bool {
        if self.barriers.contains(&from) {
            return false;
        }
        if from == to && from_ctx == to_ctx {
            return false;
        }
        let fact = self.state.fact_or_bottom(from_ctx, from);
        self.merge(to, to_ctx, &fact)
    }

    fn propagate_union(&mut self, from: Value, to: Value, ctx: Context) -> bool {
        if self.barriers.contains(&from) {
            return false;
        }
        let fact = self.state.fact_or_bottom(ctx, from);
        match self.state.get_mut(ctx, to) {
            Some(existing) => existing.union(&fact),
            None => {
                self.state.set(ctx, to, fact);
                true
            }
        }
    }

    fn merge(&mut self, to: Value, ctx: Context, fact: &F) -> bool {
        let mode = self.settings.mode;
        match self.state.get_mut(ctx, to) {
            Some(existing) => match mode {
                Mode::Must => existing.meet(fact),
                Mode::May => existing.union(fact),
            },
            None => {
                self.state.set(ctx, to, fact.clone());
                true
            }
        }
    }

    /// Context-insensitive runs track everything under [`Context::Single`].
    fn merge_into_single(&mut self) {
        let mode = self.settings.mode;
        let mut merged: HashMap<Value, F> = HashMap::new();
        for (_, table) in self.state.take_all() {
            for (v, fact) in table {
                match merged.get_mut(&v) {
                    Some(existing) => {
                        match mode {
                            Mode::Must => existing.meet(&fact),
                            Mode::May => existing.union(&fact),
                        };
                    }
                    None => {
                        merged.insert(v, fact);
                    }
                }
            }
        }
        self.worklist.clear();
        let mut seeds: Vec<Value> = merged.keys().copied().collect();
        seeds.sort();
        for v in seeds {
            self.worklist.push((v, Context::Single));
        }
        self.state.replace_table(Context::Single, merged);
    }

    fn broadcast_single(&mut self) {
        let Some(single) = self.state.table(Context::Single).cloned() else {
            return;
        };
        for ctx in self.contexts.all_contexts() {
            self.state.replace_table(ctx, single.clone());
        }
    }
}
