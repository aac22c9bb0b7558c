// CLASSIFICATION: COMMUNITY
// Filename: profile.rs v2.0
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Sandbox profile: one isolation boundary and everything the analyses
//! need to know about it.

use crate::call_graph::CallGraph;
use crate::ir::{FuncId, GlobalId, InstId, Module, Opcode, Value};
use crate::sandbox::annotations::{self, VarPerms};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Dense sandbox identifier; equal to the sandbox's name index.
pub type SandboxId = usize;

/// A sandboxed code region inside an otherwise privileged function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub function: FuncId,
    pub insts: Vec<InstId>,
}

#[derive(Clone, Debug)]
pub struct Sandbox {
    pub id: SandboxId,
    pub name: String,
    pub persistent: bool,
    /// Tolerated performance overhead in percent.
    pub overhead: u32,
    /// Classification bits this sandbox may read.
    pub clearances: u32,
    pub entry_points: BTreeSet<FuncId>,
    pub region: Option<Region>,
    pub functions: Vec<FuncId>,
    pub calls: Vec<InstId>,
    pub top_level_calls: Vec<InstId>,
    pub shared_vars: BTreeMap<GlobalId, VarPerms>,
    /// Descriptor-bearing value to the syscalls it may be passed to.
    pub capabilities: BTreeMap<Value, BTreeSet<String>>,
    pub callgates: BTreeSet<FuncId>,
    pub creation_points: Vec<InstId>,
    /// Annotation instructions and annotated globals.
    pub private_data: BTreeSet<Value>,
    function_set: HashSet<FuncId>,
    region_set: HashSet<InstId>,
}

impl Sandbox {
    pub fn new(id: SandboxId, name: impl Into<String>, persistent: bool) -> Self {
        Sandbox {
            id,
            name: name.into(),
            persistent,
            overhead: 0,
            clearances: 0,
            entry_points: BTreeSet::new(),
            region: None,
            functions: Vec::new(),
            calls: Vec::new(),
            top_level_calls: Vec::new(),
            shared_vars: BTreeMap::new(),
            capabilities: BTreeMap::new(),
            callgates: BTreeSet::new(),
            creation_points: Vec::new(),
            private_data: BTreeSet::new(),
            function_set: HashSet::new(),
            region_set: HashSet::new(),
        }
    }

    /// Bit of this sandbox in a sandbox mask.
    pub fn mask(&self) -> u32 {
        1 << self.id
    }

    pub fn is_entry_point(&self, f: FuncId) -> bool {
        self.entry_points.contains(&f)
    }

    pub fn is_callgate(&self, f: FuncId) -> bool {
        self.callgates.contains(&f)
    }

    pub fn contains_function(&self, f: FuncId) -> bool {
        self.function_set.contains(&f)
    }

    pub fn is_region_within(&self, f: FuncId) -> bool {
        self.region.as_ref().map_or(false, |r| r.function == f)
    }

    pub fn contains_instruction(&self, module: &Module, inst: InstId) -> bool {
        self.region_set.contains(&inst) || self.contains_function(module.enclosing_function(inst))
    }

    pub fn shared_perms(&self, g: GlobalId) -> VarPerms {
        self.shared_vars.get(&g).copied().unwrap_or_default()
    }

    pub fn can_read(&self, g: GlobalId) -> bool {
        self.shared_perms(g).contains(VarPerms::READ)
    }

    pub fn can_write(&self, g: GlobalId) -> bool {
        self.shared_perms(g).contains(VarPerms::WRITE)
    }

    pub(crate) fn set_region(&mut self, region: Region) {
        self.region_set = region.insts.iter().copied().collect();
        self.region = Some(region);
    }

    /// Recompute every derived member from the module. `foreign_entries`
    /// are entry points of other sandboxes; the function closure stops there.
    pub fn init(&mut self, module: &Module, cg: &CallGraph, foreign_entries: &HashSet<FuncId>) {
        self.find_functions(module, cg, foreign_entries);
        self.find_calls(module, cg);
        self.find_shared_vars(module);
        self.find_callgates(module);
        self.find_capabilities(module);
        self.find_creation_points(module);
        self.find_private_data(module);
        debug!("{}", self.describe(module));
    }

    fn find_functions(&mut self, module: &Module, cg: &CallGraph, foreign_entries: &HashSet<FuncId>) {
        let mut roots: Vec<FuncId> = self.entry_points.iter().copied().collect();
        if let Some(region) = &self.region {
            for &inst in &region.insts {
                if module.inst(inst).is_call() {
                    roots.extend(cg.callees(inst));
                }
            }
        }
        self.functions.clear();
        self.function_set.clear();
        let mut stack: Vec<FuncId> = roots.into_iter().rev().collect();
        while let Some(f) = stack.pop() {
            if module.function(f).is_declaration() || foreign_entries.contains(&f) {
                continue;
            }
            if !self.function_set.insert(f) {
                continue;
            }
            self.functions.push(f);
            let mut next: Vec<FuncId> = cg.callees_of_function(f).into_iter().collect();
            next.reverse();
            stack.extend(next);
        }
    }

    fn find_calls(&mut self, module: &Module, cg: &CallGraph) {
        self.calls.clear();
        self.top_level_calls.clear();
        for &f in &self.functions {
            for &call in cg.calls_in(f) {
                self.calls.push(call);
                if self.entry_points.contains(&f) {
                    self.top_level_calls.push(call);
                }
            }
        }
        if let Some(region) = &self.region {
            for &inst in &region.insts {
                if module.inst(inst).is_call() {
                    self.calls.push(inst);
                    self.top_level_calls.push(inst);
                }
            }
        }
    }

    fn find_shared_vars(&mut self, module: &Module) {
        self.shared_vars.clear();
        for g in module.global_ids() {
            for a in &module.global(g).annotations {
                if let Some((name, bit)) = annotations::parse_var_perm(a) {
                    if name == self.name {
                        *self.shared_vars.entry(g).or_default() |= bit;
                    }
                }
            }
        }
    }

    fn find_callgates(&mut self, module: &Module) {
        self.callgates.clear();
        let helper = format!("{}{}", annotations::CALLGATES_HELPER, self.name);
        for call in module.calls_to(&helper) {
            if let Opcode::Call { args, .. } = &module.inst(call).opcode {
                for arg in args.iter().skip(1) {
                    if let Some(f) = module.strip_casts(*arg).as_function() {
                        self.callgates.insert(f);
                    }
                }
            }
        }
    }

    fn find_capabilities(&mut self, module: &Module) {
        self.capabilities.clear();
        for &ep in &self.entry_points {
            for inst in module.instructions(ep) {
                if let Opcode::VarAnnotation { var, annotation } = &module.inst(inst).opcode {
                    let Some(fd) = annotations::parse_fd(annotation) else {
                        continue;
                    };
                    if let Some(param) = resolve_param(module, ep, *var) {
                        self.capabilities.insert(param, fd.syscalls.into_iter().collect());
                    }
                }
            }
        }
        for f in module.function_ids() {
            for inst in module.instructions(f) {
                if let Opcode::PtrAnnotation { annotation, .. } = &module.inst(inst).opcode {
                    if let Some(fd) = annotations::parse_fd(annotation) {
                        if fd.sandbox.as_deref() == Some(self.name.as_str()) {
                            self.capabilities
                                .insert(Value::Inst(inst), fd.syscalls.into_iter().collect());
                        }
                    }
                }
            }
        }
    }

    fn find_creation_points(&mut self, module: &Module) {
        self.creation_points.clear();
        for f in module.function_ids() {
            for inst in module.instructions(f) {
                if let Opcode::Annotation { annotation } = &module.inst(inst).opcode {
                    if let Some((name, persistent)) = annotations::parse_creation(annotation) {
                        if name == self.name {
                            self.persistent |= persistent;
                            self.creation_points.push(inst);
                        }
                    }
                }
            }
        }
    }

    fn find_private_data(&mut self, module: &Module) {
        self.private_data.clear();
        let marker = format!("{}{}", annotations::SANDBOX_PRIVATE, self.name);
        for f in module.function_ids() {
            for inst in module.instructions(f) {
                match &module.inst(inst).opcode {
                    Opcode::PtrAnnotation { annotation, .. } | Opcode::VarAnnotation { annotation, .. }
                        if *annotation == marker =>
                    {
                        self.private_data.insert(Value::Inst(inst));
                    }
                    _ => {}
                }
            }
        }
        for g in module.global_ids() {
            if module.global(g).annotations.iter().any(|a| *a == marker) {
                self.private_data.insert(Value::Global(g));
            }
        }
    }

    /// Summary line for logs.
    pub fn describe(&self, module: &Module) -> String {
        let names = |fs: &mut dyn Iterator<Item = FuncId>| {
            fs.map(|f| module.function(f).name.clone()).collect::<Vec<_>>().join(",")
        };
        format!(
            "[sandbox: {}#{}] persistent={} entries=[{}] functions=[{}] callgates=[{}] shared={} caps={} private={}",
            self.name,
            self.id,
            self.persistent,
            names(&mut self.entry_points.iter().copied()),
            names(&mut self.functions.iter().copied()),
            names(&mut self.callgates.iter().copied()),
            self.shared_vars.len(),
            self.capabilities.len(),
            self.private_data.len()
        )
    }
}

/// An annotated variable in an entry point names one of its parameters,
/// either directly or through the stack slot the parameter is spilled to.
fn resolve_param(module: &Module, ep: FuncId, var: Value) -> Option<Value> {
    match module.strip_casts(var) {
        p @ Value::Param(f, _) if f == ep => Some(p),
        Value::Inst(slot) => module.instructions(ep).find_map(|i| match &module.inst(i).opcode {
            Opcode::Store {
                value: p @ Value::Param(f, _),
                ptr,
            } if *f == ep && module.strip_casts(*ptr) == Value::Inst(slot) => Some(*p),
            _ => None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FnType, IRBuilder, Type};

    #[test]
    fn closure_stops_at_foreign_entry_points() {
        let void = FnType::new(Type::Void, vec![]);
        let mut b = IRBuilder::new("sb");
        let other = b.start_function("other_entry", void.clone());
        b.build_ret(None);
        let helper = b.start_function("helper", void.clone());
        b.build_call(other, vec![]);
        b.build_ret(None);
        let ep = b.start_function("entry", FnType::new(Type::Void, vec![Type::int32()]));
        b.set_param_names(ep, &["fd"]);
        let slot = b.build_alloca(Type::int32());
        b.build_store(b.param(0), slot);
        b.build_var_annotation(slot, "SOAAP_FD_read");
        b.build_call(helper, vec![]);
        b.build_ret(None);
        let m = b.finalize().unwrap();
        let cg = CallGraph::new(&m);

        let mut s = Sandbox::new(0, "box", true);
        s.entry_points.insert(ep);
        s.init(&m, &cg, &HashSet::from([other]));
        assert_eq!(s.functions, vec![ep, helper]);
        assert!(!s.contains_function(other));
        assert_eq!(s.calls.len(), 2);
        assert_eq!(s.top_level_calls.len(), 1);
        let caps = &s.capabilities[&Value::Param(ep, 0)];
        assert!(caps.contains("read"));
    }
}
