// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Call-graph query layer.
//!
//! Direct edges come from the module. Indirect edges are appended while
//! function-pointer analyses run, or ingested from profiling data. Edges
//! are never removed; every successful addition bumps [`CallGraph::version`]
//! and the lazily built callers index is rebuilt on the next query.

use crate::error::{SoaapError, SoaapResult};
use crate::ir::{FuncId, InstId, Module, Opcode, Value};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// A profiling-derived call edge: the `call_index`-th call instruction in
/// `caller` reached `callee` at run time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicEdge {
    pub caller: String,
    pub call_index: usize,
    pub callee: String,
}

struct CallersIndex {
    version: u64,
    callers: HashMap<FuncId, BTreeSet<InstId>>,
}

pub struct CallGraph {
    callees: HashMap<InstId, BTreeSet<FuncId>>,
    calls_in: HashMap<FuncId, Vec<InstId>>,
    version: u64,
    callers_cache: RefCell<Option<CallersIndex>>,
}

impl CallGraph {
    /// Record every call instruction of every defined function together
    /// with its statically known callee.
    pub fn new(module: &Module) -> Self {
        let mut callees = HashMap::new();
        let mut calls_in: HashMap<FuncId, Vec<InstId>> = HashMap::new();
        for f in module.function_ids() {
            if module.function(f).is_declaration() {
                continue;
            }
            for inst in module.instructions(f) {
                if let Opcode::Call { callee, .. } = &module.inst(inst).opcode {
                    let mut set = BTreeSet::new();
                    if let Value::Function(target) = module.strip_casts(*callee) {
                        set.insert(target);
                    }
                    callees.insert(inst, set);
                    calls_in.entry(f).or_default().push(inst);
                }
            }
        }
        debug!("call graph: {} call sites", callees.len());
        CallGraph {
            callees,
            calls_in,
            version: 0,
            callers_cache: RefCell::new(None),
        }
    }

    /// Incremented whenever an edge is added.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Possible targets of a call instruction.
    pub fn callees(&self, call: InstId) -> Vec<FuncId> {
        self.callees
            .get(&call)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Call instructions that may invoke `f`.
    pub fn callers(&self, f: FuncId) -> Vec<InstId> {
        let mut cache = self.callers_cache.borrow_mut();
        let stale = cache.as_ref().map_or(true, |c| c.version != self.version);
        if stale {
            let mut callers: HashMap<FuncId, BTreeSet<InstId>> = HashMap::new();
            for (call, targets) in &self.callees {
                for t in targets {
                    callers.entry(*t).or_default().insert(*call);
                }
            }
            *cache = Some(CallersIndex {
                version: self.version,
                callers,
            });
        }
        cache
            .as_ref()
            .and_then(|c| c.callers.get(&f))
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Append-only edge insertion. Returns whether anything was new.
    pub fn add_callees(&mut self, call: InstId, funcs: impl IntoIterator<Item = FuncId>) -> bool {
        let entry = self.callees.entry(call).or_default();
        let mut changed = false;
        for f in funcs {
            changed |= entry.insert(f);
        }
        if changed {
            self.version += 1;
        }
        changed
    }

    /// Call instructions inside `f`.
    pub fn calls_in(&self, f: FuncId) -> &[InstId] {
        self.calls_in.get(&f).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn callees_of_function(&self, f: FuncId) -> BTreeSet<FuncId> {
        self.calls_in(f)
            .iter()
            .flat_map(|c| self.callees.get(c).into_iter().flatten().copied())
            .collect()
    }

    pub fn direct_callee(module: &Module, call: InstId) -> Option<FuncId> {
        match &module.inst(call).opcode {
            Opcode::Call { callee, .. } => module.strip_casts(*callee).as_function(),
            _ => None,
        }
    }

    pub fn is_indirect_call(module: &Module, call: InstId) -> bool {
        module.inst(call).is_call() && Self::direct_callee(module, call).is_none()
    }

    /// Direct call to a function without a body.
    pub fn is_extern_call(module: &Module, call: InstId) -> bool {
        Self::direct_callee(module, call).map_or(false, |f| module.function(f).is_declaration())
    }

    /// Ingest profiling-derived edges. Returns how many were new.
    pub fn load_dynamic_edges(&mut self, module: &Module, edges: &[DynamicEdge]) -> SoaapResult<usize> {
        let mut added = 0;
        for edge in edges {
            let caller = module
                .function_by_name(&edge.caller)
                .ok_or_else(|| SoaapError::UnknownFunction(edge.caller.clone()))?;
            let callee = module
                .function_by_name(&edge.callee)
                .ok_or_else(|| SoaapError::UnknownFunction(edge.callee.clone()))?;
            let call = self.calls_in(caller).get(edge.call_index).copied().ok_or_else(|| {
                SoaapError::MalformedModule(format!("{} has no call #{}", edge.caller, edge.call_index))
            })?;
            if self.add_callees(call, [callee]) {
                added += 1;
            }
        }
        info!("loaded {} dynamic call edges ({} new)", edges.len(), added);
        Ok(added)
    }

    /// Shortest chain of call instructions leading from `from` to `to`,
    /// outermost call first. Functions for which `stop_at` holds are not
    /// expanded (other than `from` itself).
    pub fn shortest_call_path(
        &self,
        from: FuncId,
        to: FuncId,
        stop_at: &dyn Fn(FuncId) -> bool,
    ) -> Option<Vec<InstId>> {
        if from == to {
            return Some(Vec::new());
        }
        let mut pred: HashMap<FuncId, (FuncId, InstId)> = HashMap::new();
        let mut seen = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);
        while let Some(f) = queue.pop_front() {
            if f != from && stop_at(f) {
                continue;
            }
            for &call in self.calls_in(f) {
                for g in self.callees(call) {
                    if seen.insert(g) {
                        pred.insert(g, (f, call));
                        if g == to {
                            let mut path = vec![call];
                            let mut cur = f;
                            while let Some(&(p, c)) = pred.get(&cur) {
                                path.push(c);
                                cur = p;
                            }
                            path.reverse();
                            return Some(path);
                        }
                        queue.push_back(g);
                    }
                }
            }
        }
        None
    }

    /// Depth-first search for a call path from `from` to `to`. When a hop
    /// filter is supplied every call instruction on the path must satisfy it.
    pub fn find_path_to_func(
        &self,
        from: FuncId,
        to: FuncId,
        hop_filter: Option<&dyn Fn(InstId) -> bool>,
    ) -> Option<Vec<InstId>> {
        let mut visited = HashSet::from([from]);
        let mut stack: Vec<(FuncId, Vec<InstId>)> = vec![(from, Vec::new())];
        while let Some((f, path)) = stack.pop() {
            if f == to {
                return Some(path);
            }
            for &call in self.calls_in(f).iter().rev() {
                if let Some(filter) = hop_filter {
                    if !filter(call) {
                        continue;
                    }
                }
                for g in self.callees(call) {
                    if visited.insert(g) {
                        let mut next = path.clone();
                        next.push(call);
                        stack.push((g, next));
                    }
                }
            }
        }
        None
    }
}
