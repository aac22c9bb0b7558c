// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Forward control-flow analyses over basic blocks.
//!
//! Facts are `u32` masks attached to instructions. A block's entry fact is
//! the join of its predecessors' terminators; calls flow into the first
//! instruction of each non-entry-point callee and returns flow back to every
//! calling instruction. Successors are revisited only when a block's
//! terminator fact changes.

pub mod global_vars;

pub use global_vars::GlobalVariableAnalysis;

use crate::call_graph::CallGraph;
use crate::error::SoaapResult;
use crate::infoflow::{AnalysisEnv, QueueSet};
use crate::ir::{BlockId, InstId, Module, Opcode};
use crate::sandbox::SandboxModel;
use crate::validator::Report;
use log::{debug, info, trace};
use std::collections::HashMap;

pub struct CfgEngine<'a> {
    module: &'a Module,
    worklist: QueueSet<BlockId>,
    state: HashMap<InstId, u32>,
}

impl<'a> CfgEngine<'a> {
    pub fn new(module: &'a Module) -> Self {
        CfgEngine {
            module,
            worklist: QueueSet::new(),
            state: HashMap::new(),
        }
    }

    pub fn fact(&self, inst: InstId) -> u32 {
        self.state.get(&inst).copied().unwrap_or(0)
    }

    /// Or `mask` into the fact of `inst` and queue its block.
    pub fn seed(&mut self, inst: InstId, mask: u32) {
        *self.state.entry(inst).or_insert(0) |= mask;
        self.worklist.push(self.module.inst(inst).block());
    }

    pub fn into_state(self) -> HashMap<InstId, u32> {
        self.state
    }

    fn update(&mut self, inst: InstId, mask: u32) {
        let slot = self.state.entry(inst).or_insert(0);
        let old = *slot;
        *slot |= mask;
        if *slot != old {
            self.worklist.push(self.module.inst(inst).block());
        }
    }

    pub fn run(&mut self, cg: &CallGraph, sandboxes: &SandboxModel) {
        let module = self.module;
        let mut steps = 0usize;
        while let Some(b) = self.worklist.pop() {
            steps += 1;
            let block = module.block(b);
            let Some(term) = block.terminator() else {
                continue;
            };
            let entry = module
                .predecessors(b)
                .into_iter()
                .filter_map(|p| module.block(p).terminator())
                .fold(0, |acc, t| acc | self.fact(t));
            let old_term = self.fact(term);
            let mut incoming = entry;
            for &inst in &block.insts {
                let current = {
                    let slot = self.state.entry(inst).or_insert(0);
                    *slot |= incoming;
                    *slot
                };
                match &module.inst(inst).opcode {
                    Opcode::Call { .. } => {
                        for callee in cg.callees(inst) {
                            let func = module.function(callee);
                            if func.is_declaration() || sandboxes.is_entry_point(callee) {
                                continue;
                            }
                            let first = func.entry_block().and_then(|e| module.block(e).first());
                            if let Some(first) = first {
                                trace!("%{} -> {}", inst.0, func.name);
                                self.update(first, current);
                            }
                        }
                    }
                    Opcode::Ret { .. } => {
                        for caller in cg.callers(module.enclosing_function(inst)) {
                            self.update(caller, current);
                        }
                    }
                    _ => {}
                }
                incoming = current;
            }
            if self.fact(term) != old_term {
                for succ in module.successors(b) {
                    self.worklist.push(succ);
                }
            }
        }
        debug!("cfg flow settled after {} block visits", steps);
    }
}

pub trait CfgFlow {
    fn name(&self) -> &'static str;

    fn initialise(&mut self, engine: &mut CfgEngine<'_>, env: &AnalysisEnv<'_>);

    fn post_analysis(&mut self, engine: &CfgEngine<'_>, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report);

    fn do_analysis(&mut self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) -> SoaapResult<()>
    where
        Self: Sized,
    {
        info!("Running analysis: {}", self.name());
        let mut engine = CfgEngine::new(env.module);
        self.initialise(&mut engine, env);
        engine.run(cg, env.sandboxes);
        self.post_analysis(&engine, env, cg, report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FnType, IRBuilder, Type};

    #[test]
    fn facts_flow_through_calls_and_back() {
        let void = FnType::new(Type::Void, vec![]);
        let mut b = IRBuilder::new("cfg");
        let helper = b.start_function("helper", void.clone());
        let inner = b.build_annotation("marker");
        b.build_ret(None);
        b.start_function("main", void);
        let start = b.build_annotation("start");
        let call = b.build_call(helper, vec![]);
        let after = b.build_annotation("after");
        b.build_ret(None);
        let m = b.finalize().unwrap();

        let cg = CallGraph::new(&m);
        let mut report = Report::new(false);
        let model = SandboxModel::discover(&m, &cg, &mut report).unwrap();
        let mut engine = CfgEngine::new(&m);
        engine.seed(start, 0b100);
        engine.run(&cg, &model);

        assert_eq!(engine.fact(call), 0b100);
        assert_eq!(engine.fact(inner), 0b100);
        assert_eq!(engine.fact(after), 0b100);
    }
}
