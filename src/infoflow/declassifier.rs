// CLASSIFICATION: COMMUNITY
// Filename: declassifier.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Marks values that were explicitly declassified and so no longer count
//! as sandbox-private.

use crate::call_graph::CallGraph;
use crate::context::Context;
use crate::error::SoaapResult;
use crate::infoflow::engine::Engine;
use crate::infoflow::fact::Declassified;
use crate::infoflow::state::FactState;
use crate::infoflow::{AnalysisEnv, InfoFlow, Settings};
use crate::ir::{BlockId, InstId, Module, Opcode, Value};
use crate::sandbox::annotations::DECLASSIFY;
use crate::validator::Report;
use log::{debug, warn};
use std::collections::HashSet;

pub struct DeclassifierAnalysis {
    state: FactState<Declassified>,
}

impl Default for DeclassifierAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclassifierAnalysis {
    pub fn new() -> Self {
        DeclassifierAnalysis { state: FactState::new() }
    }

    pub fn is_declassified(&self, v: Value) -> bool {
        self.state.get(Context::Single, v).map_or(false, |d| d.0)
    }

    /// Every value the fixed point marked declassified.
    pub fn declassified_values(&self) -> Vec<Value> {
        self.state
            .entries(Context::Single)
            .filter(|(_, d)| d.0)
            .map(|(v, _)| v)
            .collect()
    }
}

/// `from` and everything after it in its block, then every block
/// reachable from there.
fn following_instructions(module: &Module, from: InstId) -> Vec<InstId> {
    let start = module.inst(from).block();
    let block = module.block(start);
    let pos = block.insts.iter().position(|i| *i == from).unwrap_or(0);
    let mut out: Vec<InstId> = block.insts[pos..].to_vec();
    let mut visited: HashSet<BlockId> = HashSet::from([start]);
    let mut stack = module.successors(start);
    while let Some(b) = stack.pop() {
        if !visited.insert(b) {
            continue;
        }
        out.extend(module.block(b).insts.iter().copied());
        stack.extend(module.successors(b));
    }
    out
}

impl InfoFlow for DeclassifierAnalysis {
    type Fact = Declassified;

    fn name(&self) -> &'static str {
        "declassifier"
    }

    fn settings(&self) -> Settings {
        Settings::must(true)
    }

    fn initialise(&mut self, engine: &mut Engine<'_, Declassified>, env: &AnalysisEnv<'_>, _cg: &mut CallGraph) -> SoaapResult<()> {
        let module = env.module;
        for f in module.function_ids() {
            if !module.function(f).name.starts_with(DECLASSIFY) {
                continue;
            }
            for call in module.calls_to(&module.function(f).name) {
                let Opcode::Call { args, .. } = &module.inst(call).opcode else {
                    continue;
                };
                let Some(&arg) = args.first() else {
                    continue;
                };
                let Value::Inst(load) = module.strip_casts(arg) else {
                    continue;
                };
                let Opcode::Load { ptr } = module.inst(load).opcode else {
                    continue;
                };
                let is_slot = matches!(ptr, Value::Inst(i) if matches!(module.inst(i).opcode, Opcode::Alloca { .. }));
                if !is_slot {
                    warn!(
                        "{}: only local variables and arguments can be declassified",
                        module.function(module.enclosing_function(call)).name
                    );
                    continue;
                }
                for inst in following_instructions(module, call) {
                    if matches!(module.inst(inst).opcode, Opcode::Load { ptr: p } if p == ptr) {
                        debug!("declassified load %{}", inst.0);
                        engine.seed(Value::Inst(inst), Context::NoContext, Declassified(true));
                    }
                }
            }
        }
        Ok(())
    }

    fn post_analysis(&mut self, _env: &AnalysisEnv<'_>, _cg: &CallGraph, _report: &mut Report) {
        debug!("declassified {} values", self.declassified_values().len());
    }

    fn state(&self) -> &FactState<Declassified> {
        &self.state
    }

    fn set_state(&mut self, state: FactState<Declassified>) {
        self.state = state;
    }
}
