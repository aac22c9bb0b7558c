// CLASSIFICATION: COMMUNITY
// Filename: creation.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Check that sandbox entry points are only reached after the sandbox
//! has been created.

use crate::call_graph::CallGraph;
use crate::ir::{BlockId, FuncId, InstId, Module};
use crate::sandbox::{Sandbox, SandboxModel};
use crate::validator::{trace_from_calls, Diagnostic, DiagnosticKind, Report};
use log::debug;
use std::collections::HashSet;

/// Walk the whole-program CFG from `main`, treating creation points as
/// leaves. Any entry-point call still reachable is reported.
pub fn validate_creation_points(
    module: &Module,
    cg: &CallGraph,
    model: &SandboxModel,
    report: &mut Report,
    summarise: bool,
) {
    let Some(main) = module.function_by_name("main") else {
        return;
    };
    let Some(entry) = module.function(main).entry_block() else {
        return;
    };
    for sandbox in model.sandboxes().iter().filter(|s| !s.entry_points.is_empty()) {
        let mut walk = CreationWalk {
            module,
            cg,
            sandbox,
            creation: sandbox.creation_points.iter().copied().collect(),
            visited: HashSet::new(),
            trace: Vec::new(),
            report: &mut *report,
            summarise,
        };
        let covered = walk.walk(entry);
        debug!("creation points of {:?} cover all paths: {}", sandbox.name, covered);
    }
}

struct CreationWalk<'a> {
    module: &'a Module,
    cg: &'a CallGraph,
    sandbox: &'a Sandbox,
    creation: HashSet<InstId>,
    visited: HashSet<BlockId>,
    trace: Vec<InstId>,
    report: &'a mut Report,
    summarise: bool,
}

/// One block being walked: its instructions first, then its successors.
struct Frame {
    block: BlockId,
    pos: usize,
    /// Callees of the call just before `pos` still to enter, last first.
    callees: Vec<FuncId>,
    in_call: bool,
    /// Successors still to enter, last first. `None` until the
    /// instructions are done.
    succs: Option<Vec<BlockId>>,
    all: bool,
}

impl Frame {
    fn new(block: BlockId) -> Self {
        Frame {
            block,
            pos: 0,
            callees: Vec::new(),
            in_call: false,
            succs: None,
            all: false,
        }
    }
}

impl CreationWalk<'_> {
    /// Push a frame for `b`, or answer straight away if it was seen before.
    fn enter(&mut self, b: BlockId, stack: &mut Vec<Frame>) -> Option<bool> {
        if !self.visited.insert(b) {
            return Some(false);
        }
        stack.push(Frame::new(b));
        None
    }

    /// Whether every path from `entry` passes a creation point.
    fn walk(&mut self, entry: BlockId) -> bool {
        let module = self.module;
        let mut stack: Vec<Frame> = Vec::new();
        // outcome of the frame that finished last, for its parent
        let mut returned = self.enter(entry, &mut stack);
        loop {
            let Some(frame) = stack.last_mut() else {
                return returned.unwrap_or(false);
            };
            if let Some(covered) = returned.take() {
                if frame.in_call {
                    if covered {
                        self.trace.pop();
                        stack.pop();
                        returned = Some(true);
                        continue;
                    }
                } else {
                    frame.all &= covered;
                }
            }

            if frame.in_call {
                let Some(callee) = frame.callees.pop() else {
                    frame.in_call = false;
                    self.trace.pop();
                    continue;
                };
                let func = module.function(callee);
                if func.is_declaration() {
                    continue;
                }
                let call = module.block(frame.block).insts[frame.pos - 1];
                if self.sandbox.is_entry_point(callee) {
                    self.report_missing(call, &func.name);
                    self.trace.pop();
                    stack.pop();
                    returned = Some(false);
                    continue;
                }
                if let Some(callee_entry) = func.entry_block() {
                    returned = self.enter(callee_entry, &mut stack);
                }
                continue;
            }

            if frame.succs.is_none() {
                let insts = &module.block(frame.block).insts;
                if let Some(&inst) = insts.get(frame.pos) {
                    frame.pos += 1;
                    if self.creation.contains(&inst) {
                        stack.pop();
                        returned = Some(true);
                    } else if module.inst(inst).is_call() {
                        self.trace.push(inst);
                        let mut callees = self.cg.callees(inst);
                        callees.reverse();
                        frame.callees = callees;
                        frame.in_call = true;
                    }
                    continue;
                }
                let mut succs = module.successors(frame.block);
                frame.all = !succs.is_empty();
                succs.reverse();
                frame.succs = Some(succs);
            }

            match frame.succs.as_mut().and_then(Vec::pop) {
                Some(next) => returned = self.enter(next, &mut stack),
                None => {
                    let all = frame.all;
                    stack.pop();
                    returned = Some(all);
                }
            }
        }
    }

    fn report_missing(&mut self, call: InstId, entry: &str) {
        let module = self.module;
        let caller = &module.function(module.enclosing_function(call)).name;
        self.report.push(
            Diagnostic::new(
                DiagnosticKind::MissingCreation,
                format!(
                    "Found call to sandbox entrypoint \"{}\" that is not preceded by sandbox creation",
                    entry
                ),
            )
            .in_function(caller.clone())
            .with_sandboxes(vec![self.sandbox.name.clone()])
            .at(module.inst(call).loc.as_ref())
            .about(entry.to_string())
            .with_trace(trace_from_calls(module, &self.trace, self.summarise)),
        );
    }
}
