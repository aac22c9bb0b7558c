// CLASSIFICATION: COMMUNITY
// Filename: classified.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Classified data: sandboxes may only touch values whose classes they
//! hold a clearance for.

use crate::call_graph::CallGraph;
use crate::context::Context;
use crate::error::SoaapResult;
use crate::infoflow::engine::Engine;
use crate::infoflow::fact::ClassMask;
use crate::infoflow::state::FactState;
use crate::infoflow::{AnalysisEnv, InfoFlow, Settings};
use crate::ir::{Opcode, Value};
use crate::sandbox::annotations::CLASSIFY;
use crate::validator::{Diagnostic, DiagnosticKind, Report};
use log::{debug, info};

pub struct ClassifiedAnalysis {
    settings: Settings,
    state: FactState<ClassMask>,
}

impl ClassifiedAnalysis {
    pub fn new(context_insensitive: bool) -> Self {
        ClassifiedAnalysis {
            settings: Settings::may(context_insensitive),
            state: FactState::new(),
        }
    }
}

impl InfoFlow for ClassifiedAnalysis {
    type Fact = ClassMask;

    fn name(&self) -> &'static str {
        "classified"
    }

    fn settings(&self) -> Settings {
        self.settings
    }

    fn initialise(&mut self, engine: &mut Engine<'_, ClassMask>, env: &AnalysisEnv<'_>, _cg: &mut CallGraph) -> SoaapResult<()> {
        let module = env.module;
        let classes = env.sandboxes.classes();
        let class_bit = |annotation: &str| {
            annotation
                .strip_prefix(CLASSIFY)
                .and_then(|name| classes.get(name))
                .map(ClassMask::bit)
        };
        for f in module.function_ids() {
            for inst in module.instructions(f) {
                if let Opcode::PtrAnnotation { annotation, .. } = &module.inst(inst).opcode {
                    if let Some(mask) = class_bit(annotation) {
                        info!("Classification annotation {} found", annotation);
                        engine.seed(Value::Inst(inst), Context::NoContext, mask);
                    }
                }
            }
        }
        for g in module.global_ids() {
            for annotation in &module.global(g).annotations {
                if let Some(mask) = class_bit(annotation) {
                    debug!("classified global {}: {}", module.global(g).name, annotation);
                    engine.seed(Value::Global(g), Context::NoContext, mask);
                }
            }
        }
        Ok(())
    }

    fn post_analysis(&mut self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report) {
        let module = env.module;
        let classes = env.sandboxes.classes();
        for sandbox in env.sandboxes.sandboxes() {
            let ctx = if self.settings.context_insensitive {
                Context::Single
            } else {
                Context::Sandbox(sandbox.id)
            };
            let clearances = sandbox.clearances;
            for &f in &sandbox.functions {
                for inst in module.instructions(f) {
                    let v = match &module.inst(inst).opcode {
                        Opcode::Load { ptr } => *ptr,
                        Opcode::Store { value, .. } => *value,
                        _ => continue,
                    };
                    let held = self.state.get(ctx, v).map_or(0, |m| m.0);
                    if held == 0 || held & clearances == held {
                        continue;
                    }
                    let fname = module.function(f).name.clone();
                    report.push(
                        Diagnostic::new(
                            DiagnosticKind::ClassifiedRead,
                            format!(
                                "Sandboxed method \"{}\" read data value of class: {} but only has clearances for: {}",
                                fname,
                                classes.stringify(held),
                                classes.stringify(clearances)
                            ),
                        )
                        .in_function(fname)
                        .with_sandboxes(vec![sandbox.name.clone()])
                        .at(module.inst(inst).loc.as_ref())
                        .about(module.value_name(module.strip_casts(v)))
                        .with_trace(env.trace_to(cg, Some(sandbox), f)),
                    );
                }
            }
        }
    }

    fn state(&self) -> &FactState<ClassMask> {
        &self.state
    }

    fn set_state(&mut self, state: FactState<ClassMask>) {
        self.state = state;
    }
}
