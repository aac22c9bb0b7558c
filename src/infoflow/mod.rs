// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Information-flow analyses over the program model.
//!
//! Every analysis seeds a fact table, lets [`Engine`] drive it to a fixed
//! point and then validates the result against the sandbox model.

pub mod access_origin;
pub mod capability;
pub mod classified;
pub mod declassifier;
pub mod engine;
pub mod externs;
pub mod fact;
pub mod fp_targets;
pub mod queue_set;
pub mod sandbox_private;
pub mod state;

pub use access_origin::AccessOriginAnalysis;
pub use capability::CapabilityAnalysis;
pub use classified::ClassifiedAnalysis;
pub use declassifier::DeclassifierAnalysis;
pub use engine::Engine;
pub use fact::{ClassMask, Declassified, Fact, FunctionTargets, OriginMask, SandboxMask, SyscallSet};
pub use fp_targets::{AnnotatedFpTargets, FpTargetIndex, InferredFpTargets};
pub use queue_set::QueueSet;
pub use sandbox_private::SandboxPrivateAnalysis;
pub use state::FactState;

use crate::call_graph::CallGraph;
use crate::config::AnalysisConfig;
use crate::context::{Context, ContextModel};
use crate::error::SoaapResult;
use crate::ir::{FuncId, InstId, Module};
use crate::sandbox::{Sandbox, SandboxModel};
use crate::validator::{trace_from_calls, Report, TraceFrame};
use log::info;

/// How facts meeting at one value combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Union: what is possibly true on some path.
    May,
    /// Intersection: what is definitely true on every path.
    Must,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub mode: Mode,
    pub context_insensitive: bool,
}

impl Settings {
    pub fn may(context_insensitive: bool) -> Self {
        Settings {
            mode: Mode::May,
            context_insensitive,
        }
    }

    pub fn must(context_insensitive: bool) -> Self {
        Settings {
            mode: Mode::Must,
            context_insensitive,
        }
    }
}

/// Read-only inputs shared by every analysis of one run.
#[derive(Clone, Copy)]
pub struct AnalysisEnv<'a> {
    pub module: &'a Module,
    pub sandboxes: &'a SandboxModel,
    pub config: &'a AnalysisConfig,
}

impl<'a> AnalysisEnv<'a> {
    pub fn new(module: &'a Module, sandboxes: &'a SandboxModel, config: &'a AnalysisConfig) -> Self {
        AnalysisEnv {
            module,
            sandboxes,
            config,
        }
    }

    pub fn contexts(&self, context_insensitive: bool) -> ContextModel<'a> {
        ContextModel::new(self.module, self.sandboxes, context_insensitive)
    }

    /// Call trace from `main`, or from the entry points of `sandbox`, down
    /// to `target`. Empty unless traces were requested.
    pub fn trace_to(&self, cg: &CallGraph, sandbox: Option<&Sandbox>, target: FuncId) -> Vec<TraceFrame> {
        if !self.config.output_traces {
            return Vec::new();
        }
        let roots: Vec<FuncId> = match sandbox {
            Some(s) => s.entry_points.iter().copied().collect(),
            None => self.module.function_by_name("main").into_iter().collect(),
        };
        let stop = |f: FuncId| self.sandboxes.is_entry_point(f);
        roots
            .into_iter()
            .find_map(|root| cg.shortest_call_path(root, target, &stop))
            .map(|calls| trace_from_calls(self.module, &calls, self.config.summarise_traces))
            .unwrap_or_default()
    }
}

pub trait InfoFlow {
    type Fact: Fact;

    fn name(&self) -> &'static str;

    fn settings(&self) -> Settings;

    /// Seed the engine from annotations and the sandbox model.
    fn initialise(
        &mut self,
        engine: &mut Engine<'_, Self::Fact>,
        env: &AnalysisEnv<'_>,
        cg: &mut CallGraph,
    ) -> SoaapResult<()>;

    /// Called when the fact on the callee operand of `call` changes. The
    /// engine stores `fact` back, so implementations may narrow it.
    fn state_changed_for_function_pointer(
        &mut self,
        _module: &Module,
        _cg: &mut CallGraph,
        _call: InstId,
        _ctx: Context,
        _fact: &mut Self::Fact,
    ) {
    }

    /// Compare the fixed point against the sandbox model.
    fn post_analysis(&mut self, env: &AnalysisEnv<'_>, cg: &CallGraph, report: &mut Report);

    fn state(&self) -> &FactState<Self::Fact>;

    fn set_state(&mut self, state: FactState<Self::Fact>);

    fn fact(&self, ctx: Context, v: crate::ir::Value) -> Option<&Self::Fact> {
        self.state().get(ctx, v)
    }

    fn do_analysis(&mut self, env: &AnalysisEnv<'_>, cg: &mut CallGraph, report: &mut Report) -> SoaapResult<()>
    where
        Self: Sized,
    {
        let settings = self.settings();
        info!("Running analysis: {}", self.name());
        let mut engine = Engine::new(self.name(), env.module, env.contexts(settings.context_insensitive), settings);
        self.initialise(&mut engine, env, cg)?;
        engine.run(self, cg);
        self.set_state(engine.into_state());
        self.post_analysis(env, cg, report);
        Ok(())
    }
}
