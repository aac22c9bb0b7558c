// CLASSIFICATION: COMMUNITY
// Filename: pass_registry.rs v2.0
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Maps the analyses selected in the configuration onto passes.

use crate::analysis::{CreationPointAnalysis, PrivilegedCallAnalysis};
use crate::cfgflow::GlobalVariableAnalysis;
use crate::config::{AnalysisConfig, AnalysisKind};
use crate::infoflow::{AccessOriginAnalysis, CapabilityAnalysis, ClassifiedAnalysis, SandboxPrivateAnalysis};
use crate::pass_framework::{AnalysisPass, PassManager};
use crate::passes::wrappers::{CfgFlowPass, InfoFlowPass};
use log::info;

pub struct PassRegistry {
    passes: Vec<Box<dyn AnalysisPass>>,
}

impl Default for PassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PassRegistry {
    pub fn new() -> Self {
        PassRegistry { passes: Vec::new() }
    }

    /// Register a new pass into the registry.
    pub fn register(&mut self, pass: Box<dyn AnalysisPass>) {
        info!("Registered pass: {} ({})", pass.name(), pass.description());
        self.passes.push(pass);
    }

    /// The pass implementing `kind`.
    pub fn pass_for(kind: AnalysisKind, config: &AnalysisConfig) -> Box<dyn AnalysisPass> {
        let ci = config.context_insensitive;
        match kind {
            AnalysisKind::Globals => Box::new(CfgFlowPass::new(GlobalVariableAnalysis::new())),
            AnalysisKind::Syscalls => Box::new(InfoFlowPass::new(
                CapabilityAnalysis::new(ci),
                "system calls on descriptors without the matching capability",
            )),
            AnalysisKind::Classified => Box::new(InfoFlowPass::new(
                ClassifiedAnalysis::new(ci),
                "classified data read without clearance",
            )),
            AnalysisKind::Private => Box::new(InfoFlowPass::new(
                SandboxPrivateAnalysis::new(ci),
                "reads and leaks of sandbox-private data",
            )),
            AnalysisKind::PrivilegedCalls => Box::new(PrivilegedCallAnalysis::new()),
            AnalysisKind::AccessOrigin => Box::new(InfoFlowPass::new(
                AccessOriginAnalysis::new(ci),
                "privileged calls through sandbox-supplied function pointers",
            )),
            AnalysisKind::CreationPoints => Box::new(CreationPointAnalysis),
        }
    }

    /// Passes for every analysis enabled in `config`, in canonical order.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let mut registry = Self::new();
        for kind in AnalysisKind::ALL {
            if config.enabled(kind) {
                registry.register(Self::pass_for(kind, config));
            }
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn into_manager(self) -> PassManager {
        let mut manager = PassManager::new();
        for pass in self.passes {
            manager.add_boxed(pass);
        }
        manager
    }
}
