// CLASSIFICATION: COMMUNITY
// Filename: manager.rs v2.0
// Date Modified: 2026-10-19
// Author: Lukas Bower

//! PassManager orchestrates the registration and execution of analysis passes.

use crate::error::SoaapResult;
use crate::pass_framework::traits::{AnalysisPass, PassContext};

/// Manages a sequence of passes to run against one program model.
#[derive(Default)]
pub struct PassManager {
    /// Ordered list of boxed AnalysisPass implementations.
    passes: Vec<Box<dyn AnalysisPass>>,
}

impl PassManager {
    /// Creates a new, empty PassManager.
    pub fn new() -> Self {
        PassManager { passes: Vec::new() }
    }

    /// Registers a new pass for later execution.
    pub fn add_pass<P: AnalysisPass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    pub fn add_boxed(&mut self, pass: Box<dyn AnalysisPass>) {
        self.passes.push(pass);
    }

    /// Executes all registered passes in order. Stops at the first internal error.
    pub fn run_all(&mut self, ctx: &mut PassContext<'_, '_>) -> SoaapResult<()> {
        for pass in &mut self.passes {
            log::info!("Running pass: {}", pass.name());
            pass.run(ctx)?;
        }
        Ok(())
    }

    /// Returns the number of registered passes.
    pub fn count(&self) -> usize {
        self.passes.len()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }
}
