// CLASSIFICATION: COMMUNITY
// Filename: context.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Analysis contexts and the rules that move facts between them.

use crate::ir::{FuncId, InstId, Module};
use crate::sandbox::{SandboxId, SandboxModel};
use std::fmt;

/// Execution domain a dataflow fact is tracked under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Context {
    /// Not yet placed; resolved from the first instruction that uses the value.
    NoContext,
    Privileged,
    /// All contexts merged, for context-insensitive runs.
    Single,
    Sandbox(SandboxId),
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::NoContext => write!(f, "<no context>"),
            Context::Privileged => write!(f, "<privileged>"),
            Context::Single => write!(f, "<single>"),
            Context::Sandbox(id) => write!(f, "<sandbox #{}>", id),
        }
    }
}

/// Maps program points to contexts for one analysis run.
#[derive(Clone, Copy)]
pub struct ContextModel<'a> {
    module: &'a Module,
    sandboxes: &'a SandboxModel,
    context_insensitive: bool,
}

impl<'a> ContextModel<'a> {
    pub fn new(module: &'a Module, sandboxes: &'a SandboxModel, context_insensitive: bool) -> Self {
        ContextModel {
            module,
            sandboxes,
            context_insensitive,
        }
    }

    pub fn is_context_insensitive(&self) -> bool {
        self.context_insensitive
    }

    /// Privileged plus one context per sandbox.
    pub fn all_contexts(&self) -> Vec<Context> {
        let mut all = vec![Context::Privileged];
        all.extend(self.sandboxes.sandboxes().iter().map(|s| Context::Sandbox(s.id)));
        all
    }

    pub fn contexts_for_method(&self, f: FuncId) -> Vec<Context> {
        if self.context_insensitive {
            return vec![Context::Single];
        }
        let mut contexts = Vec::new();
        if self.sandboxes.is_privileged_method(f) {
            contexts.push(Context::Privileged);
        }
        contexts.extend(
            self.sandboxes
                .sandboxes_containing_function(f)
                .into_iter()
                .map(Context::Sandbox),
        );
        contexts
    }

    /// Privileged when reachable from `main` outside any sandbox, plus every
    /// sandbox whose closure or region holds the instruction.
    pub fn contexts_for_instruction(&self, inst: InstId) -> Vec<Context> {
        if self.context_insensitive {
            return vec![Context::Single];
        }
        let mut contexts = Vec::new();
        if self.sandboxes.is_privileged_instruction(self.module, inst) {
            contexts.push(Context::Privileged);
        }
        contexts.extend(
            self.sandboxes
                .sandboxes_containing_instruction(self.module, inst)
                .into_iter()
                .map(Context::Sandbox),
        );
        contexts
    }

    pub fn executes_in(&self, inst: InstId, ctx: Context) -> bool {
        match ctx {
            Context::Single => self.context_insensitive,
            Context::NoContext => false,
            Context::Privileged => self.sandboxes.is_privileged_instruction(self.module, inst),
            Context::Sandbox(id) => self.sandboxes.sandbox(id).contains_instruction(self.module, inst),
        }
    }

    /// Context a call made under `ctx` runs `callee` in.
    pub fn callee_context(&self, ctx: Context, callee: FuncId) -> Context {
        if self.context_insensitive {
            return Context::Single;
        }
        if let Some(sandbox) = self.sandboxes.sandbox_for_entry_point(callee) {
            return Context::Sandbox(sandbox.id);
        }
        match ctx {
            Context::Sandbox(id) if self.sandboxes.sandbox(id).is_callgate(callee) => Context::Privileged,
            other => other,
        }
    }

    /// Contexts control returns to when `returning` finishes under `ctx`
    /// and resumes after `call`.
    pub fn caller_contexts(&self, returning: FuncId, call: InstId, ctx: Context) -> Vec<Context> {
        if self.context_insensitive {
            return vec![Context::Single];
        }
        if self.sandboxes.is_entry_point(returning) {
            self.contexts_for_instruction(call)
        } else {
            vec![ctx]
        }
    }

    /// Human-readable name, using sandbox names.
    pub fn describe(&self, ctx: Context) -> String {
        match ctx {
            Context::Sandbox(id) => format!("sandbox {:?}", self.sandboxes.sandbox(id).name),
            other => other.to_string(),
        }
    }
}
