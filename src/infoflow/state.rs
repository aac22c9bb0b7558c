// CLASSIFICATION: COMMUNITY
// Filename: state.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Per-context fact tables.

use crate::context::Context;
use crate::infoflow::fact::Fact;
use crate::ir::Value;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct FactState<F> {
    tables: HashMap<Context, HashMap<Value, F>>,
}

impl<F> Default for FactState<F> {
    fn default() -> Self {
        FactState { tables: HashMap::new() }
    }
}

impl<F: Fact> FactState<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, ctx: Context, v: Value) -> Option<&F> {
        self.tables.get(&ctx).and_then(|t| t.get(&v))
    }

    pub fn get_mut(&mut self, ctx: Context, v: Value) -> Option<&mut F> {
        self.tables.get_mut(&ctx).and_then(|t| t.get_mut(&v))
    }

    /// Fact of `v` under `ctx`, bottom when untracked.
    pub fn fact_or_bottom(&self, ctx: Context, v: Value) -> F {
        self.get(ctx, v).cloned().unwrap_or_else(F::bottom)
    }

    pub fn contains(&self, ctx: Context, v: Value) -> bool {
        self.get(ctx, v).is_some()
    }

    pub fn set(&mut self, ctx: Context, v: Value, fact: F) {
        self.tables.entry(ctx).or_default().insert(v, fact);
    }

    /// Values tracked under `ctx`.
    pub fn entries(&self, ctx: Context) -> impl Iterator<Item = (Value, &F)> + '_ {
        self.tables.get(&ctx).into_iter().flat_map(|t| t.iter().map(|(v, f)| (*v, f)))
    }

    pub fn contexts(&self) -> impl Iterator<Item = Context> + '_ {
        self.tables.keys().copied()
    }

    pub(crate) fn take_all(&mut self) -> HashMap<Context, HashMap<Value, F>> {
        std::mem::take(&mut self.tables)
    }

    pub(crate) fn replace_table(&mut self, ctx: Context, table: HashMap<Value, F>) {
        self.tables.insert(ctx, table);
    }

    pub(crate) fn table(&self, ctx: Context) -> Option<&HashMap<Value, F>> {
        self.tables.get(&ctx)
    }

    /// Number of (context, value) pairs tracked.
    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
