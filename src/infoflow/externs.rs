// CLASSIFICATION: COMMUNITY
// Filename: externs.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Dataflow models for body-less library functions.

use crate::ir::{InstId, Value};

/// Where a fact on one argument of a library call flows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExternFlow {
    /// Into the call's result.
    ToResult,
    /// Into argument 0 (the output pointer) unless the fact is on
    /// argument 0 or the format argument 1.
    ToOutputUnlessFormat,
    /// Into argument 0 (the destination) unless the fact is already there.
    ToDestination,
    /// Into argument 0 (the container).
    ToContainer,
}

const EXTERN_TABLE: &[(&str, ExternFlow)] = &[
    ("strdup", ExternFlow::ToResult),
    ("strndup", ExternFlow::ToResult),
    ("asprintf", ExternFlow::ToOutputUnlessFormat),
    ("vasprintf", ExternFlow::ToOutputUnlessFormat),
    ("strcpy", ExternFlow::ToDestination),
    ("strncpy", ExternFlow::ToDestination),
    ("strcat", ExternFlow::ToDestination),
    ("memcpy", ExternFlow::ToDestination),
    ("g_hash_table_insert", ExternFlow::ToContainer),
    ("g_ptr_array_add", ExternFlow::ToContainer),
    ("g_array_append_vals", ExternFlow::ToContainer),
];

/// Library calls whose result aliases their first argument.
pub const ALIAS_RETURNING: &[&str] = &["buffer_ptr"];

pub fn extern_flow(name: &str) -> Option<ExternFlow> {
    EXTERN_TABLE.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

pub fn returns_alias(name: &str) -> bool {
    ALIAS_RETURNING.contains(&name)
}

/// Value receiving the fact of `v` at `call`, if any.
pub fn extern_target(flow: ExternFlow, call: InstId, v: Value, args: &[Value]) -> Option<Value> {
    let first = args.first().copied();
    match flow {
        ExternFlow::ToResult => Some(Value::Inst(call)),
        ExternFlow::ToOutputUnlessFormat => {
            if first == Some(v) || args.get(1) == Some(&v) {
                None
            } else {
                first
            }
        }
        ExternFlow::ToDestination => first.filter(|d| *d != v),
        ExternFlow::ToContainer => first,
    }
}
