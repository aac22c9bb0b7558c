// CLASSIFICATION: COMMUNITY
// Filename: engine_properties.rs v0.1
// Date Modified: 2026-10-19
// Author: Lukas Bower

use proptest::prelude::*;
use soaap::call_graph::CallGraph;
use soaap::config::AnalysisConfig;
use soaap::context::Context;
use soaap::infoflow::{AnalysisEnv, CapabilityAnalysis, InfoFlow, SandboxPrivateAnalysis};
use soaap::ir::{FnType, FuncId, GlobalId, IRBuilder, Module, Type, Value};
use soaap::sandbox::SandboxModel;
use soaap::validator::{DiagnosticKind, Report};
use std::collections::HashMap;

const SYSCALLS: [&str; 4] = ["read", "write", "close", "fstat"];

fn fd_annotation(granted: &[bool]) -> String {
    let rights: Vec<&str> = SYSCALLS
        .iter()
        .zip(granted)
        .filter(|(_, g)| **g)
        .map(|(name, _)| *name)
        .collect();
    if rights.is_empty() {
        "SOAAP_FD_SOAAP_NO_SYSCALLS_ALLOWED".to_string()
    } else {
        format!("SOAAP_FD_{}", rights.join(","))
    }
}

/// An entry point holding a descriptor passes it down `depth` helpers; the
/// innermost one performs `performed` system calls on it.
fn chain_program(depth: usize, granted: &[bool], performed: &[usize]) -> Module {
    let fd_call = FnType::new(Type::int32(), vec![Type::int32()]);
    let takes_fd = FnType::new(Type::Void, vec![Type::int32()]);
    let mut b = IRBuilder::new("chain");
    let decls: Vec<FuncId> = SYSCALLS
        .iter()
        .map(|name| b.declare_function(*name, fd_call.clone()))
        .collect();

    let mut next = b.start_function("leaf", takes_fd.clone());
    for &s in performed {
        b.build_call(decls[s], vec![b.param(0)]);
    }
    b.build_ret(None);
    for level in 0..depth {
        let f = b.start_function(format!("hop{}", level), takes_fd.clone());
        b.build_call(next, vec![b.param(0)]);
        b.build_ret(None);
        next = f;
    }

    let ep = b.start_function("worker", takes_fd);
    b.annotate_function(ep, "SANDBOX_EPHEMERAL_box");
    b.build_var_annotation(b.param(0), fd_annotation(granted));
    b.build_call(next, vec![b.param(0)]);
    b.build_ret(None);

    b.start_function("main", FnType::new(Type::Void, vec![]));
    b.build_call(ep, vec![Value::Int(3)]);
    b.build_ret(None);
    b.finalize().unwrap()
}

/// `worker` hands its descriptor to `leaf` from one call site per entry of
/// `hops`; site `i` first copies it through `hops[i]` stack slots.
fn fan_in_program(hops: &[usize], granted: &[bool], performed: &[usize]) -> Module {
    let fd_call = FnType::new(Type::int32(), vec![Type::int32()]);
    let takes_fd = FnType::new(Type::Void, vec![Type::int32()]);
    let mut b = IRBuilder::new("fan_in");
    let decls: Vec<FuncId> = SYSCALLS
        .iter()
        .map(|name| b.declare_function(*name, fd_call.clone()))
        .collect();

    let leaf = b.start_function("leaf", takes_fd.clone());
    for &s in performed {
        b.build_call(decls[s], vec![b.param(0)]);
    }
    b.build_ret(None);

    let ep = b.start_function("worker", takes_fd);
    b.annotate_function(ep, "SANDBOX_EPHEMERAL_box");
    b.build_var_annotation(b.param(0), fd_annotation(granted));
    for &count in hops {
        let mut held = b.param(0);
        for _ in 0..count {
            let slot = b.build_alloca(Type::int32());
            b.build_store(held, slot);
            held = b.build_load(slot).into();
        }
        b.build_call(leaf, vec![held]);
    }
    b.build_ret(None);

    b.start_function("main", FnType::new(Type::Void, vec![]));
    b.build_call(ep, vec![Value::Int(3)]);
    b.build_ret(None);
    b.finalize().unwrap()
}

/// Globals `g0..gN` of which `private[i]` belong to sandbox `a`; its entry
/// copies each `g_i` into `g_{wiring[i]}`, half of them through a cast.
fn shuffle_program(private: &[bool], wiring: &[usize]) -> Module {
    let mut b = IRBuilder::new("shuffle");
    let globals: Vec<GlobalId> = (0..private.len())
        .map(|i| b.add_global(format!("g{}", i), Type::int32()))
        .collect();
    for (g, owned) in globals.iter().zip(private) {
        if *owned {
            b.annotate_global(*g, "SANDBOX_PRIVATE_a");
        }
    }
    let ep = b.start_function("entry_a", FnType::new(Type::Void, vec![]));
    b.annotate_function(ep, "SANDBOX_PERSISTENT_a");
    for (i, g) in globals.iter().enumerate() {
        let dst = globals[wiring[i] % globals.len()];
        let mut loaded = b.build_load(*g);
        if i % 2 == 1 {
            loaded = b.build_cast(loaded);
        }
        b.build_store(loaded, dst);
    }
    b.build_ret(None);
    b.start_function("main", FnType::new(Type::Void, vec![]));
    b.build_call(ep, vec![]);
    b.build_ret(None);
    b.finalize().unwrap()
}

fn private_masks(m: &Module) -> HashMap<Value, u32> {
    let mut cg = CallGraph::new(m);
    let mut report = Report::new(false);
    let model = SandboxModel::discover(m, &cg, &mut report).unwrap();
    let config = AnalysisConfig::default();
    let env = AnalysisEnv::new(m, &model, &config);
    let mut analysis = SandboxPrivateAnalysis::new(false);
    analysis.do_analysis(&env, &mut cg, &mut report).unwrap();
    let ctx = Context::Sandbox(model.sandbox_by_name("a").unwrap().id);
    analysis.state().entries(ctx).map(|(v, mask)| (v, mask.0)).collect()
}

fn denials(m: &Module, context_insensitive: bool) -> usize {
    let mut cg = CallGraph::new(m);
    let mut report = Report::new(false);
    let model = SandboxModel::discover(m, &cg, &mut report).unwrap();
    let config = AnalysisConfig {
        context_insensitive,
        ..Default::default()
    };
    let env = AnalysisEnv::new(m, &model, &config);
    CapabilityAnalysis::new(context_insensitive)
        .do_analysis(&env, &mut cg, &mut report)
        .unwrap();
    report.of_kind(DiagnosticKind::SyscallNotAllowed).len()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn denials_match_missing_rights(
        depth in 0usize..6,
        granted in proptest::collection::vec(any::<bool>(), SYSCALLS.len()),
        performed in proptest::collection::vec(0usize..SYSCALLS.len(), 0..6),
    ) {
        let m = chain_program(depth, &granted, &performed);
        let expected = performed.iter().filter(|s| !granted[**s]).count();
        prop_assert_eq!(denials(&m, false), expected);
        prop_assert_eq!(denials(&m, true), expected);
    }

    #[test]
    fn more_rights_never_add_denials(
        depth in 0usize..4,
        granted in proptest::collection::vec(any::<bool>(), SYSCALLS.len()),
        extra in 0usize..SYSCALLS.len(),
        performed in proptest::collection::vec(0usize..SYSCALLS.len(), 1..6),
    ) {
        let mut wider = granted.clone();
        wider[extra] = true;
        let narrow = denials(&chain_program(depth, &granted, &performed), false);
        let wide = denials(&chain_program(depth, &wider, &performed), false);
        prop_assert!(wide <= narrow);
    }

    #[test]
    fn call_site_order_does_not_change_denials(
        hops in proptest::collection::vec(0usize..4, 1..5),
        granted in proptest::collection::vec(any::<bool>(), SYSCALLS.len()),
        performed in proptest::collection::vec(0usize..SYSCALLS.len(), 0..5),
    ) {
        let expected = performed.iter().filter(|s| !granted[**s]).count();
        let mut reversed = hops.clone();
        reversed.reverse();
        for order in [&hops, &reversed] {
            let m = fan_in_program(order, &granted, &performed);
            prop_assert_eq!(denials(&m, false), expected);
            prop_assert_eq!(denials(&m, true), expected);
        }
    }

    #[test]
    fn more_private_globals_only_grow_facts(
        private in proptest::collection::vec(any::<bool>(), 1..6),
        wiring in proptest::collection::vec(0usize..6, 6),
        extra in 0usize..6,
    ) {
        let mut wider = private.clone();
        let last = wider.len() - 1;
        wider[extra.min(last)] = true;
        let narrow = private_masks(&shuffle_program(&private, &wiring));
        let wide = private_masks(&shuffle_program(&wider, &wiring));
        for (v, mask) in narrow {
            let grown = wide.get(&v).copied().unwrap_or(0);
            prop_assert_eq!(grown & mask, mask);
        }
    }
}
