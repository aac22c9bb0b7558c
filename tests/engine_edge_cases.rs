// CLASSIFICATION: COMMUNITY
// Filename: engine_edge_cases.rs v0.1
// Date Modified: 2026-10-19
// Author: Lukas Bower

use soaap::call_graph::CallGraph;
use soaap::config::{AnalysisConfig, AnalysisKind};
use soaap::context::Context;
use soaap::driver;
use soaap::infoflow::{AnalysisEnv, CapabilityAnalysis, InfoFlow, SandboxPrivateAnalysis};
use soaap::ir::{FnType, FuncId, GlobalId, IRBuilder, InstId, Module, Type, Value};
use soaap::sandbox::SandboxModel;
use soaap::validator::{DiagnosticKind, Report};

fn void() -> FnType {
    FnType::new(Type::Void, vec![])
}

fn fd_call() -> FnType {
    FnType::new(Type::int32(), vec![Type::int32()])
}

fn capability_denials(m: &Module) -> Vec<String> {
    let mut cg = CallGraph::new(m);
    let mut report = Report::new(false);
    let model = SandboxModel::discover(m, &cg, &mut report).unwrap();
    let config = AnalysisConfig::default();
    let env = AnalysisEnv::new(m, &model, &config);
    CapabilityAnalysis::new(false)
        .do_analysis(&env, &mut cg, &mut report)
        .unwrap();
    report
        .of_kind(DiagnosticKind::SyscallNotAllowed)
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

fn run_private(m: &Module, context_insensitive: bool) -> (SandboxModel, SandboxPrivateAnalysis, Report) {
    let mut cg = CallGraph::new(m);
    let mut report = Report::new(false);
    let model = SandboxModel::discover(m, &cg, &mut report).unwrap();
    let config = AnalysisConfig {
        context_insensitive,
        ..Default::default()
    };
    let mut analysis = SandboxPrivateAnalysis::new(context_insensitive);
    {
        let env = AnalysisEnv::new(m, &model, &config);
        analysis.do_analysis(&env, &mut cg, &mut report).unwrap();
    }
    (model, analysis, report)
}

fn leaks(report: &Report) -> Vec<String> {
    report
        .of_kind(DiagnosticKind::PrivateLeak)
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

/// Starts `entry_a` in sandbox `a` and loads a stack value private to it.
fn private_entry(b: &mut IRBuilder) -> (FuncId, InstId) {
    let ep = b.start_function("entry_a", void());
    b.annotate_function(ep, "SANDBOX_PERSISTENT_a");
    let secret = b.build_alloca(Type::int32());
    b.build_var_annotation(secret, "SANDBOX_PRIVATE_a");
    let v = b.build_load(secret);
    (ep, v)
}

fn finish_with_main(mut b: IRBuilder, ep: FuncId) -> Module {
    b.start_function("main", void());
    b.build_call(ep, vec![]);
    b.build_ret(None);
    b.finalize().unwrap()
}

fn sandbox_a(model: &SandboxModel) -> (Context, u32) {
    let a = model.sandbox_by_name("a").unwrap();
    (Context::Sandbox(a.id), a.mask())
}

#[test]
fn must_meet_waits_for_unreached_arguments() {
    let takes_fd = FnType::new(Type::Void, vec![Type::int32()]);
    let mut b = IRBuilder::new("meet");
    let read = b.declare_function("read", fd_call());
    let helper = b.start_function("helper", takes_fd.clone());
    b.build_call(read, vec![b.param(0)]);
    b.build_ret(None);
    let ep = b.start_function("worker", takes_fd);
    b.annotate_function(ep, "SANDBOX_EPHEMERAL_box");
    b.build_var_annotation(b.param(0), "SOAAP_FD_read");
    b.build_call(helper, vec![b.param(0)]);
    let slot = b.build_alloca(Type::int32());
    b.build_store(b.param(0), slot);
    let copy = b.build_load(slot);
    b.build_call(helper, vec![copy.into()]);
    b.build_ret(None);
    b.start_function("main", void());
    b.build_call(ep, vec![Value::Int(3)]);
    b.build_ret(None);
    let m = b.finalize().unwrap();

    assert_eq!(capability_denials(&m), Vec::<String>::new());
}

#[test]
fn literal_argument_strips_rights() {
    let takes_fd = FnType::new(Type::Void, vec![Type::int32()]);
    let mut b = IRBuilder::new("literal");
    let read = b.declare_function("read", fd_call());
    let helper = b.start_function("helper", takes_fd.clone());
    b.build_call(read, vec![b.param(0)]);
    b.build_ret(None);
    let ep = b.start_function("worker", takes_fd);
    b.annotate_function(ep, "SANDBOX_EPHEMERAL_box");
    b.build_var_annotation(b.param(0), "SOAAP_FD_read");
    b.build_call(helper, vec![b.param(0)]);
    b.build_call(helper, vec![Value::Int(4)]);
    b.build_ret(None);
    b.start_function("main", void());
    b.build_call(ep, vec![Value::Int(3)]);
    b.build_ret(None);
    let m = b.finalize().unwrap();

    let denials = capability_denials(&m);
    assert_eq!(denials.len(), 1);
    assert!(denials[0].contains("\"read\""));
}

#[test]
fn select_keeps_only_common_rights() {
    let mut b = IRBuilder::new("select");
    let read = b.declare_function("read", fd_call());
    let write = b.declare_function("write", fd_call());
    let ep = b.start_function("worker", FnType::new(Type::Void, vec![Type::int32(), Type::int32()]));
    b.annotate_function(ep, "SANDBOX_EPHEMERAL_box");
    b.build_var_annotation(b.param(0), "SOAAP_FD_read");
    b.build_var_annotation(b.param(1), "SOAAP_FD_read,write");
    let either = b.build_select(Value::Int(1), b.param(0), b.param(1));
    b.build_call(read, vec![either.into()]);
    b.build_call(write, vec![either.into()]);
    b.build_ret(None);
    b.start_function("main", void());
    b.build_call(ep, vec![Value::Int(3), Value::Int(4)]);
    b.build_ret(None);
    let m = b.finalize().unwrap();

    let denials = capability_denials(&m);
    assert_eq!(denials.len(), 1);
    assert!(denials[0].contains("\"write\""));
}

#[test]
fn select_carries_private_data_from_either_arm() {
    let mut b = IRBuilder::new("select");
    let g = b.add_global("shared", Type::int32());
    let (ep, v) = private_entry(&mut b);
    let either = b.build_select(Value::Int(1), v.into(), Value::Int(0));
    b.build_store(either, g);
    b.build_ret(None);
    let m = finish_with_main(b, ep);

    let (_, _, report) = run_private(&m, false);
    let found = leaks(&report);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("through global variable shared"));
}

#[test]
fn arithmetic_results_carry_nothing() {
    let mut b = IRBuilder::new("binary");
    let sum_g = b.add_global("g_sum", Type::int32());
    let cast_g = b.add_global("g_cast", Type::int32());
    let (ep, v) = private_entry(&mut b);
    let sum = b.build_binary(v, Value::Int(1));
    b.build_store(sum, sum_g);
    let cast = b.build_cast(v);
    b.build_store(cast, cast_g);
    b.build_ret(None);
    let m = finish_with_main(b, ep);

    let (model, analysis, report) = run_private(&m, false);
    let (ctx, _) = sandbox_a(&model);
    assert_eq!(analysis.fact(ctx, Value::Inst(sum)).map_or(0, |f| f.0), 0);
    let found = leaks(&report);
    assert_eq!(found.len(), 1);
    assert!(found[0].contains("g_cast"));
}

#[test]
fn library_summaries_move_facts() {
    let mut b = IRBuilder::new("externs");
    let strdup = b.declare_function("strdup", fd_call());
    let strcpy = b.declare_function("strcpy", FnType::new(Type::int32(), vec![Type::int32(), Type::int32()]));
    let mystery = b.declare_function("mystery", fd_call());
    let (ep, v) = private_entry(&mut b);
    let dup = b.build_call(strdup, vec![v.into()]);
    let dst = b.build_alloca(Type::int32());
    b.build_call(strcpy, vec![dst.into(), v.into()]);
    let opaque = b.build_call(mystery, vec![v.into()]);
    b.build_ret(None);
    let m = finish_with_main(b, ep);

    let (model, analysis, _) = run_private(&m, false);
    let (ctx, mask) = sandbox_a(&model);
    assert_eq!(analysis.fact(ctx, Value::Inst(dup)).map(|f| f.0), Some(mask));
    assert_eq!(analysis.fact(ctx, Value::Inst(dst)).map(|f| f.0), Some(mask));
    assert!(analysis.fact(ctx, Value::Inst(opaque)).is_none());
}

fn declassify_program(declassify: bool) -> Module {
    let mut b = IRBuilder::new("declassify");
    let g = b.add_global("shared", Type::int32());
    let release = b.declare_function("__soaap_declassify", FnType::new(Type::Void, vec![Type::int32()]));
    let ep = b.start_function("entry_a", void());
    b.annotate_function(ep, "SANDBOX_PERSISTENT_a");
    let secret = b.build_alloca(Type::int32());
    b.build_var_annotation(secret, "SANDBOX_PRIVATE_a");
    let first = b.build_load(secret);
    if declassify {
        b.build_call(release, vec![first.into()]);
    }
    let later = b.build_load(secret);
    let copy = b.build_cast(later);
    b.build_store(copy, g);
    b.build_ret(None);
    finish_with_main(b, ep)
}

#[test]
fn declassified_value_stops_private_flow() {
    let (_, _, kept) = run_private(&declassify_program(false), false);
    assert_eq!(leaks(&kept).len(), 1);

    let (_, analysis, released) = run_private(&declassify_program(true), false);
    assert!(leaks(&released).is_empty());
    assert!(!analysis.declassifier().declassified_values().is_empty());
}

#[test]
fn field_store_in_callee_marks_callers_object() {
    let mut b = IRBuilder::new("aggregate");
    let g = b.add_global("shared", Type::int32());
    let fill = b.start_function("fill", FnType::new(Type::Void, vec![Type::ptr_to(Type::int32()), Type::int32()]));
    let field = b.build_gep(b.param(0), vec![Value::Int(0), Value::Int(1)]);
    b.build_store(b.param(1), field);
    b.build_ret(None);
    let (ep, v) = private_entry(&mut b);
    let buf = b.build_alloca(Type::int32());
    b.build_call(fill, vec![buf.into(), v.into()]);
    let back = b.build_load(buf);
    b.build_store(back, g);
    b.build_ret(None);
    let m = finish_with_main(b, ep);

    let (model, analysis, report) = run_private(&m, false);
    let (ctx, mask) = sandbox_a(&model);
    assert_eq!(analysis.fact(ctx, Value::Inst(buf)).map(|f| f.0), Some(mask));
    assert!(leaks(&report).iter().any(|l| l.contains("through global variable shared")));
}

#[test]
fn long_address_chain_is_rewound() {
    let mut b = IRBuilder::new("chain");
    let (ep, v) = private_entry(&mut b);
    let buf = b.build_alloca(Type::int32());
    let mut field = buf;
    for _ in 0..10_000 {
        field = b.build_gep(field, vec![Value::Int(0)]);
    }
    b.build_store(v, field);
    b.build_ret(None);
    let m = finish_with_main(b, ep);

    let (model, analysis, _) = run_private(&m, false);
    let (ctx, mask) = sandbox_a(&model);
    assert_eq!(analysis.fact(ctx, Value::Inst(buf)).map(|f| f.0), Some(mask));
}

#[test]
fn variadic_arguments_reach_va_list() {
    let mut b = IRBuilder::new("varargs");
    let g = b.add_global("shared", Type::int32());
    let logger = b.start_function("log_msg", FnType::variadic(Type::Void, vec![Type::int32()]));
    let va = b.build_alloca(Type::VaList);
    let rest = b.build_load(va);
    b.build_store(rest, g);
    b.build_ret(None);
    let (ep, v) = private_entry(&mut b);
    b.build_call(logger, vec![Value::Int(0), v.into()]);
    b.build_ret(None);
    let m = finish_with_main(b, ep);

    let (model, analysis, report) = run_private(&m, false);
    let (ctx, mask) = sandbox_a(&model);
    assert_eq!(analysis.fact(ctx, Value::Inst(va)).map(|f| f.0), Some(mask));
    assert!(leaks(&report).iter().any(|l| l.contains("through global variable shared")));
}

fn private_global_program() -> (Module, GlobalId) {
    let mut b = IRBuilder::new("placement");
    let secret = b.add_global("secret", Type::int32());
    b.annotate_global(secret, "SANDBOX_PRIVATE_a");
    let ep = b.start_function("entry_a", void());
    b.annotate_function(ep, "SANDBOX_PERSISTENT_a");
    b.build_load(secret);
    b.build_ret(None);
    (finish_with_main(b, ep), secret)
}

#[test]
fn global_facts_are_placed_where_they_are_used() {
    let (m, secret) = private_global_program();
    let (model, analysis, _) = run_private(&m, false);
    let (ctx, mask) = sandbox_a(&model);
    assert_eq!(analysis.fact(ctx, Value::Global(secret)).map(|f| f.0), Some(mask));
    assert!(analysis.fact(Context::Privileged, Value::Global(secret)).is_none());
}

#[test]
fn context_insensitive_run_fills_only_real_contexts() {
    let (m, secret) = private_global_program();
    let (model, analysis, _) = run_private(&m, true);
    let (ctx, mask) = sandbox_a(&model);
    let contexts: Vec<Context> = analysis.state().contexts().collect();
    assert!(!contexts.contains(&Context::NoContext));
    assert!(contexts.contains(&Context::Single));
    assert_eq!(analysis.fact(Context::Single, Value::Global(secret)).map(|f| f.0), Some(mask));
    assert_eq!(analysis.fact(ctx, Value::Global(secret)).map(|f| f.0), Some(mask));
}

#[test]
fn indirect_call_into_other_sandbox_leaks() {
    let takes = FnType::new(Type::Void, vec![Type::int32()]);
    let mut b = IRBuilder::new("indirect");
    let other = b.start_function("entry_b", takes.clone());
    b.annotate_function(other, "SANDBOX_PERSISTENT_b");
    b.build_ret(None);
    let (ep, v) = private_entry(&mut b);
    let slot = b.build_alloca(Type::ptr_to(Type::Func(takes.clone())));
    b.build_var_annotation(slot, "SOAAP_FP_entry_b");
    let target = b.build_load(slot);
    b.set_loc("a.c", 40);
    b.build_indirect_call(target, takes, vec![v.into()]);
    b.build_ret(None);
    let m = finish_with_main(b, ep);

    let config = AnalysisConfig {
        analyses: vec![AnalysisKind::Private],
        ..Default::default()
    };
    let outcome = driver::run(&m, &config).unwrap();
    let found = outcome.report.of_kind(DiagnosticKind::PrivateLeak);
    assert_eq!(found.len(), 1);
    assert!(found[0].message.contains("cross-sandbox call into [b]"));
    assert_eq!(found[0].location.as_ref().map(|l| l.line), Some(40));
}
