// CLASSIFICATION: COMMUNITY
// Filename: scenarios.rs v0.1
// Date Modified: 2026-10-19
// Author: Lukas Bower

use soaap::call_graph::CallGraph;
use soaap::config::{AnalysisConfig, AnalysisKind};
use soaap::context::Context;
use soaap::driver;
use soaap::infoflow::{AnalysisEnv, CapabilityAnalysis, InferredFpTargets, InfoFlow};
use soaap::ir::{FnType, FuncId, IRBuilder, InstId, Module, Type, Value};
use soaap::sandbox::SandboxModel;
use soaap::validator::{DiagnosticKind, Report};

fn void() -> FnType {
    FnType::new(Type::Void, vec![])
}

fn fd_call() -> FnType {
    FnType::new(Type::int32(), vec![Type::int32()])
}

fn only(kind: AnalysisKind) -> AnalysisConfig {
    AnalysisConfig {
        analyses: vec![kind],
        ..Default::default()
    }
}

#[test]
fn write_to_read_only_shared_global() {
    let mut b = IRBuilder::new("globals");
    let g = b.add_global("counter", Type::int32());
    b.annotate_global(g, "VAR_READ_box");
    let ep = b.start_function("worker", void());
    b.annotate_function(ep, "SANDBOX_PERSISTENT_box");
    b.set_loc("worker.c", 10);
    b.build_load(g);
    b.set_loc("worker.c", 11);
    b.build_store(Value::Int(1), g);
    b.set_loc("worker.c", 12);
    b.build_store(Value::Int(2), g);
    b.build_ret(None);
    b.start_function("main", void());
    b.build_annotation("SOAAP_PERSISTENT_SANDBOX_CREATE_box");
    b.build_call(ep, vec![]);
    b.build_ret(None);
    let m = b.finalize().unwrap();

    let outcome = driver::run(&m, &only(AnalysisKind::Globals)).unwrap();
    let writes = outcome.report.of_kind(DiagnosticKind::GlobalWrite);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].function.as_deref(), Some("worker"));
    assert!(writes[0].message.contains("\"counter\""));
    assert_eq!(writes[0].location.as_ref().map(|l| l.line), Some(11));
    assert!(outcome.report.of_kind(DiagnosticKind::GlobalRead).is_empty());
}

fn private_module(store_to_global: bool) -> Module {
    let mut b = IRBuilder::new("private");
    let g = b.add_global("shared", Type::int32());
    let ep = b.start_function("worker", void());
    b.annotate_function(ep, "SANDBOX_PERSISTENT_box");
    let p = b.build_alloca(Type::int32());
    b.build_var_annotation(p, "SANDBOX_PRIVATE_box");
    b.build_store(Value::Int(7), p);
    let v = b.build_load(p);
    if store_to_global {
        b.build_store(v, g);
    }
    b.build_ret(None);
    b.start_function("main", void());
    b.build_annotation("SOAAP_PERSISTENT_SANDBOX_CREATE_box");
    b.build_call(ep, vec![]);
    b.build_ret(None);
    b.finalize().unwrap()
}

#[test]
fn private_value_stored_to_global_leaks() {
    let m = private_module(true);
    let outcome = driver::run(&m, &only(AnalysisKind::Private)).unwrap();
    let leaks = outcome.report.of_kind(DiagnosticKind::PrivateLeak);
    assert_eq!(leaks.len(), 1);
    assert!(leaks[0].message.contains("through global variable shared"));

    let clean = driver::run(&private_module(false), &only(AnalysisKind::Private)).unwrap();
    assert!(clean.report.is_empty());
}

struct FpProgram {
    module: Module,
    call: InstId,
    f1: FuncId,
    f2: FuncId,
}

/// Two sandboxes put different handlers into one global and both call
/// through it from a shared helper.
fn fp_program() -> FpProgram {
    let mut b = IRBuilder::new("fp");
    let fp = b.add_global("handler", Type::ptr_to(Type::Func(void())));
    let f1 = b.start_function("f1", void());
    b.build_ret(None);
    let f2 = b.start_function("f2", void());
    b.build_ret(None);
    let dispatch = b.start_function("dispatch", void());
    let target = b.build_load(fp);
    let call = b.build_indirect_call(target, void(), vec![]);
    b.build_ret(None);
    let a = b.start_function("entry_a", void());
    b.annotate_function(a, "SANDBOX_PERSISTENT_a");
    b.build_store(f1, fp);
    b.build_call(dispatch, vec![]);
    b.build_ret(None);
    let c = b.start_function("entry_b", void());
    b.annotate_function(c, "SANDBOX_PERSISTENT_b");
    b.build_store(f2, fp);
    b.build_call(dispatch, vec![]);
    b.build_ret(None);
    b.start_function("main", void());
    b.build_call(a, vec![]);
    b.build_call(c, vec![]);
    b.build_ret(None);
    FpProgram {
        module: b.finalize().unwrap(),
        call,
        f1,
        f2,
    }
}

#[test]
fn inferred_targets_merge_without_context() {
    let p = fp_program();
    let m = &p.module;
    let mut cg = CallGraph::new(m);
    let mut report = Report::new(false);
    let model = SandboxModel::discover(m, &cg, &mut report).unwrap();
    let config = AnalysisConfig {
        context_insensitive: true,
        ..Default::default()
    };
    let env = AnalysisEnv::new(m, &model, &config);
    let mut fp = InferredFpTargets::new(m, true);
    fp.do_analysis(&env, &mut cg, &mut report).unwrap();

    assert_eq!(fp.inferred_targets(m, p.call, Context::Single), vec![p.f1, p.f2]);
    assert_eq!(cg.callees(p.call), vec![p.f1, p.f2]);
}

#[test]
fn inferred_targets_stay_per_sandbox() {
    let p = fp_program();
    let m = &p.module;
    let mut cg = CallGraph::new(m);
    let mut report = Report::new(false);
    let model = SandboxModel::discover(m, &cg, &mut report).unwrap();
    let config = AnalysisConfig::default();
    let env = AnalysisEnv::new(m, &model, &config);
    let mut fp = InferredFpTargets::new(m, false);
    fp.do_analysis(&env, &mut cg, &mut report).unwrap();

    let a = Context::Sandbox(model.sandbox_by_name("a").unwrap().id);
    let b = Context::Sandbox(model.sandbox_by_name("b").unwrap().id);
    assert_eq!(fp.inferred_targets(m, p.call, a), vec![p.f1]);
    assert_eq!(fp.inferred_targets(m, p.call, b), vec![p.f2]);
}

fn run_capabilities(m: &Module) -> Report {
    let mut cg = CallGraph::new(m);
    let mut report = Report::new(false);
    let model = SandboxModel::discover(m, &cg, &mut report).unwrap();
    let config = AnalysisConfig::default();
    let env = AnalysisEnv::new(m, &model, &config);
    CapabilityAnalysis::new(false)
        .do_analysis(&env, &mut cg, &mut report)
        .unwrap();
    report
}

#[test]
fn capability_survives_reassignment() {
    let mut b = IRBuilder::new("caps");
    let read = b.declare_function("read", fd_call());
    let write = b.declare_function("write", fd_call());
    let ep = b.start_function("worker", FnType::new(Type::Void, vec![Type::int32()]));
    b.annotate_function(ep, "SANDBOX_EPHEMERAL_box");
    let slot = b.build_alloca(Type::int32());
    b.build_store(b.param(0), slot);
    b.build_var_annotation(slot, "SOAAP_FD_read");
    let copy = b.build_alloca(Type::int32());
    let original = b.build_load(slot);
    b.build_store(original, copy);
    let fd = b.build_load(copy);
    b.build_call(read, vec![fd.into()]);
    b.set_loc("worker.c", 20);
    b.build_call(write, vec![fd.into()]);
    b.build_ret(None);
    let m = b.finalize().unwrap();

    let report = run_capabilities(&m);
    let denied = report.of_kind(DiagnosticKind::SyscallNotAllowed);
    assert_eq!(denied.len(), 1);
    assert!(denied[0].message.contains("\"write\""));
    assert_eq!(denied[0].location.as_ref().map(|l| l.line), Some(20));
}

#[test]
fn must_meet_covers_every_caller() {
    let mut b = IRBuilder::new("meet");
    let read = b.declare_function("read", fd_call());
    let write = b.declare_function("write", fd_call());
    let helper = b.start_function("helper", FnType::new(Type::Void, vec![Type::int32()]));
    b.build_call(read, vec![b.param(0)]);
    b.build_call(write, vec![b.param(0)]);
    b.build_ret(None);
    let ep = b.start_function("worker", FnType::new(Type::Void, vec![Type::int32(), Type::int32()]));
    b.annotate_function(ep, "SANDBOX_EPHEMERAL_box");
    b.build_var_annotation(b.param(0), "SOAAP_FD_read,write");
    b.build_var_annotation(b.param(1), "SOAAP_FD_read");
    b.build_call(helper, vec![b.param(0)]);
    b.build_call(helper, vec![b.param(1)]);
    b.build_ret(None);
    let m = b.finalize().unwrap();

    let report = run_capabilities(&m);
    let denied = report.of_kind(DiagnosticKind::SyscallNotAllowed);
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].function.as_deref(), Some("helper"));
    assert!(denied[0].message.contains("\"write\""));
}
