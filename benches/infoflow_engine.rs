// CLASSIFICATION: COMMUNITY
// Filename: infoflow_engine.rs v0.1
// Date Modified: 2026-10-19
// Author: Lukas Bower

use criterion::{criterion_group, criterion_main, Criterion};
use soaap::config::AnalysisConfig;
use soaap::driver;
use soaap::ir::{FnType, IRBuilder, Module, Type, Value};

/// `sandboxes` entry points, each handing a descriptor and a private value
/// down a chain of `depth` helpers that also touch a shared global.
fn make_program(sandboxes: usize, depth: usize) -> Module {
    let fd_call = FnType::new(Type::int32(), vec![Type::int32()]);
    let takes_fd = FnType::new(Type::Void, vec![Type::int32()]);
    let mut b = IRBuilder::new("bench");
    let read = b.declare_function("read", fd_call.clone());
    let write = b.declare_function("write", fd_call);
    let shared = b.add_global("shared", Type::int32());

    let mut entries = Vec::new();
    for s in 0..sandboxes {
        let mut next = b.start_function(format!("leaf{}", s), takes_fd.clone());
        b.build_call(read, vec![b.param(0)]);
        b.build_call(write, vec![b.param(0)]);
        b.build_ret(None);
        for level in 0..depth {
            let f = b.start_function(format!("hop{}_{}", s, level), takes_fd.clone());
            let v = b.build_load(shared);
            b.build_store(v, shared);
            b.build_call(next, vec![b.param(0)]);
            b.build_ret(None);
            next = f;
        }
        let ep = b.start_function(format!("entry{}", s), takes_fd.clone());
        b.annotate_function(ep, format!("SANDBOX_PERSISTENT_s{}", s));
        b.build_var_annotation(b.param(0), "SOAAP_FD_read");
        let secret = b.build_alloca(Type::int32());
        b.build_var_annotation(secret, format!("SANDBOX_PRIVATE_s{}", s));
        let value = b.build_load(secret);
        b.build_store(value, shared);
        b.build_call(next, vec![b.param(0)]);
        b.build_ret(None);
        entries.push(ep);
    }

    b.start_function("main", FnType::new(Type::Void, vec![]));
    for s in 0..sandboxes {
        b.build_annotation(format!("SOAAP_PERSISTENT_SANDBOX_CREATE_s{}", s));
    }
    for ep in entries {
        b.build_call(ep, vec![Value::Int(3)]);
    }
    b.build_ret(None);
    match b.finalize() {
        Ok(m) => m,
        Err(e) => panic!("bench program does not build: {}", e),
    }
}

fn bench_context_sensitive(c: &mut Criterion) {
    let module = make_program(8, 32);
    let config = AnalysisConfig::default();
    c.bench_function("infoflow_context_sensitive", |b| {
        b.iter(|| driver::run(&module, &config).map(|o| o.report.len()))
    });
}

fn bench_context_insensitive(c: &mut Criterion) {
    let module = make_program(8, 32);
    let config = AnalysisConfig {
        context_insensitive: true,
        ..Default::default()
    };
    c.bench_function("infoflow_context_insensitive", |b| {
        b.iter(|| driver::run(&module, &config).map(|o| o.report.len()))
    });
}

criterion_group!(benches, bench_context_sensitive, bench_context_insensitive);
criterion_main!(benches);
