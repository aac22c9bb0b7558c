// CLASSIFICATION: COMMUNITY
// Filename: config_cli.rs v0.1
// Date Modified: 2026-10-19
// Author: Lukas Bower

use clap::Parser;
use serial_test::serial;
use soaap::cli::{self, Cli};
use soaap::config::{self, AnalysisConfig, AnalysisKind, ReportFormat};
use soaap::ir::{FnType, IRBuilder, Module, Type, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn void() -> FnType {
    FnType::new(Type::Void, vec![])
}

fn sample_module() -> Module {
    let mut b = IRBuilder::new("cli");
    let g = b.add_global("counter", Type::int32());
    let ep = b.start_function("worker", void());
    b.annotate_function(ep, "SANDBOX_PERSISTENT_box");
    b.set_loc("worker.c", 4);
    b.build_store(Value::Int(1), g);
    b.build_ret(None);
    b.start_function("main", void());
    b.build_annotation("SOAAP_PERSISTENT_SANDBOX_CREATE_box");
    b.build_call(ep, vec![]);
    b.build_ret(None);
    b.finalize().unwrap()
}

fn write_module(dir: &Path) -> String {
    let path = dir.join("program.json");
    fs::write(&path, sample_module().to_json().unwrap()).unwrap();
    path.display().to_string()
}

fn clear_env() {
    for var in [
        "SOAAP_CONTEXT_INSENSITIVE",
        "SOAAP_PEDANTIC",
        "SOAAP_INFER_FP_TARGETS",
        "SOAAP_TRACES",
    ] {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn config_file_then_env_then_flags() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let cfg_path = dir.path().join("soaap.toml");
    fs::write(&cfg_path, "analyses = [\"globals\", \"private\"]\noutput_traces = true\n").unwrap();
    std::env::set_var("SOAAP_PEDANTIC", "yes");

    let cli = Cli::parse_from([
        "soaap",
        "program.json",
        "--config",
        cfg_path.to_str().unwrap(),
        "--context-insensitive",
    ]);
    let cfg = cli::build_config(&cli).unwrap();
    clear_env();

    assert_eq!(cfg.analyses, vec![AnalysisKind::Globals, AnalysisKind::Private]);
    assert!(cfg.output_traces);
    assert!(cfg.pedantic);
    assert!(cfg.context_insensitive);
    assert!(!cfg.infer_fp_targets);
}

#[test]
#[serial]
fn env_flags_are_case_insensitive() {
    clear_env();
    std::env::set_var("SOAAP_INFER_FP_TARGETS", "TRUE");
    std::env::set_var("SOAAP_TRACES", "0");
    let cfg = AnalysisConfig::from_env();
    clear_env();
    assert!(cfg.infer_fp_targets);
    assert!(!cfg.output_traces);
}

#[test]
#[serial]
fn malformed_config_file_is_rejected() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let cfg_path = dir.path().join("bad.toml");
    fs::write(&cfg_path, "analyses = [\"nope\"]\n").unwrap();
    assert!(AnalysisConfig::load(&cfg_path).is_err());
    assert!(AnalysisConfig::load(&dir.path().join("missing.toml")).is_err());
}

#[test]
#[serial]
fn run_renders_text_report() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let program = write_module(dir.path());
    let cli = Cli::parse_from(["soaap", program.as_str(), "--analysis", "globals"]);
    let out = cli::run(&cli).unwrap();
    assert!(out.contains("global variable \"counter\""));
    assert!(out.contains("+++ Line 4 of file worker.c"));
    assert_eq!(config::get_config().unwrap().analyses, vec![AnalysisKind::Globals]);
}

#[test]
#[serial]
fn run_renders_json_report() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let program = write_module(dir.path());
    let cli = Cli::parse_from(["soaap", program.as_str(), "--json", "--analysis", "vars"]);
    let out = cli::run(&cli).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert!(parsed["generated_at"].is_string());
    let diags = parsed["diagnostics"].as_array().unwrap();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0]["kind"], "GlobalWrite");
    assert_eq!(diags[0]["function"], "worker");
    assert_eq!(config::get_config().unwrap().report_format, ReportFormat::Json);
}

#[test]
#[serial]
fn dynamic_edges_file_must_name_known_functions() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let program = write_module(dir.path());
    let edges = dir.path().join("edges.json");
    fs::write(&edges, r#"[{"caller": "main", "call_index": 0, "callee": "ghost"}]"#).unwrap();
    let cli = Cli::parse_from([
        "soaap",
        program.as_str(),
        "--dynamic-edges",
        edges.to_str().unwrap(),
    ]);
    let err = cli::run(&cli).unwrap_err();
    assert!(format!("{:#}", err).contains("ghost"));
}

#[test]
#[serial]
fn missing_program_is_an_error() {
    clear_env();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    let cli = Cli::parse_from(["soaap", path.to_str().unwrap()]);
    let err = cli::run(&cli).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.json"));
}
