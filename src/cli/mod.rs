// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v2.0
// Date Modified: 2026-10-19
// Author: Lukas Bower

//! CLI for the checker: option merging, program loading and report output.

pub mod args;

pub use args::Cli;

use crate::call_graph::DynamicEdge;
use crate::config::{self, AnalysisConfig, AnalysisKind, ReportFormat};
use crate::driver;
use crate::ir::Module;
use anyhow::Context as _;
use std::fs;

/// Defaults, then the TOML file, then `SOAAP_*` variables, then flags.
pub fn build_config(cli: &Cli) -> anyhow::Result<AnalysisConfig> {
    let mut cfg = match &cli.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    cfg.apply_env();
    if !cli.analyses.is_empty() {
        cfg.analyses = cli
            .analyses
            .iter()
            .map(|a| a.parse::<AnalysisKind>())
            .collect::<Result<_, _>>()?;
    }
    cfg.context_insensitive |= cli.context_insensitive;
    cfg.pedantic |= cli.pedantic;
    cfg.infer_fp_targets |= cli.infer_fp_targets;
    cfg.output_traces |= cli.traces;
    if cli.json {
        cfg.report_format = ReportFormat::Json;
    }
    Ok(cfg)
}

/// Run the checker and return the rendered report.
pub fn run(cli: &Cli) -> anyhow::Result<String> {
    let cfg = build_config(cli)?;
    config::set_config(cfg.clone())?;

    let text = fs::read_to_string(&cli.program)
        .with_context(|| format!("reading {}", cli.program.display()))?;
    let module = Module::from_json(&text)?;
    let edges: Vec<DynamicEdge> = match &cli.dynamic_edges {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&raw)?
        }
        None => Vec::new(),
    };

    let outcome = driver::run_with_edges(&module, &cfg, &edges)?;
    Ok(match cfg.report_format {
        ReportFormat::Text => outcome.report.render_text(),
        ReportFormat::Json => outcome.report.to_json()?,
    })
}
