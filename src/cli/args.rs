// CLASSIFICATION: COMMUNITY
// Filename: args.rs v2.0
// Date Modified: 2026-10-19
// Author: Lukas Bower

use clap::Parser;
use std::path::PathBuf;

/// Command line of the `soaap` checker.
#[derive(Parser, Debug)]
#[command(name = "soaap", about = "Check sandboxing annotations of a program model", version = "0.1")]
pub struct Cli {
    /// Program model in JSON form.
    pub program: PathBuf,
    /// Analyses to run (globals, syscalls, classified, private, privileged_calls,
    /// access_origin, creation_points). Defaults to all.
    #[arg(long = "analysis", value_name = "KIND")]
    pub analyses: Vec<String>,
    #[arg(long)]
    pub context_insensitive: bool,
    /// Report every occurrence of a violation.
    #[arg(long)]
    pub pedantic: bool,
    #[arg(long)]
    pub infer_fp_targets: bool,
    /// Attach call traces to diagnostics.
    #[arg(long)]
    pub traces: bool,
    #[arg(long)]
    pub json: bool,
    /// TOML file with analysis options; flags override it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// JSON list of profiling call edges.
    #[arg(long, value_name = "FILE")]
    pub dynamic_edges: Option<PathBuf>,
}
