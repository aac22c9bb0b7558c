// CLASSIFICATION: COMMUNITY
// Filename: lib.rs v2.0
// Date Modified: 2026-10-19
// Author: Lukas Bower

//! Sandbox annotation checker.
//!
//! A program model ([`ir::Module`]) carries sandboxing annotations. The
//! [`sandbox::SandboxModel`] derives the sandboxes from them, and the
//! analyses in [`infoflow`], [`cfgflow`] and [`analysis`] report every way
//! the program breaks what the annotations promise. [`driver::run`] ties a
//! complete run together.

/// Program model: arena IR, builder and JSON loading
pub mod ir;

/// Call edges, including ones discovered while analysing
pub mod call_graph;

/// Execution contexts of instructions and functions
pub mod context;

/// Sandbox discovery and membership
pub mod sandbox;

/// Context-sensitive information-flow engine and its analyses
pub mod infoflow;

/// Control-flow analyses over basic blocks
pub mod cfgflow;

/// Checks without a dataflow engine
pub mod analysis;

/// Analysis pass framework and the registered passes
pub mod pass_framework;
pub mod passes;

/// Diagnostics and reports
pub mod validator;

pub mod config;
pub mod error;
pub mod syscalls;

/// Complete checker run
pub mod driver;

/// CLI interface for the checker binary
pub mod cli;

pub use error::{SoaapError, SoaapResult};
