// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v2.0
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Entry point for the analysis pass framework.

pub mod manager;
pub mod traits;

pub use manager::PassManager;
pub use traits::{AnalysisPass, PassContext};
