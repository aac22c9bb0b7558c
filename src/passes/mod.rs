// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v2.0
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Analysis passes and their registry.

pub mod pass_registry;
pub mod wrappers;

pub use pass_registry::PassRegistry;
pub use wrappers::{CfgFlowPass, InfoFlowPass};
