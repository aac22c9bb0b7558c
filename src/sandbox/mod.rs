// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v2.0
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Sandbox model: discovery from annotations, membership and permissions.

pub mod annotations;
pub mod creation;
pub mod model;
pub mod profile;
pub mod registry;

pub use creation::validate_creation_points;
pub use model::SandboxModel;
pub use profile::{Region, Sandbox, SandboxId};
pub use registry::NameRegistry;
