// CLASSIFICATION: COMMUNITY
// Filename: ops.rs v1.2
// Date Modified: 2026-10-19
// Author: Lukas Bower

/// Opcode naming and classification helpers.
use crate::ir::Opcode;

/// Returns a display-friendly mnemonic for an Opcode.
pub fn opcode_name(op: &Opcode) -> &'static str {
    match op {
        Opcode::Nop => "nop",
        Opcode::Alloca { .. } => "alloca",
        Opcode::Load { .. } => "load",
        Opcode::Store { .. } => "store",
        Opcode::Gep { .. } => "getelementptr",
        Opcode::Cast { .. } => "cast",
        Opcode::Call { .. } => "call",
        Opcode::Ret { .. } => "ret",
        Opcode::Br { .. } => "br",
        Opcode::Phi { .. } => "phi",
        Opcode::Select { .. } => "select",
        Opcode::Binary { .. } => "binop",
        Opcode::PtrAnnotation { .. } => "ptr.annotation",
        Opcode::VarAnnotation { .. } => "var.annotation",
        Opcode::Annotation { .. } => "annotation",
    }
}

/// Represents a high-level category for grouping opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpcodeCategory {
    Arithmetic,
    Memory,
    ControlFlow,
    Merge,
    Meta,
}

/// Returns the category of a given opcode.
pub fn categorize(op: &Opcode) -> OpcodeCategory {
    match op {
        Opcode::Binary { .. } => OpcodeCategory::Arithmetic,
        Opcode::Alloca { .. } | Opcode::Load { .. } | Opcode::Store { .. } | Opcode::Gep { .. } | Opcode::Cast { .. } => {
            OpcodeCategory::Memory
        }
        Opcode::Call { .. } | Opcode::Ret { .. } | Opcode::Br { .. } => OpcodeCategory::ControlFlow,
        Opcode::Phi { .. } | Opcode::Select { .. } => OpcodeCategory::Merge,
        Opcode::Nop | Opcode::PtrAnnotation { .. } | Opcode::VarAnnotation { .. } | Opcode::Annotation { .. } => {
            OpcodeCategory::Meta
        }
    }
}
