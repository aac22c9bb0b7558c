// CLASSIFICATION: COMMUNITY
// Filename: instruction.rs v1.2
// Date Modified: 2026-10-19
// Author: Lukas Bower

//! Core instruction representation of the program model.

use crate::ir::ty::{FnType, Type};
use crate::ir::value::{BlockId, FuncId, SourceLoc, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operation performed by an instruction, with its operands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Opcode {
    Nop,
    /// Stack slot holding a value of type `allocated`.
    Alloca { allocated: Type },
    Load { ptr: Value },
    Store { value: Value, ptr: Value },
    /// Address computation into an aggregate.
    Gep { base: Value, indices: Vec<Value> },
    Cast { value: Value },
    Call {
        callee: Value,
        args: Vec<Value>,
        sig: FnType,
    },
    Ret { value: Option<Value> },
    Br { targets: Vec<BlockId> },
    Phi { incoming: Vec<(Value, BlockId)> },
    Select {
        cond: Value,
        on_true: Value,
        on_false: Value,
    },
    Binary { lhs: Value, rhs: Value },
    /// Pointer annotation intrinsic. Its result aliases `ptr`.
    PtrAnnotation { ptr: Value, annotation: String },
    /// Local variable annotation intrinsic.
    VarAnnotation { var: Value, annotation: String },
    /// Free-standing annotation marker in the instruction stream.
    Annotation { annotation: String },
}

/// A single instruction. Its result, when it has one, is `Value::Inst(id)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    #[serde(default)]
    pub ty: Option<Type>,
    #[serde(default)]
    pub loc: Option<SourceLoc>,
    /// Owning function and block, filled in when inserted into a module.
    #[serde(skip, default = "detached_parent")]
    pub parent: (FuncId, BlockId),
}

fn detached_parent() -> (FuncId, BlockId) {
    (FuncId(u32::MAX), BlockId(u32::MAX))
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Instruction {
            opcode,
            ty: None,
            loc: None,
            parent: detached_parent(),
        }
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn at(mut self, loc: SourceLoc) -> Self {
        self.loc = Some(loc);
        self
    }

    pub fn function(&self) -> FuncId {
        self.parent.0
    }

    pub fn block(&self) -> BlockId {
        self.parent.1
    }

    pub fn is_call(&self) -> bool {
        matches!(self.opcode, Opcode::Call { .. })
    }

    pub fn is_terminator(&self) -> bool {
        matches!(self.opcode, Opcode::Ret { .. } | Opcode::Br { .. })
    }

    /// Blocks this instruction names: branch targets and phi predecessors.
    pub fn block_targets(&self) -> Vec<BlockId> {
        match &self.opcode {
            Opcode::Br { targets } => targets.clone(),
            Opcode::Phi { incoming } => incoming.iter().map(|(_, b)| *b).collect(),
            _ => Vec::new(),
        }
    }

    /// Every value read by this instruction, in operand order.
    pub fn operands(&self) -> Vec<Value> {
        match &self.opcode {
            Opcode::Nop | Opcode::Alloca { .. } | Opcode::Br { .. } | Opcode::Annotation { .. } => {
                Vec::new()
            }
            Opcode::Load { ptr } => vec![*ptr],
            Opcode::Store { value, ptr } => vec![*value, *ptr],
            Opcode::Gep { base, indices } => {
                let mut ops = vec![*base];
                ops.extend(indices.iter().copied());
                ops
            }
            Opcode::Cast { value } => vec![*value],
            Opcode::Call { callee, args, .. } => {
                let mut ops = vec![*callee];
                ops.extend(args.iter().copied());
                ops
            }
            Opcode::Ret { value } => value.iter().copied().collect(),
            Opcode::Phi { incoming } => incoming.iter().map(|(v, _)| *v).collect(),
            Opcode::Select {
                cond,
                on_true,
                on_false,
            } => vec![*cond, *on_true, *on_false],
            Opcode::Binary { lhs, rhs } => vec![*lhs, *rhs],
            Opcode::PtrAnnotation { ptr, .. } => vec![*ptr],
            Opcode::VarAnnotation { var, .. } => vec![*var],
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.opcode {
            Opcode::Call { callee, args, .. } => write!(f, "call {:?}({:?})", callee, args),
            Opcode::PtrAnnotation { annotation, .. }
            | Opcode::VarAnnotation { annotation, .. }
            | Opcode::Annotation { annotation } => write!(f, "annotation \"{}\"", annotation),
            other => write!(f, "{:?}", other),
        }
    }
}
