// CLASSIFICATION: COMMUNITY
// Filename: value.rs v1.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Value handles. Every node of a [`Module`](crate::ir::Module) is addressed
//! by a dense index into the module's arenas.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

id_type!(
    /// Index of a function in [`Module::functions`](crate::ir::Module).
    FuncId
);
id_type!(BlockId);
id_type!(InstId);
id_type!(GlobalId);
id_type!(ConstId);

/// An SSA value or named program entity that dataflow facts can attach to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Function(FuncId),
    Global(GlobalId),
    /// Formal parameter `n` of a function.
    Param(FuncId, u32),
    Inst(InstId),
    Const(ConstId),
    Int(i64),
    Null,
}

impl Value {
    pub fn as_inst(self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_function(self) -> Option<FuncId> {
        match self {
            Value::Function(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_global(self) -> Option<GlobalId> {
        match self {
            Value::Global(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_constant(self) -> bool {
        matches!(
            self,
            Value::Const(_) | Value::Int(_) | Value::Null | Value::Function(_) | Value::Global(_)
        )
    }
}

impl From<InstId> for Value {
    fn from(id: InstId) -> Self {
        Value::Inst(id)
    }
}

impl From<FuncId> for Value {
    fn from(id: FuncId) -> Self {
        Value::Function(id)
    }
}

impl From<GlobalId> for Value {
    fn from(id: GlobalId) -> Self {
        Value::Global(id)
    }
}

/// Something that holds a reference to a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum User {
    Inst(InstId),
    Const(ConstId),
}

/// Debug location attached to instructions, functions and globals.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

impl SourceLoc {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        SourceLoc {
            file: file.into(),
            line,
        }
    }

    /// File name without leading directories.
    pub fn file_name(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}
