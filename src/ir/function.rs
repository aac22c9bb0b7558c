// CLASSIFICATION: COMMUNITY
// Filename: function.rs v1.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Function IR node: owns its blocks and annotation metadata.

use crate::ir::ty::FnType;
use crate::ir::value::{BlockId, SourceLoc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub ty: FnType,
    /// Parameter names, positionally matching `ty.params`.
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<BlockId>,
    /// Source-level annotation strings attached to the function.
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub loc: Option<SourceLoc>,
}

impl Function {
    /// Create a body-less function with the given name and signature.
    pub fn new(name: impl Into<String>, ty: FnType) -> Self {
        Function {
            name: name.into(),
            ty,
            params: Vec::new(),
            blocks: Vec::new(),
            annotations: Vec::new(),
            loc: None,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry_block(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }

    pub fn param_count(&self) -> usize {
        self.ty.params.len()
    }

    pub fn has_annotation(&self, prefix: &str) -> bool {
        self.annotations.iter().any(|a| a.starts_with(prefix))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_declaration() {
            write!(f, "declare {} @{}", self.ty, self.name)
        } else {
            write!(f, "define {} @{} ({} blocks)", self.ty, self.name, self.blocks.len())
        }
    }
}
