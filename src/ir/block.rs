// CLASSIFICATION: COMMUNITY
// Filename: block.rs v1.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

use crate::ir::value::{FuncId, InstId};
use serde::{Deserialize, Serialize};

/// Block: sequence of instructions with single entry and terminator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub label: String,
    pub insts: Vec<InstId>,
    #[serde(skip, default = "detached")]
    pub function: FuncId,
}

fn detached() -> FuncId {
    FuncId(u32::MAX)
}

impl Block {
    pub fn first(&self) -> Option<InstId> {
        self.insts.first().copied()
    }

    pub fn terminator(&self) -> Option<InstId> {
        self.insts.last().copied()
    }
}
