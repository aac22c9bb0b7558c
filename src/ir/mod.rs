// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v1.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Program model root module.
//! Re-exports the arena handles, instructions, functions and the module container.

pub mod block;
pub mod builder;
pub mod function;
pub mod instruction;
pub mod module;
pub mod ops;
pub mod ty;
pub mod value;

pub use block::Block;
pub use builder::IRBuilder;
pub use function::Function;
pub use instruction::{Instruction, Opcode};
pub use module::{Constant, Global, Module};
pub use ty::{FnType, Type};
pub use value::{BlockId, ConstId, FuncId, GlobalId, InstId, SourceLoc, User, Value};
