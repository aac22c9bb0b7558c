// CLASSIFICATION: COMMUNITY
// Filename: module.rs v1.2
// Date Modified: 2026-10-19
// Author: Lukas Bower

//! The IR Module: arenas for every program entity plus the derived
//! use-list index the dataflow engines walk.

use crate::error::{SoaapError, SoaapResult};
use crate::ir::block::Block;
use crate::ir::function::Function;
use crate::ir::instruction::{Instruction, Opcode};
use crate::ir::ty::Type;
use crate::ir::value::{BlockId, ConstId, FuncId, GlobalId, InstId, SourceLoc, User, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A global variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub initializer: Option<Value>,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub loc: Option<SourceLoc>,
    /// Defined outside the module.
    #[serde(default)]
    pub external: bool,
}

impl Global {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Global {
            name: name.into(),
            ty,
            initializer: None,
            annotations: Vec::new(),
            loc: None,
            external: false,
        }
    }
}

/// Compile-time constant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Str(String),
    /// Array or struct literal.
    Aggregate(Vec<Value>),
    /// Constant cast or address expression over another value.
    Expr(Value),
}

/// A compilation unit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub insts: Vec<Instruction>,
    #[serde(default)]
    pub globals: Vec<Global>,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(skip)]
    users: HashMap<Value, Vec<User>>,
    #[serde(skip)]
    by_name: HashMap<String, FuncId>,
}

impl Module {
    /// Creates a new empty Module with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Deserialize a module and rebuild its derived indexes.
    pub fn from_json(text: &str) -> SoaapResult<Self> {
        let mut module: Module = serde_json::from_str(text)?;
        module.rebuild_index()?;
        Ok(module)
    }

    pub fn to_json(&self) -> SoaapResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Recompute parent links, the name table and the use-lists.
    /// Must be called after any structural edit.
    pub fn rebuild_index(&mut self) -> SoaapResult<()> {
        self.by_name.clear();
        self.users.clear();
        let mut placed = vec![false; self.insts.len()];
        for (fi, func) in self.functions.iter().enumerate() {
            let fid = FuncId(fi as u32);
            self.by_name.insert(func.name.clone(), fid);
            for &bid in &func.blocks {
                let block = self.blocks.get_mut(bid.index()).ok_or_else(|| {
                    SoaapError::MalformedModule(format!("{} references missing block {}", func.name, bid.0))
                })?;
                block.function = fid;
                for &iid in &block.insts {
                    let inst = self.insts.get_mut(iid.index()).ok_or_else(|| {
                        SoaapError::MalformedModule(format!("block {} references missing instruction {}", bid.0, iid.0))
                    })?;
                    inst.parent = (fid, bid);
                    placed[iid.index()] = true;
                }
            }
        }
        if let Some(orphan) = placed.iter().position(|p| !p) {
            return Err(SoaapError::MalformedModule(format!("instruction {} is not in any block", orphan)));
        }
        for (ii, inst) in self.insts.iter().enumerate() {
            for target in inst.block_targets() {
                let owned = self
                    .blocks
                    .get(target.index())
                    .map_or(false, |b| b.function == inst.function());
                if !owned {
                    return Err(SoaapError::MalformedModule(format!(
                        "instruction {} refers to block {} outside its function",
                        ii, target.0
                    )));
                }
            }
            let mut ops = inst.operands();
            ops.sort();
            ops.dedup();
            for op in ops {
                self.check_value(op)?;
                self.users.entry(op).or_default().push(User::Inst(InstId(ii as u32)));
            }
        }
        for (ci, c) in self.constants.iter().enumerate() {
            let mut ops = match c {
                Constant::Str(_) => Vec::new(),
                Constant::Aggregate(vals) => vals.clone(),
                Constant::Expr(v) => vec![*v],
            };
            ops.sort();
            ops.dedup();
            for op in ops {
                self.check_value(op)?;
                self.users.entry(op).or_default().push(User::Const(ConstId(ci as u32)));
            }
        }
        Ok(())
    }

    fn check_value(&self, v: Value) -> SoaapResult<()> {
        let ok = match v {
            Value::Function(f) => f.index() < self.functions.len(),
            Value::Global(g) => g.index() < self.globals.len(),
            Value::Param(f, n) => self
                .functions
                .get(f.index())
                .map_or(false, |func| (n as usize) < func.param_count()),
            Value::Inst(i) => i.index() < self.insts.len(),
            Value::Const(c) => c.index() < self.constants.len(),
            Value::Int(_) | Value::Null => true,
        };
        if ok {
            Ok(())
        } else {
            Err(SoaapError::MalformedModule(format!("dangling value {:?}", v)))
        }
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id.index()]
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    pub fn constant(&self, id: ConstId) -> &Constant {
        &self.constants[id.index()]
    }

    pub fn function_ids(&self) -> impl Iterator<Item = FuncId> {
        (0..self.functions.len() as u32).map(FuncId)
    }

    pub fn global_ids(&self) -> impl Iterator<Item = GlobalId> {
        (0..self.globals.len() as u32).map(GlobalId)
    }

    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.by_name.get(name).copied()
    }

    pub fn global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.globals
            .iter()
            .position(|g| g.name == name)
            .map(|i| GlobalId(i as u32))
    }

    /// Instructions and constants that read `v`. Each instruction appears once.
    pub fn users(&self, v: Value) -> &[User] {
        self.users.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All instructions of `f` in block order.
    pub fn instructions(&self, f: FuncId) -> impl Iterator<Item = InstId> + '_ {
        self.function(f)
            .blocks
            .iter()
            .flat_map(move |b| self.block(*b).insts.iter().copied())
    }

    pub fn enclosing_function(&self, inst: InstId) -> FuncId {
        self.inst(inst).function()
    }

    /// Look through value casts and constant expressions.
    pub fn strip_casts(&self, mut v: Value) -> Value {
        loop {
            v = match v {
                Value::Inst(id) => match &self.inst(id).opcode {
                    Opcode::Cast { value } => *value,
                    _ => return v,
                },
                Value::Const(id) => match self.constant(id) {
                    Constant::Expr(inner) => *inner,
                    _ => return v,
                },
                _ => return v,
            };
        }
    }

    /// Whether `f` is used other than as the callee of a direct call.
    pub fn address_taken(&self, f: FuncId) -> bool {
        let fv = Value::Function(f);
        if self.globals.iter().any(|g| g.initializer == Some(fv)) {
            return true;
        }
        self.users(fv).iter().any(|u| match u {
            User::Const(_) => true,
            User::Inst(id) => match &self.inst(*id).opcode {
                Opcode::Call { callee, args, .. } => *callee != fv || args.contains(&fv),
                _ => true,
            },
        })
    }

    pub fn successors(&self, b: BlockId) -> Vec<BlockId> {
        self.block(b)
            .terminator()
            .map(|t| match &self.inst(t).opcode {
                Opcode::Br { targets } => targets.clone(),
                _ => Vec::new(),
            })
            .unwrap_or_default()
    }

    pub fn predecessors(&self, b: BlockId) -> Vec<BlockId> {
        let func = self.block(b).function;
        self.function(func)
            .blocks
            .iter()
            .copied()
            .filter(|p| self.successors(*p).contains(&b))
            .collect()
    }

    /// Instructions that may execute immediately after `inst`.
    pub fn inst_successors(&self, inst: InstId) -> Vec<InstId> {
        let block = self.block(self.inst(inst).block());
        match block.insts.iter().position(|i| *i == inst) {
            Some(pos) if pos + 1 < block.insts.len() => vec![block.insts[pos + 1]],
            _ => self
                .successors(self.inst(inst).block())
                .into_iter()
                .filter_map(|b| self.block(b).first())
                .collect(),
        }
    }

    /// Entry-block stack slot of type `va_list`, the stand-in for a
    /// variadic function's extra arguments.
    pub fn va_list_slot(&self, f: FuncId) -> Option<InstId> {
        let entry = self.function(f).entry_block()?;
        self.block(entry).insts.iter().copied().find(|i| {
            matches!(
                &self.inst(*i).opcode,
                Opcode::Alloca { allocated: Type::VaList }
            )
        })
    }

    /// Source location of an instruction, function or global, if known.
    pub fn loc_of(&self, v: Value) -> Option<&SourceLoc> {
        match v {
            Value::Inst(i) => self.inst(i).loc.as_ref(),
            Value::Function(f) | Value::Param(f, _) => self.function(f).loc.as_ref(),
            Value::Global(g) => self.global(g).loc.as_ref(),
            _ => None,
        }
    }

    /// Human-readable name of a value for diagnostics.
    pub fn value_name(&self, v: Value) -> String {
        match v {
            Value::Function(f) => self.function(f).name.clone(),
            Value::Global(g) => self.global(g).name.clone(),
            Value::Param(f, n) => {
                let func = self.function(f);
                func.params
                    .get(n as usize)
                    .cloned()
                    .unwrap_or_else(|| format!("{}#arg{}", func.name, n))
            }
            Value::Inst(i) => format!("%{}", i.0),
            Value::Const(c) => match self.constant(c) {
                Constant::Str(s) => format!("{:?}", s),
                _ => format!("const#{}", c.0),
            },
            Value::Int(n) => n.to_string(),
            Value::Null => "null".into(),
        }
    }

    /// Calls to the function named `name`.
    pub fn calls_to(&self, name: &str) -> Vec<InstId> {
        match self.function_by_name(name) {
            Some(f) => self
                .users(Value::Function(f))
                .iter()
                .filter_map(|u| match u {
                    User::Inst(id) => match &self.inst(*id).opcode {
                        Opcode::Call { callee, .. } if *callee == Value::Function(f) => Some(*id),
                        _ => None,
                    },
                    User::Const(_) => None,
                })
                .collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::IRBuilder;
    use crate::ir::ty::FnType;

    #[test]
    fn users_are_deduplicated_per_instruction() {
        let mut b = IRBuilder::new("m");
        let f = b.start_function("f", FnType::new(Type::Void, vec![Type::int32()]));
        let x = b.param(0);
        let sum = b.build_binary(x, x);
        b.build_ret(None);
        let m = b.finalize().unwrap();
        assert_eq!(m.users(Value::Param(f, 0)), &[User::Inst(sum)]);
    }

    #[test]
    fn json_roundtrip_rebuilds_index() {
        let mut b = IRBuilder::new("m");
        let callee = b.declare_function("g", FnType::new(Type::Void, vec![]));
        b.start_function("main", FnType::new(Type::int32(), vec![]));
        let call = b.build_call(callee, vec![]);
        b.build_ret(Some(Value::Int(0)));
        let m = b.finalize().unwrap();
        let text = m.to_json().unwrap();
        let back = Module::from_json(&text).unwrap();
        assert_eq!(back.function_by_name("main"), Some(FuncId(1)));
        assert_eq!(back.calls_to("g"), vec![call]);
        assert!(!back.address_taken(callee));
    }

    fn single_block_json(terminator: &str) -> String {
        format!(
            r#"{{"name":"m","functions":[{{"name":"main","ty":{{"ret":"Void","params":[]}},"blocks":[0]}}],
                "blocks":[{{"label":"entry","insts":[0]}}],
                "insts":[{{"opcode":{}}}]}}"#,
            terminator
        )
    }

    #[test]
    fn branch_targets_must_exist() {
        assert!(Module::from_json(&single_block_json(r#"{"Br":{"targets":[0]}}"#)).is_ok());
        let err = Module::from_json(&single_block_json(r#"{"Br":{"targets":[99]}}"#)).unwrap_err();
        assert!(matches!(err, SoaapError::MalformedModule(_)));
        let phi = r#"{"Phi":{"incoming":[[{"Int":1},7]]}}"#;
        assert!(matches!(Module::from_json(&single_block_json(phi)), Err(SoaapError::MalformedModule(_))));
    }

    #[test]
    fn instruction_outside_blocks_is_rejected() {
        let mut b = IRBuilder::new("m");
        b.start_function("main", FnType::new(Type::Void, vec![]));
        b.build_ret(None);
        let mut m = b.finalize().unwrap();
        m.insts.push(Instruction::new(Opcode::Nop));
        assert!(matches!(m.rebuild_index(), Err(SoaapError::MalformedModule(_))));
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let text = r#"{"name":"m","insts":[{"opcode":{"Load":{"ptr":{"Inst":7}}}}]}"#;
        assert!(matches!(Module::from_json(text), Err(SoaapError::MalformedModule(_))));
    }
}
