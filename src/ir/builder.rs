// CLASSIFICATION: COMMUNITY
// Filename: builder.rs v1.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

/// IRBuilder for constructing Modules and Functions.
use crate::error::SoaapResult;
use crate::ir::block::Block;
use crate::ir::function::Function;
use crate::ir::instruction::{Instruction, Opcode};
use crate::ir::module::{Constant, Global, Module};
use crate::ir::ty::{FnType, Type};
use crate::ir::value::{BlockId, ConstId, FuncId, GlobalId, InstId, SourceLoc, Value};

/// Helper for incrementally building IR modules.
pub struct IRBuilder {
    module: Module,
    current: Option<FuncId>,
    insert_at: Option<BlockId>,
    loc: Option<SourceLoc>,
}

impl IRBuilder {
    /// Create a new builder for a module with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        IRBuilder {
            module: Module::new(name),
            current: None,
            insert_at: None,
            loc: None,
        }
    }

    /// Add a body-less function.
    pub fn declare_function(&mut self, name: impl Into<String>, ty: FnType) -> FuncId {
        let id = FuncId(self.module.functions.len() as u32);
        self.module.functions.push(Function::new(name, ty));
        id
    }

    /// Begin emitting a new function with an `entry` block.
    pub fn start_function(&mut self, name: impl Into<String>, ty: FnType) -> FuncId {
        let id = self.declare_function(name, ty);
        self.current = Some(id);
        let entry = self.add_block("entry");
        self.position_at(entry);
        id
    }

    /// Re-open a previously started function for further emission.
    pub fn resume_function(&mut self, f: FuncId) {
        self.current = Some(f);
        self.insert_at = self.module.functions[f.index()].blocks.last().copied();
    }

    pub fn add_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.module.blocks.len() as u32);
        let function = self.current.unwrap_or(FuncId(u32::MAX));
        self.module.blocks.push(Block {
            label: label.into(),
            insts: Vec::new(),
            function,
        });
        if let Some(f) = self.current {
            self.module.functions[f.index()].blocks.push(id);
        }
        id
    }

    pub fn position_at(&mut self, block: BlockId) {
        self.insert_at = Some(block);
    }

    /// Debug location applied to subsequently emitted instructions.
    pub fn set_loc(&mut self, file: &str, line: u32) {
        self.loc = Some(SourceLoc::new(file, line));
    }

    /// Formal parameter `n` of the current function.
    pub fn param(&self, n: u32) -> Value {
        Value::Param(self.current.unwrap_or(FuncId(u32::MAX)), n)
    }

    pub fn current_function(&self) -> Option<FuncId> {
        self.current
    }

    pub fn annotate_function(&mut self, f: FuncId, annotation: impl Into<String>) {
        self.module.functions[f.index()].annotations.push(annotation.into());
    }

    pub fn set_param_names(&mut self, f: FuncId, names: &[&str]) {
        self.module.functions[f.index()].params = names.iter().map(|s| s.to_string()).collect();
    }

    pub fn add_global(&mut self, name: impl Into<String>, ty: Type) -> GlobalId {
        let id = GlobalId(self.module.globals.len() as u32);
        let mut global = Global::new(name, ty);
        global.loc = self.loc.clone();
        self.module.globals.push(global);
        id
    }

    pub fn annotate_global(&mut self, g: GlobalId, annotation: impl Into<String>) {
        self.module.globals[g.index()].annotations.push(annotation.into());
    }

    pub fn set_initializer(&mut self, g: GlobalId, init: Value) {
        self.module.globals[g.index()].initializer = Some(init);
    }

    pub fn add_constant(&mut self, c: Constant) -> ConstId {
        let id = ConstId(self.module.constants.len() as u32);
        self.module.constants.push(c);
        id
    }

    /// Emit an instruction at the insertion block.
    pub fn emit(&mut self, opcode: Opcode) -> InstId {
        let id = InstId(self.module.insts.len() as u32);
        let mut inst = Instruction::new(opcode);
        inst.loc = self.loc.clone();
        if let (Some(f), Some(b)) = (self.current, self.insert_at) {
            inst.parent = (f, b);
            self.module.blocks[b.index()].insts.push(id);
        }
        self.module.insts.push(inst);
        id
    }

    pub fn build_alloca(&mut self, allocated: Type) -> InstId {
        let id = self.emit(Opcode::Alloca {
            allocated: allocated.clone(),
        });
        self.module.insts[id.index()].ty = Some(Type::ptr_to(allocated));
        id
    }

    pub fn build_load(&mut self, ptr: impl Into<Value>) -> InstId {
        self.emit(Opcode::Load { ptr: ptr.into() })
    }

    pub fn build_store(&mut self, value: impl Into<Value>, ptr: impl Into<Value>) -> InstId {
        self.emit(Opcode::Store {
            value: value.into(),
            ptr: ptr.into(),
        })
    }

    pub fn build_gep(&mut self, base: impl Into<Value>, indices: Vec<Value>) -> InstId {
        self.emit(Opcode::Gep {
            base: base.into(),
            indices,
        })
    }

    pub fn build_cast(&mut self, value: impl Into<Value>) -> InstId {
        self.emit(Opcode::Cast {
            value: value.into(),
        })
    }

    /// Direct call; the call-site signature is the callee's own.
    pub fn build_call(&mut self, callee: FuncId, args: Vec<Value>) -> InstId {
        let sig = self.module.functions[callee.index()].ty.clone();
        self.emit(Opcode::Call {
            callee: Value::Function(callee),
            args,
            sig,
        })
    }

    /// Call through a function pointer.
    pub fn build_indirect_call(&mut self, callee: impl Into<Value>, sig: FnType, args: Vec<Value>) -> InstId {
        self.emit(Opcode::Call {
            callee: callee.into(),
            args,
            sig,
        })
    }

    pub fn build_ret(&mut self, value: Option<Value>) -> InstId {
        self.emit(Opcode::Ret { value })
    }

    pub fn build_br(&mut self, targets: Vec<BlockId>) -> InstId {
        self.emit(Opcode::Br { targets })
    }

    pub fn build_phi(&mut self, incoming: Vec<(Value, BlockId)>) -> InstId {
        self.emit(Opcode::Phi { incoming })
    }

    pub fn build_select(&mut self, cond: Value, on_true: Value, on_false: Value) -> InstId {
        self.emit(Opcode::Select {
            cond,
            on_true,
            on_false,
        })
    }

    pub fn build_binary(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> InstId {
        self.emit(Opcode::Binary {
            lhs: lhs.into(),
            rhs: rhs.into(),
        })
    }

    pub fn build_ptr_annotation(&mut self, ptr: impl Into<Value>, annotation: impl Into<String>) -> InstId {
        self.emit(Opcode::PtrAnnotation {
            ptr: ptr.into(),
            annotation: annotation.into(),
        })
    }

    pub fn build_var_annotation(&mut self, var: impl Into<Value>, annotation: impl Into<String>) -> InstId {
        self.emit(Opcode::VarAnnotation {
            var: var.into(),
            annotation: annotation.into(),
        })
    }

    pub fn build_annotation(&mut self, annotation: impl Into<String>) -> InstId {
        self.emit(Opcode::Annotation {
            annotation: annotation.into(),
        })
    }

    /// Finish the current function.
    pub fn finish_function(&mut self) {
        self.current = None;
        self.insert_at = None;
    }

    /// Finalize and return the built module with its indexes populated.
    pub fn finalize(mut self) -> SoaapResult<Module> {
        self.finish_function();
        self.module.rebuild_index()?;
        Ok(self.module)
    }
}
