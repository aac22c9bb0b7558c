// CLASSIFICATION: COMMUNITY
// Filename: model.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Whole-program sandbox discovery and the queries the analyses ask of it.

use crate::call_graph::CallGraph;
use crate::error::SoaapResult;
use crate::ir::{FuncId, InstId, Module, Opcode};
use crate::sandbox::annotations;
use crate::sandbox::profile::{Region, Sandbox, SandboxId};
use crate::sandbox::registry::NameRegistry;
use crate::validator::{Diagnostic, DiagnosticKind, Report};
use log::{info, warn};
use std::collections::{HashMap, HashSet};

pub struct SandboxModel {
    sandboxes: Vec<Sandbox>,
    names: NameRegistry,
    classes: NameRegistry,
    entry_points: HashMap<FuncId, SandboxId>,
    privileged: Vec<FuncId>,
    privileged_set: HashSet<FuncId>,
}

impl SandboxModel {
    /// Read every sandbox-related annotation in `module` and build the
    /// model. Inconsistent annotations are warned about and recorded in
    /// `report`; only name-space exhaustion is a hard error.
    pub fn discover(module: &Module, cg: &CallGraph, report: &mut Report) -> SoaapResult<Self> {
        let mut model = SandboxModel {
            sandboxes: Vec::new(),
            names: NameRegistry::new("sandbox"),
            classes: NameRegistry::new("classification"),
            entry_points: HashMap::new(),
            privileged: Vec::new(),
            privileged_set: HashSet::new(),
        };
        model.find_entry_point_sandboxes(module, report)?;
        model.find_region_sandboxes(module, report)?;
        model.find_referenced_sandboxes(module)?;
        model.register_classes(module)?;
        model.reinit(module, cg);
        info!(
            "discovered {} sandboxes, {} privileged methods",
            model.sandboxes.len(),
            model.privileged.len()
        );
        Ok(model)
    }

    fn sandbox_named(&mut self, name: &str, persistent: bool) -> SoaapResult<SandboxId> {
        if let Some(id) = self.names.get(name) {
            return Ok(id);
        }
        let id = self.names.assign(name)?;
        info!("found sandbox {:?} (index {})", name, id);
        self.sandboxes.push(Sandbox::new(id, name, persistent));
        Ok(id)
    }

    fn find_entry_point_sandboxes(&mut self, module: &Module, report: &mut Report) -> SoaapResult<()> {
        for f in module.function_ids() {
            let func = module.function(f);
            let mut overhead = None;
            let mut clearances = 0u32;
            for a in &func.annotations {
                if let Some((name, persistent)) = annotations::parse_entry_point(a) {
                    if let Some(&existing) = self.entry_points.get(&f) {
                        let owner = self.sandboxes[existing].name.clone();
                        if owner != name {
                            warn!(
                                "{} is already an entry point of sandbox {:?}, ignoring {:?}",
                                func.name, owner, a
                            );
                            report.push(
                                Diagnostic::new(
                                    DiagnosticKind::AnnotationConflict,
                                    format!(
                                        "Function \"{}\" is already an entry point of sandbox \"{}\", ignoring annotation for sandbox \"{}\"",
                                        func.name, owner, name
                                    ),
                                )
                                .in_function(func.name.clone())
                                .with_sandboxes(vec![owner, name.to_string()])
                                .at(func.loc.as_ref())
                                .about(a.clone()),
                            );
                        }
                        continue;
                    }
                    let id = self.sandbox_named(name, persistent)?;
                    let sandbox = &mut self.sandboxes[id];
                    sandbox.persistent &= persistent;
                    sandbox.entry_points.insert(f);
                    self.entry_points.insert(f, id);
                } else if let Some(pct) = annotations::parse_overhead(a) {
                    overhead = Some(pct);
                } else if let Some(class) = a.strip_prefix(annotations::CLEARANCE) {
                    clearances |= 1 << self.classes.assign(class)?;
                }
            }
            if let Some(&id) = self.entry_points.get(&f) {
                let sandbox = &mut self.sandboxes[id];
                sandbox.clearances |= clearances;
                if let Some(pct) = overhead {
                    sandbox.overhead = pct;
                }
            }
        }
        Ok(())
    }

    fn find_region_sandboxes(&mut self, module: &Module, report: &mut Report) -> SoaapResult<()> {
        for f in module.function_ids() {
            let insts: Vec<InstId> = module.instructions(f).collect();
            for (pos, &inst) in insts.iter().enumerate() {
                let Opcode::Annotation { annotation } = &module.inst(inst).opcode else {
                    continue;
                };
                let Some(name) = annotation.strip_prefix(annotations::REGION_START) else {
                    continue;
                };
                let end_marker = format!("{}{}", annotations::REGION_END, name);
                let mut region = Vec::new();
                let mut closed = false;
                for &next in &insts[pos + 1..] {
                    if matches!(&module.inst(next).opcode, Opcode::Annotation { annotation } if *annotation == end_marker)
                    {
                        closed = true;
                        break;
                    }
                    region.push(next);
                }
                let func_name = &module.function(f).name;
                if !closed {
                    warn!("sandboxed region {:?} in {} has no end marker", name, func_name);
                    report.push(
                        Diagnostic::new(
                            DiagnosticKind::AnnotationConflict,
                            format!(
                                "Sandboxed region \"{}\" in \"{}\" has no end marker; it extends to the end of the function",
                                name, func_name
                            ),
                        )
                        .in_function(func_name.clone())
                        .with_sandboxes(vec![name.to_string()])
                        .at(module.inst(inst).loc.as_ref())
                        .about(end_marker.clone()),
                    );
                }
                if self.names.get(name).is_some() {
                    warn!("region {:?} reuses an existing sandbox name, ignoring it", name);
                    report.push(
                        Diagnostic::new(
                            DiagnosticKind::AnnotationConflict,
                            format!("Sandboxed region \"{}\" reuses the name of an existing sandbox", name),
                        )
                        .in_function(func_name.clone())
                        .at(module.inst(inst).loc.as_ref())
                        .about(annotation.clone()),
                    );
                    continue;
                }
                let id = self.sandbox_named(name, false)?;
                self.sandboxes[id].set_region(Region {
                    function: f,
                    insts: region,
                });
            }
        }
        Ok(())
    }

    /// Sandboxes mentioned only by data, `SOAAP_SANDBOXED` or callgate
    /// annotations still get a (possibly empty) sandbox.
    fn find_referenced_sandboxes(&mut self, module: &Module) -> SoaapResult<()> {
        let mut referenced: Vec<String> = Vec::new();
        for g in module.global_ids() {
            for a in &module.global(g).annotations {
                if let Some(name) = a.strip_prefix(annotations::SANDBOX_PRIVATE) {
                    referenced.push(name.to_string());
                } else if let Some((name, _)) = annotations::parse_var_perm(a) {
                    referenced.push(name.to_string());
                }
            }
        }
        for f in module.function_ids() {
            let func = module.function(f);
            if let Some(name) = func.name.strip_prefix(annotations::CALLGATES_HELPER) {
                referenced.push(name.to_string());
            }
            for a in &func.annotations {
                if let Some(list) = a.strip_prefix(annotations::SANDBOXED) {
                    referenced.extend(annotations::split_names(list));
                }
            }
            for inst in module.instructions(f) {
                match &module.inst(inst).opcode {
                    Opcode::PtrAnnotation { annotation, .. } | Opcode::VarAnnotation { annotation, .. } => {
                        if let Some(name) = annotation.strip_prefix(annotations::SANDBOX_PRIVATE) {
                            referenced.push(name.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        for name in referenced {
            self.sandbox_named(&name, true)?;
        }
        Ok(())
    }

    fn register_classes(&mut self, module: &Module) -> SoaapResult<()> {
        for g in module.global_ids() {
            for a in &module.global(g).annotations {
                if let Some(class) = a.strip_prefix(annotations::CLASSIFY) {
                    self.classes.assign(class)?;
                }
            }
        }
        for f in module.function_ids() {
            for inst in module.instructions(f) {
                if let Opcode::PtrAnnotation { annotation, .. } = &module.inst(inst).opcode {
                    if let Some(class) = annotation.strip_prefix(annotations::CLASSIFY) {
                        self.classes.assign(class)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Recompute every sandbox's derived members and the privileged set,
    /// e.g. after new call edges were added.
    pub fn reinit(&mut self, module: &Module, cg: &CallGraph) {
        for sandbox in &mut self.sandboxes {
            let foreign: HashSet<FuncId> = self
                .entry_points
                .iter()
                .filter(|(_, owner)| **owner != sandbox.id)
                .map(|(f, _)| *f)
                .collect();
            sandbox.init(module, cg, &foreign);
        }
        self.calculate_privileged_methods(module, cg);
    }

    fn calculate_privileged_methods(&mut self, module: &Module, cg: &CallGraph) {
        self.privileged.clear();
        self.privileged_set.clear();
        let Some(main) = module.function_by_name("main") else {
            return;
        };
        let mut stack = vec![main];
        while let Some(f) = stack.pop() {
            if self.is_entry_point(f) || module.function(f).is_declaration() || !self.privileged_set.insert(f) {
                continue;
            }
            self.privileged.push(f);
            let mut callees: Vec<FuncId> = cg.callees_of_function(f).into_iter().collect();
            callees.reverse();
            stack.extend(callees);
        }
    }

    pub fn sandboxes(&self) -> &[Sandbox] {
        &self.sandboxes
    }

    pub fn sandbox(&self, id: SandboxId) -> &Sandbox {
        &self.sandboxes[id]
    }

    pub fn sandbox_by_name(&self, name: &str) -> Option<&Sandbox> {
        self.names.get(name).map(|id| &self.sandboxes[id])
    }

    pub fn classes(&self) -> &NameRegistry {
        &self.classes
    }

    pub fn is_entry_point(&self, f: FuncId) -> bool {
        self.entry_points.contains_key(&f)
    }

    pub fn sandbox_for_entry_point(&self, f: FuncId) -> Option<&Sandbox> {
        self.entry_points.get(&f).map(|id| &self.sandboxes[*id])
    }

    /// Functions reachable from `main` without crossing an entry point.
    pub fn privileged_methods(&self) -> &[FuncId] {
        &self.privileged
    }

    pub fn is_privileged_method(&self, f: FuncId) -> bool {
        self.privileged_set.contains(&f)
    }

    /// In a privileged method and outside any sandboxed region.
    pub fn is_privileged_instruction(&self, module: &Module, inst: InstId) -> bool {
        let f = module.enclosing_function(inst);
        self.is_privileged_method(f)
            && !self
                .sandboxes
                .iter()
                .any(|s| s.is_region_within(f) && s.contains_instruction(module, inst))
    }

    pub fn sandboxes_containing_function(&self, f: FuncId) -> Vec<SandboxId> {
        self.sandboxes
            .iter()
            .filter(|s| s.contains_function(f))
            .map(|s| s.id)
            .collect()
    }

    pub fn sandboxes_containing_instruction(&self, module: &Module, inst: InstId) -> Vec<SandboxId> {
        self.sandboxes
            .iter()
            .filter(|s| s.contains_instruction(module, inst))
            .map(|s| s.id)
            .collect()
    }

    /// Entry points of every sandbox.
    pub fn all_entry_points(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.entry_points.keys().copied()
    }

    pub fn sandbox_names(&self, mask: u32) -> Vec<String> {
        self.names.names_in(mask)
    }

    /// `[a,b]` rendering of a sandbox mask.
    pub fn stringify_sandbox_names(&self, mask: u32) -> String {
        self.names.stringify(mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FnType, IRBuilder, Type};

    fn void() -> FnType {
        FnType::new(Type::Void, vec![])
    }

    #[test]
    fn conflicting_entry_point_is_reported_once() {
        let mut b = IRBuilder::new("m");
        let ep = b.start_function("worker", void());
        b.build_ret(None);
        b.annotate_function(ep, "SANDBOX_PERSISTENT_a");
        b.annotate_function(ep, "SANDBOX_EPHEMERAL_b");
        b.annotate_function(ep, "perf_overhead_(15)");
        b.start_function("main", void());
        b.build_call(ep, vec![]);
        b.build_ret(None);
        let m = b.finalize().unwrap();
        let cg = CallGraph::new(&m);
        let mut report = Report::new(false);
        let model = SandboxModel::discover(&m, &cg, &mut report).unwrap();

        assert_eq!(report.of_kind(DiagnosticKind::AnnotationConflict).len(), 1);
        let a = model.sandbox_by_name("a").unwrap();
        assert!(a.is_entry_point(ep));
        assert_eq!(a.overhead, 15);
        assert!(model.sandbox_by_name("b").is_none());
        assert_eq!(model.privileged_methods().len(), 1);
    }

    #[test]
    fn region_without_end_runs_to_function_end() {
        let mut b = IRBuilder::new("m");
        let helper = b.start_function("helper", void());
        b.build_ret(None);
        b.start_function("main", void());
        let before = b.build_call(helper, vec![]);
        b.build_annotation("SOAAP_SANDBOX_REGION_START_r");
        let inside = b.build_call(helper, vec![]);
        b.build_ret(None);
        let m = b.finalize().unwrap();
        let cg = CallGraph::new(&m);
        let mut report = Report::new(false);
        let model = SandboxModel::discover(&m, &cg, &mut report).unwrap();

        assert_eq!(report.len(), 1);
        let r = model.sandbox_by_name("r").unwrap();
        assert!(!r.persistent);
        assert!(r.contains_function(helper));
        assert!(model.is_privileged_instruction(&m, before));
        assert!(!model.is_privileged_instruction(&m, inside));
        assert_eq!(model.sandboxes_containing_instruction(&m, inside), vec![r.id]);
    }
}
