// CLASSIFICATION: COMMUNITY
// Filename: mod.rs v0.4
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Violation records and the report that collects them.

use crate::error::SoaapResult;
use crate::ir::{InstId, Module, SourceLoc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DiagnosticKind {
    GlobalRead,
    GlobalWrite,
    LostUpdate,
    SyscallNotAllowed,
    ClassifiedRead,
    PrivateRead,
    PrivateLeak,
    UntrustedFunctionPointer,
    PrivilegedCall,
    MissingCreation,
    AnnotationConflict,
}

/// One hop of a call trace: the call instruction's function and location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TraceFrame {
    pub function: String,
    pub location: Option<SourceLoc>,
}

/// Structured rule violation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub function: Option<String>,
    pub sandboxes: Vec<String>,
    pub location: Option<SourceLoc>,
    pub trace: Vec<TraceFrame>,
    /// Variable or callee the violation is about; part of the dedup key.
    #[serde(skip)]
    pub subject: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            function: None,
            sandboxes: Vec::new(),
            location: None,
            trace: Vec::new(),
            subject: String::new(),
        }
    }

    pub fn in_function(mut self, name: impl Into<String>) -> Self {
        self.function = Some(name.into());
        self
    }

    pub fn with_sandboxes(mut self, names: Vec<String>) -> Self {
        self.sandboxes = names;
        self
    }

    pub fn at(mut self, loc: Option<&SourceLoc>) -> Self {
        self.location = loc.cloned();
        self
    }

    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_trace(mut self, trace: Vec<TraceFrame>) -> Self {
        self.trace = trace;
        self
    }
}

/// Turn a chain of call instructions into trace frames, innermost first.
/// With `summarise`, consecutive frames in the same function collapse.
pub fn trace_from_calls(module: &Module, calls: &[InstId], summarise: bool) -> Vec<TraceFrame> {
    let mut frames: Vec<TraceFrame> = Vec::new();
    for &call in calls.iter().rev() {
        let frame = TraceFrame {
            function: module.function(module.enclosing_function(call)).name.clone(),
            location: module.inst(call).loc.clone(),
        };
        if summarise && frames.last().map_or(false, |f| f.function == frame.function) {
            continue;
        }
        frames.push(frame);
    }
    frames
}

/// Collected diagnostics of a run.
#[derive(Debug, Default)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
    seen: HashSet<(DiagnosticKind, Option<String>, String)>,
    pedantic: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    diagnostics: &'a [Diagnostic],
}

impl Report {
    pub fn new(pedantic: bool) -> Self {
        Report {
            pedantic,
            ..Default::default()
        }
    }

    /// Record a diagnostic. Returns false when an equivalent one was
    /// already recorded and pedantic mode is off.
    pub fn push(&mut self, diag: Diagnostic) -> bool {
        if !self.pedantic {
            let key = (diag.kind, diag.function.clone(), diag.subject.clone());
            if !self.seen.insert(key) {
                return false;
            }
        }
        self.diagnostics.push(diag);
        true
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind == kind).collect()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for d in &self.diagnostics {
            let _ = writeln!(out, " *** {}", d.message);
            if let Some(loc) = &d.location {
                let _ = writeln!(out, " +++ Line {} of file {}", loc.line, loc.file);
            }
            if !d.trace.is_empty() {
                let _ = writeln!(out, "     Call trace:");
                for frame in &d.trace {
                    match &frame.location {
                        Some(loc) => {
                            let _ = writeln!(out, "       {} ({}:{})", frame.function, loc.file, loc.line);
                        }
                        None => {
                            let _ = writeln!(out, "       {}", frame.function);
                        }
                    }
                }
            }
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> SoaapResult<String> {
        let doc = JsonReport {
            generated_at: chrono::Utc::now().to_rfc3339(),
            diagnostics: &self.diagnostics,
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}
