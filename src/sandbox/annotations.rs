// CLASSIFICATION: COMMUNITY
// Filename: annotations.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Annotation vocabulary understood by sandbox discovery and the analyses.

use bitflags::bitflags;

pub const SANDBOX_PERSISTENT: &str = "SANDBOX_PERSISTENT_";
pub const SANDBOX_EPHEMERAL: &str = "SANDBOX_EPHEMERAL_";
pub const PERF_OVERHEAD: &str = "perf_overhead_";
pub const CLEARANCE: &str = "CLEARANCE_";
pub const PRIVILEGED: &str = "SOAAP_PRIVILEGED";
pub const SANDBOXED: &str = "SOAAP_SANDBOXED_";
pub const VAR_READ: &str = "VAR_READ_";
pub const VAR_WRITE: &str = "VAR_WRITE_";
pub const CLASSIFY: &str = "CLASSIFY_";
pub const SANDBOX_PRIVATE: &str = "SANDBOX_PRIVATE_";
pub const FD: &str = "SOAAP_FD_";
pub const NO_SYSCALLS_ALLOWED: &str = "SOAAP_NO_SYSCALLS_ALLOWED";
pub const FP: &str = "SOAAP_FP_";
pub const PERSISTENT_CREATE: &str = "SOAAP_PERSISTENT_SANDBOX_CREATE_";
pub const EPHEMERAL_CREATE: &str = "SOAAP_EPHEMERAL_SANDBOX_CREATE_";
pub const REGION_START: &str = "SOAAP_SANDBOX_REGION_START_";
pub const REGION_END: &str = "SOAAP_SANDBOX_REGION_END_";
pub const CALLGATES_HELPER: &str = "__soaap_declare_callgates_helper_";
pub const DECLASSIFY: &str = "__soaap_declassify";

bitflags! {
    /// Access a sandbox is granted to a shared global variable.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct VarPerms: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
    }
}

/// Split a comma separated list, trimming blanks and quotes.
pub fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().trim_matches('"').trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `perf_overhead_(NN)` or `perf_overhead_NN`.
pub fn parse_overhead(annotation: &str) -> Option<u32> {
    let rest = annotation.strip_prefix(PERF_OVERHEAD)?;
    rest.trim_matches(|c| c == '(' || c == ')').trim().parse().ok()
}

/// Entry-point marker: returns the sandbox name and whether it is persistent.
pub fn parse_entry_point(annotation: &str) -> Option<(&str, bool)> {
    if let Some(name) = annotation.strip_prefix(SANDBOX_PERSISTENT) {
        Some((name, true))
    } else {
        annotation.strip_prefix(SANDBOX_EPHEMERAL).map(|name| (name, false))
    }
}

/// Creation-point marker: returns the sandbox name and whether it is persistent.
pub fn parse_creation(annotation: &str) -> Option<(&str, bool)> {
    if let Some(name) = annotation.strip_prefix(PERSISTENT_CREATE) {
        Some((name, true))
    } else {
        annotation.strip_prefix(EPHEMERAL_CREATE).map(|name| (name, false))
    }
}

/// Descriptor capability annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FdAnnotation {
    /// Only present in the field form `SOAAP_FD_"<sandbox>"<list>`.
    pub sandbox: Option<String>,
    pub syscalls: Vec<String>,
}

pub fn parse_fd(annotation: &str) -> Option<FdAnnotation> {
    let rest = annotation.strip_prefix(FD)?;
    let (sandbox, list) = match rest.strip_prefix('"') {
        Some(quoted) => {
            let end = quoted.find('"')?;
            (Some(quoted[..end].to_string()), &quoted[end + 1..])
        }
        None => (None, rest),
    };
    let mut syscalls = Vec::new();
    for name in split_names(list) {
        if name == NO_SYSCALLS_ALLOWED {
            syscalls.clear();
            break;
        }
        syscalls.push(name);
    }
    Some(FdAnnotation { sandbox, syscalls })
}

/// `VAR_READ_<name>` / `VAR_WRITE_<name>` to (sandbox, permission).
pub fn parse_var_perm(annotation: &str) -> Option<(&str, VarPerms)> {
    if let Some(name) = annotation.strip_prefix(VAR_READ) {
        Some((name, VarPerms::READ))
    } else {
        annotation.strip_prefix(VAR_WRITE).map(|name| (name, VarPerms::WRITE))
    }
}
