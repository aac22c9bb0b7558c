// CLASSIFICATION: COMMUNITY
// Filename: syscalls.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Table of descriptor-taking system calls known to the capability
//! validator. Indexes are stable and double as bit positions in
//! [`SyscallSet`](crate::infoflow::SyscallSet).

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// (name, index of the descriptor argument)
const FD_SYSCALLS: &[(&str, usize)] = &[
    ("read", 0),
    ("write", 0),
    ("pread", 0),
    ("pwrite", 0),
    ("readv", 0),
    ("writev", 0),
    ("close", 0),
    ("lseek", 0),
    ("fstat", 0),
    ("fstatat", 0),
    ("fchmod", 0),
    ("fchown", 0),
    ("fchdir", 0),
    ("fsync", 0),
    ("ftruncate", 0),
    ("flock", 0),
    ("fcntl", 0),
    ("ioctl", 0),
    ("dup", 0),
    ("dup2", 0),
    ("openat", 0),
    ("getdents", 0),
    ("accept", 0),
    ("bind", 0),
    ("connect", 0),
    ("listen", 0),
    ("shutdown", 0),
    ("send", 0),
    ("sendto", 0),
    ("sendmsg", 0),
    ("recv", 0),
    ("recvfrom", 0),
    ("recvmsg", 0),
    ("getsockopt", 0),
    ("setsockopt", 0),
    ("mmap", 4),
];

pub struct SysCallTable {
    by_name: HashMap<&'static str, usize>,
}

static TABLE: Lazy<SysCallTable> = Lazy::new(|| SysCallTable {
    by_name: FD_SYSCALLS
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (*name, i))
        .collect(),
});

impl SysCallTable {
    pub fn get() -> &'static SysCallTable {
        &TABLE
    }

    pub fn is_syscall(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn fd_arg(&self, name: &str) -> Option<usize> {
        self.index(name).map(|i| FD_SYSCALLS[i].1)
    }

    pub fn name(&self, idx: usize) -> Option<&'static str> {
        FD_SYSCALLS.get(idx).map(|(n, _)| *n)
    }

    pub fn len(&self) -> usize {
        FD_SYSCALLS.len()
    }

    pub fn is_empty(&self) -> bool {
        FD_SYSCALLS.is_empty()
    }
}
