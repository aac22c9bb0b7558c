// CLASSIFICATION: COMMUNITY
// Filename: registry.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Dense bit-index assignment for sandbox and classification names.

use crate::error::{SoaapError, SoaapResult};
use std::collections::HashMap;

/// Masks are `u32`, so at most this many names per registry.
pub const MAX_NAMES: usize = 32;

#[derive(Clone, Debug)]
pub struct NameRegistry {
    kind: &'static str,
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl NameRegistry {
    pub fn new(kind: &'static str) -> Self {
        NameRegistry {
            kind,
            names: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Index for `name`, assigning the next free one on first sight.
    pub fn assign(&mut self, name: &str) -> SoaapResult<usize> {
        if let Some(idx) = self.index.get(name) {
            return Ok(*idx);
        }
        if self.names.len() >= MAX_NAMES {
            return Err(SoaapError::TooManyNames {
                kind: self.kind,
                name: name.to_string(),
                limit: MAX_NAMES,
            });
        }
        let idx = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        Ok(idx)
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    /// Names whose bit is set in `mask`, in index order.
    pub fn names_in(&self, mask: u32) -> Vec<String> {
        self.names
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// `[a,b]` rendering of a mask.
    pub fn stringify(&self, mask: u32) -> String {
        format!("[{}]", self.names_in(mask).join(","))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirty_third_name_is_rejected() {
        let mut reg = NameRegistry::new("sandbox");
        for i in 0..MAX_NAMES {
            assert_eq!(reg.assign(&format!("s{}", i)).unwrap(), i);
        }
        assert_eq!(reg.assign("s3").unwrap(), 3);
        assert!(matches!(
            reg.assign("overflow"),
            Err(SoaapError::TooManyNames { limit: 32, .. })
        ));
    }

    #[test]
    fn stringify_mask() {
        let mut reg = NameRegistry::new("class");
        reg.assign("secret").unwrap();
        reg.assign("topsecret").unwrap();
        assert_eq!(reg.stringify(0b11), "[secret,topsecret]");
        assert_eq!(reg.stringify(0), "[]");
    }
}
