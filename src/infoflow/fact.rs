// CLASSIFICATION: COMMUNITY
// Filename: fact.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Lattice elements tracked by the information-flow engine.

use bit_set::BitSet;
use std::fmt::Debug;

/// A dataflow fact. `union` and `meet` return whether `self` changed.
pub trait Fact: Clone + Debug {
    fn bottom() -> Self;

    fn union(&mut self, other: &Self) -> bool;

    /// Combination used by must-analyses. May-facts keep the default.
    fn meet(&mut self, other: &Self) -> bool {
        self.union(other)
    }

    fn describe(&self) -> String {
        format!("{:?}", self)
    }
}

macro_rules! mask_fact {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            pub fn bit(idx: usize) -> Self {
                $name(1 << idx)
            }

            pub fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl Fact for $name {
            fn bottom() -> Self {
                $name(0)
            }

            fn union(&mut self, other: &Self) -> bool {
                let old = self.0;
                self.0 |= other.0;
                self.0 != old
            }

            fn describe(&self) -> String {
                format!("{:#x}", self.0)
            }
        }
    };
}

mask_fact!(
    /// Sandboxes whose private data a value may carry.
    SandboxMask
);
mask_fact!(
    /// Classification labels a value may carry.
    ClassMask
);
mask_fact!(
    /// Sandboxes a value may have been returned from.
    OriginMask
);

fn bitset_union(dst: &mut BitSet, src: &BitSet) -> bool {
    let before = dst.len();
    dst.union_with(src);
    dst.len() != before
}

fn bitset_meet(dst: &mut BitSet, src: &BitSet) -> bool {
    let before = dst.len();
    dst.intersect_with(src);
    dst.len() != before
}

/// Syscalls a descriptor may be passed to, indexed by
/// [`SysCallTable`](crate::syscalls::SysCallTable). Must-fact.
#[derive(Clone, Debug, Default)]
pub struct SyscallSet(pub BitSet);

impl SyscallSet {
    pub fn allows(&self, idx: usize) -> bool {
        self.0.contains(idx)
    }
}

impl FromIterator<usize> for SyscallSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        SyscallSet(iter.into_iter().collect())
    }
}

impl PartialEq for SyscallSet {
    fn eq(&self, other: &Self) -> bool {
        self.0.iter().eq(other.0.iter())
    }
}

impl Fact for SyscallSet {
    fn bottom() -> Self {
        SyscallSet(BitSet::new())
    }

    fn union(&mut self, other: &Self) -> bool {
        bitset_union(&mut self.0, &other.0)
    }

    fn meet(&mut self, other: &Self) -> bool {
        bitset_meet(&mut self.0, &other.0)
    }

    fn describe(&self) -> String {
        format!("{:?}", self.0.iter().collect::<Vec<_>>())
    }
}

/// Possible function-pointer targets, indexed by the dense numbering of
/// address-taken functions.
#[derive(Clone, Debug, Default)]
pub struct FunctionTargets(pub BitSet);

impl FunctionTargets {
    pub fn single(idx: usize) -> Self {
        let mut set = BitSet::new();
        set.insert(idx);
        FunctionTargets(set)
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter()
    }
}

impl Fact for FunctionTargets {
    fn bottom() -> Self {
        FunctionTargets(BitSet::new())
    }

    fn union(&mut self, other: &Self) -> bool {
        bitset_union(&mut self.0, &other.0)
    }

    fn describe(&self) -> String {
        format!("{:?}", self.0.iter().collect::<Vec<_>>())
    }
}

/// Whether a value has definitely been declassified. Must-fact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Declassified(pub bool);

impl Fact for Declassified {
    fn bottom() -> Self {
        Declassified(false)
    }

    fn union(&mut self, other: &Self) -> bool {
        let old = self.0;
        self.0 |= other.0;
        self.0 != old
    }

    fn meet(&mut self, other: &Self) -> bool {
        let old = self.0;
        self.0 &= other.0;
        self.0 != old
    }
}
