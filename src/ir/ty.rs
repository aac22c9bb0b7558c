// CLASSIFICATION: COMMUNITY
// Filename: ty.rs v1.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! IR type system: integers, pointers, aggregates and function signatures.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    Int(u32),
    Ptr(Box<Type>),
    Array(Box<Type>, u64),
    Struct(String),
    Func(FnType),
    /// Compiler-provided variadic argument cursor.
    VaList,
}

/// Signature of a function or of the value called by an indirect call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FnType {
    pub ret: Box<Type>,
    pub params: Vec<Type>,
    #[serde(default)]
    pub variadic: bool,
}

impl FnType {
    pub fn new(ret: Type, params: Vec<Type>) -> Self {
        FnType {
            ret: Box::new(ret),
            params,
            variadic: false,
        }
    }

    pub fn variadic(ret: Type, params: Vec<Type>) -> Self {
        FnType {
            ret: Box::new(ret),
            params,
            variadic: true,
        }
    }

    /// Whether a function of type `self` may be the target of a call site
    /// expecting `site`. Exact match, or when either side is variadic the
    /// return type plus the shared positional parameters must agree.
    pub fn compatible_with(&self, site: &FnType) -> bool {
        if self == site {
            return true;
        }
        if !(self.variadic || site.variadic) {
            return false;
        }
        self.ret == site.ret
            && self
                .params
                .iter()
                .zip(site.params.iter())
                .all(|(a, b)| a == b)
    }
}

impl Type {
    pub fn int32() -> Self {
        Type::Int(32)
    }

    pub fn ptr_to(inner: Type) -> Self {
        Type::Ptr(Box::new(inner))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr(_))
    }

    /// Function signature reachable through at most two levels of pointers.
    pub fn function_signature(&self) -> Option<&FnType> {
        match self {
            Type::Func(ft) => Some(ft),
            Type::Ptr(inner) => match inner.as_ref() {
                Type::Func(ft) => Some(ft),
                Type::Ptr(inner2) => match inner2.as_ref() {
                    Type::Func(ft) => Some(ft),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Ptr(inner) => write!(f, "{}*", inner),
            Type::Array(inner, n) => write!(f, "[{} x {}]", n, inner),
            Type::Struct(name) => write!(f, "%{}", name),
            Type::Func(ft) => write!(f, "{}", ft),
            Type::VaList => write!(f, "va_list"),
        }
    }
}

impl fmt::Display for FnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.ret)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        if self.variadic {
            if !self.params.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "...")?;
        }
        write!(f, ")")
    }
}
