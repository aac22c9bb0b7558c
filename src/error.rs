// CLASSIFICATION: COMMUNITY
// Filename: error.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-10-19

//! Hard errors. Security violations are never reported through this type;
//! they go to the [`Report`](crate::validator::Report).

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoaapError {
    #[error("more than {limit} distinct {kind} names (while adding {name:?})")]
    TooManyNames {
        kind: &'static str,
        name: String,
        limit: usize,
    },
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("malformed annotation {annotation:?}: {reason}")]
    MalformedAnnotation { annotation: String, reason: String },
    #[error("malformed module: {0}")]
    MalformedModule(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type SoaapResult<T> = Result<T, SoaapError>;
