//! Error taxonomy for the profile engine.
//!
//! All failures are local and synchronous: they are raised at the point of
//! detection and never retried internally. Store I/O errors from the external
//! tree-access collaborator pass through unchanged inside `Error::Store`.

use crate::tree::FieldPath;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Requested path is absent from a tree's flattened field mapping.
    #[error("field not found in tree: {0}")]
    MissingField(FieldPath),

    /// Arrays of inconsistent length were combined.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Operator name outside the fixed elementwise-arithmetic set.
    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    /// Model parameters that parse but cannot be applied.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Declared but unimplemented behavior (asymmetric sampling).
    #[error("not supported: {0}")]
    NotSupported(String),

    /// No runs to work with.
    #[error("ensemble contains no runs")]
    EmptyEnsemble,

    /// Propagated failure from the external tree store.
    #[error("tree store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
