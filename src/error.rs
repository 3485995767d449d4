//! Error Handling
//!
//! This module provides the error types raised by the decompilation core.
//! The core never attempts partial recovery, so a method either decompiles
//! completely or is rejected with one of the error kinds below plus a
//! diagnostic bundle.
//!
//! # Error Categories
//! - **Control-flow errors**: the CFG cannot be linearised (irreducible)
//! - **Exception-scope errors**: try/catch bookmarks do not nest properly
//! - **Instruction lowering errors**: a single instruction could not be lowered
//! - **Collaborator failures**: type inference or async splitting failed upstream

use crate::program::MethodReference;
use thiserror::Error;

/// Errors raised while decompiling a single method.
///
/// Every variant is fatal to the method being processed: the core
/// does not attempt to emit a partially-structured body.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecompileError {
    /// The control-flow graph is irreducible and cannot be linearised by the
    /// graph indexer. The caller is responsible for block duplication
    /// or dispatcher insertion before retrying; the core refuses outright
    /// rather than emit an incorrect structuring.
    #[error("irreducible control flow in {method}")]
    IrreducibleControlFlow {
        method: MethodReference,
        listing: String,
    },

    /// A try/catch bookmark could not be closed against its recorded owner
    /// block, e.g. because the owner is not an ancestor of the current open
    /// block on the lexical-block stack.
    #[error("malformed exception scope in {method}: {detail}")]
    MalformedExceptionScope {
        method: MethodReference,
        detail: String,
        listing: String,
    },

    /// Lowering a single instruction to a statement failed.
    #[error("failed to lower instruction at offset {offset} in {method}: {cause}")]
    InstructionLoweringError {
        method: MethodReference,
        offset: u32,
        cause: String,
        listing: String,
    },

    /// The type-inference collaborator failed; the core never
    /// fabricates a default type in its place.
    #[error("type inference failed for {method}: {cause}")]
    TypeInferenceFailure { method: MethodReference, cause: String },

    /// The async-splitter collaborator failed; the method is not
    /// partially emitted.
    #[error("async split failed for {method}: {cause}")]
    AsyncSplitFailure { method: MethodReference, cause: String },
}

impl DecompileError {
    /// The method this error pertains to.
    pub fn method(&self) -> &MethodReference {
        match self {
            DecompileError::IrreducibleControlFlow { method, .. } => method,
            DecompileError::MalformedExceptionScope { method, .. } => method,
            DecompileError::InstructionLoweringError { method, .. } => method,
            DecompileError::TypeInferenceFailure { method, .. } => method,
            DecompileError::AsyncSplitFailure { method, .. } => method,
        }
    }

    /// Human-readable listing of the program, if one was captured for this
    /// error. Collaborator failures (type inference, async split) surface
    /// without a listing since they originate outside the core.
    pub fn listing(&self) -> Option<&str> {
        match self {
            DecompileError::IrreducibleControlFlow { listing, .. }
            | DecompileError::MalformedExceptionScope { listing, .. }
            | DecompileError::InstructionLoweringError { listing, .. } => Some(listing),
            DecompileError::TypeInferenceFailure { .. }
            | DecompileError::AsyncSplitFailure { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DecompileError>;
