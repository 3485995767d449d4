//! Diagnostics
//!
//! Builds the `(method, listing, errorKind, cause?)` bundle a caller sees
//! when a method fails. Grounded on `debug.rs`'s instruction-dump style for
//! `render_listing`, which the core calls to capture program state at the
//! moment of failure so callers get actionable diagnostics without
//! the core doing any logging itself.

use crate::error::DecompileError;
use crate::program::{MethodReference, Program};
use std::fmt;

/// Renders a `Program` as a plain-text instruction listing, one block per
/// line group, for inclusion in a fatal error's `listing` field.
pub fn render_listing(method: &MethodReference, program: &Program) -> String {
    let mut out = String::new();
    out.push_str(&format!("method {}\n", method));
    for block in &program.blocks {
        out.push_str(&format!("  block{}:\n", block.id));
        for (offset, instr) in block.instructions.iter().enumerate() {
            out.push_str(&format!("    {:4}: {:?}\n", offset, instr));
        }
        if !block.try_catch.is_empty() {
            out.push_str(&format!("    handlers: {:?}\n", block.try_catch));
        }
    }
    out
}

/// `(method, listing, errorKind, cause?)`. Callers decide whether to
/// continue the batch; the core never attempts partial recovery.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DiagnosticBundle {
    pub method: MethodReference,
    pub listing: Option<String>,
    pub error_kind: String,
    pub cause: Option<String>,
}

impl DiagnosticBundle {
    pub fn from_error(error: &DecompileError) -> Self {
        let error_kind = match error {
            DecompileError::IrreducibleControlFlow { .. } => "IrreducibleControlFlow",
            DecompileError::MalformedExceptionScope { .. } => "MalformedExceptionScope",
            DecompileError::InstructionLoweringError { .. } => "InstructionLoweringError",
            DecompileError::TypeInferenceFailure { .. } => "TypeInferenceFailure",
            DecompileError::AsyncSplitFailure { .. } => "AsyncSplitFailure",
        }
        .to_string();
        let cause = match error {
            DecompileError::MalformedExceptionScope { detail, .. } => Some(detail.clone()),
            DecompileError::InstructionLoweringError { cause, .. } => Some(cause.clone()),
            DecompileError::TypeInferenceFailure { cause, .. } => Some(cause.clone()),
            DecompileError::AsyncSplitFailure { cause, .. } => Some(cause.clone()),
            DecompileError::IrreducibleControlFlow { .. } => None,
        };
        Self {
            method: error.method().clone(),
            listing: error.listing().map(str::to_string),
            error_kind,
            cause,
        }
    }
}

impl DiagnosticBundle {
    /// Serialises the bundle to JSON, for callers that batch-collect
    /// failures across many methods and persist or ship them rather than
    /// logging each one immediately.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for DiagnosticBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.method, self.error_kind)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({cause})")?;
        }
        if let Some(listing) = &self.listing {
            write!(f, "\n{listing}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_carries_cause_for_wrapped_errors() {
        let method = MethodReference::new("p/C", "m", "()V");
        let err = DecompileError::InstructionLoweringError {
            method: method.clone(),
            offset: 4,
            cause: "operand stack underflow".into(),
            listing: "method p/C.m()V\n".into(),
        };
        let bundle = DiagnosticBundle::from_error(&err);
        assert_eq!(bundle.error_kind, "InstructionLoweringError");
        assert_eq!(bundle.cause.as_deref(), Some("operand stack underflow"));
        assert!(bundle.listing.is_some());
    }

    #[test]
    fn bundle_round_trips_through_json() {
        let method = MethodReference::new("p/C", "m", "()V");
        let err = DecompileError::TypeInferenceFailure {
            method,
            cause: "unresolved local 4".into(),
        };
        let bundle = DiagnosticBundle::from_error(&err);
        let json = bundle.to_json().expect("bundle is serialisable");
        let restored = DiagnosticBundle::from_json(&json).expect("round-trip must parse");
        assert_eq!(bundle, restored);
    }

    #[test]
    fn listing_renders_every_block() {
        let method = MethodReference::new("p/C", "m", "()V");
        let mut b0 = crate::program::BasicBlock::new(0);
        b0.instructions.push(crate::instr::Instruction::Return { has_value: false });
        let program = Program::new(vec![b0]);
        let listing = render_listing(&method, &program);
        assert!(listing.contains("block0"));
        assert!(listing.contains("Return"));
    }
}
