//! Program Data Model
//!
//! The input to the decompilation core: an ordered sequence of basic blocks
//! plus their try/catch structure. This is produced upstream by the
//! instruction parser and CFG builder collaborators — the core
//! only consumes it.

use crate::instr::Instruction;
use smallvec::SmallVec;
use std::fmt;

/// Identifies a method for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MethodReference {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MethodReference {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MethodReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.owner, self.name, self.descriptor)
    }
}

/// A handler range active on some block.
///
/// Order within a block's range list is significant — earlier entries catch
/// first, mirroring a class file's exception table ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TryCatchRange {
    /// `None` means catch-all (a finally block, or an unresolved handler
    /// class).
    pub exception_type: Option<String>,
    pub handler_block: u32,
    /// Local slot the caught exception is bound to, if the handler reads it.
    pub exception_local: Option<u16>,
}

/// A maximal straight-line instruction sequence with a single terminator.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: u32,
    pub instructions: Vec<Instruction>,
    /// Present iff this block is an exception-handler entry point.
    pub exception_local: Option<u16>,
    /// Handlers active during execution of this block's body, outermost
    /// first. The *set* of ranges active changes only at block boundaries:
    /// within a block it is constant.
    pub try_catch: SmallVec<[TryCatchRange; 2]>,
    /// Branch targets of this block's terminator instruction, in the order
    /// the terminator expects them (e.g. `[true, false]` for `Branch`,
    /// `[case0, case1, .., default]` for `Switch`). Empty for blocks whose
    /// terminator needs none (`Return`, `Throw`) or whose last instruction
    /// is not a terminator (implicit fall-through to `id + 1`).
    pub terminator_targets: Vec<u32>,
}

impl BasicBlock {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            instructions: Vec::new(),
            exception_local: None,
            try_catch: SmallVec::new(),
            terminator_targets: Vec::new(),
        }
    }

    /// Whether this block is reachable only via exception dispatch.
    pub fn is_handler_entry(&self) -> bool {
        self.exception_local.is_some()
    }
}

/// The method body the core decompiles: block 0 is always the entry block.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub blocks: Vec<BasicBlock>,
}

impl Program {
    pub fn new(blocks: Vec<BasicBlock>) -> Self {
        Self { blocks }
    }

    pub fn entry(&self) -> u32 {
        0
    }

    pub fn block(&self, id: u32) -> &BasicBlock {
        &self.blocks[id as usize]
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_entry_detection() {
        let mut block = BasicBlock::new(0);
        assert!(!block.is_handler_entry());
        block.exception_local = Some(3);
        assert!(block.is_handler_entry());
    }

    #[test]
    fn method_reference_display() {
        let m = MethodReference::new("pkg/Cls", "run", "(I)V");
        assert_eq!(m.to_string(), "pkg/Cls.run(I)V");
    }
}
