//! Input Instruction Set
//!
//! The decompiler core receives a `Program` whose basic blocks carry an
//! ordered instruction list. This module names the instruction shapes the
//! statement generator knows how to lower. It intentionally covers the
//! stack-machine opcode families a structured-control-flow decompiler needs
//! to lower — not a full bytecode instruction set, which belongs to a
//! separate instruction-parser collaborator out of this crate's scope.
//!
//! # Memory layout
//! `#[repr(u8)]` keeps the discriminant to one byte for this tagged union.

use smallvec::SmallVec;

/// Local-variable slot index.
pub type Local = u16;

/// Kind of value a variable or stack slot holds, used by the register
/// allocator to classify interference and by type inference
/// to populate `VariableNode::ty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum VariableKind {
    I32 = 0,
    I64 = 1,
    F32 = 2,
    F64 = 3,
    Reference = 4,
    Address = 5,
}

impl VariableKind {
    /// Two variables of different kinds never interfere in the allocator,
    /// except that the two wide kinds (`I64`/`F64`) still occupy register
    /// pairs and are tracked separately from their narrow counterparts.
    pub fn is_wide(self) -> bool {
        matches!(self, VariableKind::I64 | VariableKind::F64)
    }
}

/// A binary comparison used by conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Comparison {
    Eq = 0,
    Ne = 1,
    Lt = 2,
    Le = 3,
    Gt = 4,
    Ge = 5,
}

/// A single instruction inside a `BasicBlock`.
///
/// Non-terminator instructions are lowered 1:1 to `Statement::Expression` or
/// `Statement::Assign` nodes; terminators (`Branch`, `Goto`,
/// `Switch`, `Return`, `Throw`) drive the control-flow translation and are
/// never themselves wrapped in a generated statement body twice.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Load a local variable onto the evaluation stack.
    Load { local: Local, kind: VariableKind },
    /// Store the top of the evaluation stack into a local variable.
    Store { local: Local, kind: VariableKind },
    /// Duplicate the top of the evaluation stack.
    Dup,
    /// Pop and discard the top of the evaluation stack.
    Pop,
    /// Push a constant value.
    Const { value: i64, kind: VariableKind },
    /// Binary arithmetic/logic op; operator is an opaque mnemonic so the
    /// core does not need a full ISA (see module docs).
    BinOp { op: &'static str, kind: VariableKind },
    /// Read an instance or static field.
    GetField { owner: String, name: String, kind: VariableKind },
    /// Write an instance or static field.
    PutField { owner: String, name: String, kind: VariableKind },
    /// Load an element from an array.
    ArrayLoad { kind: VariableKind },
    /// Store an element into an array.
    ArrayStore { kind: VariableKind },
    /// Invoke a method; `arg_count` values are popped, `has_result` governs
    /// whether a value is pushed back.
    Invoke {
        owner: String,
        name: String,
        descriptor: String,
        arg_count: u16,
        has_result: bool,
    },
    /// Enter a monitor (`synchronized` block entry).
    MonitorEnter,
    /// Exit a monitor.
    MonitorExit,
    /// Unconditional jump, always a block terminator.
    Goto,
    /// Conditional branch comparing the top one or two stack values;
    /// terminator with exactly two successors (true, false) in the CFG.
    Branch { cmp: Comparison },
    /// Multi-way branch; terminator with one successor per case plus a
    /// default, in the order recorded here.
    Switch { cases: SmallVec<[i32; 4]> },
    /// Return from the method, optionally with a value.
    Return { has_value: bool },
    /// Re-throw the top of the evaluation stack.
    Throw,
    /// Suspension point for coroutine-splittable methods; the
    /// `AsyncSplitter` collaborator decides which blocks end at one of
    /// these, the core only needs to know the point exists so it can bind
    /// the resume statement the collaborator supplies.
    Suspend { resume_hint: String },
}

impl Instruction {
    /// Whether this instruction is a block terminator, i.e. it is always
    /// the last instruction of the `BasicBlock` that contains it.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Goto
                | Instruction::Branch { .. }
                | Instruction::Switch { .. }
                | Instruction::Return { .. }
                | Instruction::Throw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminators_are_identified() {
        assert!(Instruction::Goto.is_terminator());
        assert!(Instruction::Return { has_value: false }.is_terminator());
        assert!(Instruction::Throw.is_terminator());
        assert!(!Instruction::Dup.is_terminator());
        assert!(!Instruction::Suspend { resume_hint: "x".into() }.is_terminator());
    }

    #[test]
    fn wide_kinds() {
        assert!(VariableKind::I64.is_wide());
        assert!(VariableKind::F64.is_wide());
        assert!(!VariableKind::I32.is_wide());
        assert!(!VariableKind::Reference.is_wide());
    }
}
