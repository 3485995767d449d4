//! Output Data Model
//!
//! The statement generator never recurses over the CFG; it only
//! builds these trees bottom-up as blocks close. Expression nodes model the
//! stack-machine operand stack the generator simulates while lowering a
//! block's instructions — they are not part of the input
//! `Instruction` set, which stays a flat stack machine by design.

use crate::instr::{Comparison, Local, VariableKind};
use smallvec::SmallVec;

/// A value produced by simulating the evaluation stack while lowering one
/// block's instructions. Distinct from `Statement`: an `Expr` never has a
/// side effect of its own except by containing an `Invoke`/field/array node,
/// which the generator always wraps in a `Statement::Expression` once it can
/// no longer defer emission.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Local(Local),
    Const {
        value: i64,
        kind: VariableKind,
    },
    BinOp {
        op: &'static str,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        kind: VariableKind,
    },
    Compare {
        cmp: Comparison,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    GetField {
        owner: String,
        name: String,
        kind: VariableKind,
    },
    PutField {
        owner: String,
        name: String,
        value: Box<Expr>,
    },
    ArrayLoad {
        array: Box<Expr>,
        index: Box<Expr>,
        kind: VariableKind,
    },
    ArrayStore {
        array: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    Invoke {
        owner: String,
        name: String,
        descriptor: String,
        args: Vec<Expr>,
        has_result: bool,
    },
    Monitor {
        enter: bool,
        value: Box<Expr>,
    },
    /// The value bound by a handler entry's exception local.
    CaughtException,
}

/// `(register, inferredType, optional debugName)`. `register` is
/// `-1` until the allocator assigns it.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableNode {
    pub local: Local,
    pub register: i32,
    pub ty: Option<VariableKind>,
    pub debug_name: Option<String>,
}

impl VariableNode {
    pub fn new(local: Local) -> Self {
        Self {
            local,
            register: -1,
            ty: None,
            debug_name: None,
        }
    }
}

/// A node in the emitted statement tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Sequential(Vec<Statement>),
    Block {
        id: String,
        body: Vec<Statement>,
    },
    While {
        id: String,
        body: Vec<Statement>,
    },
    TryCatch {
        exception_type: Option<String>,
        exception_local: Option<Local>,
        handler: Box<Statement>,
        body: Vec<Statement>,
    },
    GotoPart(usize),
    Jump(String),
    If {
        cond: Expr,
        then_branch: Box<Statement>,
        else_branch: Box<Statement>,
    },
    Switch {
        scrutinee: Expr,
        cases: SmallVec<[(i32, Statement); 4]>,
        default: Box<Statement>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Assign {
        local: Local,
        value: Expr,
    },
    Expression(Expr),
}

/// One decompiled fragment. Synchronous methods produce exactly one;
/// async methods produce `k >= 1`, numbered `0..k-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodPart {
    pub index: usize,
    pub body: Statement,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_node_starts_unassigned() {
        let v = VariableNode::new(3);
        assert_eq!(v.register, -1);
        assert!(v.ty.is_none());
    }
}
