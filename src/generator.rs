//! Statement Generator
//!
//! Drives a single explicit loop over indexed positions `0..N`, maintaining
//! an explicit stack of open lexical blocks instead of recursing over the
//! graph. This mirrors the staged `PipelineContext` driving loop in
//! `pipeline.rs`, adapted from a whole-program multi-pass pipeline to a
//! single method's block-by-block lowering.

use crate::bookmarker::Bookmarker;
use crate::error::{DecompileError, Result};
use crate::indexer::GraphIndex;
use crate::instr::Instruction;
use crate::program::{BasicBlock, Program};
use crate::range_tree::RangeTree;
use crate::statement::{Expr, Statement};
use std::collections::HashMap;

/// A lexical block currently open on the generator's stack.
struct OpenBlock {
    id: String,
    is_loop: bool,
    end: u32,
    body: Vec<Statement>,
    /// Original block ids this block installed into `block_map`, so they can
    /// be removed when the block closes.
    installed_keys: Vec<u32>,
}

/// A reference a jump can resolve to: the label and whether it names a loop
/// (relevant only for readability; both break and continue targets are
/// plain `Jump(label)` statements per ).
#[derive(Clone)]
struct BlockMapEntry {
    label: String,
    is_loop: bool,
}

pub struct StatementGenerator<'a> {
    program: &'a Program,
    index: &'a GraphIndex,
    tree: &'a RangeTree,
    target_part: Option<&'a [i32]>,
    stack: Vec<OpenBlock>,
    block_map: HashMap<u32, BlockMapEntry>,
    bookmarker: Bookmarker,
}

impl<'a> StatementGenerator<'a> {
    pub fn new(
        program: &'a Program,
        index: &'a GraphIndex,
        tree: &'a RangeTree,
        target_part: Option<&'a [i32]>,
    ) -> Self {
        Self {
            program,
            index,
            tree,
            target_part,
            stack: vec![OpenBlock {
                id: "root".to_string(),
                is_loop: false,
                end: u32::MAX,
                body: Vec::new(),
                installed_keys: Vec::new(),
            }],
            block_map: HashMap::new(),
            bookmarker: Bookmarker::new(),
        }
    }

    pub fn generate(mut self, method: &crate::program::MethodReference, listing: impl Fn() -> String) -> Result<Statement> {
        let n = self.index.len() as u32;
        log::debug!("generator: entering {method} ({n} indexed blocks)");

        for i in 0..=n {
            self.close_ending_at(i);
            if i == n {
                break;
            }
            self.open_starting_at(i);

            let original_id = self.index.node_at(i);
            let block = self.program.block(original_id);
            self.sync_bookmarks(block, method, &listing)?;
            self.lower_block(block, i, method, &listing)?;

            if let Some(targets) = self.target_part {
                let target = targets[original_id as usize];
                if target >= 0 {
                    self.push_statement(Statement::GotoPart(target as usize));
                }
            }
        }

        // Close-before-open also handles root's own "close" implicitly since
        // root.end is u32::MAX and never matches; unwrap its accumulated body.
        let root = self.stack.pop().expect("root always present");
        log::debug!("generator: leaving {method}, {} top-level statements", root.body.len());
        Ok(Statement::Sequential(root.body))
    }

    fn push_statement(&mut self, stmt: Statement) {
        self.stack.last_mut().expect("stack never empty").body.push(stmt);
    }

    fn close_ending_at(&mut self, i: u32) {
        while self.stack.len() > 1 && self.stack.last().unwrap().end == i {
            let closed = self.stack.pop().unwrap();
            for key in &closed.installed_keys {
                if self
                    .block_map
                    .get(key)
                    .map(|e| e.label == closed.id)
                    .unwrap_or(false)
                {
                    self.block_map.remove(key);
                }
            }
            let wrapper = if closed.is_loop {
                Statement::While {
                    id: closed.id,
                    body: closed.body,
                }
            } else {
                Statement::Block {
                    id: closed.id,
                    body: closed.body,
                }
            };
            self.push_statement(wrapper);
        }
    }

    fn open_starting_at(&mut self, i: u32) {
        for range_id in self.tree.starting_at(i) {
            let range = self.tree.node(range_id).clone();
            let is_loop = range.loop_index.is_some();
            let label = if is_loop {
                format!("block{}", self.index.node_at(range.start))
            } else {
                format!("block{}", self.index.node_at(range.end))
            };

            let mut installed_keys = Vec::new();
            let end_key = self.index.node_at(range.end);
            let should_install_end = self
                .block_map
                .get(&end_key)
                .map(|existing| is_loop && !existing.is_loop)
                .unwrap_or(true);
            if should_install_end {
                self.block_map.insert(
                    end_key,
                    BlockMapEntry {
                        label: label.clone(),
                        is_loop,
                    },
                );
                installed_keys.push(end_key);
            }
            if is_loop {
                let start_key = self.index.node_at(range.start);
                self.block_map.insert(
                    start_key,
                    BlockMapEntry {
                        label: label.clone(),
                        is_loop: true,
                    },
                );
                installed_keys.push(start_key);
            }

            self.stack.push(OpenBlock {
                id: label,
                is_loop,
                end: range.end,
                body: Vec::new(),
                installed_keys,
            });
        }
    }

    fn sync_bookmarks(
        &mut self,
        block: &BasicBlock,
        method: &crate::program::MethodReference,
        listing: &impl Fn() -> String,
    ) -> Result<()> {
        let keep = self.bookmarker.common_prefix_len(&block.try_catch);
        let closing = self.bookmarker.close_to(keep);
        for bm in &closing {
            self.close_bookmark(bm, method, listing)?;
        }
        let owner_depth = self.stack.len() - 1;
        let offset = self.stack.last().unwrap().body.len();
        self.bookmarker.open(&block.try_catch, keep, owner_depth, offset);
        Ok(())
    }

    fn close_bookmark(
        &mut self,
        bm: &crate::bookmarker::TryCatchBookmark,
        method: &crate::program::MethodReference,
        listing: &impl Fn() -> String,
    ) -> Result<()> {
        let top = self.stack.len() - 1;
        if bm.owner_depth > top {
            return Err(DecompileError::MalformedExceptionScope {
                method: method.clone(),
                detail: "try-catch bookmark owner is not an ancestor of the current block".into(),
                listing: listing(),
            });
        }
        let handler_label = format!("block{}", bm.handler_block);
        for depth in (bm.owner_depth + 1..=top).rev() {
            let body = &mut self.stack[depth].body;
            if body.len() > 1 {
                let protected: Vec<Statement> = body.drain(0..body.len() - 1).collect();
                body.insert(
                    0,
                    Statement::TryCatch {
                        exception_type: bm.exception_type.clone(),
                        exception_local: bm.exception_local,
                        handler: Box::new(Statement::Jump(handler_label.clone())),
                        body: protected,
                    },
                );
            }
        }
        let owner_body = &mut self.stack[bm.owner_depth].body;
        if owner_body.len() > bm.offset {
            let protected: Vec<Statement> = owner_body.drain(bm.offset..).collect();
            if !protected.is_empty() {
                owner_body.push(Statement::TryCatch {
                    exception_type: bm.exception_type.clone(),
                    exception_local: bm.exception_local,
                    handler: Box::new(Statement::Jump(handler_label)),
                    body: protected,
                });
            }
        }
        Ok(())
    }

    fn jump_to(
        &self,
        target: u32,
        current_index: u32,
        method: &crate::program::MethodReference,
        listing: &impl Fn() -> String,
    ) -> Result<Statement> {
        let target_index = self.index.index_of(target);
        if target_index == current_index + 1 {
            return Ok(Statement::Sequential(Vec::new()));
        }
        match self.block_map.get(&target) {
            Some(entry) => Ok(Statement::Jump(entry.label.clone())),
            None => Err(DecompileError::InstructionLoweringError {
                method: method.clone(),
                offset: current_index,
                cause: format!("jump target block {} has no enclosing lexical block", target),
                listing: listing(),
            }),
        }
    }

    fn lower_block(
        &mut self,
        block: &BasicBlock,
        current_index: u32,
        method: &crate::program::MethodReference,
        listing: &impl Fn() -> String,
    ) -> Result<()> {
        let mut operands: Vec<Expr> = Vec::new();

        if let Some(local) = block.exception_local {
            self.push_statement(Statement::Assign {
                local,
                value: Expr::CaughtException,
            });
        }

        for instr in &block.instructions {
            self.lower_instruction(instr, &mut operands, current_index, method, listing)?;
        }
        Ok(())
    }

    fn lower_instruction(
        &mut self,
        instr: &Instruction,
        operands: &mut Vec<Expr>,
        current_index: u32,
        method: &crate::program::MethodReference,
        listing: &impl Fn() -> String,
    ) -> Result<()> {
        match instr {
            Instruction::Load { local, .. } => operands.push(Expr::Local(*local)),
            Instruction::Const { value, kind } => operands.push(Expr::Const {
                value: *value,
                kind: *kind,
            }),
            Instruction::Dup => {
                let top = operands.last().cloned().ok_or_else(|| lowering_err(method, current_index, "Dup on empty stack", listing))?;
                operands.push(top);
            }
            Instruction::Pop => {
                let top = pop(operands, method, current_index, listing)?;
                self.push_statement(Statement::Expression(top));
            }
            Instruction::Store { local, .. } => {
                let value = pop(operands, method, current_index, listing)?;
                self.push_statement(Statement::Assign { local: *local, value });
            }
            Instruction::BinOp { op, kind } => {
                let rhs = pop(operands, method, current_index, listing)?;
                let lhs = pop(operands, method, current_index, listing)?;
                operands.push(Expr::BinOp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    kind: *kind,
                });
            }
            Instruction::GetField { owner, name, kind } => operands.push(Expr::GetField {
                owner: owner.clone(),
                name: name.clone(),
                kind: *kind,
            }),
            Instruction::PutField { owner, name, .. } => {
                let value = pop(operands, method, current_index, listing)?;
                self.push_statement(Statement::Expression(Expr::PutField {
                    owner: owner.clone(),
                    name: name.clone(),
                    value: Box::new(value),
                }));
            }
            Instruction::ArrayLoad { kind } => {
                let index = pop(operands, method, current_index, listing)?;
                let array = pop(operands, method, current_index, listing)?;
                operands.push(Expr::ArrayLoad {
                    array: Box::new(array),
                    index: Box::new(index),
                    kind: *kind,
                });
            }
            Instruction::ArrayStore { .. } => {
                let value = pop(operands, method, current_index, listing)?;
                let index = pop(operands, method, current_index, listing)?;
                let array = pop(operands, method, current_index, listing)?;
                self.push_statement(Statement::Expression(Expr::ArrayStore {
                    array: Box::new(array),
                    index: Box::new(index),
                    value: Box::new(value),
                }));
            }
            Instruction::Invoke {
                owner,
                name,
                descriptor,
                arg_count,
                has_result,
            } => {
                let mut args = Vec::with_capacity(*arg_count as usize);
                for _ in 0..*arg_count {
                    args.push(pop(operands, method, current_index, listing)?);
                }
                args.reverse();
                let call = Expr::Invoke {
                    owner: owner.clone(),
                    name: name.clone(),
                    descriptor: descriptor.clone(),
                    args,
                    has_result: *has_result,
                };
                if *has_result {
                    operands.push(call);
                } else {
                    self.push_statement(Statement::Expression(call));
                }
            }
            Instruction::MonitorEnter | Instruction::MonitorExit => {
                let value = pop(operands, method, current_index, listing)?;
                self.push_statement(Statement::Expression(Expr::Monitor {
                    enter: matches!(instr, Instruction::MonitorEnter),
                    value: Box::new(value),
                }));
            }
            Instruction::Suspend { resume_hint } => {
                self.push_statement(Statement::Expression(Expr::Invoke {
                    owner: "$async".into(),
                    name: "suspend".into(),
                    descriptor: resume_hint.clone(),
                    args: Vec::new(),
                    has_result: false,
                }));
            }
            Instruction::Goto => {
                let target = block_goto_target(self.program.block(self.index.node_at(current_index)))
                    .ok_or_else(|| lowering_err(method, current_index, "Goto missing target", listing))?;
                let stmt = self.jump_to(target, current_index, method, listing)?;
                if !matches!(&stmt, Statement::Sequential(v) if v.is_empty()) {
                    self.push_statement(stmt);
                }
            }
            Instruction::Branch { cmp } => {
                let rhs = pop(operands, method, current_index, listing)?;
                let lhs = pop(operands, method, current_index, listing)?;
                let block = self.program.block(self.index.node_at(current_index));
                let t = *block.terminator_targets.first().ok_or_else(|| lowering_err(method, current_index, "Branch missing true target", listing))?;
                let f = *block.terminator_targets.get(1).ok_or_else(|| lowering_err(method, current_index, "Branch missing false target", listing))?;
                let then_branch = self.jump_to(t, current_index, method, listing)?;
                let else_branch = self.jump_to(f, current_index, method, listing)?;
                self.push_statement(Statement::If {
                    cond: Expr::Compare {
                        cmp: *cmp,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                });
            }
            Instruction::Switch { .. } => {
                let scrutinee = pop(operands, method, current_index, listing)?;
                let block = self.program.block(self.index.node_at(current_index));
                let targets = block.terminator_targets.clone();
                let (default_target, case_targets) = targets.split_last().ok_or_else(|| lowering_err(method, current_index, "Switch has no targets", listing))?;
                let mut cases = smallvec::SmallVec::new();
                for (case_index, &target) in case_targets.iter().enumerate() {
                    let stmt = self.jump_to(target, current_index, method, listing)?;
                    cases.push((case_index as i32, stmt));
                }
                let default = self.jump_to(*default_target, current_index, method, listing)?;
                self.push_statement(Statement::Switch {
                    scrutinee,
                    cases,
                    default: Box::new(default),
                });
            }
            Instruction::Return { has_value } => {
                let value = if *has_value {
                    Some(pop(operands, method, current_index, listing)?)
                } else {
                    None
                };
                self.push_statement(Statement::Return(value));
            }
            Instruction::Throw => {
                let value = pop(operands, method, current_index, listing)?;
                self.push_statement(Statement::Throw(value));
            }
        }
        Ok(())
    }
}

fn pop(
    operands: &mut Vec<Expr>,
    method: &crate::program::MethodReference,
    current_index: u32,
    listing: &impl Fn() -> String,
) -> Result<Expr> {
    operands
        .pop()
        .ok_or_else(|| lowering_err(method, current_index, "operand stack underflow", listing))
}

fn lowering_err(
    method: &crate::program::MethodReference,
    current_index: u32,
    cause: &str,
    listing: &impl Fn() -> String,
) -> DecompileError {
    DecompileError::InstructionLoweringError {
        method: method.clone(),
        offset: current_index,
        cause: cause.to_string(),
        listing: listing(),
    }
}

fn block_goto_target(block: &BasicBlock) -> Option<u32> {
    block.terminator_targets.first().copied()
}
