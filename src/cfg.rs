//! Control Flow Graph Construction
//!
//! Builds successor/predecessor lists per block from each block's
//! terminator instruction plus the set of reachable exception handlers.
//! Grounded on `analysis/control_flow.rs`, generalised from a PowerPC-branch
//! successor derivation to this crate's `Instruction` terminators, and
//! carrying `SmallVec<[u32; 2]>` since most blocks have at most two
//! successors.

use crate::instr::Instruction;
use crate::program::Program;
use smallvec::SmallVec;

/// The control-flow graph over a `Program`'s blocks.
#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    pub successors: Vec<SmallVec<[u32; 2]>>,
    pub predecessors: Vec<SmallVec<[u32; 2]>>,
    pub entry: u32,
}

impl ControlFlowGraph {
    /// Build the CFG for `program`. Each block's outgoing edges are the
    /// branch targets of its terminator (if any — fall-through is implicit
    /// when the last instruction is not a terminator), plus an edge to every
    /// handler whose range is active on that block, since control may
    /// transfer there at any point during the block's body.
    pub fn build(program: &Program) -> Self {
        let n = program.blocks.len();
        let mut successors: Vec<SmallVec<[u32; 2]>> = vec![SmallVec::new(); n];
        let mut predecessors: Vec<SmallVec<[u32; 2]>> = vec![SmallVec::new(); n];

        for block in &program.blocks {
            let idx = block.id as usize;
            for target in Self::explicit_successors(block) {
                Self::push_unique(&mut successors[idx], target);
            }
            for range in &block.try_catch {
                Self::push_unique(&mut successors[idx], range.handler_block);
            }
        }

        for idx in 0..n {
            for &succ in &successors[idx].clone() {
                Self::push_unique(&mut predecessors[succ as usize], idx as u32);
            }
        }

        Self {
            successors,
            predecessors,
            entry: program.entry(),
        }
    }

    fn push_unique(list: &mut SmallVec<[u32; 2]>, value: u32) {
        if !list.contains(&value) {
            list.push(value);
        }
    }

    /// Successors implied directly by a block's terminator. A block with no
    /// terminator instruction (falls off the end) implicitly continues to
    /// the next block in program order — the caller passes that edge via
    /// `fallthrough`-free blocks only when `terminator` is absent.
    fn explicit_successors(block: &crate::program::BasicBlock) -> SmallVec<[u32; 2]> {
        let mut out = SmallVec::new();
        match block.instructions.last() {
            Some(Instruction::Return { .. }) | Some(Instruction::Throw) => {}
            Some(Instruction::Goto) => {
                if let Some(target) = block_goto_target(block) {
                    out.push(target);
                }
            }
            Some(Instruction::Branch { .. }) => {
                if let Some((t, f)) = block_branch_targets(block) {
                    out.push(t);
                    out.push(f);
                }
            }
            Some(Instruction::Switch { .. }) => {
                out.extend(block_switch_targets(block));
            }
            _ => {
                if let Some(next) = block.id.checked_add(1) {
                    out.push(next);
                }
            }
        }
        out
    }
}

/// Terminator targets are recorded on `BasicBlock::terminator_targets`
/// rather than inside `Instruction` itself, since they come from the
/// CFG-builder collaborator, not the opcode.
fn block_goto_target(block: &crate::program::BasicBlock) -> Option<u32> {
    block.terminator_targets.first().copied()
}

fn block_branch_targets(block: &crate::program::BasicBlock) -> Option<(u32, u32)> {
    let t = *block.terminator_targets.first()?;
    let f = *block.terminator_targets.get(1)?;
    Some((t, f))
}

fn block_switch_targets(block: &crate::program::BasicBlock) -> SmallVec<[u32; 2]> {
    block.terminator_targets.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::BasicBlock;

    fn block(id: u32, inst: Instruction, targets: &[u32]) -> BasicBlock {
        let mut b = BasicBlock::new(id);
        b.instructions.push(inst);
        b.terminator_targets = targets.to_vec();
        b
    }

    #[test]
    fn fallthrough_block_targets_next_id() {
        let program = Program::new(vec![
            block(0, Instruction::Dup, &[]),
            block(1, Instruction::Return { has_value: false }, &[]),
        ]);
        let cfg = ControlFlowGraph::build(&program);
        assert_eq!(cfg.successors[0].as_slice(), &[1]);
        assert_eq!(cfg.predecessors[1].as_slice(), &[0]);
    }

    #[test]
    fn branch_has_two_successors() {
        let program = Program::new(vec![
            block(0, Instruction::Branch { cmp: crate::instr::Comparison::Eq }, &[1, 2]),
            block(1, Instruction::Return { has_value: false }, &[]),
            block(2, Instruction::Return { has_value: false }, &[]),
        ]);
        let cfg = ControlFlowGraph::build(&program);
        assert_eq!(cfg.successors[0].len(), 2);
        assert!(cfg.successors[0].contains(&1));
        assert!(cfg.successors[0].contains(&2));
    }

    #[test]
    fn handler_range_adds_edge_to_handler() {
        let mut b0 = block(0, Instruction::Return { has_value: false }, &[]);
        b0.try_catch.push(crate::program::TryCatchRange {
            exception_type: Some("java/lang/Exception".into()),
            handler_block: 1,
            exception_local: Some(0),
        });
        let mut handler = BasicBlock::new(1);
        handler.exception_local = Some(0);
        handler.instructions.push(Instruction::Throw);
        let program = Program::new(vec![b0, handler]);
        let cfg = ControlFlowGraph::build(&program);
        assert!(cfg.successors[0].contains(&1));
    }
}
