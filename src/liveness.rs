//! Liveness Analyser
//!
//! Runs on the original (pre-decompilation) program, not the generated
//! statement tree. Grounded directly on `analysis/data_flow.rs`'s iterative
//! worklist fixed point over `BitVec` live-sets, generalized from a fixed
//! 32-GPR bitset to one sized per method's local-variable count. Exception
//! edges are already present in `ControlFlowGraph::successors`, so treating a
//! throwing instruction's handler as a conservative live-out successor falls
//! out of running the same backward dataflow over that graph.

use crate::cfg::ControlFlowGraph;
use crate::instr::{Instruction, Local};
use crate::program::Program;
use bitvec::prelude::*;

/// Per-block def/use summary: which locals are read
/// before any write in the block (`uses`), and which are written anywhere
/// in the block (`defs`). Kept around so the interference graph builder
/// doesn't need to re-scan instructions itself.
#[derive(Debug, Clone)]
pub struct DefUseChains {
    pub uses: Vec<BitVec<u32>>,
    pub defs: Vec<BitVec<u32>>,
}

/// Per-block live-in/live-out sets.
#[derive(Debug, Clone)]
pub struct LivenessResult {
    pub live_in: Vec<BitVec<u32>>,
    pub live_out: Vec<BitVec<u32>>,
    pub chains: DefUseChains,
}

pub fn analyze(program: &Program, cfg: &ControlFlowGraph, num_vars: usize) -> LivenessResult {
    let n = program.len();
    let mut uses = vec![bitvec![u32, Lsb0; 0; num_vars]; n];
    let mut defs = vec![bitvec![u32, Lsb0; 0; num_vars]; n];

    for block in &program.blocks {
        let idx = block.id as usize;
        for instr in &block.instructions {
            match instr {
                Instruction::Load { local, .. } => {
                    if !defs[idx][*local as usize] {
                        uses[idx].set(*local as usize, true);
                    }
                }
                Instruction::Store { local, .. } => {
                    defs[idx].set(*local as usize, true);
                }
                _ => {}
            }
        }
    }

    let mut live_in = vec![bitvec![u32, Lsb0; 0; num_vars]; n];
    let mut live_out = vec![bitvec![u32, Lsb0; 0; num_vars]; n];

    let mut changed = true;
    while changed {
        changed = false;
        for b in (0..n).rev() {
            let mut out = bitvec![u32, Lsb0; 0; num_vars];
            for &succ in &cfg.successors[b] {
                out |= live_in[succ as usize].clone();
            }
            if out != live_out[b] {
                live_out[b] = out.clone();
                changed = true;
            }

            let mut new_in = uses[b].clone();
            let mut propagate = out;
            propagate &= !defs[b].clone();
            new_in |= propagate;
            if new_in != live_in[b] {
                live_in[b] = new_in;
                changed = true;
            }
        }
    }

    LivenessResult {
        live_in,
        live_out,
        chains: DefUseChains { uses, defs },
    }
}

/// Per-instruction live-after sets for one block, computed backwards from
/// `live_out[block]`.
pub fn per_instruction_live_after(
    block_id: u32,
    instructions: &[Instruction],
    live_out: &BitVec<u32>,
    num_vars: usize,
) -> Vec<BitVec<u32>> {
    let _ = block_id;
    let mut live = live_out.clone();
    let mut result = vec![bitvec![u32, Lsb0; 0; num_vars]; instructions.len()];
    for (i, instr) in instructions.iter().enumerate().rev() {
        result[i] = live.clone();
        match instr {
            Instruction::Store { local, .. } => live.set(*local as usize, false),
            Instruction::Load { local, .. } => live.set(*local as usize, true),
            _ => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::VariableKind;
    use crate::program::BasicBlock;

    fn cfg_of(edges: &[(u32, u32)], n: usize) -> ControlFlowGraph {
        let mut successors = vec![smallvec::SmallVec::<[u32; 2]>::new(); n];
        let mut predecessors = vec![smallvec::SmallVec::<[u32; 2]>::new(); n];
        for &(u, v) in edges {
            successors[u as usize].push(v);
            predecessors[v as usize].push(u);
        }
        ControlFlowGraph {
            successors,
            predecessors,
            entry: 0,
        }
    }

    #[test]
    fn variable_live_across_loop_back_edge() {
        // b0: store 0; b1: load 0, store 1, branch -> b1|b2; b2: load 0, return.
        let mut b0 = BasicBlock::new(0);
        b0.instructions.push(Instruction::Store { local: 0, kind: VariableKind::I32 });
        let mut b1 = BasicBlock::new(1);
        b1.instructions.push(Instruction::Load { local: 0, kind: VariableKind::I32 });
        b1.instructions.push(Instruction::Store { local: 1, kind: VariableKind::I32 });
        let mut b2 = BasicBlock::new(2);
        b2.instructions.push(Instruction::Load { local: 0, kind: VariableKind::I32 });

        let program = Program::new(vec![b0, b1, b2]);
        let cfg = cfg_of(&[(0, 1), (1, 1), (1, 2)], 3);
        let result = analyze(&program, &cfg, 2);
        assert!(result.live_out[0][0]);
        assert!(result.live_in[1][0]);
        assert!(result.live_out[1][0]);
    }
}
