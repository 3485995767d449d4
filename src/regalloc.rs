//! Register Allocator
//!
//! Grounded on `codegen/register.rs`, but replacing its placeholder 1:1
//! register-name mapping with the full graph-colouring algorithm: build an
//! interference graph from
//! liveness, **simplify** by repeatedly removing the lowest-degree node onto
//! a stack, then **select** by popping and assigning the lowest colour
//! unused among each node's graph neighbours.

use crate::cfg::ControlFlowGraph;
use crate::instr::{Local, VariableKind};
use crate::liveness::{per_instruction_live_after, LivenessResult};
use crate::program::Program;
use std::collections::{HashMap, HashSet};

/// Undirected interference graph over local-variable numbers.
#[derive(Debug, Default)]
pub struct InterferenceGraph {
    edges: HashMap<Local, HashSet<Local>>,
}

impl InterferenceGraph {
    fn add_node(&mut self, v: Local) {
        self.edges.entry(v).or_default();
    }

    fn add_edge(&mut self, a: Local, b: Local) {
        if a == b {
            return;
        }
        self.edges.entry(a).or_default().insert(b);
        self.edges.entry(b).or_default().insert(a);
    }

    pub fn neighbours(&self, v: Local) -> impl Iterator<Item = &Local> {
        self.edges.get(&v).into_iter().flatten()
    }

    pub fn interferes(&self, a: Local, b: Local) -> bool {
        self.edges.get(&a).map(|n| n.contains(&b)).unwrap_or(false)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Local> {
        self.edges.keys()
    }
}

/// Builds the interference graph: two locals interfere iff they are
/// simultaneously live at some program point and share a kind class.
/// Variables of different `VariableKind` never interfere, even if live at
/// the same point, since they never compete for the same physical register
/// file in the backend.
pub fn build_interference_graph(
    program: &Program,
    liveness: &LivenessResult,
    kind_of: &HashMap<Local, VariableKind>,
    num_vars: usize,
) -> InterferenceGraph {
    let mut graph = InterferenceGraph::default();
    for &local in kind_of.keys() {
        graph.add_node(local);
    }

    for block in &program.blocks {
        let idx = block.id as usize;
        let live_after = per_instruction_live_after(
            block.id,
            &block.instructions,
            &liveness.live_out[idx],
            num_vars,
        );
        for (i, instr) in block.instructions.iter().enumerate() {
            if let crate::instr::Instruction::Store { local: defined, .. } = instr {
                let defined_kind = kind_of.get(defined).copied();
                for other in live_after[i].iter_ones() {
                    let other = other as Local;
                    if other == *defined {
                        continue;
                    }
                    if kind_of.get(&other).copied() == defined_kind {
                        graph.add_edge(*defined, other);
                    }
                }
            }
        }
    }
    graph
}

/// `colour[var] == -1` means unassigned — never produced by `allocate` for a
/// node present in the graph, reserved only as the sentinel before
/// allocation runs.
pub fn allocate(graph: &InterferenceGraph) -> HashMap<Local, i32> {
    let mut remaining: HashSet<Local> = graph.nodes().copied().collect();
    let mut stack: Vec<Local> = Vec::new();

    while !remaining.is_empty() {
        let next = *remaining
            .iter()
            .min_by_key(|&&v| {
                graph
                    .neighbours(v)
                    .filter(|n| remaining.contains(n))
                    .count()
            })
            .expect("remaining is non-empty");
        remaining.remove(&next);
        stack.push(next);
    }

    let mut colour: HashMap<Local, i32> = HashMap::new();
    while let Some(v) = stack.pop() {
        let used: HashSet<i32> = graph
            .neighbours(v)
            .filter_map(|n| colour.get(n).copied())
            .collect();
        let mut c = 0;
        while used.contains(&c) {
            c += 1;
        }
        colour.insert(v, c);
    }
    colour
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::ControlFlowGraph;
    use crate::instr::{Instruction, VariableKind};
    use crate::liveness;
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
    fn interfering_variables_get_distinct_colours() {
        // Single block: store 0; store 1; load 0; load 1 — both live at once.
        let mut b0 = BasicBlock::new(0);
        b0.instructions.push(Instruction::Store { local: 0, kind: VariableKind::I32 });
        b0.instructions.push(Instruction::Store { local: 1, kind: VariableKind::I32 });
        b0.instructions.push(Instruction::Load { local: 0, kind: VariableKind::I32 });
        b0.instructions.push(Instruction::Load { local: 1, kind: VariableKind::I32 });
        let program = Program::new(vec![b0]);
        let cfg = cfg_of(&[], 1);
        let live = liveness::analyze(&program, &cfg, 2);

        let mut kinds = HashMap::new();
        kinds.insert(0, VariableKind::I32);
        kinds.insert(1, VariableKind::I32);

        let graph = build_interference_graph(&program, &live, &kinds, 2);
        assert!(graph.interferes(0, 1));

        let colours = allocate(&graph);
        assert_ne!(colours[&0], colours[&1]);
    }

    #[test]
    fn different_kind_class_never_interferes() {
        let mut b0 = BasicBlock::new(0);
        b0.instructions.push(Instruction::Store { local: 0, kind: VariableKind::I32 });
        b0.instructions.push(Instruction::Store { local: 1, kind: VariableKind::F32 });
        b0.instructions.push(Instruction::Load { local: 0, kind: VariableKind::I32 });
        b0.instructions.push(Instruction::Load { local: 1, kind: VariableKind::F32 });
        let program = Program::new(vec![b0]);
        let cfg = cfg_of(&[], 1);
        let live = liveness::analyze(&program, &cfg, 2);

        let mut kinds = HashMap::new();
        kinds.insert(0, VariableKind::I32);
        kinds.insert(1, VariableKind::F32);

        let graph = build_interference_graph(&program, &live, &kinds, 2);
        assert!(!graph.interferes(0, 1));
    }
}
