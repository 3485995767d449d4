//! Loop Analysis
//!
//! Builds the natural-loop forest from the back-edges the graph indexer
//! proved safe: for each back-edge `(u, h)`, the loop body is every
//! node that can reach `u` without passing through `h`. Loops that share a
//! header are merged, generalising the usual "detect a loop per back-edge"
//! approach to "merge into one loop per header" and extending it with
//! parent pointers so nested loops know their enclosing loop.

use crate::cfg::ControlFlowGraph;
use bitvec::prelude::*;
use smallvec::SmallVec;
use std::collections::HashMap;

/// One natural loop: header block plus member set.
#[derive(Debug, Clone)]
pub struct LoopInfo {
    pub header: u32,
    /// Membership bitset over original block ids.
    pub body: BitVec<u32>,
    pub back_edges: SmallVec<[(u32, u32); 2]>,
    body_size: usize,
}

impl LoopInfo {
    pub fn contains(&self, block: u32) -> bool {
        self.body.get(block as usize).map(|b| *b).unwrap_or(false)
    }
}

/// For each block, its innermost containing loop; for each loop, its
/// immediately enclosing loop.
#[derive(Debug, Clone)]
pub struct LoopForest {
    pub loops: Vec<LoopInfo>,
    parent: Vec<Option<usize>>,
    innermost_of_block: HashMap<u32, usize>,
}

impl LoopForest {
    pub fn build(cfg: &ControlFlowGraph, back_edges: &[(u32, u32)]) -> Self {
        let n = cfg.successors.len();

        let mut sources_by_header: HashMap<u32, Vec<u32>> = HashMap::new();
        for &(source, header) in back_edges {
            sources_by_header.entry(header).or_default().push(source);
        }

        let mut loops: Vec<LoopInfo> = Vec::new();
        for (&header, sources) in &sources_by_header {
            let body = natural_loop_body(cfg, n, header, sources);
            let body_size = body.count_ones();
            let back_edges = sources.iter().map(|&s| (s, header)).collect();
            loops.push(LoopInfo {
                header,
                body,
                back_edges,
                body_size,
            });
        }
        // Deterministic order: smaller loops (innermost-first) simplifies
        // nesting lookups below, and gives stable iteration for callers.
        loops.sort_by_key(|l| (l.body_size, l.header));

        let parent = Self::compute_parents(&loops);
        let innermost_of_block = Self::compute_innermost(&loops);

        Self {
            loops,
            parent,
            innermost_of_block,
        }
    }

    fn compute_parents(loops: &[LoopInfo]) -> Vec<Option<usize>> {
        let mut parent = vec![None; loops.len()];
        for (i, loop_i) in loops.iter().enumerate() {
            let mut best: Option<usize> = None;
            for (j, loop_j) in loops.iter().enumerate() {
                if i == j {
                    continue;
                }
                if loop_j.contains(loop_i.header) && loop_j.header != loop_i.header {
                    best = match best {
                        None => Some(j),
                        Some(b) if loops[j].body_size < loops[b].body_size => Some(j),
                        Some(b) => Some(b),
                    };
                }
            }
            parent[i] = best;
        }
        parent
    }

    fn compute_innermost(loops: &[LoopInfo]) -> HashMap<u32, usize> {
        let mut innermost: HashMap<u32, usize> = HashMap::new();
        for (i, l) in loops.iter().enumerate() {
            for block in l.body.iter_ones() {
                let block = block as u32;
                match innermost.get(&block) {
                    Some(&existing) if loops[existing].body_size <= l.body_size => {}
                    _ => {
                        innermost.insert(block, i);
                    }
                }
            }
        }
        innermost
    }

    pub fn innermost_loop_of(&self, block: u32) -> Option<&LoopInfo> {
        self.innermost_of_block.get(&block).map(|&i| &self.loops[i])
    }

    pub fn innermost_loop_index_of(&self, block: u32) -> Option<usize> {
        self.innermost_of_block.get(&block).copied()
    }

    pub fn parent_of(&self, loop_index: usize) -> Option<usize> {
        self.parent[loop_index]
    }
}

fn natural_loop_body(cfg: &ControlFlowGraph, n: usize, header: u32, sources: &[u32]) -> BitVec<u32> {
    let mut body: BitVec<u32> = bitvec![u32, Lsb0; 0; n];
    body.set(header as usize, true);

    let mut stack: Vec<u32> = sources.to_vec();
    while let Some(node) = stack.pop() {
        if body[node as usize] {
            continue;
        }
        body.set(node as usize, true);
        for &pred in &cfg.predecessors[node as usize] {
            if !body[pred as usize] {
                stack.push(pred);
            }
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::build_graph_index;
    use crate::program::MethodReference;
    use std::collections::HashMap as Map;

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
    fn single_loop_body_contains_header_and_members() {
        // B0 -> B1; B1 -> B1|B2 (self loop + exit).
        let cfg = cfg_of(&[(0, 1), (1, 1), (1, 2)], 3);
        let method = MethodReference::new("p/C", "m", "()V");
        let idx = build_graph_index(&cfg, &[0, 0, 0], &Map::new(), &method, String::new).unwrap();
        let forest = LoopForest::build(&cfg, &idx.back_edges);
        assert_eq!(forest.loops.len(), 1);
        assert!(forest.loops[0].contains(1));
        assert!(!forest.loops[0].contains(2));
        assert_eq!(forest.innermost_loop_of(1).unwrap().header, 1);
        assert!(forest.innermost_loop_of(2).is_none());
    }

    #[test]
    fn nested_loop_parent_pointer() {
        // B0 -> B1; B1 -> B2|B5; B2 -> B3; B3 -> B2|B4; B4 -> B1; B5 -> ret.
        let cfg = cfg_of(
            &[(0, 1), (1, 2), (1, 5), (2, 3), (3, 2), (3, 4), (4, 1)],
            6,
        );
        let method = MethodReference::new("p/C", "m", "()V");
        let idx = build_graph_index(&cfg, &[0; 6], &Map::new(), &method, String::new).unwrap();
        let forest = LoopForest::build(&cfg, &idx.back_edges);
        assert_eq!(forest.loops.len(), 2);

        let inner_idx = forest.innermost_loop_index_of(2).unwrap();
        let outer_idx = forest.innermost_loop_index_of(1).unwrap();
        assert_ne!(inner_idx, outer_idx);
        assert_eq!(forest.loops[inner_idx].header, 2);
        assert_eq!(forest.loops[outer_idx].header, 1);
        assert_eq!(forest.parent_of(inner_idx), Some(outer_idx));
        assert_eq!(forest.parent_of(outer_idx), None);

        // Block 3 is inside both loops; innermost must be the header-2 loop.
        assert_eq!(forest.innermost_loop_index_of(3), Some(inner_idx));
    }
}
