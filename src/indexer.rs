//! Graph Indexer
//!
//! Linearises the control-flow graph into `0..N` such that every forward
//! edge `u -> v` has `idx(u) < idx(v)` unless `v` is a loop header, in which
//! case the edge is a back-edge and goes backwards. Ties among a block's
//! successors are broken by weight/priority, reducing the span of forward
//! jumps.
//!
//! # Algorithm
//! A reverse-postorder (RPO) numbering from an iterative, non-recursive
//! depth-first traversal has the property that every edge not classified
//! as a back-edge already goes forward. Back-edges are the
//! edges `(u, v)` where `v` dominates `u`; dominance is computed with the
//! standard Cooper/Harvey/Kennedy iterative algorithm, which is well
//! defined for any single-entry graph regardless of reducibility. A
//! retreating edge (`rank[v] <= rank[u]`) whose target does *not* dominate
//! its source proves the graph irreducible: the indexer
//! refuses rather than guess an order.

use crate::cfg::ControlFlowGraph;
use crate::error::{DecompileError, Result};
use crate::program::MethodReference;
use std::collections::HashMap;

/// Bijection between original block ids and linearised positions, plus the
/// back-edges discovered while proving reducibility.
#[derive(Debug, Clone)]
pub struct GraphIndex {
    /// `to_index[original_id] = indexed position`
    to_index: Vec<u32>,
    /// `to_original[indexed position] = original_id`
    to_original: Vec<u32>,
    /// `(source, header)` pairs, in original block ids, where `header`
    /// dominates `source` and `source -> header` is an edge in the CFG.
    pub back_edges: Vec<(u32, u32)>,
}

impl GraphIndex {
    pub fn len(&self) -> usize {
        self.to_original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_original.is_empty()
    }

    pub fn index_of(&self, original: u32) -> u32 {
        self.to_index[original as usize]
    }

    pub fn node_at(&self, index: u32) -> u32 {
        self.to_original[index as usize]
    }

    /// Reindexed successor lists, keyed and valued by indexed position.
    pub fn reindexed_successors(&self, cfg: &ControlFlowGraph) -> Vec<Vec<u32>> {
        let mut out = vec![Vec::new(); self.len()];
        for original_u in 0..cfg.successors.len() as u32 {
            let iu = self.index_of(original_u);
            for &original_v in &cfg.successors[original_u as usize] {
                out[iu as usize].push(self.index_of(original_v));
            }
        }
        out
    }
}

/// Builds the `GraphIndex` for `cfg`, weighting ties among successors by
/// `block_weight` (larger blocks sort later) with `priority_pins`
/// overriding the natural weight when present (a higher pin value sorts
/// later, same as a larger weight).
pub fn build_graph_index(
    cfg: &ControlFlowGraph,
    block_weight: &[u64],
    priority_pins: &HashMap<u32, i32>,
    method: &MethodReference,
    listing: impl FnOnce() -> String,
) -> Result<GraphIndex> {
    let n = cfg.successors.len();
    // Blocks unreachable from the entry are excluded from the traversal and
    // left as `u32::MAX` in `to_index`; the indexer only orders what the
    // entry can reach.
    let rpo = reverse_postorder(cfg, n, block_weight, priority_pins);

    let mut to_index = vec![u32::MAX; n];
    for (rank, &node) in rpo.iter().enumerate() {
        to_index[node as usize] = rank as u32;
    }
    let to_original = rpo;

    let dom = dominators(cfg, &to_original, &to_index);

    let mut back_edges = Vec::new();
    for u in 0..n as u32 {
        if to_index[u as usize] == u32::MAX {
            continue;
        }
        for &v in &cfg.successors[u as usize] {
            if to_index[v as usize] == u32::MAX {
                continue;
            }
            let retreating = to_index[v as usize] <= to_index[u as usize];
            if !retreating {
                continue;
            }
            if dominates(&dom, v, u) {
                back_edges.push((u, v));
            } else {
                return Err(DecompileError::IrreducibleControlFlow {
                    method: method.clone(),
                    listing: listing(),
                });
            }
        }
    }

    Ok(GraphIndex {
        to_index,
        to_original,
        back_edges,
    })
}

/// Iterative (explicit-stack) depth-first traversal producing
/// reverse-postorder. Successors are visited in descending
/// `(priority_pin, weight)` order: a reverse-postorder numbering places a
/// node's earliest-visited child last among its siblings, so visiting the
/// heavier/pinned-later successor first is what makes it rank last.
fn reverse_postorder(
    cfg: &ControlFlowGraph,
    n: usize,
    block_weight: &[u64],
    priority_pins: &HashMap<u32, i32>,
) -> Vec<u32> {
    let key_of = |b: u32| -> (i32, u64) {
        let pin = priority_pins.get(&b).copied().unwrap_or(0);
        let weight = block_weight.get(b as usize).copied().unwrap_or(0);
        (pin, weight)
    };

    let mut visited = vec![false; n];
    let mut postorder = Vec::with_capacity(n);
    // Each stack frame: (node, next successor index to visit, sorted successors)
    let mut stack: Vec<(u32, usize, Vec<u32>)> = Vec::new();

    let entry = cfg.entry;
    if (entry as usize) < n {
        visited[entry as usize] = true;
        let mut succs = cfg.successors[entry as usize].to_vec();
        succs.sort_by_key(|&s| std::cmp::Reverse(key_of(s)));
        stack.push((entry, 0, succs));
    }

    while let Some(frame) = stack.last_mut() {
        let (node, next, succs) = frame;
        if *next < succs.len() {
            let candidate = succs[*next];
            *next += 1;
            if !visited[candidate as usize] {
                visited[candidate as usize] = true;
                let mut child_succs = cfg.successors[candidate as usize].to_vec();
                child_succs.sort_by_key(|&s| std::cmp::Reverse(key_of(s)));
                stack.push((candidate, 0, child_succs));
            }
        } else {
            postorder.push(*node);
            stack.pop();
        }
    }

    postorder.reverse();
    postorder
}

/// Immediate-dominator array, indexed by original block id; `u32::MAX`
/// means "unreachable" (not assigned a dominator).
fn dominators(cfg: &ControlFlowGraph, to_original: &[u32], to_index: &[u32]) -> Vec<u32> {
    let n = cfg.successors.len();
    let mut idom = vec![u32::MAX; n];
    let entry = cfg.entry;
    idom[entry as usize] = entry;

    let mut changed = true;
    while changed {
        changed = false;
        // Process in reverse-postorder, skipping the entry.
        for &node in to_original.iter() {
            if node == entry {
                continue;
            }
            let preds = &cfg.predecessors[node as usize];
            let mut new_idom: Option<u32> = None;
            for &p in preds {
                if idom[p as usize] == u32::MAX {
                    continue;
                }
                new_idom = Some(match new_idom {
                    None => p,
                    Some(existing) => intersect(&idom, to_index, existing, p),
                });
            }
            if let Some(computed) = new_idom {
                if idom[node as usize] != computed {
                    idom[node as usize] = computed;
                    changed = true;
                }
            }
        }
    }

    idom
}

fn intersect(idom: &[u32], to_index: &[u32], mut a: u32, mut b: u32) -> u32 {
    while a != b {
        while to_index[a as usize] > to_index[b as usize] {
            a = idom[a as usize];
        }
        while to_index[b as usize] > to_index[a as usize] {
            b = idom[b as usize];
        }
    }
    a
}

/// Whether `candidate` dominates `node` (every path from entry to `node`
/// passes through `candidate`), including the trivial case `candidate == node`.
fn dominates(idom: &[u32], candidate: u32, mut node: u32) -> bool {
    if idom[node as usize] == u32::MAX {
        return false;
    }
    loop {
        if node == candidate {
            return true;
        }
        let next = idom[node as usize];
        if next == node {
            // Reached the entry without finding `candidate`.
            return candidate == node;
        }
        node = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{BasicBlock, Program};

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

    fn method() -> MethodReference {
        MethodReference::new("pkg/Cls", "run", "()V")
    }

    #[test]
    fn simple_loop_indexes_with_back_edge() {
        // B0 -> B1 -> B2 (exit); B1 -> B1 loop back (self) and B1 -> B2.
        let cfg = cfg_of(&[(0, 1), (1, 1), (1, 2)], 3);
        let idx = build_graph_index(&cfg, &[0, 0, 0], &HashMap::new(), &method(), String::new).unwrap();
        assert_eq!(idx.index_of(0), 0);
        assert_eq!(idx.index_of(1), 1);
        assert_eq!(idx.index_of(2), 2);
        assert_eq!(idx.back_edges, vec![(1, 1)]);
    }

    #[test]
    fn irreducible_graph_is_rejected() {
        // Two loop entries into the same cycle: 0->1, 0->2, 1->2, 2->1.
        let cfg = cfg_of(&[(0, 1), (0, 2), (1, 2), (2, 1)], 3);
        let result = build_graph_index(&cfg, &[0, 0, 0], &HashMap::new(), &method(), String::new);
        assert!(matches!(result, Err(DecompileError::IrreducibleControlFlow { .. })));
    }

    #[test]
    fn heavier_successor_sorts_later() {
        // 0 -> 1, 0 -> 2; make 2 much heavier than 1, so 1 should index first.
        let cfg = cfg_of(&[(0, 1), (0, 2)], 3);
        let idx = build_graph_index(&cfg, &[0, 1, 100], &HashMap::new(), &method(), String::new).unwrap();
        assert!(idx.index_of(1) < idx.index_of(2));
    }
}
