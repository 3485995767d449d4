//! Range Tree Construction
//!
//! Seeds the statement generator's lexical blocks: one range per loop
//! (`header -> loopSuccessor`) and one per forward-jump span whose target
//! is reached from a strictly earlier predecessor than its immediate
//! neighbour. Grounded on `analysis/loop_analysis.rs`'s interval-merging
//! approach, generalised from loop-only ranges to the full two-source
//! range set the generator needs.

use crate::cfg::ControlFlowGraph;
use crate::indexer::GraphIndex;
use crate::loop_forest::LoopForest;
use std::collections::HashMap;

/// One nested interval `[start, end)` over indexed positions.
#[derive(Debug, Clone)]
pub struct RangeNode {
    pub start: u32,
    pub end: u32,
    /// `Some(loop_index)` when this range seeds a `While`, i.e. it came from
    /// a loop header rather than a plain forward-jump span.
    pub loop_index: Option<usize>,
    pub children: Vec<usize>,
}

/// Forest of `RangeNode`s ordered by `start` ascending, `end` descending,
/// nested strictly.
#[derive(Debug, Clone)]
pub struct RangeTree {
    nodes: Vec<RangeNode>,
    pub roots: Vec<usize>,
}

impl RangeTree {
    pub fn build(cfg: &ControlFlowGraph, index: &GraphIndex, loops: &LoopForest) -> Self {
        let n = index.len();

        // Loop ranges come first so that a forward-jump span with identical
        // bounds is recognised as already covered and skipped.
        let mut loop_ranges: HashMap<(u32, u32), usize> = HashMap::new();
        for (loop_idx, l) in loops.loops.iter().enumerate() {
            let mut max_indexed = 0u32;
            for member in l.body.iter_ones() {
                max_indexed = max_indexed.max(index.index_of(member as u32));
            }
            let start = index.index_of(l.header);
            let end = max_indexed + 1;
            loop_ranges.insert((start, end), loop_idx);
        }

        let mut ranges: Vec<(u32, u32, Option<usize>)> = loop_ranges
            .iter()
            .map(|(&(s, e), &li)| (s, e, Some(li)))
            .collect();

        for iv in 0..n as u32 {
            let original_v = index.node_at(iv);
            let mut pred_start: Option<u32> = None;
            for &pred in &cfg.predecessors[original_v as usize] {
                let ip = index.index_of(pred);
                pred_start = Some(match pred_start {
                    None => ip,
                    Some(existing) => existing.min(ip),
                });
            }
            let Some(pred_start) = pred_start else { continue };
            if iv >= 1 && pred_start < iv - 1 && !loop_ranges.contains_key(&(pred_start, iv)) {
                ranges.push((pred_start, iv, None));
            }
        }

        ranges.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut nodes = Vec::with_capacity(ranges.len());
        let mut roots = Vec::new();
        // Stack of (node index, end) representing currently-open ancestors.
        let mut stack: Vec<usize> = Vec::new();

        for (start, end, loop_index) in ranges {
            while let Some(&top) = stack.last() {
                if nodes[top].end <= start {
                    stack.pop();
                } else {
                    break;
                }
            }
            let id = nodes.len();
            nodes.push(RangeNode {
                start,
                end,
                loop_index,
                children: Vec::new(),
            });
            match stack.last() {
                Some(&parent) => nodes[parent].children.push(id),
                None => roots.push(id),
            }
            stack.push(id);
        }

        Self { nodes, roots }
    }

    pub fn node(&self, id: usize) -> &RangeNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids whose `start == at`, in no particular order relative to
    /// each other (the generator installs them as nested pushes, innermost
    /// last since children never precede a still-open parent in tree order).
    pub fn starting_at(&self, at: u32) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.start == at)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn ending_at(&self, at: u32) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.end == at)
            .map(|(i, _)| i)
            .collect()
    }
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
    fn simple_loop_yields_single_loop_range() {
        let cfg = cfg_of(&[(0, 1), (1, 1), (1, 2)], 3);
        let method = MethodReference::new("p/C", "m", "()V");
        let idx = build_graph_index(&cfg, &[0; 3], &Map::new(), &method, String::new).unwrap();
        let forest = LoopForest::build(&cfg, &idx.back_edges);
        let tree = RangeTree::build(&cfg, &idx, &forest);
        assert_eq!(tree.len(), 1);
        let root = tree.node(tree.roots[0]);
        assert_eq!((root.start, root.end), (1, 2));
        assert!(root.loop_index.is_some());
    }

    #[test]
    fn self_loop_yields_range_n_n_plus_1() {
        let cfg = cfg_of(&[(0, 0), (0, 1)], 2);
        let method = MethodReference::new("p/C", "m", "()V");
        let idx = build_graph_index(&cfg, &[0; 2], &Map::new(), &method, String::new).unwrap();
        let forest = LoopForest::build(&cfg, &idx.back_edges);
        let tree = RangeTree::build(&cfg, &idx, &forest);
        assert_eq!(tree.len(), 1);
        let root = tree.node(tree.roots[0]);
        assert_eq!((root.start, root.end), (0, 1));
    }

    #[test]
    fn nested_loops_nest_in_tree() {
        let cfg = cfg_of(
            &[(0, 1), (1, 2), (1, 5), (2, 3), (3, 2), (3, 4), (4, 1)],
            6,
        );
        let method = MethodReference::new("p/C", "m", "()V");
        let idx = build_graph_index(&cfg, &[0; 6], &Map::new(), &method, String::new).unwrap();
        let forest = LoopForest::build(&cfg, &idx.back_edges);
        let tree = RangeTree::build(&cfg, &idx, &forest);
        assert_eq!(tree.roots.len(), 1);
        let outer = tree.node(tree.roots[0]);
        assert!(!outer.children.is_empty());
        let inner = tree.node(outer.children[0]);
        assert!(inner.start >= outer.start && inner.end <= outer.end);
    }
}
