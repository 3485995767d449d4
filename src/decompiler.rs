//! Top-Level Entry Points
//!
//! Wires the per-stage analyzer structs together into the two outputs an
//! embedder can ask for: `RegularMethodNode` for synchronous methods and
//! `AsyncMethodNode` for split ones. This is the "glue" component —
//! everything here is orchestration, the actual algorithms live in their
//! own modules.

use crate::cfg::ControlFlowGraph;
use crate::collaborators::{AsyncSplitter, ClassSource, Optimizer};
use crate::diagnostics::render_listing;
use crate::error::Result;
use crate::indexer::build_graph_index;
use crate::instr::{Instruction, Local};
use crate::liveness;
use crate::loop_forest::LoopForest;
use crate::program::{MethodReference, Program};
use crate::range_tree::RangeTree;
use crate::regalloc;
use crate::generator::StatementGenerator;
use crate::statement::{MethodPart, Statement, VariableNode};
use crate::type_infer::{StackTypeInferer, TypeInferer};
use std::collections::HashMap;
use std::collections::HashSet;

/// `{ friendlyToDebugger: bool, splitMethods: set<MethodReference> }`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DecompileFlags {
    pub friendly_to_debugger: bool,
    pub split_methods: HashSet<MethodReference>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegularMethodNode {
    pub method: MethodReference,
    pub body: Statement,
    pub variables: Vec<VariableNode>,
    pub modifiers: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsyncMethodNode {
    pub method: MethodReference,
    pub parts: Vec<MethodPart>,
    pub variables: Vec<VariableNode>,
    pub modifiers: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodNode {
    Regular(RegularMethodNode),
    Async(AsyncMethodNode),
}

/// Bundles the three external collaborators a decompilation run needs.
/// Each per-method driver constructed inside `decompile` is fresh and holds
/// no interior mutability, so running many of these concurrently across
/// methods on a read-only `Program` set is safe provided the collaborators
/// themselves are `Sync`.
pub struct Decompiler<'a> {
    pub class_source: &'a dyn ClassSource,
    pub async_splitter: Option<&'a dyn AsyncSplitter>,
    pub optimizer: &'a dyn Optimizer,
}

impl<'a> Decompiler<'a> {
    pub fn new(
        class_source: &'a dyn ClassSource,
        async_splitter: Option<&'a dyn AsyncSplitter>,
        optimizer: &'a dyn Optimizer,
    ) -> Self {
        Self {
            class_source,
            async_splitter,
            optimizer,
        }
    }

    pub fn decompile(
        &self,
        program: &Program,
        method: &MethodReference,
        flags: &DecompileFlags,
        modifiers: u32,
    ) -> Result<MethodNode> {
        let listing = || render_listing(method, program);

        if flags.split_methods.contains(method) {
            self.decompile_async(program, method, flags, modifiers, &listing)
        } else {
            self.decompile_regular(program, method, flags, modifiers, &listing)
        }
    }

    fn decompile_regular(
        &self,
        program: &Program,
        method: &MethodReference,
        flags: &DecompileFlags,
        modifiers: u32,
        listing: &impl Fn() -> String,
    ) -> Result<MethodNode> {
        log::debug!("decompiler: stage cfg: building control-flow graph for {method}");
        let program = self.resolve_exception_types(program);
        let cfg = ControlFlowGraph::build(&program);
        let weights = block_weights(&program);
        log::debug!("decompiler: stage index: linearising {method}");
        let index = build_graph_index(&cfg, &weights, &HashMap::new(), method, || listing())?;
        log::debug!("decompiler: stage loops: finding natural loops for {method}");
        let forest = LoopForest::build(&cfg, &index.back_edges);
        log::debug!("decompiler: stage ranges: building range tree for {method}");
        let tree = RangeTree::build(&cfg, &index, &forest);
        let gen = StatementGenerator::new(&program, &index, &tree, None);
        let body = gen.generate(method, listing)?;
        log::debug!("decompiler: stage optimize: running optimiser pass for {method}");
        let body = self.optimizer.optimize(body, &program, flags.friendly_to_debugger);

        let variables = self.collect_variables(&program);
        Ok(MethodNode::Regular(RegularMethodNode {
            method: method.clone(),
            body,
            variables,
            modifiers,
        }))
    }

    fn decompile_async(
        &self,
        program: &Program,
        method: &MethodReference,
        flags: &DecompileFlags,
        modifiers: u32,
        listing: &impl Fn() -> String,
    ) -> Result<MethodNode> {
        log::debug!("decompiler: stage split: splitting {method} into async parts");
        let program = self.resolve_exception_types(program);
        let splitter = self.async_splitter.ok_or_else(|| crate::error::DecompileError::AsyncSplitFailure {
            method: method.clone(),
            cause: "method is marked for splitting but no AsyncSplitter is configured".into(),
        })?;
        let subprograms = splitter.split(&program)?;
        log::debug!("decompiler: {method} split into {} parts", subprograms.len());

        let mut parts = Vec::with_capacity(subprograms.len());
        for (part_index, sub) in subprograms.iter().enumerate() {
            let sub_program = sub.program();
            let sub_cfg = ControlFlowGraph::build(sub_program);
            let sub_weights = block_weights(sub_program);
            let sub_index = build_graph_index(&sub_cfg, &sub_weights, &HashMap::new(), method, || listing())?;
            let sub_forest = LoopForest::build(&sub_cfg, &sub_index.back_edges);
            let sub_tree = RangeTree::build(&sub_cfg, &sub_index, &sub_forest);
            let gen = StatementGenerator::new(sub_program, &sub_index, &sub_tree, Some(sub.target_part()));
            let body = gen.generate(method, listing)?;
            log::debug!("decompiler: stage optimize: running optimiser pass on part {part_index} of {method}");
            let body = self.optimizer.optimize(body, &program, flags.friendly_to_debugger);
            parts.push(MethodPart {
                index: part_index,
                body,
            });
        }

        let variables = self.collect_variables(&program);
        Ok(MethodNode::Async(AsyncMethodNode {
            method: method.clone(),
            parts,
            variables,
            modifiers,
        }))
    }

    /// Resolves every handler range's exception type name through
    /// `class_source`, matching the `ClassSource` contract's "an unresolved
    /// name becomes a catch-all rather than an error": a name the
    /// collaborator cannot find is flattened to `None` here, before the
    /// bookmarker or generator ever see it, so the rest of the pipeline only
    /// ever deals with names it could confirm exist.
    fn resolve_exception_types(&self, program: &Program) -> Program {
        let mut resolved = program.clone();
        for block in &mut resolved.blocks {
            for range in &mut block.try_catch {
                if let Some(name) = &range.exception_type {
                    if self.class_source.get(name).is_none() {
                        range.exception_type = None;
                    }
                }
            }
        }
        resolved
    }

    /// Liveness and register allocation run on the *original* program,
    /// independent of how many parts the statement generator produced.
    fn collect_variables(&self, program: &Program) -> Vec<VariableNode> {
        let num_vars = max_local(program) as usize + 1;
        let cfg = ControlFlowGraph::build(program);
        let inferer = StackTypeInferer::infer(program);
        let liveness_result = liveness::analyze(program, &cfg, num_vars);

        let mut kind_of = HashMap::new();
        for local in 0..num_vars as Local {
            if let Some(kind) = inferer.type_of(local) {
                kind_of.insert(local, kind);
            }
        }
        let graph = regalloc::build_interference_graph(program, &liveness_result, &kind_of, num_vars);
        let colours = regalloc::allocate(&graph);

        (0..num_vars as Local)
            .map(|local| {
                let mut v = VariableNode::new(local);
                v.ty = kind_of.get(&local).copied();
                v.register = colours.get(&local).copied().unwrap_or(-1);
                v
            })
            .collect()
    }
}

fn block_weights(program: &Program) -> Vec<u64> {
    program.blocks.iter().map(|b| b.instructions.len() as u64).collect()
}

fn max_local(program: &Program) -> Local {
    let mut max = 0;
    for block in &program.blocks {
        for instr in &block.instructions {
            let local = match instr {
                Instruction::Load { local, .. } | Instruction::Store { local, .. } => *local,
                _ => continue,
            };
            max = max.max(local);
        }
        if let Some(local) = block.exception_local {
            max = max.max(local);
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::IdentityOptimizer;
    use crate::collaborators::ClassDescriptor;
    use crate::instr::VariableKind;
    use crate::program::BasicBlock;

    struct NoClasses;
    impl ClassSource for NoClasses {
        fn get(&self, _name: &str) -> Option<ClassDescriptor> {
            None
        }
    }

    #[test]
    fn straight_line_method_decompiles_to_regular_node() {
        let mut b0 = BasicBlock::new(0);
        b0.instructions.push(Instruction::Store { local: 0, kind: VariableKind::I32 });
        b0.instructions.push(Instruction::Return { has_value: false });
        let program = Program::new(vec![b0]);
        let method = MethodReference::new("p/C", "m", "()V");

        let classes = NoClasses;
        let optimizer = IdentityOptimizer;
        let decompiler = Decompiler::new(&classes, None, &optimizer);
        let flags = DecompileFlags::default();
        let result = decompiler.decompile(&program, &method, &flags, 0).unwrap();
        match result {
            MethodNode::Regular(node) => {
                assert_eq!(node.method, method);
                assert!(!node.variables.is_empty());
            }
            MethodNode::Async(_) => panic!("expected a regular node"),
        }
    }

    #[test]
    fn unresolved_exception_type_becomes_catch_all() {
        let mut b0 = BasicBlock::new(0);
        b0.instructions.push(Instruction::Const { value: 1, kind: VariableKind::I32 });
        b0.instructions.push(Instruction::Store { local: 0, kind: VariableKind::I32 });
        b0.instructions.push(Instruction::Return { has_value: false });
        b0.try_catch.push(crate::program::TryCatchRange {
            exception_type: Some("unresolved/Exc".into()),
            handler_block: 1,
            exception_local: Some(0),
        });

        let mut b1 = BasicBlock::new(1);
        b1.exception_local = Some(0);
        b1.instructions.push(Instruction::Return { has_value: false });

        let program = Program::new(vec![b0, b1]);
        let method = MethodReference::new("p/C", "m", "()V");

        let classes = NoClasses;
        let optimizer = IdentityOptimizer;
        let decompiler = Decompiler::new(&classes, None, &optimizer);
        let flags = DecompileFlags::default();
        let result = decompiler.decompile(&program, &method, &flags, 0).unwrap();
        let body = match result {
            MethodNode::Regular(node) => node.body,
            MethodNode::Async(_) => panic!("expected a regular node"),
        };
        let Statement::Sequential(items) = body else { panic!("expected Sequential root") };
        let found = items.iter().any(|s| matches!(s, Statement::TryCatch { exception_type: None, .. }));
        assert!(found, "unresolved exception type should have been flattened to catch-all: {items:?}");
    }

    #[test]
    fn splitting_without_a_configured_splitter_fails() {
        let mut b0 = BasicBlock::new(0);
        b0.instructions.push(Instruction::Return { has_value: false });
        let program = Program::new(vec![b0]);
        let method = MethodReference::new("p/C", "m", "()V");

        let classes = NoClasses;
        let optimizer = IdentityOptimizer;
        let decompiler = Decompiler::new(&classes, None, &optimizer);
        let mut flags = DecompileFlags::default();
        flags.split_methods.insert(method.clone());

        let result = decompiler.decompile(&program, &method, &flags, 0);
        assert!(matches!(result, Err(crate::error::DecompileError::AsyncSplitFailure { .. })));
    }
}
