//! Type Inferer
//!
//! A collaborator contract: the core only calls `typeOf(var)` to populate
//! `VariableNode.ty`, it never invents a fallback type of its own.
//! `StackTypeInferer` is the default implementation, grounded on
//! `analysis/type_inference.rs`'s forward-unification pass, adapted here to
//! this crate's stack-based instruction set: each `Load`/`Store` of a local
//! carries the operand kind directly, so unification is reduced to "every
//! observed kind for a local must agree."

use crate::instr::{Instruction, Local, VariableKind};
use crate::program::Program;
use std::collections::HashMap;

/// Type-inference collaborator contract.
pub trait TypeInferer {
    fn type_of(&self, local: Local) -> Option<VariableKind>;
}

/// Forward pass over every block's `Load`/`Store` of locals, unifying the
/// kind observed for each local. A local observed with two different kinds
/// keeps the first and is left for the caller to flag via `conflicts()` —
/// the core itself never silently picks one.
#[derive(Debug, Default)]
pub struct StackTypeInferer {
    kinds: HashMap<Local, VariableKind>,
    conflicts: HashMap<Local, (VariableKind, VariableKind)>,
}

impl StackTypeInferer {
    pub fn infer(program: &Program) -> Self {
        let mut inferer = Self::default();
        for block in &program.blocks {
            for instr in &block.instructions {
                let (local, kind) = match instr {
                    Instruction::Load { local, kind } => (*local, *kind),
                    Instruction::Store { local, kind } => (*local, *kind),
                    _ => continue,
                };
                inferer.unify(local, kind);
            }
        }
        inferer
    }

    fn unify(&mut self, local: Local, kind: VariableKind) {
        match self.kinds.get(&local) {
            None => {
                self.kinds.insert(local, kind);
            }
            Some(&existing) if existing != kind => {
                self.conflicts.entry(local).or_insert((existing, kind));
            }
            _ => {}
        }
    }

    pub fn conflicts(&self) -> &HashMap<Local, (VariableKind, VariableKind)> {
        &self.conflicts
    }
}

impl TypeInferer for StackTypeInferer {
    fn type_of(&self, local: Local) -> Option<VariableKind> {
        self.kinds.get(&local).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::BasicBlock;

    #[test]
    fn infers_kind_from_load_and_store() {
        let mut b0 = BasicBlock::new(0);
        b0.instructions.push(Instruction::Store { local: 2, kind: VariableKind::F64 });
        let program = Program::new(vec![b0]);
        let inferer = StackTypeInferer::infer(&program);
        assert_eq!(inferer.type_of(2), Some(VariableKind::F64));
        assert!(inferer.conflicts().is_empty());
    }

    #[test]
    fn conflicting_kinds_are_recorded_not_silently_resolved() {
        let mut b0 = BasicBlock::new(0);
        b0.instructions.push(Instruction::Store { local: 0, kind: VariableKind::I32 });
        b0.instructions.push(Instruction::Load { local: 0, kind: VariableKind::F32 });
        let program = Program::new(vec![b0]);
        let inferer = StackTypeInferer::infer(&program);
        assert_eq!(inferer.type_of(0), Some(VariableKind::I32));
        assert_eq!(inferer.conflicts().get(&0), Some(&(VariableKind::I32, VariableKind::F32)));
    }
}
