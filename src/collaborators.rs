//! External Collaborator Contracts
//!
//! The only three places the core reaches outside itself. All other stages
//! (indexer, loop analysis, range tree, generator, bookmarker, liveness,
//! register allocator) are plain stateless analyzer structs with an
//! associated-function entry point, matching the `ControlFlowAnalyzer`/
//! `DataFlowAnalyzer`/`LoopAnalyzer` shape used elsewhere in this crate.
//! These three are `trait`s instead so callers can supply fakes in tests,
//! the same way class-metadata lookups are injected as a dependency rather
//! than reached for as global state.

use crate::error::Result;
use crate::program::Program;
use crate::statement::Statement;

/// A resolved class's shape, as far as the core needs to know it: enough to
/// look up an exception type's ancestry for catch-all resolution.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassDescriptor {
    pub name: String,
    pub super_name: Option<String>,
}

/// `ClassSource.get(name) -> ClassDescriptor?`. Used only for type
/// inference and exception-type lookup; an unresolved name becomes a
/// catch-all (`None` exception type) rather than an error.
pub trait ClassSource {
    fn get(&self, name: &str) -> Option<ClassDescriptor>;
}

/// One sub-program produced by splitting an asynchronous method.
pub struct SubProgram {
    program: Program,
    /// `target_part[original_block_id]`, `-1` if the block does not
    /// transfer to a different part. Kept as `target_part` here rather than
    /// the `blockSuccessors` name sometimes seen for the same kind of array,
    /// since this one indexes by original block id rather than by successor
    /// position.
    target_part: Vec<i32>,
}

impl SubProgram {
    pub fn new(program: Program, target_part: Vec<i32>) -> Self {
        Self { program, target_part }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn target_part(&self) -> &[i32] {
        &self.target_part
    }
}

/// `AsyncSplitter.split(program) -> [SubProgram]`. Parts carry no
/// shared state in the decompiler; inter-part dataflow is this
/// collaborator's concern, not the core's.
pub trait AsyncSplitter {
    fn split(&self, program: &Program) -> Result<Vec<SubProgram>>;
}

/// `Optimizer.optimize(node, originalProgram, friendlyToDebugger)`,
/// applied to the decompiled node before it is returned. A no-op
/// implementation is provided for callers that do not need post-pass
/// optimisation; its second application trivially satisfies the idempotence
/// property since it never changes the tree.
pub trait Optimizer {
    fn optimize(&self, node: Statement, original_program: &Program, friendly_to_debugger: bool) -> Statement;
}

/// `Optimizer` that returns its input unchanged.
#[derive(Debug, Default)]
pub struct IdentityOptimizer;

impl Optimizer for IdentityOptimizer {
    fn optimize(&self, node: Statement, _original_program: &Program, _friendly_to_debugger: bool) -> Statement {
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_optimizer_is_idempotent() {
        let program = Program::new(vec![]);
        let opt = IdentityOptimizer;
        let once = opt.optimize(Statement::Sequential(vec![]), &program, false);
        let twice = opt.optimize(once.clone(), &program, false);
        assert_eq!(once, twice);
    }
}
