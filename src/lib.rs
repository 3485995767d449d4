//! Decompilation core: folds per-method control-flow graphs into structured
//! statements, with interval register allocation and coroutine-split
//! support.
//!
//! The pipeline runs leaf-first: a `ControlFlowGraph` is linearised by the
//! [`indexer`], natural loops are found by [`loop_forest`], candidate
//! lexical scopes are seeded by [`range_tree`], and [`generator`] drives a
//! single explicit-stack pass that emits the [`statement`] tree while
//! [`bookmarker`] tracks try/catch scope transitions. [`liveness`] and
//! [`regalloc`] run independently on the original program to colour
//! variables. [`decompiler`] wires all of the above into the two outputs an
//! embedder asks for: a regular method node or, for methods the
//! [`collaborators::AsyncSplitter`] marks as suspending, an async one.
//!
//! Everything here is single-threaded per method and free of interior
//! mutability; decompiling many methods concurrently is a matter of calling
//! [`decompiler::Decompiler::decompile`] from multiple threads over a
//! read-only `Program` set.

pub mod bookmarker;
pub mod cfg;
pub mod collaborators;
pub mod decompiler;
pub mod diagnostics;
pub mod error;
pub mod generator;
pub mod indexer;
pub mod instr;
pub mod liveness;
pub mod loop_forest;
pub mod program;
pub mod range_tree;
pub mod regalloc;
pub mod statement;
pub mod type_infer;

pub use decompiler::{AsyncMethodNode, DecompileFlags, Decompiler, MethodNode, RegularMethodNode};
pub use error::{DecompileError, Result};
pub use program::{BasicBlock, MethodReference, Program, TryCatchRange};
pub use statement::{Expr, MethodPart, Statement, VariableNode};
