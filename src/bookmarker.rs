//! Try/Catch Bookmarker
//!
//! Tracks which handler ranges are currently open as the statement generator
//! walks from block to block. Active handlers are compared list-wise,
//! outermost first; a matching prefix stays open, the rest close in reverse
//! order of opening — the same stack discipline used elsewhere in this
//! crate for basic-block accumulation, applied here to handler scopes
//! instead of blocks.

use crate::instr::Local;
use crate::program::TryCatchRange;

/// An open try-catch scope: opened at `(owner_depth, offset)` in the
/// generator's open-block stack, closed once the active handler list no
/// longer has it as a live prefix entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TryCatchBookmark {
    /// Depth in the generator's open-block stack at the time this bookmark
    /// was opened; the block that owns the protected body.
    pub owner_depth: usize,
    /// Offset into the owner block's body vector where the protected region
    /// begins.
    pub offset: usize,
    pub exception_type: Option<String>,
    pub exception_local: Option<Local>,
    pub handler_block: u32,
}

/// Stack of currently-open bookmarks.
#[derive(Debug, Default)]
pub struct Bookmarker {
    active: Vec<TryCatchBookmark>,
}

impl Bookmarker {
    pub fn new() -> Self {
        Self { active: Vec::new() }
    }

    pub fn active(&self) -> &[TryCatchBookmark] {
        &self.active
    }

    /// Length of the prefix of `self.active()` whose source range matches
    /// `new_ranges` positionally. Everything at or beyond this length closes;
    /// everything in `new_ranges` beyond this length opens.
    pub fn common_prefix_len(&self, new_ranges: &[TryCatchRange]) -> usize {
        self.active
            .iter()
            .zip(new_ranges.iter())
            .take_while(|(bm, range)| {
                bm.exception_type == range.exception_type
                    && bm.handler_block == range.handler_block
                    && bm.exception_local == range.exception_local
            })
            .count()
    }

    /// Pops bookmarks beyond `keep`, returning them in close order (last
    /// opened first, i.e. reverse of the order they were pushed).
    pub fn close_to(&mut self, keep: usize) -> Vec<TryCatchBookmark> {
        let mut closed = Vec::new();
        while self.active.len() > keep {
            closed.push(self.active.pop().expect("checked len > keep"));
        }
        closed
    }

    /// Opens bookmarks for `new_ranges[keep..]`, all owned at `owner_depth`
    /// starting at `offset` (the generator updates `offset` per newly-opened
    /// bookmark as it emits statements, but all handlers appearing at the
    /// same block boundary open at the same initial offset).
    pub fn open(&mut self, new_ranges: &[TryCatchRange], keep: usize, owner_depth: usize, offset: usize) {
        for range in &new_ranges[keep..] {
            self.active.push(TryCatchBookmark {
                owner_depth,
                offset,
                exception_type: range.exception_type.clone(),
                exception_local: range.exception_local,
                handler_block: range.handler_block,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
