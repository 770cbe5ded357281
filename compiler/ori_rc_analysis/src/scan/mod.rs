//! Range scans inside a single block.
//!
//! Both ends of a range are [`InstrRef`]s into the same block. Positions
//! run from the first body instruction to the terminator
//! (`body.len()`), so a range may include the terminator. Ranges past the
//! terminator are clamped; an empty or inverted range yields `None`.

use crate::effects::{may_check_ref_count, may_decrement_ref_count, may_use_value};
use crate::ir::{ArcBlock, ArcFunction, ArcVarId, InstrRef, InstrView};
use crate::oracle::AliasOracle;

/// Instructions of `[lo, hi)` with their references, clamped to the block.
fn instrs_between(
    block: &ArcBlock,
    lo: usize,
    hi: usize,
) -> impl DoubleEndedIterator<Item = (InstrRef, InstrView<'_>)> {
    let hi = hi.min(block.instr_count());
    (lo.min(hi)..hi).filter_map(move |pos| {
        let view = block.instr_at(pos)?;
        Some((InstrRef::new(block.id, crate::ir::position(pos)), view))
    })
}

fn range_block(func: &ArcFunction, start: InstrRef, end: InstrRef) -> Option<&ArcBlock> {
    debug_assert_eq!(
        start.block, end.block,
        "range scan across blocks ({start:?} .. {end:?})"
    );
    if start.block != end.block {
        return None;
    }
    func.blocks.get(start.block.index())
}

/// First instruction in `[start, end)` that may use `op`.
pub fn value_has_arc_uses_in_range(
    func: &ArcFunction,
    op: ArcVarId,
    start: InstrRef,
    end: InstrRef,
    alias: &dyn AliasOracle,
) -> Option<InstrRef> {
    let block = range_block(func, start, end)?;
    instrs_between(block, start.index(), end.index())
        .find(|&(_, view)| may_use_value(func, view, op, alias))
        .map(|(r, _)| r)
}

/// Last instruction in `[start, end)` that may use `op`.
pub fn value_has_arc_uses_in_reverse_range(
    func: &ArcFunction,
    op: ArcVarId,
    start: InstrRef,
    end: InstrRef,
    alias: &dyn AliasOracle,
) -> Option<InstrRef> {
    let block = range_block(func, start, end)?;
    instrs_between(block, start.index(), end.index())
        .rev()
        .find(|&(_, view)| may_use_value(func, view, op, alias))
        .map(|(r, _)| r)
}

/// First instruction in `(start, end]` that may decrement `op`'s
/// reference count or check it for uniqueness.
pub fn value_has_arc_decrement_or_check_in_range(
    func: &ArcFunction,
    op: ArcVarId,
    start: InstrRef,
    end: InstrRef,
    alias: &dyn AliasOracle,
) -> Option<InstrRef> {
    let block = range_block(func, start, end)?;
    instrs_between(block, start.index() + 1, end.index() + 1)
        .find(|&(_, view)| {
            may_decrement_ref_count(func, view, op, alias) || may_check_ref_count(view)
        })
        .map(|(r, _)| r)
}
