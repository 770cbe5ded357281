//! ARC-inert trap blocks.

use crate::effects::{can_never_decrement_ref_counts, can_never_use_values};
use crate::ir::{ArcBlock, ArcTerminator, InstrView};

/// Is `block` a trap that the backward searches may ignore?
///
/// A trap block ends in `Unreachable` and nothing in its body can use a
/// value or decrement a reference count, so leaving a value unreleased on
/// the way into it is unobservable.
pub fn is_arc_inert_trap_block(block: &ArcBlock) -> bool {
    matches!(block.terminator, ArcTerminator::Unreachable)
        && block.body.iter().all(|instr| {
            let view = InstrView::Instr(instr);
            can_never_use_values(view) && can_never_decrement_ref_counts(view)
        })
}

#[cfg(test)]
mod tests;
