use pretty_assertions::assert_eq;

use crate::builder::ArcIrBuilder;
use crate::config::SearchConfig;
use crate::ir::{ArcArg, ArcFunction, ArcValue, CallEffects, Name};
use crate::ownership::Ownership;
use crate::scan::value_has_arc_decrement_or_check_in_range;
use crate::test_helpers::{b, Oracles};
use crate::types::{Idx, Pool};

use super::*;

const SELF: Name = Name::from_raw(1);
const OTHER: Name = Name::from_raw(2);

fn at(block: u32, pos: u32) -> InstrRef {
    InstrRef::new(b(block), pos)
}

fn matcher_for(func: &ArcFunction) -> ConsumedResultRetainMatcher {
    let pool = Pool::new();
    let oracles = Oracles::new(func, &pool);
    ConsumedResultRetainMatcher::new(&oracles.ctx(func))
}

/// `fn(x: owned str) -> str { inc x; return x }`
#[test]
fn retain_before_return_matches() {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    f.emit_rc_inc(x);
    f.terminate_return(x);
    let func = f.finish(SELF, Idx::STR);

    let matcher = matcher_for(&func);
    assert_eq!(matcher.epilogue_retains(), &[at(0, 0)]);
    assert_eq!(matcher.len(), 1);
    assert!(matcher.recursive_calls().is_empty());
}

/// The matched retain leaves no decrement or check between the result's
/// definition and the retain, nor between the retain and the return.
#[test]
fn matched_retain_has_no_lifetime_gap() {
    let mut f = ArcIrBuilder::new();
    let y = f.emit_apply(Idx::STR, OTHER, vec![], CallEffects::Unknown);
    f.emit_debug_value(y);
    f.emit_rc_inc(y);
    f.emit_fix_lifetime(y);
    f.terminate_return(y);
    let func = f.finish(SELF, Idx::STR);

    let pool = Pool::new();
    let oracles = Oracles::new(&func, &pool);
    let ctx = oracles.ctx(&func);
    let matcher = ConsumedResultRetainMatcher::new(&ctx);
    assert_eq!(matcher.epilogue_retains(), &[at(0, 2)]);

    for retain in matcher.iter() {
        let def = at(0, 0);
        assert_eq!(
            value_has_arc_decrement_or_check_in_range(&func, y, def, retain, ctx.alias),
            None
        );
        let exit = func.block(retain.block).terminator_ref();
        assert_eq!(
            value_has_arc_decrement_or_check_in_range(&func, y, retain, exit, ctx.alias),
            None
        );
    }
}

#[test]
fn release_between_retain_and_return_blocks() {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    let y = f.add_param(Idx::STR, Ownership::Owned);
    f.emit_rc_inc(x);
    f.emit_rc_dec(y);
    f.terminate_return(x);
    let func = f.finish(SELF, Idx::STR);

    assert!(matcher_for(&func).is_empty());
}

#[test]
fn uniqueness_check_blocks() {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    f.emit_rc_inc(x);
    let _shared = f.emit_is_shared(x);
    f.terminate_return(x);
    let func = f.finish(SELF, Idx::STR);

    assert!(matcher_for(&func).is_empty());
}

#[test]
fn reaching_the_definition_blocks() {
    let mut f = ArcIrBuilder::new();
    let y = f.emit_apply(Idx::STR, OTHER, vec![], CallEffects::NoRelease);
    f.terminate_return(y);
    let func = f.finish(SELF, Idx::STR);

    assert!(matcher_for(&func).is_empty());
}

#[test]
fn retain_of_a_copy_matches_the_copied_value() {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    let copy = f.emit_let(Idx::STR, ArcValue::Var(x));
    f.emit_rc_inc(copy);
    f.terminate_return(x);
    let func = f.finish(SELF, Idx::STR);

    assert_eq!(matcher_for(&func).epilogue_retains(), &[at(0, 1)]);
}

/// Diamond where each arm retains before joining the return block.
fn diamond(retain_in_else: bool) -> ArcFunction {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    let c = f.add_param(Idx::BOOL, Ownership::Owned);
    let then_bb = f.new_block();
    let else_bb = f.new_block();
    let join = f.new_block();
    f.terminate_branch(c, then_bb, else_bb);

    f.position_at(then_bb);
    f.emit_rc_inc(x);
    f.terminate_jump(join, vec![]);

    f.position_at(else_bb);
    if retain_in_else {
        f.emit_rc_inc(x);
    }
    f.terminate_jump(join, vec![]);

    f.position_at(join);
    f.terminate_return(x);
    f.finish(SELF, Idx::STR)
}

#[test]
fn retains_on_every_predecessor_path() {
    let func = diamond(true);
    let matcher = matcher_for(&func);
    let mut retains: Vec<InstrRef> = matcher.iter().collect();
    retains.sort();
    assert_eq!(retains, vec![at(1, 0), at(2, 0)]);

    let reversed: Vec<InstrRef> = matcher.iter_rev().collect();
    let mut forward: Vec<InstrRef> = matcher.iter().collect();
    forward.reverse();
    assert_eq!(reversed, forward);
}

#[test]
fn missing_retain_on_one_path_fails_everything() {
    assert!(matcher_for(&diamond(false)).is_empty());
}

#[test]
fn search_limit_gives_up() {
    let func = diamond(true);
    let pool = Pool::new();
    let oracles = Oracles::new(&func, &pool);
    let ctx = oracles
        .ctx(&func)
        .with_config(SearchConfig::default().with_max_explored_blocks(1));
    assert!(ConsumedResultRetainMatcher::new(&ctx).is_empty());
}

/// `b3(p)` receives a freshly retained value from each arm.
#[test]
fn block_parameter_splits_into_incoming_values() {
    let mut f = ArcIrBuilder::new();
    let c = f.add_param(Idx::BOOL, Ownership::Owned);
    let then_bb = f.new_block();
    let else_bb = f.new_block();
    let join = f.new_block();
    let p = f.add_block_param(join, Idx::STR);
    f.terminate_branch(c, then_bb, else_bb);

    f.position_at(then_bb);
    let a = f.emit_apply(Idx::STR, OTHER, vec![], CallEffects::Unknown);
    f.emit_rc_inc(a);
    f.terminate_jump(join, vec![a]);

    f.position_at(else_bb);
    let d = f.emit_apply(Idx::STR, OTHER, vec![], CallEffects::Unknown);
    f.emit_rc_inc(d);
    f.terminate_jump(join, vec![d]);

    f.position_at(join);
    f.terminate_return(p);
    let func = f.finish(SELF, Idx::STR);

    let mut retains: Vec<InstrRef> = matcher_for(&func).iter().collect();
    retains.sort();
    assert_eq!(retains, vec![at(1, 1), at(2, 1)]);
}

/// A self-recursive call between the retain and the return is recorded
/// and does not block the search.
#[test]
fn recursion_then_found() {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    f.emit_rc_inc(x);
    let _r = f.emit_apply(Idx::STR, SELF, vec![ArcArg::borrowed(x)], CallEffects::Unknown);
    f.terminate_return(x);
    let func = f.finish(SELF, Idx::STR);

    let matcher = matcher_for(&func);
    assert_eq!(matcher.epilogue_retains(), &[at(0, 0)]);
    assert_eq!(matcher.recursive_calls(), &[at(0, 1)]);
}

#[test]
fn recursive_call_consuming_the_value_blocks() {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    f.emit_rc_inc(x);
    let _r = f.emit_apply(Idx::STR, SELF, vec![ArcArg::owned(x)], CallEffects::Unknown);
    f.terminate_return(x);
    let func = f.finish(SELF, Idx::STR);

    assert!(matcher_for(&func).is_empty());
}

/// Returning the owned result of a self-recursive call needs no retain.
#[test]
fn recursive_result_ends_the_path() {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    let r = f.emit_apply(Idx::STR, SELF, vec![ArcArg::owned(x)], CallEffects::Unknown);
    f.terminate_return(r);
    let func = f.finish(SELF, Idx::STR);

    let matcher = matcher_for(&func);
    assert!(matcher.is_empty());
    assert_eq!(matcher.recursive_calls(), &[at(0, 0)]);
}

/// `b0: inc x; br c, b1, b2` where `b1` returns and `b2` leaves some
/// other way.
fn retain_before_branch(else_is_trap: bool) -> ArcFunction {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    let c = f.add_param(Idx::BOOL, Ownership::Owned);
    let ret_bb = f.new_block();
    let other = f.new_block();
    f.emit_rc_inc(x);
    f.terminate_branch(c, ret_bb, other);

    f.position_at(ret_bb);
    f.terminate_return(x);

    f.position_at(other);
    if else_is_trap {
        f.emit_cond_fail(c);
        f.terminate_unreachable();
    } else {
        f.terminate_throw(x);
    }
    f.finish(SELF, Idx::STR)
}

#[test]
fn retain_reaching_another_exit_is_rejected() {
    assert!(matcher_for(&retain_before_branch(false)).is_empty());
}

#[test]
fn trap_successors_are_ignored() {
    let matcher = matcher_for(&retain_before_branch(true));
    assert_eq!(matcher.epilogue_retains(), &[at(0, 0)]);
}

/// One retain ahead of a branch into two return blocks serves both.
#[test]
fn retain_shared_by_two_return_blocks() {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    let c = f.add_param(Idx::BOOL, Ownership::Owned);
    let first = f.new_block();
    let second = f.new_block();
    f.emit_rc_inc(x);
    f.terminate_branch(c, first, second);
    f.position_at(first);
    f.terminate_return(x);
    f.position_at(second);
    f.terminate_return(x);
    let func = f.finish(SELF, Idx::STR);

    assert_eq!(matcher_for(&func).epilogue_retains(), &[at(0, 0)]);
}

#[test]
fn scalar_result_needs_no_retain() {
    let mut f = ArcIrBuilder::new();
    let n = f.add_param(Idx::INT, Ownership::Owned);
    f.terminate_return(n);
    let func = f.finish(SELF, Idx::INT);

    assert!(matcher_for(&func).is_empty());
}

#[test]
fn malformed_function_is_unmatched() {
    let mut f = ArcIrBuilder::new();
    let x = f.add_param(Idx::STR, Ownership::Owned);
    let target = f.new_block();
    f.emit_rc_inc(x);
    // Missing argument for the block parameter.
    let _p = f.add_block_param(target, Idx::STR);
    f.terminate_jump(target, vec![]);
    f.position_at(target);
    f.terminate_return(x);
    let func = f.finish(SELF, Idx::STR);

    assert!(matcher_for(&func).is_empty());
}

#[test]
fn per_block_scan() {
    let func = diamond(true);
    let pool = Pool::new();
    let oracles = Oracles::new(&func, &pool);
    let ctx = oracles.ctx(&func);
    let x = func.params[0].var;

    let then_scan = ConsumedResultRetainMatcher::find_matching_retains(&ctx, b(1), x);
    assert_eq!(then_scan.kind, FindRetainKind::Found(at(1, 0)));
    let join_scan = ConsumedResultRetainMatcher::find_matching_retains(&ctx, b(3), x);
    assert_eq!(join_scan.kind, FindRetainKind::None);
    let entry_scan = ConsumedResultRetainMatcher::find_matching_retains(&ctx, b(0), x);
    assert_eq!(entry_scan.kind, FindRetainKind::Blocked);
}

#[test]
fn recompute_is_idempotent_and_tracks_edits() {
    let mut func = diamond(true);
    let pool = Pool::new();
    let oracles = Oracles::new(&func, &pool);
    let mut matcher = ConsumedResultRetainMatcher::new(&oracles.ctx(&func));
    let first: Vec<InstrRef> = matcher.iter().collect();
    matcher.recompute(&oracles.ctx(&func));
    assert_eq!(matcher.iter().collect::<Vec<_>>(), first);
    assert!(!matcher.is_stale(&oracles.ctx(&func)));
    assert!(matcher.is_epilogue_retain(&oracles.ctx(&func), at(1, 0)));

    // Drop the retain in the else arm.
    func.blocks[2].body.clear();
    assert!(matcher.is_stale(&oracles.ctx(&func)));
    matcher.recompute(&oracles.ctx(&func));
    assert!(matcher.is_empty());
}
