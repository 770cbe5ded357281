use pretty_assertions::assert_eq;

use crate::builder::ArcIrBuilder;
use crate::ir::{ArcFunction, CallEffects, Name};
use crate::ownership::Ownership;
use crate::test_helpers::{b, Oracles};
use crate::types::{Idx, Pool};

use super::*;

const SELF: Name = Name::from_raw(1);
const OTHER: Name = Name::from_raw(2);

fn at(block: u32, pos: u32) -> InstrRef {
    InstrRef::new(b(block), pos)
}

fn accept_all() -> ReleaseTracker<'static> {
    ReleaseTracker::new(|_| true)
}

fn run(func: &ArcFunction, value: ArcVarId, tracker: &mut ReleaseTracker<'_>) -> bool {
    let pool = Pool::new();
    let oracles = Oracles::new(func, &pool);
    final_releases_for_value(&oracles.ctx(func), value, tracker)
}

/// `x = call(); <body>; return n`
fn straight_line(body: impl FnOnce(&mut ArcIrBuilder, ArcVarId)) -> (ArcFunction, ArcVarId) {
    let mut f = ArcIrBuilder::new();
    let n = f.add_param(Idx::INT, Ownership::Owned);
    let x = f.emit_apply(Idx::STR, OTHER, vec![], CallEffects::NoRelease);
    body(&mut f, x);
    f.terminate_return(n);
    (f.finish(SELF, Idx::INT), x)
}

#[test]
fn single_release_in_defining_block() {
    let (func, x) = straight_line(|f, x| {
        f.emit_debug_value(x);
        f.emit_rc_dec(x);
    });
    let mut tracker = accept_all();
    assert!(run(&func, x, &mut tracker));
    assert_eq!(tracker.final_releases(), &[at(0, 2)]);
    assert_eq!(tracker.tracked_users(), &[at(0, 1), at(0, 2)]);
    assert!(tracker.is_user_tracked(at(0, 1)));
    assert!(!tracker.is_user_tracked(at(0, 0)));
}

#[test]
fn use_after_release_fails() {
    let (func, x) = straight_line(|f, x| {
        f.emit_rc_dec(x);
        f.emit_debug_value(x);
    });
    assert!(!run(&func, x, &mut accept_all()));
}

#[test]
fn unreleased_value_fails() {
    let (func, x) = straight_line(|f, x| f.emit_debug_value(x));
    assert!(!run(&func, x, &mut accept_all()));
}

#[test]
fn unacceptable_user_fails() {
    let (func, x) = straight_line(|f, x| {
        f.emit_debug_value(x);
        f.emit_rc_dec(x);
    });
    let mut tracker =
        ReleaseTracker::new(|view| !matches!(view, InstrView::Instr(ArcInstr::DebugValue { .. })));
    assert!(!run(&func, x, &mut tracker));
}

#[test]
fn undefined_value_fails() {
    let (func, _) = straight_line(|_, _| {});
    assert!(!run(&func, ArcVarId::new(40), &mut accept_all()));
}

#[test]
fn release_in_a_later_block() {
    let mut f = ArcIrBuilder::new();
    let n = f.add_param(Idx::INT, Ownership::Owned);
    let next = f.new_block();
    let x = f.emit_apply(Idx::STR, OTHER, vec![], CallEffects::NoRelease);
    f.emit_debug_value(x);
    f.terminate_jump(next, vec![]);
    f.position_at(next);
    f.emit_rc_dec(x);
    f.terminate_return(n);
    let func = f.finish(SELF, Idx::INT);

    let mut tracker = accept_all();
    assert!(run(&func, x, &mut tracker));
    assert_eq!(tracker.tracked_users(), &[at(0, 1), at(1, 0)]);
    assert_eq!(tracker.final_releases(), &[at(1, 0)]);
}

#[derive(Clone, Copy)]
enum ElseArm {
    Releases,
    Leaks,
    Traps,
}

/// `b0: x = call(); br c, b1, b2` with `b1` releasing `x` and both arms
/// joining `b3: return n` (unless `b2` traps).
fn diamond(else_arm: ElseArm) -> (ArcFunction, ArcVarId) {
    let mut f = ArcIrBuilder::new();
    let n = f.add_param(Idx::INT, Ownership::Owned);
    let c = f.add_param(Idx::BOOL, Ownership::Owned);
    let then_bb = f.new_block();
    let else_bb = f.new_block();
    let join = f.new_block();
    let x = f.emit_apply(Idx::STR, OTHER, vec![], CallEffects::NoRelease);
    f.terminate_branch(c, then_bb, else_bb);

    f.position_at(then_bb);
    f.emit_debug_value(x);
    f.emit_rc_dec(x);
    f.terminate_jump(join, vec![]);

    f.position_at(else_bb);
    match else_arm {
        ElseArm::Releases => {
            f.emit_rc_dec(x);
            f.terminate_jump(join, vec![]);
        }
        ElseArm::Leaks => f.terminate_jump(join, vec![]),
        ElseArm::Traps => {
            f.emit_cond_fail(c);
            f.terminate_unreachable();
        }
    }

    f.position_at(join);
    f.terminate_return(n);
    (f.finish(SELF, Idx::INT), x)
}

#[test]
fn release_on_each_arm() {
    let (func, x) = diamond(ElseArm::Releases);
    let mut tracker = accept_all();
    assert!(run(&func, x, &mut tracker));
    assert_eq!(tracker.final_releases(), &[at(1, 1), at(2, 0)]);
}

#[test]
fn path_to_exit_without_release_fails() {
    let (func, x) = diamond(ElseArm::Leaks);
    assert!(!run(&func, x, &mut accept_all()));
}

#[test]
fn trap_path_needs_no_release() {
    let (func, x) = diamond(ElseArm::Traps);
    let mut tracker = accept_all();
    assert!(run(&func, x, &mut tracker));
    assert_eq!(tracker.final_releases(), &[at(1, 1)]);
}

#[test]
fn clear_keeps_the_predicate() {
    let (func, x) = diamond(ElseArm::Releases);
    let mut tracker = ReleaseTracker::new(|view| {
        matches!(
            view,
            InstrView::Instr(ArcInstr::RcDec { .. } | ArcInstr::DebugValue { .. })
        )
    });
    assert!(run(&func, x, &mut tracker));
    tracker.clear();
    assert!(tracker.tracked_users().is_empty());
    assert!(tracker.final_releases().is_empty());

    let store = ArcInstr::Store { addr: x, value: x };
    assert!(!tracker.is_user_acceptable(InstrView::Instr(&store)));
    assert!(run(&func, x, &mut tracker));
}
