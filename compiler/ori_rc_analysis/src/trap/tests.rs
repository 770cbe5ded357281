use crate::effects::{may_decrement_ref_count, may_use_value};
use crate::ir::{ArcInstr, ArcValue, LitValue};
use crate::oracle::ConservativeAliasOracle;
use crate::test_helpers::{block, dec, make_func, owned_param, ret, v};
use crate::types::Idx;

use super::*;

fn trap_body() -> Vec<ArcInstr> {
    vec![
        ArcInstr::Let {
            dst: v(1),
            ty: Idx::BOOL,
            value: ArcValue::Literal(LitValue::Bool(true)),
        },
        ArcInstr::CondFail { cond: v(1) },
        ArcInstr::DebugValue { var: v(0) },
    ]
}

#[test]
fn unreachable_with_inert_body_is_a_trap() {
    assert!(is_arc_inert_trap_block(&block(
        0,
        trap_body(),
        ArcTerminator::Unreachable
    )));
    assert!(is_arc_inert_trap_block(&block(
        0,
        vec![],
        ArcTerminator::Unreachable
    )));
}

#[test]
fn release_in_body_disqualifies() {
    let mut body = trap_body();
    body.push(dec(0));
    assert!(!is_arc_inert_trap_block(&block(
        0,
        body,
        ArcTerminator::Unreachable
    )));
}

#[test]
fn returning_block_is_not_a_trap() {
    assert!(!is_arc_inert_trap_block(&block(0, trap_body(), ret(0))));
}

/// Every instruction of a trap block is inert for every value.
#[test]
fn trap_blocks_are_inert_for_every_value() {
    let trap = block(0, trap_body(), ArcTerminator::Unreachable);
    let func = make_func(
        vec![owned_param(0, Idx::STR)],
        Idx::UNIT,
        vec![trap.clone()],
        vec![Idx::STR, Idx::BOOL],
    );
    let alias = ConservativeAliasOracle;
    assert!(is_arc_inert_trap_block(&trap));
    for pos in 0..trap.instr_count() {
        let Some(view) = trap.instr_at(pos) else {
            panic!("position {pos} out of range");
        };
        for value in 0..2 {
            assert!(!may_use_value(&func, view, v(value), &alias));
            assert!(!may_decrement_ref_count(&func, view, v(value), &alias));
        }
    }
}
