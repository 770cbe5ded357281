//! Per-instruction RC effect predicates.
//!
//! Each predicate answers one question about one instruction and one value
//! through the [`AliasOracle`]. The predicates are pure and independent:
//! nothing is cached, and none of them implies another.
//!
//! The "may" predicates are conservative: `true` whenever the answer is
//! not proven to be `false`. The "must" predicates are the opposite: only
//! a proven `MustAlias` makes them `true`. Both directions go through
//! [`AliasResult::is_no_alias`](crate::AliasResult::is_no_alias) and
//! [`AliasResult::is_must_alias`](crate::AliasResult::is_must_alias).
//!
//! Terminators are classified by the same rules as body instructions via
//! [`InstrView`].

use crate::ir::{ArcArg, ArcFunction, ArcInstr, ArcTerminator, ArcVarId, CallEffects, InstrView};
use crate::oracle::AliasOracle;

/// The argument list and effect summary of a call, if `instr` is one.
///
/// Indirect calls have no summary and read as [`CallEffects::Unknown`].
fn call_parts(instr: InstrView<'_>) -> Option<(&[ArcArg], CallEffects)> {
    match instr {
        InstrView::Instr(ArcInstr::Apply { args, effects, .. })
        | InstrView::Terminator(ArcTerminator::TryApply { args, effects, .. }) => {
            Some((args, *effects))
        }
        InstrView::Instr(ArcInstr::ApplyIndirect { args, .. }) => {
            Some((args, CallEffects::Unknown))
        }
        _ => None,
    }
}

/// Only the direct call forms carry a known argument convention for
/// [`must_use_value`].
fn direct_call_args(instr: InstrView<'_>) -> Option<&[ArcArg]> {
    match instr {
        InstrView::Instr(ArcInstr::Apply { args, .. })
        | InstrView::Terminator(ArcTerminator::TryApply { args, .. }) => Some(args),
        _ => None,
    }
}

fn no_alias(func: &ArcFunction, alias: &dyn AliasOracle, a: ArcVarId, b: ArcVarId) -> bool {
    alias.alias(func, a, b).is_no_alias()
}

fn must_alias(func: &ArcFunction, alias: &dyn AliasOracle, a: ArcVarId, b: ArcVarId) -> bool {
    alias.alias(func, a, b).is_must_alias()
}

/// Instruction kinds that never decrement any reference count.
pub fn can_never_decrement_ref_counts(instr: InstrView<'_>) -> bool {
    match instr {
        InstrView::Instr(i) => matches!(
            i,
            ArcInstr::Let { .. }
                | ArcInstr::Project { .. }
                | ArcInstr::Construct { .. }
                | ArcInstr::Alloc { .. }
                | ArcInstr::Load { .. }
                | ArcInstr::Store { .. }
                | ArcInstr::RcInc { .. }
                | ArcInstr::IsShared { .. }
                | ArcInstr::CondFail { .. }
                | ArcInstr::DebugValue { .. }
                | ArcInstr::FixLifetime { .. }
        ),
        InstrView::Terminator(t) => !matches!(t, ArcTerminator::TryApply { .. }),
    }
}

/// Instruction kinds that never use a reference-counted value in a way
/// that matters for its lifetime.
///
/// Aggregate formation and projections are not uses by themselves; their
/// users are.
pub fn can_never_use_values(instr: InstrView<'_>) -> bool {
    match instr {
        InstrView::Instr(i) => matches!(
            i,
            ArcInstr::Let { .. }
                | ArcInstr::Project { .. }
                | ArcInstr::Construct { .. }
                | ArcInstr::Alloc { .. }
                | ArcInstr::CondFail { .. }
                | ArcInstr::DebugValue { .. }
        ),
        InstrView::Terminator(t) => matches!(t, ArcTerminator::Unreachable),
    }
}

/// May `instr` decrement the reference count of `value`?
pub fn may_decrement_ref_count(
    func: &ArcFunction,
    instr: InstrView<'_>,
    value: ArcVarId,
    alias: &dyn AliasOracle,
) -> bool {
    if can_never_decrement_ref_counts(instr) {
        return false;
    }

    if let Some((args, effects)) = call_parts(instr) {
        return match effects {
            CallEffects::NoRelease => false,
            CallEffects::ReleasesArgsOnly => args
                .iter()
                .filter(|a| a.ownership.is_owned())
                .any(|a| !no_alias(func, alias, a.var, value)),
            CallEffects::Unknown => true,
        };
    }

    true
}

/// May `instr` inspect the reference count (uniqueness checks)?
pub fn may_check_ref_count(instr: InstrView<'_>) -> bool {
    matches!(instr, InstrView::Instr(ArcInstr::IsShared { .. }))
}

/// May `instr` use `value` in a way that requires it to be alive?
pub fn may_use_value(
    func: &ArcFunction,
    instr: InstrView<'_>,
    value: ArcVarId,
    alias: &dyn AliasOracle,
) -> bool {
    if can_never_use_values(instr) {
        return false;
    }

    let operand_may_alias = |v: ArcVarId| !no_alias(func, alias, v, value);

    match instr {
        InstrView::Instr(i) => match i {
            ArcInstr::Store { addr, value: stored } => {
                operand_may_alias(*addr) || operand_may_alias(*stored)
            }
            ArcInstr::Load { addr, .. } => operand_may_alias(*addr),
            ArcInstr::RcInc { var, .. }
            | ArcInstr::IsShared { var, .. }
            | ArcInstr::FixLifetime { var } => operand_may_alias(*var),
            _ => true,
        },
        InstrView::Terminator(t) => match t {
            ArcTerminator::Return { value: v } | ArcTerminator::Throw { value: v } => {
                operand_may_alias(*v)
            }
            ArcTerminator::Jump { args, .. } => args.iter().any(|&a| operand_may_alias(a)),
            ArcTerminator::Branch { cond, .. } => operand_may_alias(*cond),
            ArcTerminator::Switch { scrutinee, .. } => operand_may_alias(*scrutinee),
            ArcTerminator::TryApply { .. } | ArcTerminator::Unreachable => true,
        },
    }
}

/// Does `instr` definitely use `value`? True only for a direct call with an
/// argument that must-aliases `value`.
pub fn must_use_value(
    func: &ArcFunction,
    instr: InstrView<'_>,
    value: ArcVarId,
    alias: &dyn AliasOracle,
) -> bool {
    direct_call_args(instr)
        .is_some_and(|args| args.iter().any(|a| must_alias(func, alias, a.var, value)))
}

/// Does `instr` definitely use `value` as a guaranteed (borrowed) call
/// argument?
pub fn must_guaranteed_use_value(
    func: &ArcFunction,
    instr: InstrView<'_>,
    value: ArcVarId,
    alias: &dyn AliasOracle,
) -> bool {
    call_parts(instr).is_some_and(|(args, _)| {
        args.iter()
            .filter(|a| a.ownership.is_guaranteed())
            .any(|a| must_alias(func, alias, a.var, value))
    })
}

/// May `instr` use `value` as a guaranteed (borrowed) call argument?
///
/// Only full calls pass guaranteed arguments, so every other instruction
/// answers `false`.
pub fn may_guaranteed_use_value(
    func: &ArcFunction,
    instr: InstrView<'_>,
    value: ArcVarId,
    alias: &dyn AliasOracle,
) -> bool {
    call_parts(instr).is_some_and(|(args, _)| {
        args.iter()
            .filter(|a| a.ownership.is_guaranteed())
            .any(|a| !no_alias(func, alias, a.var, value))
    })
}
