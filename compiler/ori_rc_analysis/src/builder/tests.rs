use pretty_assertions::assert_eq;

use crate::ir::{ArcArg, ArcTerminator, ArcValue, CallEffects, LitValue};

use super::*;

#[test]
fn builder_creates_entry_block() {
    let builder = ArcIrBuilder::new();
    assert_eq!(builder.current_block(), ArcBlockId::new(0));
    assert!(!builder.is_terminated());
}

#[test]
fn builder_allocates_fresh_vars() {
    let mut builder = ArcIrBuilder::new();
    let v0 = builder.fresh_var(Idx::INT);
    let v1 = builder.fresh_var(Idx::BOOL);
    assert_eq!(v0, ArcVarId::new(0));
    assert_eq!(v1, ArcVarId::new(1));
    assert_eq!(builder.var_types[v0.index()], Idx::INT);
    assert_eq!(builder.var_types[v1.index()], Idx::BOOL);
}

#[test]
fn builder_records_params_with_ownership() {
    let mut builder = ArcIrBuilder::new();
    let x = builder.add_param(Idx::STR, Ownership::Owned);
    let y = builder.add_param(Idx::STR, Ownership::Borrowed);
    builder.terminate_return(x);

    let func = builder.finish(Name::from_raw(1), Idx::STR);
    assert_eq!(func.params.len(), 2);
    assert_eq!(func.param(x).map(|p| p.ownership), Some(Ownership::Owned));
    assert_eq!(func.param(y).map(|p| p.ownership), Some(Ownership::Borrowed));
    assert_eq!(func.var_type(y), Idx::STR);
}

#[test]
fn builder_emit_let_and_return() {
    let mut builder = ArcIrBuilder::new();
    let v = builder.emit_let(Idx::INT, ArcValue::Literal(LitValue::Int(42)));
    builder.terminate_return(v);
    assert!(builder.is_terminated());

    let func = builder.finish(Name::from_raw(1), Idx::INT);
    assert_eq!(func.blocks.len(), 1);
    assert_eq!(func.blocks[0].body.len(), 1);
    assert_eq!(func.blocks[0].terminator, ArcTerminator::Return { value: v });
}

#[test]
fn builder_block_params() {
    let mut builder = ArcIrBuilder::new();
    let bb1 = builder.new_block();
    let param_var = builder.add_block_param(bb1, Idx::INT);
    assert_eq!(param_var.raw(), 0);

    let func = builder.finish(Name::from_raw(1), Idx::UNIT);
    assert_eq!(func.blocks[1].params, vec![(param_var, Idx::INT)]);
}

#[test]
fn builder_rc_ops_in_order() {
    let mut builder = ArcIrBuilder::new();
    let x = builder.add_param(Idx::STR, Ownership::Owned);
    builder.emit_rc_inc(x);
    builder.emit_rc_dec(x);
    builder.terminate_return(x);

    let func = builder.finish(Name::from_raw(1), Idx::STR);
    assert_eq!(
        func.blocks[0].body,
        vec![ArcInstr::RcInc { var: x, count: 1 }, ArcInstr::RcDec { var: x }]
    );
}

#[test]
fn builder_try_apply_defines_result() {
    let mut builder = ArcIrBuilder::new();
    let x = builder.add_param(Idx::STR, Ownership::Owned);
    let ok = builder.new_block();
    let err = builder.new_block();
    let r = builder.terminate_try_apply(
        Idx::STR,
        Name::from_raw(7),
        vec![ArcArg::owned(x)],
        CallEffects::Unknown,
        ok,
        err,
    );
    builder.position_at(ok);
    builder.terminate_return(r);
    builder.position_at(err);
    builder.terminate_throw(x);

    let func = builder.finish(Name::from_raw(1), Idx::STR);
    assert_eq!(func.var_type(r), Idx::STR);
    assert!(matches!(
        func.blocks[0].terminator,
        ArcTerminator::TryApply { dst, .. } if dst == r
    ));
    assert_eq!(func.blocks[2].terminator, ArcTerminator::Throw { value: x });
}

#[test]
fn finish_fills_unterminated_blocks() {
    let mut builder = ArcIrBuilder::new();
    let _unused = builder.new_block();
    builder.terminate_unreachable();

    let func = builder.finish(Name::from_raw(1), Idx::UNIT);
    assert_eq!(func.blocks[1].terminator, ArcTerminator::Unreachable);
}
