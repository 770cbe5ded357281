//! Shared test utilities for the RC analyses.
//!
//! Factory functions for hand-written functions, plus a bundle of the
//! reference oracles so matcher tests stay short. Only compiled in test
//! builds.

use rustc_hash::FxHashMap;

use crate::classify::ArcClassifier;
use crate::ir::{
    ArcBlock, ArcBlockId, ArcFunction, ArcInstr, ArcParam, ArcTerminator, ArcVarId, Name,
};
use crate::oracle::{AliasOracle, AliasResult, BasicAliasOracle, ForwardingRcIdentity};
use crate::ownership::Ownership;
use crate::types::{Idx, Pool};
use crate::AnalysisCtx;

/// Shorthand for `ArcVarId::new(n)`.
pub(crate) fn v(n: u32) -> ArcVarId {
    ArcVarId::new(n)
}

/// Shorthand for `ArcBlockId::new(n)`.
pub(crate) fn b(n: u32) -> ArcBlockId {
    ArcBlockId::new(n)
}

/// Build a minimal `ArcFunction` with a default name (`Name::from_raw(1)`).
pub(crate) fn make_func(
    params: Vec<ArcParam>,
    return_type: Idx,
    blocks: Vec<ArcBlock>,
    var_types: Vec<Idx>,
) -> ArcFunction {
    ArcFunction {
        name: Name::from_raw(1),
        params,
        return_type,
        blocks,
        entry: ArcBlockId::new(0),
        var_types,
    }
}

/// Shorthand for a block whose ID is its position.
pub(crate) fn block(id: u32, body: Vec<ArcInstr>, terminator: ArcTerminator) -> ArcBlock {
    ArcBlock {
        id: b(id),
        params: vec![],
        body,
        terminator,
    }
}

/// Create an owned parameter.
pub(crate) fn owned_param(var: u32, ty: Idx) -> ArcParam {
    ArcParam {
        var: ArcVarId::new(var),
        ty,
        ownership: Ownership::Owned,
    }
}

/// `RcInc { var, count: 1 }`.
pub(crate) fn inc(var: u32) -> ArcInstr {
    ArcInstr::RcInc {
        var: v(var),
        count: 1,
    }
}

/// `RcDec { var }`.
pub(crate) fn dec(var: u32) -> ArcInstr {
    ArcInstr::RcDec { var: v(var) }
}

/// `Return { value }`.
pub(crate) fn ret(var: u32) -> ArcTerminator {
    ArcTerminator::Return { value: v(var) }
}

/// The reference oracles for one function.
pub(crate) struct Oracles<'pool> {
    pub rc: ForwardingRcIdentity,
    pub alias: BasicAliasOracle,
    pub classifier: ArcClassifier<'pool>,
}

impl<'pool> Oracles<'pool> {
    pub(crate) fn new(func: &ArcFunction, pool: &'pool Pool) -> Self {
        let classifier = ArcClassifier::new(pool);
        let rc = ForwardingRcIdentity::new(func);
        let alias = BasicAliasOracle::new(func, &rc, &classifier);
        Self {
            rc,
            alias,
            classifier,
        }
    }

    pub(crate) fn ctx<'a>(&'a self, func: &'a ArcFunction) -> AnalysisCtx<'a> {
        AnalysisCtx::new(func, &self.rc, &self.alias, &self.classifier)
    }
}

/// Alias oracle answering from an explicit table.
///
/// Identical handles must-alias; listed pairs (in either order) answer as
/// recorded; everything else answers `fallback`.
pub(crate) struct TableAliasOracle {
    pairs: FxHashMap<(ArcVarId, ArcVarId), AliasResult>,
    fallback: AliasResult,
}

impl TableAliasOracle {
    pub(crate) fn new(fallback: AliasResult) -> Self {
        Self {
            pairs: FxHashMap::default(),
            fallback,
        }
    }

    pub(crate) fn set(mut self, a: u32, b: u32, result: AliasResult) -> Self {
        self.pairs.insert((v(a), v(b)), result);
        self.pairs.insert((v(b), v(a)), result);
        self
    }
}

impl AliasOracle for TableAliasOracle {
    fn alias(&self, _func: &ArcFunction, a: ArcVarId, b: ArcVarId) -> AliasResult {
        if a == b {
            return AliasResult::MustAlias;
        }
        self.pairs.get(&(a, b)).copied().unwrap_or(self.fallback)
    }
}
