//! Reference alias oracles.

use crate::ir::{ArcFunction, ArcInstr, ArcVarId};
use crate::ArcClassification;

use super::{AliasOracle, AliasResult, RcIdentity};

/// Sound, type- and root-based alias oracle.
///
/// - identical handles or a shared RC root: `MustAlias`
/// - either value of scalar type: `NoAlias` (nothing to count)
/// - two distinct stack slots (`Alloc` roots): `NoAlias`
/// - anything else: `MayAlias`
///
/// Built once per function from an [`RcIdentity`] and a classifier;
/// rebuild after editing the function.
#[derive(Clone, Debug)]
pub struct BasicAliasOracle {
    root: Vec<ArcVarId>,
    scalar: Vec<bool>,
    is_alloc: Vec<bool>,
}

impl BasicAliasOracle {
    pub fn new(
        func: &ArcFunction,
        rc: &dyn RcIdentity,
        classifier: &dyn ArcClassification,
    ) -> Self {
        let num_vars = func.var_types.len();
        let root = (0..num_vars)
            .map(|i| {
                let var = ArcVarId::new(u32::try_from(i).unwrap_or(u32::MAX));
                rc.rc_root(func, var)
            })
            .collect();
        let scalar = func
            .var_types
            .iter()
            .map(|&ty| classifier.is_scalar(ty))
            .collect();

        let mut is_alloc = vec![false; num_vars];
        for instr in func.blocks.iter().flat_map(|bl| bl.body.iter()) {
            if let ArcInstr::Alloc { dst, .. } = instr {
                if let Some(slot) = is_alloc.get_mut(dst.index()) {
                    *slot = true;
                }
            }
        }

        Self {
            root,
            scalar,
            is_alloc,
        }
    }

    fn root_of(&self, v: ArcVarId) -> Option<ArcVarId> {
        self.root.get(v.index()).copied()
    }

    fn is_scalar(&self, v: ArcVarId) -> bool {
        self.scalar.get(v.index()).copied().unwrap_or(false)
    }

    fn is_alloc(&self, v: ArcVarId) -> bool {
        self.is_alloc.get(v.index()).copied().unwrap_or(false)
    }
}

impl AliasOracle for BasicAliasOracle {
    fn alias(&self, _func: &ArcFunction, a: ArcVarId, b: ArcVarId) -> AliasResult {
        if a == b {
            return AliasResult::MustAlias;
        }
        let (Some(ra), Some(rb)) = (self.root_of(a), self.root_of(b)) else {
            return AliasResult::Unknown;
        };
        if ra == rb {
            return AliasResult::MustAlias;
        }
        if self.is_scalar(a) || self.is_scalar(b) {
            return AliasResult::NoAlias;
        }
        if self.is_alloc(ra) && self.is_alloc(rb) {
            return AliasResult::NoAlias;
        }
        AliasResult::MayAlias
    }
}

/// Oracle that knows nothing beyond handle identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConservativeAliasOracle;

impl AliasOracle for ConservativeAliasOracle {
    fn alias(&self, _func: &ArcFunction, a: ArcVarId, b: ArcVarId) -> AliasResult {
        if a == b {
            AliasResult::MustAlias
        } else {
            AliasResult::Unknown
        }
    }
}
