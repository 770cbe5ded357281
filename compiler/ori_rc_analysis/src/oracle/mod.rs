//! Alias and RC-identity oracles.
//!
//! The analyses never decide aliasing or reference identity themselves;
//! they ask an [`AliasOracle`] and an [`RcIdentity`]. Real compilers plug
//! in their own analyses. This module ships small reference
//! implementations that are sound but imprecise.
//!
//! # Unknown answers
//!
//! [`AliasResult::is_no_alias`] and [`AliasResult::is_must_alias`] are the
//! only places that turn an oracle answer into a decision. Only a definite
//! `NoAlias` / `MustAlias` enables the branch that lets an optimization
//! proceed; `MayAlias` and `Unknown` always take the conservative branch.

mod alias;
mod rc_identity;

pub use alias::{BasicAliasOracle, ConservativeAliasOracle};
pub use rc_identity::ForwardingRcIdentity;

use crate::ir::{ArcFunction, ArcVarId};
use crate::projection::ProjectionPath;

/// Answer to "may these two values refer to overlapping storage?".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AliasResult {
    /// Proven disjoint.
    NoAlias,
    /// Possibly overlapping.
    MayAlias,
    /// Proven to be the same reference.
    MustAlias,
    /// The oracle could not answer.
    Unknown,
}

impl AliasResult {
    /// Only a proven `NoAlias` counts as disjoint.
    #[inline]
    pub fn is_no_alias(self) -> bool {
        matches!(self, AliasResult::NoAlias)
    }

    /// Only a proven `MustAlias` counts as identical.
    #[inline]
    pub fn is_must_alias(self) -> bool {
        matches!(self, AliasResult::MustAlias)
    }
}

/// Overlap queries between two values of one function.
pub trait AliasOracle {
    /// May `a` and `b` refer to overlapping reference-counted storage?
    fn alias(&self, func: &ArcFunction, a: ArcVarId, b: ArcVarId) -> AliasResult;
}

/// Reference-identity queries.
///
/// Two values with the same RC root share one reference count: retaining
/// one is retaining the other.
pub trait RcIdentity {
    /// The value whose reference count `v` shares, looking through copies
    /// and forwarding block parameters. A value is its own root when
    /// nothing can be looked through.
    fn rc_root(&self, func: &ArcFunction, v: ArcVarId) -> ArcVarId;

    /// Field path leading from `base` to `derived`, if `derived` is
    /// (RC-identical to) a projection of `base`. `Some(empty)` when both
    /// share a root.
    fn projection_path(
        &self,
        func: &ArcFunction,
        base: ArcVarId,
        derived: ArcVarId,
    ) -> Option<ProjectionPath>;

    /// The outermost aggregate `v` is projected from, if `v` is a
    /// projection at all.
    fn projection_base(&self, func: &ArcFunction, v: ArcVarId) -> Option<ArcVarId>;
}
