//! Reference-count lifetime analysis for the Ori compiler.
//!
//! This crate answers the questions that retain/release optimizations need
//! before they are allowed to delete or move an RC operation:
//!
//! - **Effect classification** ([`effects`]): may an instruction decrement,
//!   check, or observe the reference count of a value?
//! - **Range scans** ([`scan`]): first/last ARC-relevant use, or first
//!   decrement/check, inside a single block.
//! - **Epilogue matching** ([`ConsumedResultRetainMatcher`],
//!   [`ConsumedArgReleaseMatcher`]): which retains balance an owned return
//!   value, and which releases balance owned arguments at the function exits.
//! - **Final releases** ([`ReleaseTracker`], [`final_releases_for_value`]):
//!   a post-dominating set of releases for an arbitrary value.
//! - **Trap blocks** ([`is_arc_inert_trap_block`]): unreachable-terminated
//!   blocks that can be ignored by the backward searches.
//!
//! # Design
//!
//! Every analysis is read-only over [`ArcFunction`] and biased toward
//! "not matched": a missing answer makes a client skip an optimization, a
//! wrong answer corrupts runtime reference counts. Alias and RC-identity
//! questions go through the [`AliasOracle`] and [`RcIdentity`] traits, and
//! an unknown oracle answer always maps to the conservative branch (see
//! [`AliasResult`]).
//!
//! Inspired by Swift's `ARCAnalysis` (`lib/SILOptimizer/Analysis`), adapted
//! to the basic-block ARC IR with block parameters.
//!
//! # Invalidation
//!
//! Matchers snapshot nothing but their results and a fingerprint of the
//! function they were computed for. Any CFG edit invalidates them; callers
//! must call `recompute` before querying again.

pub mod builder;
mod classify;
pub mod config;
pub mod effects;
pub mod epilogue;
pub mod graph;
pub mod ir;
pub mod oracle;
pub mod ownership;
pub mod projection;
pub mod release_tracker;
pub mod scan;
pub mod trap;
pub mod types;
pub mod verify;

#[cfg(test)]
mod test_helpers;

pub use builder::ArcIrBuilder;
pub use classify::ArcClassifier;
pub use config::SearchConfig;
pub use effects::{
    can_never_decrement_ref_counts, can_never_use_values, may_check_ref_count,
    may_decrement_ref_count, may_guaranteed_use_value, may_use_value, must_guaranteed_use_value,
    must_use_value,
};
pub use epilogue::{
    BlockReleases, ConsumedArgReleaseMatcher, ConsumedResultRetainMatcher, FindRetainKind,
    ReleaseList, RetainList, RetainSearch,
};
pub use ir::{
    ArcArg, ArcBlock, ArcBlockId, ArcFunction, ArcInstr, ArcParam, ArcTerminator, ArcValue,
    ArcVarId, CallEffects, CtorKind, ExitKind, InstrRef, InstrView, LitValue, Name, PrimOp,
};
pub use oracle::{
    AliasOracle, AliasResult, BasicAliasOracle, ConservativeAliasOracle, ForwardingRcIdentity,
    RcIdentity,
};
pub use ownership::Ownership;
pub use projection::ProjectionPath;
pub use release_tracker::{final_releases_for_value, ReleaseTracker};
pub use scan::{
    value_has_arc_decrement_or_check_in_range, value_has_arc_uses_in_range,
    value_has_arc_uses_in_reverse_range,
};
pub use trap::is_arc_inert_trap_block;
pub use types::{Idx, Pool, TypeData};
pub use verify::{verify_function, IrProblem};

/// ARC classification for a type.
///
/// Determines whether values of this type carry reference-counted storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArcClass {
    /// No reference counting needed. The value is purely stack/register.
    Scalar,

    /// Definitely contains a reference-counted heap pointer.
    DefiniteRef,

    /// Might contain a reference-counted pointer (opaque or unresolved
    /// types). Conservatively treated as needing RC.
    PossibleRef,
}

/// Classification trait for ARC analysis.
///
/// Provides the core `arc_class` query, the RC leaf enumeration used by
/// epilogue release matching, and convenience predicates. Implemented by
/// [`ArcClassifier`], which wraps a [`Pool`] reference with caching.
pub trait ArcClassification {
    /// Classify a type by its pool index.
    fn arc_class(&self, idx: Idx) -> ArcClass;

    /// Projection paths (from the value itself) of every reference-counted
    /// leaf of a type.
    ///
    /// A scalar type has no leaves. A reference type is its own leaf (the
    /// empty path). Tuples and structs contribute their fields' leaves;
    /// enums and opaque types are leaves as a whole since projections
    /// cannot enter them.
    fn rc_leaves(&self, idx: Idx) -> Vec<ProjectionPath>;

    /// Returns `true` if this type is scalar (no RC operations needed).
    fn is_scalar(&self, idx: Idx) -> bool {
        self.arc_class(idx) == ArcClass::Scalar
    }

    /// Returns `true` if this type might need reference counting.
    ///
    /// This is `true` for both `DefiniteRef` and `PossibleRef`.
    fn needs_rc(&self, idx: Idx) -> bool {
        self.arc_class(idx) != ArcClass::Scalar
    }
}

/// Everything an epilogue matcher needs to query a function.
///
/// Bundles the function with the oracles that were built for it. Oracles
/// are per-function snapshots: after editing the function, rebuild them
/// along with the context.
#[derive(Clone, Copy)]
pub struct AnalysisCtx<'a> {
    pub func: &'a ArcFunction,
    pub rc: &'a dyn RcIdentity,
    pub alias: &'a dyn AliasOracle,
    pub classifier: &'a dyn ArcClassification,
    pub config: SearchConfig,
}

impl<'a> AnalysisCtx<'a> {
    /// Create a context with the default [`SearchConfig`].
    pub fn new(
        func: &'a ArcFunction,
        rc: &'a dyn RcIdentity,
        alias: &'a dyn AliasOracle,
        classifier: &'a dyn ArcClassification,
    ) -> Self {
        Self {
            func,
            rc,
            alias,
            classifier,
            config: SearchConfig::default(),
        }
    }

    /// Replace the search limits.
    #[must_use]
    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }
}
