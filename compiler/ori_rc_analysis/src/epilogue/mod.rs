//! Epilogue retain/release matching.
//!
//! An owned return value arrives at the caller with a +1 reference count;
//! somewhere before the return a retain balances that obligation. An owned
//! argument must be released exactly once; near each exit a release
//! balances it. Optimizations that move ownership across the call
//! boundary (turning an owned parameter into a borrowed one, dropping a
//! retain/release pair around a call) need those exact instructions.
//!
//! - [`ConsumedResultRetainMatcher`]: owned return value to retains
//! - [`ConsumedArgReleaseMatcher`]: owned arguments to releases, per
//!   [`ExitKind`](crate::ExitKind)
//!
//! Both matchers are computed eagerly by their constructor and hold no
//! borrow of the function. After any edit, call `recompute`; `is_stale`
//! detects a forgotten recompute by comparing a structural fingerprint.

mod release;
mod retain;

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use smallvec::SmallVec;

use crate::ir::{ArcFunction, InstrRef};

pub use release::{BlockReleases, ConsumedArgReleaseMatcher};
pub use retain::{ConsumedResultRetainMatcher, FindRetainKind, RetainSearch};

/// Retains matched to the owned return value, in discovery order.
pub type RetainList = SmallVec<[InstrRef; 2]>;

/// Releases matched to one argument, in program order per exit block.
pub type ReleaseList = SmallVec<[InstrRef; 2]>;

/// Structural fingerprint of a function, taken at `recompute` time.
pub(crate) fn fingerprint(func: &ArcFunction) -> u64 {
    let mut hasher = FxHasher::default();
    func.hash(&mut hasher);
    hasher.finish()
}
