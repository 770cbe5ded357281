//! Projection paths and reference-counted leaf coverage.
//!
//! A [`ProjectionPath`] is the sequence of positional field indices that
//! leads from a base value to a derived value (`base.0.2`). Epilogue
//! release matching uses paths for two questions:
//!
//! - **Overlap**: do two releases touch the same storage? Two paths overlap
//!   when one is a prefix of the other (`x.0` and `x.0.1`, or `x` and
//!   anything). Diverging paths (`x.0` and `x.1`) are disjoint.
//! - **Coverage**: does a set of releases reach every RC leaf of the base?
//!   A release on path `p` covers every leaf whose path starts with `p`.

use std::fmt;

use smallvec::SmallVec;

/// Field path from a base value to a derived value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectionPath(SmallVec<[u32; 4]>);

impl ProjectionPath {
    /// The empty path: the base value itself.
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    /// Build a path from field indices, outermost first.
    pub fn from_fields(fields: &[u32]) -> Self {
        Self(SmallVec::from_slice(fields))
    }

    /// Field indices, outermost first.
    pub fn fields(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Extend this path by one more field.
    pub fn push(&mut self, field: u32) {
        self.0.push(field);
    }

    /// This path extended by `field`.
    #[must_use]
    pub fn with_field(&self, field: u32) -> Self {
        let mut path = self.clone();
        path.push(field);
        path
    }

    /// Append `suffix` after this path.
    #[must_use]
    pub fn join(&self, suffix: &ProjectionPath) -> Self {
        let mut path = self.clone();
        path.0.extend_from_slice(&suffix.0);
        path
    }

    /// Is `self` a (non-strict) prefix of `other`?
    pub fn is_prefix_of(&self, other: &ProjectionPath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Do the two paths address overlapping storage?
    ///
    /// The negation of "non-empty symmetric difference": paths overlap
    /// unless they diverge at some field.
    pub fn overlaps(&self, other: &ProjectionPath) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl fmt::Display for ProjectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for field in &self.0 {
            write!(f, ".{field}")?;
        }
        Ok(())
    }
}

/// Does some leaf escape every released path?
///
/// `leaves` are the RC leaf paths of the base type; `released` are the
/// paths of the releases found for it. A scalar base (no leaves) is
/// trivially covered.
pub fn has_uncovered_leaves(leaves: &[ProjectionPath], released: &[ProjectionPath]) -> bool {
    leaves
        .iter()
        .any(|leaf| !released.iter().any(|r| r.is_prefix_of(leaf)))
}

/// Find two released paths that overlap, if any.
///
/// Returns the positions of the first overlapping pair. Overlap means
/// some storage would be released twice by the set.
pub fn find_overlap(released: &[ProjectionPath]) -> Option<(usize, usize)> {
    for (i, a) in released.iter().enumerate() {
        for (j, b) in released.iter().enumerate().skip(i + 1) {
            if a.overlaps(b) {
                return Some((i, j));
            }
        }
    }
    None
}
