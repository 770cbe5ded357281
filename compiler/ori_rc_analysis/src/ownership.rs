//! Ownership conventions for function arguments and call operands.
//!
//! Every function parameter and every call argument carries an
//! [`Ownership`]. The epilogue matchers only look for balancing releases
//! of [`Owned`](Ownership::Owned) parameters, and the guaranteed-use
//! predicates only consider [`Borrowed`](Ownership::Borrowed) call operands.

/// Ownership convention for a parameter or call argument.
///
/// Inspired by Swift's `@owned` / `@guaranteed` / `@unowned` parameter
/// conventions and Lean 4's borrow annotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// The callee consumes the value and must release it exactly once.
    Owned,

    /// The caller guarantees the value stays alive for the duration of the
    /// call. The callee neither retains nor releases it.
    Borrowed,

    /// No ownership is transferred and no lifetime is guaranteed.
    Unowned,
}

impl Ownership {
    /// Returns `true` for the consumed (`@owned`) convention.
    #[inline]
    pub fn is_owned(self) -> bool {
        self == Ownership::Owned
    }

    /// Returns `true` for the guaranteed (`@guaranteed`) convention.
    #[inline]
    pub fn is_guaranteed(self) -> bool {
        self == Ownership::Borrowed
    }
}
