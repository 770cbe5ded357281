//! Search limits for the backward CFG walks.
//!
//! Every epilogue search and the final-release collector explore at most
//! [`SearchConfig::max_explored_blocks`] blocks. Hitting the limit yields
//! the conservative answer ("not matched"), never a partial one.

/// Limits applied to the CFG searches.
///
/// # Example
///
/// ```
/// use ori_rc_analysis::SearchConfig;
///
/// let config = SearchConfig::default().with_max_explored_blocks(8);
/// assert_eq!(config.max_explored_blocks, 8);
/// assert!(SearchConfig::unlimited().allows(100_000));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchConfig {
    /// Maximum number of distinct blocks one search may visit.
    pub max_explored_blocks: usize,
}

impl SearchConfig {
    /// Default exploration bound.
    pub const DEFAULT_MAX_EXPLORED_BLOCKS: usize = 64;

    /// No limit on explored blocks.
    pub fn unlimited() -> Self {
        Self {
            max_explored_blocks: usize::MAX,
        }
    }

    /// Set the block limit.
    #[must_use]
    pub fn with_max_explored_blocks(mut self, max: usize) -> Self {
        self.max_explored_blocks = max;
        self
    }

    /// May a search that has visited `explored` blocks keep going?
    #[inline]
    pub fn allows(&self, explored: usize) -> bool {
        explored <= self.max_explored_blocks
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_explored_blocks: Self::DEFAULT_MAX_EXPLORED_BLOCKS,
        }
    }
}
