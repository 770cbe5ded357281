//! Final releases of an arbitrary value.
//!
//! [`final_releases_for_value`] treats the value as a liveness problem
//! over its direct users. Every user must be acceptable to the caller's
//! predicate. In each block where the value dies (used there, not live
//! into any successor) the last use must be a release of the value; those
//! releases are the final releases. Finally, every path from the
//! definition to a function exit must cross a final release.
//!
//! On failure the tracker's contents are meaningless; discard it.

use rustc_hash::FxHashSet;

use crate::graph::{compute_def_sites, compute_predecessors, successor_block_ids};
use crate::ir::{ArcBlockId, ArcInstr, ArcVarId, InstrRef, InstrView};
use crate::trap::is_arc_inert_trap_block;
use crate::AnalysisCtx;

/// Insertion-ordered set of instruction references.
#[derive(Clone, Debug, Default)]
struct InstrSet {
    order: Vec<InstrRef>,
    members: FxHashSet<InstrRef>,
}

impl InstrSet {
    fn insert(&mut self, r: InstrRef) -> bool {
        let inserted = self.members.insert(r);
        if inserted {
            self.order.push(r);
        }
        inserted
    }

    fn contains(&self, r: InstrRef) -> bool {
        self.members.contains(&r)
    }

    fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

/// Accumulator for [`final_releases_for_value`].
///
/// Holds the caller's acceptable-user predicate, every user the walk
/// tracked, and the subset judged to be final releases.
pub struct ReleaseTracker<'a> {
    tracked_users: InstrSet,
    final_releases: InstrSet,
    acceptable_user: Box<dyn Fn(InstrView<'_>) -> bool + 'a>,
}

impl<'a> ReleaseTracker<'a> {
    pub fn new(acceptable_user: impl Fn(InstrView<'_>) -> bool + 'a) -> Self {
        Self {
            tracked_users: InstrSet::default(),
            final_releases: InstrSet::default(),
            acceptable_user: Box::new(acceptable_user),
        }
    }

    pub fn is_user_acceptable(&self, user: InstrView<'_>) -> bool {
        (self.acceptable_user)(user)
    }

    pub fn track_user(&mut self, user: InstrRef) {
        self.tracked_users.insert(user);
    }

    pub fn track_last_release(&mut self, release: InstrRef) {
        self.final_releases.insert(release);
    }

    pub fn is_user_tracked(&self, user: InstrRef) -> bool {
        self.tracked_users.contains(user)
    }

    /// Every tracked user, in the order it was tracked.
    pub fn tracked_users(&self) -> &[InstrRef] {
        &self.tracked_users.order
    }

    /// The final releases, in the order they were found.
    pub fn final_releases(&self) -> &[InstrRef] {
        &self.final_releases.order
    }

    /// Forget everything tracked so far; keeps the predicate.
    pub fn clear(&mut self) {
        self.tracked_users.clear();
        self.final_releases.clear();
    }
}

fn is_release_of(view: InstrView<'_>, value: ArcVarId) -> bool {
    matches!(view, InstrView::Instr(ArcInstr::RcDec { var }) if *var == value)
}

/// Find a post-dominating set of final releases of `value`.
///
/// Returns `false` when some user is unacceptable, some dying block does
/// not end the value's life with a release, or some path reaches an exit
/// without crossing a final release.
pub fn final_releases_for_value(
    ctx: &AnalysisCtx<'_>,
    value: ArcVarId,
    tracker: &mut ReleaseTracker<'_>,
) -> bool {
    let func = ctx.func;
    let Some(def_block) = compute_def_sites(func)
        .get(value.index())
        .copied()
        .flatten()
        .map(|site| site.block(func))
    else {
        return false;
    };

    let mut live_in: FxHashSet<ArcBlockId> = FxHashSet::default();
    let mut use_blocks: Vec<ArcBlockId> = Vec::new();
    let mut releases: Vec<InstrRef> = Vec::new();

    for bb in &func.blocks {
        for pos in 0..bb.instr_count() {
            let Some(view) = bb.instr_at(pos) else {
                continue;
            };
            if !view.uses_var(value) {
                continue;
            }
            if !tracker.is_user_acceptable(view) {
                tracing::trace!(
                    function = func.name.raw(),
                    value = value.raw(),
                    block = bb.id.raw(),
                    "unacceptable user"
                );
                return false;
            }
            let here = InstrRef::new(bb.id, crate::ir::position(pos));
            tracker.track_user(here);
            if is_release_of(view, value) {
                releases.push(here);
            }
            if !use_blocks.contains(&bb.id) {
                use_blocks.push(bb.id);
            }
            if bb.id != def_block {
                live_in.insert(bb.id);
            }
        }
    }

    // A lone release that is also the last user in the only use block.
    if let [release] = releases.as_slice() {
        let last_user = tracker.tracked_users().last().copied();
        if use_blocks.len() == 1 && last_user == Some(*release) && release.block == def_block {
            tracker.track_last_release(*release);
            return true;
        }
    }

    // Propagate liveness backward to the definition.
    let preds = compute_predecessors(func);
    let mut worklist: Vec<ArcBlockId> = live_in.iter().copied().collect();
    while let Some(block) = worklist.pop() {
        for &pred in &preds[block.index()] {
            let pred_id = func.blocks[pred].id;
            if pred_id != def_block && live_in.insert(pred_id) {
                if !ctx.config.allows(live_in.len()) {
                    return false;
                }
                worklist.push(pred_id);
            }
        }
    }

    // The last use in every block where the value dies must release it.
    for &block in &use_blocks {
        let bb = func.block(block);
        let live_out = successor_block_ids(&bb.terminator)
            .iter()
            .any(|succ| live_in.contains(succ));
        if live_out {
            continue;
        }
        let last_use = (0..bb.instr_count())
            .rev()
            .map(|pos| InstrRef::new(block, crate::ir::position(pos)))
            .find(|&r| tracker.is_user_tracked(r));
        let Some(last_use) = last_use else {
            return false;
        };
        if !func.instr(last_use).is_some_and(|view| is_release_of(view, value)) {
            return false;
        }
        tracker.track_last_release(last_use);
    }

    releases_post_dominate(ctx, def_block, tracker)
}

/// Does every path from `def_block` to an exit cross a final release?
fn releases_post_dominate(
    ctx: &AnalysisCtx<'_>,
    def_block: ArcBlockId,
    tracker: &ReleaseTracker<'_>,
) -> bool {
    let func = ctx.func;
    let release_blocks: FxHashSet<ArcBlockId> =
        tracker.final_releases().iter().map(|r| r.block).collect();

    let mut visited = FxHashSet::default();
    let mut worklist = vec![def_block];
    visited.insert(def_block);
    while let Some(block) = worklist.pop() {
        if release_blocks.contains(&block) {
            continue;
        }
        let bb = func.block(block);
        let succs = successor_block_ids(&bb.terminator);
        if succs.is_empty() && !is_arc_inert_trap_block(bb) {
            tracing::trace!(
                function = func.name.raw(),
                block = block.raw(),
                "exit reached without a final release"
            );
            return false;
        }
        for succ in succs {
            if visited.insert(succ) {
                if !ctx.config.allows(visited.len()) {
                    return false;
                }
                worklist.push(succ);
            }
        }
    }
    true
}

#[cfg(test)]
mod tests;
