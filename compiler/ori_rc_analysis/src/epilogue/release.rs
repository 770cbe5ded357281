//! Owned arguments to epilogue releases.

use smallvec::SmallVec;

use crate::effects::{may_check_ref_count, may_decrement_ref_count, may_use_value};
use crate::graph::exit_blocks;
use crate::ir::{ArcBlockId, ArcInstr, ArcVarId, ExitKind, InstrRef, InstrView};
use crate::projection::{find_overlap, has_uncovered_leaves, ProjectionPath};
use crate::verify::verify_function;
use crate::AnalysisCtx;

use super::{fingerprint, ReleaseList};

/// A collected release: where it is and which value it releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Release {
    at: InstrRef,
    operand: ArcVarId,
}

/// Result of one backward exit-block scan.
#[derive(Clone, Debug, Default)]
struct Collected {
    /// Arguments with their releases, latest argument first.
    releases: Vec<(ArcVarId, SmallVec<[Release; 2]>)>,
    /// Arguments whose scan stopped on a second release of a leaf that
    /// was already released.
    double_covered: SmallVec<[ArcVarId; 2]>,
}

/// Releases accepted for one exit block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockReleases {
    /// Accepted arguments with their releases in program order.
    pub accepted: Vec<(ArcVarId, ReleaseList)>,
    /// Arguments rejected because two releases cover the same leaf.
    pub double_covered: SmallVec<[ArcVarId; 2]>,
}

/// Finds the releases that balance a function's owned arguments at the
/// exits of one kind.
///
/// Each exit block is scanned backward from its terminator, collecting
/// releases of owned parameters (directly or through projections) until
/// something that may decrement an owned parameter, a `Dealloc`, an
/// unrelated release, or a redundant release stops it. An aggregate
/// argument is accepted only when its releases cover every RC leaf of its
/// type, and only when every exit block of the kind accepts it.
#[derive(Clone, Debug)]
pub struct ConsumedArgReleaseMatcher {
    kind: ExitKind,
    /// Accepted arguments in parameter order.
    arg_releases: Vec<(ArcVarId, ReleaseList)>,
    has_block: bool,
    has_block_without_match: bool,
    double_covered: SmallVec<[ArcVarId; 2]>,
    fingerprint: u64,
}

impl ConsumedArgReleaseMatcher {
    /// Match releases at the normal return exits.
    pub fn new(ctx: &AnalysisCtx<'_>) -> Self {
        Self::for_exit_kind(ctx, ExitKind::Return)
    }

    /// Match releases at the exits of `kind`.
    pub fn for_exit_kind(ctx: &AnalysisCtx<'_>, kind: ExitKind) -> Self {
        let mut matcher = Self {
            kind,
            arg_releases: Vec::new(),
            has_block: false,
            has_block_without_match: false,
            double_covered: SmallVec::new(),
            fingerprint: 0,
        };
        matcher.recompute(ctx);
        matcher
    }

    /// Discard all state and match again.
    pub fn recompute(&mut self, ctx: &AnalysisCtx<'_>) {
        let func = ctx.func;
        self.arg_releases.clear();
        self.has_block = false;
        self.has_block_without_match = false;
        self.double_covered.clear();
        self.fingerprint = fingerprint(func);

        let exits = exit_blocks(func, self.kind);
        self.has_block = !exits.is_empty();
        if !self.has_block {
            return;
        }
        if !verify_function(func).is_empty() {
            self.has_block_without_match = true;
            return;
        }

        let mut per_block = Vec::with_capacity(exits.len());
        for &exit in &exits {
            let block = Self::find_matching_releases(ctx, exit);
            if block.accepted.is_empty() {
                self.has_block_without_match = true;
            }
            for &arg in &block.double_covered {
                if !self.double_covered.contains(&arg) {
                    self.double_covered.push(arg);
                }
            }
            per_block.push(block);
        }

        // An argument counts only if every exit block accepted it.
        for param in &func.params {
            let mut releases = ReleaseList::new();
            let everywhere = per_block.iter().all(|block| {
                match block.accepted.iter().find(|(arg, _)| *arg == param.var) {
                    Some((_, list)) => {
                        releases.extend(list.iter().copied());
                        true
                    }
                    None => false,
                }
            });
            if everywhere {
                self.arg_releases.push((param.var, releases));
            }
        }

        tracing::debug!(
            function = func.name.raw(),
            kind = ?self.kind,
            exits = exits.len(),
            matched_args = self.arg_releases.len(),
            has_block_without_match = self.has_block_without_match,
            "matched epilogue releases"
        );
    }

    /// Collect and validate the releases of one exit block.
    pub fn find_matching_releases(ctx: &AnalysisCtx<'_>, block: ArcBlockId) -> BlockReleases {
        let collected = collect_releases(ctx, block);
        process_matching_releases(ctx, collected)
    }

    /// The exit kind this matcher was built for.
    pub fn exit_kind(&self) -> ExitKind {
        self.kind
    }

    /// Does the function have an exit of this kind at all?
    pub fn has_block(&self) -> bool {
        self.has_block
    }

    /// Did some exit block of this kind match no argument?
    ///
    /// When set, callers must not rely on the result for any argument.
    pub fn has_block_without_match(&self) -> bool {
        self.has_block_without_match
    }

    /// Arguments rejected because their releases overlapped.
    pub fn double_covered_arguments(&self) -> &[ArcVarId] {
        &self.double_covered
    }

    /// Is `arg` matched to exactly one release?
    pub fn is_single_release(&self, arg: ArcVarId) -> bool {
        self.releases_for_argument(arg).len() == 1
    }

    pub fn single_release_for_argument(&self, arg: ArcVarId) -> Option<InstrRef> {
        match self.releases_for_argument(arg) {
            [single] => Some(*single),
            _ => None,
        }
    }

    /// Single release of the argument RC-identical to `value`.
    pub fn single_release_for_value(
        &self,
        ctx: &AnalysisCtx<'_>,
        value: ArcVarId,
    ) -> Option<InstrRef> {
        debug_assert!(
            !self.is_stale(ctx),
            "release matcher queried without recompute"
        );
        self.argument_for_value(ctx, value)
            .and_then(|arg| self.single_release_for_argument(arg))
    }

    /// Matched releases of `arg`; empty when unmatched.
    pub fn releases_for_argument(&self, arg: ArcVarId) -> &[InstrRef] {
        match self.arg_releases.iter().find(|(a, _)| *a == arg) {
            Some((_, list)) => list,
            None => &[],
        }
    }

    /// Matched releases of the argument RC-identical to `value`.
    pub fn releases_for_value(&self, ctx: &AnalysisCtx<'_>, value: ArcVarId) -> &[InstrRef] {
        debug_assert!(
            !self.is_stale(ctx),
            "release matcher queried without recompute"
        );
        match self.argument_for_value(ctx, value) {
            Some(arg) => self.releases_for_argument(arg),
            None => &[],
        }
    }

    /// Is `release` the one and only matched release of some argument?
    pub fn is_single_release_matched_to_argument(&self, release: InstrRef) -> bool {
        self.arg_releases
            .iter()
            .any(|(_, list)| list.len() == 1 && list[0] == release)
    }

    /// Matched arguments with their releases, in parameter order.
    pub fn iter(&self) -> impl Iterator<Item = (ArcVarId, &[InstrRef])> + '_ {
        self.arg_releases
            .iter()
            .map(|(arg, list)| (*arg, list.as_slice()))
    }

    /// Number of matched arguments.
    pub fn len(&self) -> usize {
        self.arg_releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arg_releases.is_empty()
    }

    /// Was the function edited since the last `recompute`?
    pub fn is_stale(&self, ctx: &AnalysisCtx<'_>) -> bool {
        self.fingerprint != fingerprint(ctx.func)
    }

    fn argument_for_value(&self, ctx: &AnalysisCtx<'_>, value: ArcVarId) -> Option<ArcVarId> {
        let root = ctx.rc.rc_root(ctx.func, value);
        self.arg_releases
            .iter()
            .map(|(arg, _)| *arg)
            .find(|&arg| ctx.rc.rc_root(ctx.func, arg) == root)
    }
}

/// The owned, reference-counted parameter whose RC root is `root`.
fn owned_param_with_root(ctx: &AnalysisCtx<'_>, root: ArcVarId) -> Option<ArcVarId> {
    ctx.func
        .params
        .iter()
        .find(|p| {
            p.ownership.is_owned()
                && ctx.classifier.needs_rc(p.ty)
                && ctx.rc.rc_root(ctx.func, p.var) == root
        })
        .map(|p| p.var)
}

/// The owned parameter a release operand belongs to: its RC root, or
/// the base of the projection it was taken from.
fn argument_of(ctx: &AnalysisCtx<'_>, operand: ArcVarId) -> Option<ArcVarId> {
    let root = ctx.rc.rc_root(ctx.func, operand);
    owned_param_with_root(ctx, root).or_else(|| {
        ctx.rc
            .projection_base(ctx.func, operand)
            .and_then(|base| owned_param_with_root(ctx, ctx.rc.rc_root(ctx.func, base)))
    })
}

/// Scan an exit block backward from just before its terminator.
///
/// Stops at the first instruction that may decrement an owned parameter
/// or check any reference count, at a `Dealloc`, at a release that maps
/// to no owned parameter, at a redundant release, and at a release whose
/// value is used by something already scanned (a use after the release).
fn collect_releases(ctx: &AnalysisCtx<'_>, block: ArcBlockId) -> Collected {
    let func = ctx.func;
    let mut collected = Collected::default();
    let Some(bb) = func.blocks.get(block.index()) else {
        return collected;
    };
    let owned: SmallVec<[ArcVarId; 4]> = func
        .params
        .iter()
        .filter(|p| p.ownership.is_owned())
        .map(|p| p.var)
        .collect();
    // Non-release instructions between the scan position and the exit.
    let mut later: SmallVec<[InstrView<'_>; 8]> = SmallVec::new();
    later.push(InstrView::Terminator(&bb.terminator));

    for (pos, instr) in bb.body.iter().enumerate().rev() {
        let here = InstrRef::new(block, crate::ir::position(pos));

        match instr {
            ArcInstr::Dealloc { .. } => break,
            ArcInstr::RcDec { var } => {
                let Some(arg) = argument_of(ctx, *var) else {
                    break;
                };
                if later
                    .iter()
                    .any(|&view| may_use_value(func, view, *var, ctx.alias))
                {
                    tracing::trace!(
                        function = func.name.raw(),
                        arg = arg.raw(),
                        "release followed by a use"
                    );
                    break;
                }
                let idx = match collected.releases.iter().position(|(a, _)| *a == arg) {
                    Some(idx) => idx,
                    None => {
                        collected.releases.push((arg, SmallVec::new()));
                        collected.releases.len() - 1
                    }
                };
                let seen = &collected.releases[idx].1;
                if is_redundant_release(ctx, seen, arg, *var) {
                    // A resolvable path that is still redundant overlaps a
                    // release collected earlier in the scan.
                    let resolvable = ctx.rc.projection_path(func, arg, *var).is_some();
                    if resolvable && !seen.is_empty() {
                        collected.double_covered.push(arg);
                    }
                    break;
                }
                collected.releases[idx].1.push(Release {
                    at: here,
                    operand: *var,
                });
            }
            _ => {
                let view = InstrView::Instr(instr);
                if may_check_ref_count(view)
                    || owned
                        .iter()
                        .any(|&p| may_decrement_ref_count(func, view, p, ctx.alias))
                {
                    break;
                }
                later.push(view);
            }
        }
    }

    collected
        .releases
        .retain(|(_, releases)| !releases.is_empty());
    for (_, releases) in &mut collected.releases {
        releases.reverse();
    }
    collected
}

/// Does releasing `derived` overlap storage already released for `base`?
///
/// A path that cannot be resolved counts as redundant, which stops the
/// scan.
fn is_redundant_release(
    ctx: &AnalysisCtx<'_>,
    seen: &[Release],
    base: ArcVarId,
    derived: ArcVarId,
) -> bool {
    let Some(path) = ctx.rc.projection_path(ctx.func, base, derived) else {
        return true;
    };
    seen.iter().any(
        |r| match ctx.rc.projection_path(ctx.func, base, r.operand) {
            Some(seen_path) => seen_path.overlaps(&path),
            None => true,
        },
    )
}

/// Accept each argument whose collected releases balance it exactly.
fn process_matching_releases(ctx: &AnalysisCtx<'_>, collected: Collected) -> BlockReleases {
    let mut result = BlockReleases::default();
    for (arg, releases) in collected.releases {
        if collected.double_covered.contains(&arg) {
            tracing::debug!(
                function = ctx.func.name.raw(),
                arg = arg.raw(),
                "argument released twice; rejected"
            );
            result.double_covered.push(arg);
            continue;
        }
        if let [single] = releases.as_slice() {
            if ctx.rc.rc_root(ctx.func, single.operand) == ctx.rc.rc_root(ctx.func, arg) {
                result.accepted.push((arg, SmallVec::from_slice(&[single.at])));
                continue;
            }
        }
        match release_argument(ctx, arg, &releases) {
            Coverage::Complete => {
                let list = releases.iter().map(|r| r.at).collect();
                result.accepted.push((arg, list));
            }
            Coverage::Overlapping => {
                tracing::debug!(
                    function = ctx.func.name.raw(),
                    arg = arg.raw(),
                    "overlapping releases for argument; rejected"
                );
                result.double_covered.push(arg);
            }
            Coverage::Incomplete => {
                tracing::trace!(
                    function = ctx.func.name.raw(),
                    arg = arg.raw(),
                    releases = releases.len(),
                    "releases leave an RC leaf uncovered"
                );
            }
        }
    }
    result
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Coverage {
    Complete,
    Incomplete,
    Overlapping,
}

/// Set-cover check of the releases against the RC leaves of `arg`'s type.
fn release_argument(ctx: &AnalysisCtx<'_>, arg: ArcVarId, releases: &[Release]) -> Coverage {
    let paths: Option<Vec<ProjectionPath>> = releases
        .iter()
        .map(|r| ctx.rc.projection_path(ctx.func, arg, r.operand))
        .collect();
    let Some(paths) = paths else {
        return Coverage::Incomplete;
    };
    if find_overlap(&paths).is_some() {
        return Coverage::Overlapping;
    }
    let leaves = ctx.classifier.rc_leaves(ctx.func.var_type(arg));
    if has_uncovered_leaves(&leaves, &paths) {
        Coverage::Incomplete
    } else {
        Coverage::Complete
    }
}
