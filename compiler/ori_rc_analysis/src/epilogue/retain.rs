//! Owned return value to epilogue retains.

use rustc_hash::FxHashSet;

use crate::effects::{may_check_ref_count, may_decrement_ref_count};
use crate::graph::{
    compute_def_sites, compute_predecessors, exit_blocks, successor_block_ids, DefSite,
};
use crate::ir::{
    ArcArg, ArcBlockId, ArcInstr, ArcTerminator, ArcVarId, ExitKind, InstrRef, InstrView,
};
use crate::trap::is_arc_inert_trap_block;
use crate::verify::verify_function;
use crate::AnalysisCtx;

use super::{fingerprint, RetainList};

/// Outcome of scanning one block backward for the retain of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FindRetainKind {
    /// Nothing in the block decides the path; the search continues into
    /// the predecessors.
    None,
    /// A retain of the value.
    Found(InstrRef),
    /// The value is the owned result of a self-recursive call, which
    /// stands in for the retain on this path.
    Recursion(InstrRef),
    /// An instruction may decrement or check the value, or the value's
    /// definition was reached without a retain.
    Blocked,
}

/// Result of [`ConsumedResultRetainMatcher::find_matching_retains`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetainSearch {
    pub kind: FindRetainKind,
    /// Self-recursive calls the scan passed over, latest first.
    pub recursive_calls: RetainList,
}

impl RetainSearch {
    fn new(kind: FindRetainKind, recursive_calls: RetainList) -> Self {
        Self {
            kind,
            recursive_calls,
        }
    }
}

/// Finds the retains that balance a function's owned return value.
///
/// Searches backward from every return block. On each path the first
/// RC-relevant event decides: a retain of the returned value's RC root
/// matches, anything that may decrement or check it blocks. Block
/// parameters are followed into the predecessors' `Jump` arguments. A
/// result is kept only if every path matched and every block the search
/// crossed leads only to crossed blocks or ARC-inert traps.
///
/// Any failure empties the whole result.
#[derive(Clone, Debug)]
pub struct ConsumedResultRetainMatcher {
    retains: RetainList,
    recursive_calls: RetainList,
    fingerprint: u64,
}

impl ConsumedResultRetainMatcher {
    /// Match the retains of `ctx.func`.
    pub fn new(ctx: &AnalysisCtx<'_>) -> Self {
        let mut matcher = Self {
            retains: RetainList::new(),
            recursive_calls: RetainList::new(),
            fingerprint: 0,
        };
        matcher.recompute(ctx);
        matcher
    }

    /// Discard all state and match again.
    pub fn recompute(&mut self, ctx: &AnalysisCtx<'_>) {
        let func = ctx.func;
        self.retains.clear();
        self.recursive_calls.clear();
        self.fingerprint = fingerprint(func);

        if !verify_function(func).is_empty() {
            return;
        }

        let preds = compute_predecessors(func);
        let def_sites = compute_def_sites(func);
        let mut retain_free = FxHashSet::default();
        for ret_block in exit_blocks(func, ExitKind::Return) {
            let ArcTerminator::Return { value } = func.block(ret_block).terminator else {
                continue;
            };
            if ctx.classifier.is_scalar(func.var_type(value)) {
                continue;
            }
            if !self.search_from(ctx, &preds, &def_sites, ret_block, value, &mut retain_free) {
                tracing::debug!(
                    function = func.name.raw(),
                    block = ret_block.raw(),
                    "no epilogue retain for owned result"
                );
                self.retains.clear();
                self.recursive_calls.clear();
                return;
            }
        }

        // Checked once over every return block's search, so a retain shared
        // by several return paths may branch into any of them.
        if !is_transitive_successors_retain_free(ctx, &self.retains, &retain_free) {
            tracing::debug!(
                function = func.name.raw(),
                "retain block reaches a block outside the epilogue"
            );
            self.retains.clear();
            self.recursive_calls.clear();
            return;
        }

        tracing::debug!(
            function = func.name.raw(),
            retains = self.retains.len(),
            recursive_calls = self.recursive_calls.len(),
            "matched epilogue retains"
        );
    }

    /// Backward worklist search from one return block. Blocks crossed
    /// without a retain are added to `retain_free`.
    fn search_from(
        &mut self,
        ctx: &AnalysisCtx<'_>,
        preds: &[Vec<usize>],
        def_sites: &[Option<DefSite>],
        ret_block: ArcBlockId,
        value: ArcVarId,
        retain_free: &mut FxHashSet<ArcBlockId>,
    ) -> bool {
        let func = ctx.func;
        let root = ctx.rc.rc_root(func, value);

        let mut worklist = vec![(ret_block, root)];
        let mut handled = FxHashSet::default();
        handled.insert((ret_block, root));
        let mut crossed = FxHashSet::default();
        let mut found = RetainList::new();
        let mut recursive_calls = RetainList::new();

        while let Some((block, value)) = worklist.pop() {
            if !ctx.config.allows(handled.len()) {
                tracing::trace!(
                    function = func.name.raw(),
                    explored = handled.len(),
                    "retain search exceeded block limit"
                );
                return false;
            }

            let search = scan_block(ctx, def_sites, block, value);
            recursive_calls.extend(search.recursive_calls);
            match search.kind {
                FindRetainKind::Found(r) => found.push(r),
                FindRetainKind::Recursion(r) => recursive_calls.push(r),
                FindRetainKind::Blocked => {
                    tracing::trace!(
                        function = func.name.raw(),
                        block = block.raw(),
                        value = value.raw(),
                        "retain search blocked"
                    );
                    return false;
                }
                FindRetainKind::None => {
                    let block_preds = &preds[block.index()];
                    if block_preds.is_empty() {
                        return false;
                    }
                    crossed.insert(block);

                    let bb = func.block(block);
                    let param_pos = bb.params.iter().position(|&(p, _)| p == value);
                    for &pred in block_preds {
                        let next = match param_pos {
                            Some(pos) => {
                                let ArcTerminator::Jump { args, .. } = &func.blocks[pred].terminator
                                else {
                                    return false;
                                };
                                let Some(&incoming) = args.get(pos) else {
                                    return false;
                                };
                                ctx.rc.rc_root(func, incoming)
                            }
                            None => value,
                        };
                        let pred_id = func.blocks[pred].id;
                        if handled.insert((pred_id, next)) {
                            worklist.push((pred_id, next));
                        }
                    }
                }
            }
        }

        retain_free.extend(crossed);
        for r in found {
            if !self.retains.contains(&r) {
                self.retains.push(r);
            }
        }
        for r in recursive_calls {
            if !self.recursive_calls.contains(&r) {
                self.recursive_calls.push(r);
            }
        }
        true
    }

    /// Scan `block` backward from its terminator for the retain of
    /// `value`'s RC root.
    pub fn find_matching_retains(
        ctx: &AnalysisCtx<'_>,
        block: ArcBlockId,
        value: ArcVarId,
    ) -> RetainSearch {
        let def_sites = compute_def_sites(ctx.func);
        scan_block(ctx, &def_sites, block, ctx.rc.rc_root(ctx.func, value))
    }

    /// All matched retains, in discovery order.
    pub fn epilogue_retains(&self) -> &[InstrRef] {
        &self.retains
    }

    /// Self-recursive calls recorded on the matched paths.
    pub fn recursive_calls(&self) -> &[InstrRef] {
        &self.recursive_calls
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = InstrRef> + '_ {
        self.retains.iter().copied()
    }

    /// Iterate in reverse discovery order.
    pub fn iter_rev(&self) -> impl Iterator<Item = InstrRef> + '_ {
        self.retains.iter().rev().copied()
    }

    pub fn len(&self) -> usize {
        self.retains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retains.is_empty()
    }

    /// Is `r` one of the matched retains of `ctx.func`?
    pub fn is_epilogue_retain(&self, ctx: &AnalysisCtx<'_>, r: InstrRef) -> bool {
        debug_assert!(
            !self.is_stale(ctx),
            "retain matcher queried without recompute"
        );
        self.retains.contains(&r)
    }

    /// Was the function edited since the last `recompute`?
    pub fn is_stale(&self, ctx: &AnalysisCtx<'_>) -> bool {
        self.fingerprint != fingerprint(ctx.func)
    }
}

/// One backward block scan. `root` is already an RC root.
fn scan_block(
    ctx: &AnalysisCtx<'_>,
    def_sites: &[Option<DefSite>],
    block: ArcBlockId,
    root: ArcVarId,
) -> RetainSearch {
    let func = ctx.func;
    let mut recursive_calls = RetainList::new();
    let Some(bb) = func.blocks.get(block.index()) else {
        return RetainSearch::new(FindRetainKind::Blocked, recursive_calls);
    };
    let is_root = |v: ArcVarId| ctx.rc.rc_root(func, v) == root;

    for pos in (0..bb.instr_count()).rev() {
        let Some(view) = bb.instr_at(pos) else {
            continue;
        };
        let here = InstrRef::new(block, crate::ir::position(pos));

        if let Some((args, dst)) = self_call(ctx, view) {
            if dst.is_some_and(is_root) {
                return RetainSearch::new(FindRetainKind::Recursion(here), recursive_calls);
            }
            let consumes_value = args.iter().any(|a| {
                a.ownership.is_owned() && !ctx.alias.alias(func, a.var, root).is_no_alias()
            });
            if consumes_value {
                return RetainSearch::new(FindRetainKind::Blocked, recursive_calls);
            }
            recursive_calls.push(here);
            continue;
        }

        if let InstrView::Instr(instr) = view {
            if instr.retained_var().is_some_and(is_root) {
                return RetainSearch::new(FindRetainKind::Found(here), recursive_calls);
            }
            if instr.defined_var().is_some_and(is_root) {
                return RetainSearch::new(FindRetainKind::Blocked, recursive_calls);
            }
        }

        if may_decrement_ref_count(func, view, root, ctx.alias) || may_check_ref_count(view) {
            return RetainSearch::new(FindRetainKind::Blocked, recursive_calls);
        }
    }

    // Definitions outside the body: parameters of the entry block and
    // `TryApply` results at the top of their normal successor.
    let kind = match def_sites.get(root.index()).copied().flatten() {
        Some(DefSite::Param) if block == func.entry => FindRetainKind::Blocked,
        Some(DefSite::TryApplyResult { call, normal }) if normal == block => {
            let recursive = matches!(
                func.instr(call),
                Some(InstrView::Terminator(ArcTerminator::TryApply { func: callee, .. }))
                    if func.is_self_call(*callee)
            );
            if recursive {
                FindRetainKind::Recursion(call)
            } else {
                FindRetainKind::Blocked
            }
        }
        _ => FindRetainKind::None,
    };
    RetainSearch::new(kind, recursive_calls)
}

/// Arguments and in-block result of a direct call to the function itself.
fn self_call<'a>(
    ctx: &AnalysisCtx<'_>,
    view: InstrView<'a>,
) -> Option<(&'a [ArcArg], Option<ArcVarId>)> {
    match view {
        InstrView::Instr(ArcInstr::Apply {
            func: callee,
            args,
            dst,
            ..
        }) if ctx.func.is_self_call(*callee) => Some((args, Some(*dst))),
        // The result of a `TryApply` is only defined in its normal successor.
        InstrView::Terminator(ArcTerminator::TryApply {
            func: callee, args, ..
        }) if ctx.func.is_self_call(*callee) => Some((args, None)),
        _ => None,
    }
}

/// Every successor of a block holding a found retain, and of every block
/// the search crossed without finding one, must itself be a crossed block
/// or an ARC-inert trap. Recursion records are not checked.
fn is_transitive_successors_retain_free(
    ctx: &AnalysisCtx<'_>,
    found: &[InstrRef],
    retain_free: &FxHashSet<ArcBlockId>,
) -> bool {
    let func = ctx.func;
    let ok = |succ: ArcBlockId| {
        retain_free.contains(&succ)
            || func
                .blocks
                .get(succ.index())
                .is_some_and(is_arc_inert_trap_block)
    };
    let retain_blocks = found.iter().map(|r| r.block);
    retain_blocks
        .chain(retain_free.iter().copied())
        .all(|block| successor_block_ids(&func.block(block).terminator).into_iter().all(ok))
}

#[cfg(test)]
mod tests;
