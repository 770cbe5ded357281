//! Shared CFG utilities for the RC analyses.
//!
//! Generic graph operations on [`ArcFunction`] that several analyses need.
//! They live here so that analyses do not import from each other.

use rustc_hash::FxHashSet;
use smallvec::{smallvec, SmallVec};

use crate::ir::{ArcBlockId, ArcFunction, ArcTerminator, ArcVarId, ExitKind, InstrRef};

/// Compute the predecessor list for each block (deduplicated).
///
/// Returns a vector indexed by block index, where each entry is the
/// list of distinct predecessor block indices.
pub fn compute_predecessors(func: &ArcFunction) -> Vec<Vec<usize>> {
    let num_blocks = func.blocks.len();
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); num_blocks];

    for (block_idx, block) in func.blocks.iter().enumerate() {
        let mut seen = FxHashSet::default();
        for succ_id in successor_block_ids(&block.terminator) {
            let succ_idx = succ_id.index();
            if succ_idx < num_blocks && seen.insert(succ_idx) {
                predecessors[succ_idx].push(block_idx);
            }
        }
    }

    predecessors
}

/// Extract successor block IDs from a terminator.
///
/// Returns `SmallVec<[ArcBlockId; 4]>` to avoid heap allocation for the
/// common case (max 2 successors except Switch with many cases).
pub fn successor_block_ids(terminator: &ArcTerminator) -> SmallVec<[ArcBlockId; 4]> {
    match terminator {
        ArcTerminator::Return { .. }
        | ArcTerminator::Throw { .. }
        | ArcTerminator::Unreachable => SmallVec::new(),
        ArcTerminator::Jump { target, .. } => smallvec![*target],
        ArcTerminator::Branch {
            then_block,
            else_block,
            ..
        } => smallvec![*then_block, *else_block],
        ArcTerminator::Switch { cases, default, .. } => {
            let mut targets = SmallVec::with_capacity(cases.len() + 1);
            for &(_, b) in cases {
                targets.push(b);
            }
            targets.push(*default);
            targets
        }
        ArcTerminator::TryApply { normal, error, .. } => smallvec![*normal, *error],
    }
}

/// Blocks whose terminator exits the function with the given kind, in
/// block order.
pub fn exit_blocks(func: &ArcFunction, kind: ExitKind) -> Vec<ArcBlockId> {
    func.blocks
        .iter()
        .filter(|bl| bl.terminator.exit_kind() == Some(kind))
        .map(|bl| bl.id)
        .collect()
}

/// Where a variable gets its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefSite {
    /// A function parameter, defined on entry.
    Param,
    /// A parameter of the given block.
    BlockParam(ArcBlockId),
    /// A body instruction.
    Instr(InstrRef),
    /// The result of a `TryApply`, defined on entry to its normal
    /// successor. Holds the terminator's own reference.
    TryApplyResult { call: InstrRef, normal: ArcBlockId },
}

impl DefSite {
    /// The block in which the variable becomes available.
    pub fn block(self, func: &ArcFunction) -> ArcBlockId {
        match self {
            DefSite::Param => func.entry,
            DefSite::BlockParam(block) => block,
            DefSite::Instr(r) => r.block,
            DefSite::TryApplyResult { normal, .. } => normal,
        }
    }
}

/// Definition site of every variable, indexed by `ArcVarId::index()`.
///
/// Variables without a definition (malformed IR) map to `None`.
pub fn compute_def_sites(func: &ArcFunction) -> Vec<Option<DefSite>> {
    let mut sites = vec![None; func.var_types.len()];
    let mut set = |var: ArcVarId, site: DefSite| {
        if let Some(slot) = sites.get_mut(var.index()) {
            *slot = Some(site);
        }
    };

    for param in &func.params {
        set(param.var, DefSite::Param);
    }
    for block in &func.blocks {
        for &(var, _) in &block.params {
            set(var, DefSite::BlockParam(block.id));
        }
        for (pos, instr) in block.body.iter().enumerate() {
            if let Some(dst) = instr.defined_var() {
                set(
                    dst,
                    DefSite::Instr(InstrRef::new(block.id, crate::ir::position(pos))),
                );
            }
        }
        if let ArcTerminator::TryApply { dst, normal, .. } = &block.terminator {
            set(
                *dst,
                DefSite::TryApplyResult {
                    call: block.terminator_ref(),
                    normal: *normal,
                },
            );
        }
    }

    sites
}
