//! Forwarding RC-identity resolver.

use crate::graph::compute_predecessors;
use crate::ir::{ArcFunction, ArcInstr, ArcTerminator, ArcValue, ArcVarId};
use crate::projection::ProjectionPath;

use super::RcIdentity;

/// RC identity by looking through copies and forwarding block parameters.
///
/// - `let y = x` makes `y` RC-identical to `x`.
/// - A block parameter whose incoming values (from every predecessor
///   `Jump`) all share one root, ignoring the parameter itself, shares
///   that root.
/// - `Project` starts a new value: the field has its own count. The
///   projection chain is kept for [`RcIdentity::projection_path`].
///
/// Built once per function; rebuild after editing the function.
#[derive(Clone, Debug)]
pub struct ForwardingRcIdentity {
    /// Union-find style parent links; a root has `None`.
    parent: Vec<Option<ArcVarId>>,
    /// `Project { dst, value, field }` as `dst -> (value, field)`.
    projection: Vec<Option<(ArcVarId, u32)>>,
}

impl ForwardingRcIdentity {
    pub fn new(func: &ArcFunction) -> Self {
        let num_vars = func.var_types.len();
        let mut this = Self {
            parent: vec![None; num_vars],
            projection: vec![None; num_vars],
        };

        for block in &func.blocks {
            for instr in &block.body {
                match instr {
                    ArcInstr::Let {
                        dst,
                        value: ArcValue::Var(src),
                        ..
                    } => this.link(*dst, *src),
                    ArcInstr::Project {
                        dst, value, field, ..
                    } => {
                        if let Some(slot) = this.projection.get_mut(dst.index()) {
                            *slot = Some((*value, *field));
                        }
                    }
                    _ => {}
                }
            }
        }

        this.forward_block_params(func);
        this
    }

    /// Resolve block parameters to a shared incoming root until nothing
    /// changes. Links only ever join one root under another distinct
    /// root, so the parent graph stays acyclic.
    fn forward_block_params(&mut self, func: &ArcFunction) {
        let preds = compute_predecessors(func);
        let mut changed = true;
        while changed {
            changed = false;
            for (block_idx, block) in func.blocks.iter().enumerate() {
                for (param_pos, &(param, _)) in block.params.iter().enumerate() {
                    if self.parent_of(param).is_some() {
                        continue;
                    }
                    let Some(root) = self.shared_incoming_root(
                        func,
                        &preds[block_idx],
                        block_idx,
                        param_pos,
                        param,
                    ) else {
                        continue;
                    };
                    self.link(param, root);
                    changed = true;
                }
            }
        }
    }

    fn shared_incoming_root(
        &self,
        func: &ArcFunction,
        preds: &[usize],
        block_idx: usize,
        param_pos: usize,
        param: ArcVarId,
    ) -> Option<ArcVarId> {
        let mut shared = None;
        for &pred in preds {
            let ArcTerminator::Jump { target, args } = &func.blocks[pred].terminator else {
                // Non-Jump edges carry no arguments.
                return None;
            };
            if target.index() != block_idx {
                return None;
            }
            let root = self.root(*args.get(param_pos)?);
            if root == param {
                continue;
            }
            match shared {
                None => shared = Some(root),
                Some(existing) if existing == root => {}
                Some(_) => return None,
            }
        }
        shared
    }

    fn parent_of(&self, v: ArcVarId) -> Option<ArcVarId> {
        self.parent.get(v.index()).copied().flatten()
    }

    fn link(&mut self, child: ArcVarId, target: ArcVarId) {
        let root = self.root(target);
        if root == child {
            return;
        }
        if let Some(slot) = self.parent.get_mut(child.index()) {
            *slot = Some(root);
        }
    }

    fn root(&self, mut v: ArcVarId) -> ArcVarId {
        // Bounded by the variable count; the parent graph is acyclic.
        for _ in 0..=self.parent.len() {
            match self.parent_of(v) {
                Some(p) => v = p,
                None => return v,
            }
        }
        v
    }

    fn projected_from(&self, v: ArcVarId) -> Option<(ArcVarId, u32)> {
        self.projection.get(v.index()).copied().flatten()
    }
}

impl RcIdentity for ForwardingRcIdentity {
    fn rc_root(&self, func: &ArcFunction, v: ArcVarId) -> ArcVarId {
        debug_assert_eq!(
            func.var_types.len(),
            self.parent.len(),
            "RC identity snapshot built for a different function"
        );
        self.root(v)
    }

    fn projection_path(
        &self,
        func: &ArcFunction,
        base: ArcVarId,
        derived: ArcVarId,
    ) -> Option<ProjectionPath> {
        let base_root = self.rc_root(func, base);
        let mut fields = Vec::new();
        let mut cur = self.root(derived);
        for _ in 0..=self.projection.len() {
            if cur == base_root {
                fields.reverse();
                return Some(ProjectionPath::from_fields(&fields));
            }
            let (value, field) = self.projected_from(cur)?;
            fields.push(field);
            cur = self.root(value);
        }
        None
    }

    fn projection_base(&self, func: &ArcFunction, v: ArcVarId) -> Option<ArcVarId> {
        let mut cur = self.rc_root(func, v);
        let mut base = None;
        for _ in 0..=self.projection.len() {
            match self.projected_from(cur) {
                Some((value, _)) => {
                    cur = self.root(value);
                    base = Some(cur);
                }
                None => break,
            }
        }
        base
    }
}
