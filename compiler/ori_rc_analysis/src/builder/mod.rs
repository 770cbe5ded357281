//! Incremental construction of [`ArcFunction`]s.
//!
//! The analyses in this crate never build IR, but their clients and tests
//! need a convenient way to write functions down without tracking variable
//! numbering and per-variable types by hand.

use crate::ir::{
    ArcArg, ArcBlock, ArcBlockId, ArcFunction, ArcInstr, ArcParam, ArcTerminator, ArcValue,
    ArcVarId, CallEffects, CtorKind, Name,
};
use crate::ownership::Ownership;
use crate::types::Idx;

/// In-progress basic block being constructed.
struct BlockBuilder {
    id: ArcBlockId,
    params: Vec<(ArcVarId, Idx)>,
    body: Vec<ArcInstr>,
    terminator: Option<ArcTerminator>,
}

impl BlockBuilder {
    fn new(id: ArcBlockId) -> Self {
        Self {
            id,
            params: Vec::new(),
            body: Vec::new(),
            terminator: None,
        }
    }
}

// ArcIrBuilder

/// Builder for an in-progress ARC IR function.
///
/// Follows the "position at a block, emit instructions, terminate" pattern
/// of LLVM's `IRBuilder`, with block parameters instead of phi nodes.
/// Consumed by [`finish`](ArcIrBuilder::finish).
pub struct ArcIrBuilder {
    blocks: Vec<BlockBuilder>,
    current_block: ArcBlockId,
    next_var: u32,
    var_types: Vec<Idx>,
    params: Vec<ArcParam>,
}

impl Default for ArcIrBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArcIrBuilder {
    /// Create a builder with an entry block already allocated.
    pub fn new() -> Self {
        let entry = BlockBuilder::new(ArcBlockId::new(0));
        Self {
            blocks: vec![entry],
            current_block: ArcBlockId::new(0),
            next_var: 0,
            var_types: Vec::new(),
            params: Vec::new(),
        }
    }

    // Block management

    /// Allocate a new empty block and return its ID.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "block indices never exceed u32"
    )]
    pub fn new_block(&mut self) -> ArcBlockId {
        let id = ArcBlockId::new(self.blocks.len() as u32);
        self.blocks.push(BlockBuilder::new(id));
        id
    }

    /// Set the insertion point to `block`.
    pub fn position_at(&mut self, block: ArcBlockId) {
        debug_assert!(
            block.index() < self.blocks.len(),
            "ArcBlockId {} out of bounds (have {} blocks)",
            block.raw(),
            self.blocks.len(),
        );
        self.current_block = block;
    }

    /// The block instructions are currently emitted into.
    pub fn current_block(&self) -> ArcBlockId {
        self.current_block
    }

    /// Does the current block already have a terminator?
    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current_block.index()].terminator.is_some()
    }

    // Variables

    /// Allocate a fresh variable of type `ty`.
    pub fn fresh_var(&mut self, ty: Idx) -> ArcVarId {
        let id = ArcVarId::new(self.next_var);
        self.next_var += 1;
        self.var_types.push(ty);
        id
    }

    /// Add a function parameter with the given convention.
    pub fn add_param(&mut self, ty: Idx, ownership: Ownership) -> ArcVarId {
        let var = self.fresh_var(ty);
        self.params.push(ArcParam { var, ty, ownership });
        var
    }

    /// Add a block parameter to `block`.
    pub fn add_block_param(&mut self, block: ArcBlockId, ty: Idx) -> ArcVarId {
        let var = self.fresh_var(ty);
        self.blocks[block.index()].params.push((var, ty));
        var
    }

    // Instructions

    fn push(&mut self, instr: ArcInstr) {
        let block = &mut self.blocks[self.current_block.index()];
        debug_assert!(
            block.terminator.is_none(),
            "emitting into terminated block {}",
            self.current_block.raw()
        );
        block.body.push(instr);
    }

    /// Emit `Let` and return the defined variable.
    pub fn emit_let(&mut self, ty: Idx, value: ArcValue) -> ArcVarId {
        let dst = self.fresh_var(ty);
        self.push(ArcInstr::Let { dst, ty, value });
        dst
    }

    /// Emit a direct call.
    pub fn emit_apply(
        &mut self,
        ty: Idx,
        func: Name,
        args: Vec<ArcArg>,
        effects: CallEffects,
    ) -> ArcVarId {
        let dst = self.fresh_var(ty);
        self.push(ArcInstr::Apply {
            dst,
            ty,
            func,
            args,
            effects,
        });
        dst
    }

    /// Emit a call through a closure.
    pub fn emit_apply_indirect(
        &mut self,
        ty: Idx,
        closure: ArcVarId,
        args: Vec<ArcArg>,
    ) -> ArcVarId {
        let dst = self.fresh_var(ty);
        self.push(ArcInstr::ApplyIndirect {
            dst,
            ty,
            closure,
            args,
        });
        dst
    }

    /// Emit aggregate construction.
    pub fn emit_construct(&mut self, ty: Idx, ctor: CtorKind, args: Vec<ArcVarId>) -> ArcVarId {
        let dst = self.fresh_var(ty);
        self.push(ArcInstr::Construct {
            dst,
            ty,
            ctor,
            args,
        });
        dst
    }

    /// Emit a field projection.
    pub fn emit_project(&mut self, ty: Idx, value: ArcVarId, field: u32) -> ArcVarId {
        let dst = self.fresh_var(ty);
        self.push(ArcInstr::Project {
            dst,
            ty,
            value,
            field,
        });
        dst
    }

    /// Emit a stack slot allocation and return its address.
    pub fn emit_alloc(&mut self, ty: Idx) -> ArcVarId {
        let dst = self.fresh_var(ty);
        self.push(ArcInstr::Alloc { dst, ty });
        dst
    }

    pub fn emit_load(&mut self, ty: Idx, addr: ArcVarId) -> ArcVarId {
        let dst = self.fresh_var(ty);
        self.push(ArcInstr::Load { dst, ty, addr });
        dst
    }

    pub fn emit_store(&mut self, addr: ArcVarId, value: ArcVarId) {
        self.push(ArcInstr::Store { addr, value });
    }

    /// Emit a single retain.
    pub fn emit_rc_inc(&mut self, var: ArcVarId) {
        self.push(ArcInstr::RcInc { var, count: 1 });
    }

    /// Emit a release.
    pub fn emit_rc_dec(&mut self, var: ArcVarId) {
        self.push(ArcInstr::RcDec { var });
    }

    /// Emit a uniqueness check; the result is a `bool`.
    pub fn emit_is_shared(&mut self, var: ArcVarId) -> ArcVarId {
        let dst = self.fresh_var(Idx::BOOL);
        self.push(ArcInstr::IsShared { dst, var });
        dst
    }

    pub fn emit_dealloc(&mut self, var: ArcVarId) {
        self.push(ArcInstr::Dealloc { var });
    }

    pub fn emit_cond_fail(&mut self, cond: ArcVarId) {
        self.push(ArcInstr::CondFail { cond });
    }

    pub fn emit_debug_value(&mut self, var: ArcVarId) {
        self.push(ArcInstr::DebugValue { var });
    }

    pub fn emit_fix_lifetime(&mut self, var: ArcVarId) {
        self.push(ArcInstr::FixLifetime { var });
    }

    // Terminators

    fn set_terminator(&mut self, terminator: ArcTerminator) {
        let block = &mut self.blocks[self.current_block.index()];
        debug_assert!(
            block.terminator.is_none(),
            "block {} already terminated",
            self.current_block.raw()
        );
        block.terminator = Some(terminator);
    }

    /// Terminate with `Return`.
    pub fn terminate_return(&mut self, value: ArcVarId) {
        self.set_terminator(ArcTerminator::Return { value });
    }

    /// Terminate with `Throw` (error exit).
    pub fn terminate_throw(&mut self, value: ArcVarId) {
        self.set_terminator(ArcTerminator::Throw { value });
    }

    /// Terminate with unconditional `Jump`.
    pub fn terminate_jump(&mut self, target: ArcBlockId, args: Vec<ArcVarId>) {
        self.set_terminator(ArcTerminator::Jump { target, args });
    }

    /// Terminate with conditional `Branch`.
    pub fn terminate_branch(
        &mut self,
        cond: ArcVarId,
        then_block: ArcBlockId,
        else_block: ArcBlockId,
    ) {
        self.set_terminator(ArcTerminator::Branch {
            cond,
            then_block,
            else_block,
        });
    }

    /// Terminate with multi-way `Switch`.
    pub fn terminate_switch(
        &mut self,
        scrutinee: ArcVarId,
        cases: Vec<(u64, ArcBlockId)>,
        default: ArcBlockId,
    ) {
        self.set_terminator(ArcTerminator::Switch {
            scrutinee,
            cases,
            default,
        });
    }

    /// Terminate with `TryApply` (call that may throw).
    ///
    /// The returned variable is defined at the entry of `normal`, not in
    /// the current block.
    pub fn terminate_try_apply(
        &mut self,
        ty: Idx,
        func: Name,
        args: Vec<ArcArg>,
        effects: CallEffects,
        normal: ArcBlockId,
        error: ArcBlockId,
    ) -> ArcVarId {
        let dst = self.fresh_var(ty);
        self.set_terminator(ArcTerminator::TryApply {
            dst,
            ty,
            func,
            args,
            effects,
            normal,
            error,
        });
        dst
    }

    /// Terminate with `Unreachable`.
    pub fn terminate_unreachable(&mut self) {
        self.set_terminator(ArcTerminator::Unreachable);
    }

    // Finalization

    /// Consume the builder and produce a finished [`ArcFunction`].
    ///
    /// Unterminated blocks get `Unreachable` as a fallback (with a tracing
    /// warning).
    pub fn finish(self, name: Name, return_type: Idx) -> ArcFunction {
        let blocks = self
            .blocks
            .into_iter()
            .map(|bb| {
                let terminator = bb.terminator.unwrap_or_else(|| {
                    tracing::warn!(
                        block = bb.id.raw(),
                        "unterminated block in ARC IR, adding Unreachable"
                    );
                    ArcTerminator::Unreachable
                });
                ArcBlock {
                    id: bb.id,
                    params: bb.params,
                    body: bb.body,
                    terminator,
                }
            })
            .collect();

        ArcFunction {
            name,
            params: self.params,
            return_type,
            blocks,
            entry: ArcBlockId::new(0),
            var_types: self.var_types,
        }
    }
}

#[cfg(test)]
mod tests;
