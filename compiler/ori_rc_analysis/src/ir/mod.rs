//! ARC IR: the basic-block representation the RC analyses read.
//!
//! # Architecture
//!
//! - **[`ArcFunction`]**: parameters with ownership conventions, blocks,
//!   variable types
//! - **[`ArcBlock`]**: block parameters, body instructions, terminator
//! - **[`ArcInstr`]**: a single body instruction (copy, call, projection,
//!   memory access, RC operation, ...)
//! - **[`ArcTerminator`]**: block exit (return, throw, jump, branch, ...)
//!
//! Values are named via [`ArcVarId`] (SSA). Control flow uses
//! [`ArcBlockId`] references between blocks; merges pass values through
//! block parameters instead of phi nodes.
//!
//! # Instruction identity
//!
//! An [`InstrRef`] names one instruction by block and position. Position
//! `body.len()` is the block's terminator, so the analyses can treat a
//! block as one instruction sequence ending in its terminator. An
//! `InstrRef` is only meaningful for the function state it was taken from.

use crate::ownership::Ownership;
use crate::types::Idx;

// ID newtypes

/// Interned symbol naming a function, class, or constructor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Variable ID within an ARC IR function.
///
/// Each `ArcVarId` identifies a unique SSA value within a single
/// [`ArcFunction`]. IDs are allocated sequentially starting from 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ArcVarId(u32);

impl ArcVarId {
    /// Create a new variable ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Basic block ID within an ARC IR function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ArcBlockId(u32);

impl ArcBlockId {
    /// Create a new block ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identity of one instruction: its block and its position in that block.
///
/// Position `body.len()` denotes the terminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrRef {
    pub block: ArcBlockId,
    pub pos: u32,
}

impl InstrRef {
    #[inline]
    pub fn new(block: ArcBlockId, pos: u32) -> Self {
        Self { block, pos }
    }

    /// Position as `usize`.
    #[inline]
    pub fn index(self) -> usize {
        self.pos as usize
    }

    /// The instruction after this one in the same block.
    #[inline]
    #[must_use]
    pub fn next(self) -> Self {
        Self::new(self.block, self.pos + 1)
    }
}

// Values

/// Literal value in the ARC IR.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LitValue {
    Int(i64),
    Float(u64),
    Bool(bool),
    /// Statically allocated string constant (immortal; never released).
    String(Name),
    Unit,
}

/// Primitive operation on scalar operands.
///
/// Operations on reference-counted values (string concatenation,
/// collection access) are lowered to `Apply` calls, so a `PrimOp` never
/// touches a reference count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
    Neg,
}

/// A value expression in the ARC IR.
///
/// Values are the right-hand side of `Let` instructions and are free of
/// reference-count effects.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArcValue {
    /// Copy of an existing variable (RC-identical to it).
    Var(ArcVarId),
    /// A literal constant.
    Literal(LitValue),
    /// A primitive operation on scalars.
    PrimOp { op: PrimOp, args: Vec<ArcVarId> },
}

/// The kind of constructor for a `Construct` instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CtorKind {
    /// Named struct: `Point { x: 1, y: 2 }`.
    Struct(Name),
    /// Enum variant by index.
    EnumVariant { enum_name: Name, variant: u32 },
    /// Tuple: `(1, "hello")`.
    Tuple,
}

// Calls

/// A call operand together with the callee's convention for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArcArg {
    pub var: ArcVarId,
    pub ownership: Ownership,
}

impl ArcArg {
    pub fn owned(var: ArcVarId) -> Self {
        Self {
            var,
            ownership: Ownership::Owned,
        }
    }

    pub fn borrowed(var: ArcVarId) -> Self {
        Self {
            var,
            ownership: Ownership::Borrowed,
        }
    }
}

/// Summary of a callee's reference-count side effects.
///
/// Produced by whatever side-effect analysis the caller runs; the RC
/// analyses only read it. `Unknown` is always safe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallEffects {
    /// The callee may release anything reachable.
    #[default]
    Unknown,
    /// The callee never decrements a reference count.
    NoRelease,
    /// The callee decrements only the arguments it receives as owned.
    ReleasesArgsOnly,
}

// Parameters

/// A function parameter with its ownership convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ArcParam {
    /// The variable ID bound to this parameter.
    pub var: ArcVarId,
    /// The parameter's type in the type pool.
    pub ty: Idx,
    /// Ownership convention.
    pub ownership: Ownership,
}

// Instructions

/// A single instruction in an ARC IR basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArcInstr {
    /// Bind a value to a variable: `let dst: ty = value`.
    Let {
        dst: ArcVarId,
        ty: Idx,
        value: ArcValue,
    },

    /// Direct function call: `let dst: ty = func(args...)`.
    Apply {
        dst: ArcVarId,
        ty: Idx,
        func: Name,
        args: Vec<ArcArg>,
        effects: CallEffects,
    },

    /// Indirect call through a closure. Its effects are always unknown.
    ApplyIndirect {
        dst: ArcVarId,
        ty: Idx,
        closure: ArcVarId,
        args: Vec<ArcArg>,
    },

    /// Field projection: `let dst: ty = value.field`.
    Project {
        dst: ArcVarId,
        ty: Idx,
        value: ArcVarId,
        field: u32,
    },

    /// Aggregate formation: `let dst: ty = ctor(args...)`.
    Construct {
        dst: ArcVarId,
        ty: Idx,
        ctor: CtorKind,
        args: Vec<ArcVarId>,
    },

    /// Stack slot allocation. `dst` is the slot's address.
    Alloc { dst: ArcVarId, ty: Idx },

    /// Read a value out of memory.
    Load {
        dst: ArcVarId,
        ty: Idx,
        addr: ArcVarId,
    },

    /// Initialize memory with a value (no release of a previous value).
    Store { addr: ArcVarId, value: ArcVarId },

    /// Increment reference count (retain). `count` allows batched
    /// increments.
    RcInc { var: ArcVarId, count: u32 },

    /// Decrement reference count and free if zero (release).
    RcDec { var: ArcVarId },

    /// Test whether a value's reference count is 1. Reads the count.
    IsShared { dst: ArcVarId, var: ArcVarId },

    /// Free a heap object whose reference count already reached zero.
    Dealloc { var: ArcVarId },

    /// Trap if a scalar condition holds.
    CondFail { cond: ArcVarId },

    /// Debug-info marker; not a use for lifetime purposes.
    DebugValue { var: ArcVarId },

    /// Keep a value alive up to this point.
    FixLifetime { var: ArcVarId },
}

impl ArcInstr {
    /// Returns the variable defined (written) by this instruction, if any.
    pub fn defined_var(&self) -> Option<ArcVarId> {
        match self {
            ArcInstr::Let { dst, .. }
            | ArcInstr::Apply { dst, .. }
            | ArcInstr::ApplyIndirect { dst, .. }
            | ArcInstr::Project { dst, .. }
            | ArcInstr::Construct { dst, .. }
            | ArcInstr::Alloc { dst, .. }
            | ArcInstr::Load { dst, .. }
            | ArcInstr::IsShared { dst, .. } => Some(*dst),

            ArcInstr::Store { .. }
            | ArcInstr::RcInc { .. }
            | ArcInstr::RcDec { .. }
            | ArcInstr::Dealloc { .. }
            | ArcInstr::CondFail { .. }
            | ArcInstr::DebugValue { .. }
            | ArcInstr::FixLifetime { .. } => None,
        }
    }

    /// Returns all variables read (used) by this instruction.
    ///
    /// The `dst` of value-producing instructions is NOT included.
    pub fn used_vars(&self) -> Vec<ArcVarId> {
        match self {
            ArcInstr::Let { value, .. } => match value {
                ArcValue::Var(v) => vec![*v],
                ArcValue::Literal(_) => vec![],
                ArcValue::PrimOp { args, .. } => args.clone(),
            },

            ArcInstr::Apply { args, .. } => args.iter().map(|a| a.var).collect(),

            ArcInstr::ApplyIndirect { closure, args, .. } => {
                let mut vars = Vec::with_capacity(1 + args.len());
                vars.push(*closure);
                vars.extend(args.iter().map(|a| a.var));
                vars
            }

            ArcInstr::Construct { args, .. } => args.clone(),

            ArcInstr::Project { value, .. } => vec![*value],

            ArcInstr::Alloc { .. } => vec![],

            ArcInstr::Load { addr, .. } => vec![*addr],

            ArcInstr::Store { addr, value } => vec![*addr, *value],

            ArcInstr::RcInc { var, .. }
            | ArcInstr::RcDec { var }
            | ArcInstr::IsShared { var, .. }
            | ArcInstr::Dealloc { var }
            | ArcInstr::DebugValue { var }
            | ArcInstr::FixLifetime { var } => vec![*var],

            ArcInstr::CondFail { cond } => vec![*cond],
        }
    }

    /// Does this instruction read `var`?
    pub fn uses_var(&self, var: ArcVarId) -> bool {
        self.used_vars().contains(&var)
    }

    /// The operand of a retain, if this is one.
    pub fn retained_var(&self) -> Option<ArcVarId> {
        match self {
            ArcInstr::RcInc { var, .. } => Some(*var),
            _ => None,
        }
    }

    /// The operand of a release, if this is one.
    pub fn released_var(&self) -> Option<ArcVarId> {
        match self {
            ArcInstr::RcDec { var } => Some(*var),
            _ => None,
        }
    }
}

// Terminators

/// The kind of function exit a block represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExitKind {
    /// Normal return.
    Return,
    /// Error exit.
    Throw,
}

/// Block terminator: how control leaves a basic block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArcTerminator {
    /// Return a value from the function.
    Return { value: ArcVarId },

    /// Leave the function through its error exit.
    Throw { value: ArcVarId },

    /// Unconditional jump to a target block, passing arguments.
    Jump {
        target: ArcBlockId,
        args: Vec<ArcVarId>,
    },

    /// Conditional branch on a boolean.
    Branch {
        cond: ArcVarId,
        then_block: ArcBlockId,
        else_block: ArcBlockId,
    },

    /// Multi-way branch on an integer discriminant.
    Switch {
        scrutinee: ArcVarId,
        cases: Vec<(u64, ArcBlockId)>,
        default: ArcBlockId,
    },

    /// Call that may throw. On success, `dst` is defined at the entry of
    /// `normal`; on error, control transfers to `error`.
    TryApply {
        dst: ArcVarId,
        ty: Idx,
        func: Name,
        args: Vec<ArcArg>,
        effects: CallEffects,
        normal: ArcBlockId,
        error: ArcBlockId,
    },

    /// Marks a block as unreachable (after a trap or exhaustive match).
    Unreachable,
}

impl ArcTerminator {
    /// Returns all variables read (used) by this terminator.
    pub fn used_vars(&self) -> Vec<ArcVarId> {
        match self {
            ArcTerminator::Return { value } | ArcTerminator::Throw { value } => vec![*value],
            ArcTerminator::Jump { args, .. } => args.clone(),
            ArcTerminator::TryApply { args, .. } => args.iter().map(|a| a.var).collect(),
            ArcTerminator::Branch { cond, .. } => vec![*cond],
            ArcTerminator::Switch { scrutinee, .. } => vec![*scrutinee],
            ArcTerminator::Unreachable => vec![],
        }
    }

    /// Which function exit this terminator is, if any.
    pub fn exit_kind(&self) -> Option<ExitKind> {
        match self {
            ArcTerminator::Return { .. } => Some(ExitKind::Return),
            ArcTerminator::Throw { .. } => Some(ExitKind::Throw),
            _ => None,
        }
    }
}

/// A borrowed view of either a body instruction or a terminator.
///
/// The effect predicates take this so that terminators are classified by
/// the same rules as body instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstrView<'a> {
    Instr(&'a ArcInstr),
    Terminator(&'a ArcTerminator),
}

impl InstrView<'_> {
    /// Variables read by the underlying instruction.
    pub fn used_vars(self) -> Vec<ArcVarId> {
        match self {
            InstrView::Instr(instr) => instr.used_vars(),
            InstrView::Terminator(term) => term.used_vars(),
        }
    }

    /// Variable defined by a body instruction. Terminators define nothing
    /// in their own block.
    pub fn defined_var(self) -> Option<ArcVarId> {
        match self {
            InstrView::Instr(instr) => instr.defined_var(),
            InstrView::Terminator(_) => None,
        }
    }

    /// Does this instruction read `var`?
    pub fn uses_var(self, var: ArcVarId) -> bool {
        self.used_vars().contains(&var)
    }
}

impl<'a> From<&'a ArcInstr> for InstrView<'a> {
    fn from(instr: &'a ArcInstr) -> Self {
        InstrView::Instr(instr)
    }
}

impl<'a> From<&'a ArcTerminator> for InstrView<'a> {
    fn from(term: &'a ArcTerminator) -> Self {
        InstrView::Terminator(term)
    }
}

// Blocks

/// A basic block in the ARC IR.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArcBlock {
    /// This block's identifier.
    pub id: ArcBlockId,
    /// Block parameters: values passed from predecessor blocks via `Jump`.
    pub params: Vec<(ArcVarId, Idx)>,
    /// Sequential instructions executed in order.
    pub body: Vec<ArcInstr>,
    /// How control leaves this block.
    pub terminator: ArcTerminator,
}

impl ArcBlock {
    /// Number of instructions including the terminator.
    #[inline]
    pub fn instr_count(&self) -> usize {
        self.body.len() + 1
    }

    /// The instruction at `pos`, where `body.len()` is the terminator.
    pub fn instr_at(&self, pos: usize) -> Option<InstrView<'_>> {
        match pos.cmp(&self.body.len()) {
            std::cmp::Ordering::Less => Some(InstrView::Instr(&self.body[pos])),
            std::cmp::Ordering::Equal => Some(InstrView::Terminator(&self.terminator)),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Reference to this block's terminator.
    pub fn terminator_ref(&self) -> InstrRef {
        InstrRef::new(self.id, position(self.body.len()))
    }

    /// Reference to this block's first instruction (the terminator for an
    /// empty body).
    pub fn first_ref(&self) -> InstrRef {
        InstrRef::new(self.id, 0)
    }

    /// Is `var` one of this block's parameters?
    pub fn has_param(&self, var: ArcVarId) -> bool {
        self.params.iter().any(|&(p, _)| p == var)
    }
}

/// Convert a body position to the `u32` stored in [`InstrRef`].
pub(crate) fn position(pos: usize) -> u32 {
    u32::try_from(pos).unwrap_or(u32::MAX)
}

// Functions

/// A complete function in the ARC IR.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArcFunction {
    /// The function's mangled name. Calls to this name are self-recursive.
    pub name: Name,
    /// Function parameters with ownership conventions.
    pub params: Vec<ArcParam>,
    /// The return type.
    pub return_type: Idx,
    /// Basic blocks in definition order. `blocks[entry.index()]` is the entry.
    pub blocks: Vec<ArcBlock>,
    /// The entry block ID.
    pub entry: ArcBlockId,
    /// Type of each variable, indexed by `ArcVarId::index()`.
    pub var_types: Vec<Idx>,
}

impl ArcFunction {
    /// Look up the type of a variable. Out-of-range variables read as
    /// [`Idx::NONE`].
    #[inline]
    pub fn var_type(&self, var: ArcVarId) -> Idx {
        debug_assert!(
            var.index() < self.var_types.len(),
            "ArcVarId {} out of bounds (have {} vars)",
            var.raw(),
            self.var_types.len(),
        );
        self.var_types.get(var.index()).copied().unwrap_or(Idx::NONE)
    }

    /// Look up a block.
    #[inline]
    pub fn block(&self, id: ArcBlockId) -> &ArcBlock {
        &self.blocks[id.index()]
    }

    /// Resolve an instruction reference.
    pub fn instr(&self, r: InstrRef) -> Option<InstrView<'_>> {
        self.blocks.get(r.block.index())?.instr_at(r.index())
    }

    /// The function parameter bound to `var`, if any.
    pub fn param(&self, var: ArcVarId) -> Option<&ArcParam> {
        self.params.iter().find(|p| p.var == var)
    }

    /// Is `callee` this function?
    #[inline]
    pub fn is_self_call(&self, callee: Name) -> bool {
        callee == self.name
    }
}
