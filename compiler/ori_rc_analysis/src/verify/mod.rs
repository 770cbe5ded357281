//! Structural well-formedness checks.
//!
//! The analyses index blocks and variables directly and follow `Jump`
//! arguments into block parameters, so they rely on a few structural
//! properties. [`verify_function`] reports every violation it finds.
//! Problems never abort anything: the epilogue matchers treat a function
//! with problems as unmatched.

use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::graph::successor_block_ids;
use crate::ir::{ArcBlockId, ArcFunction, ArcTerminator, ArcVarId, InstrView};

/// A structural problem in an [`ArcFunction`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IrProblem {
    #[error("function has no blocks")]
    NoBlocks,

    #[error("entry block {0:?} does not exist")]
    MissingEntry(ArcBlockId),

    #[error("block at position {position} carries id {id:?}")]
    BlockIdMismatch { position: usize, id: ArcBlockId },

    #[error("block {block:?} branches to missing block {target:?}")]
    UnknownSuccessor {
        block: ArcBlockId,
        target: ArcBlockId,
    },

    #[error("jump from {block:?} passes {found} arguments to {target:?}, which takes {expected}")]
    JumpArity {
        block: ArcBlockId,
        target: ArcBlockId,
        expected: usize,
        found: usize,
    },

    #[error("variable {var:?} has no type (function has {num_vars} variables)")]
    VarOutOfRange { var: ArcVarId, num_vars: usize },

    #[error("variable {0:?} is defined more than once")]
    DuplicateDefinition(ArcVarId),

    #[error("variable {var:?} is used in {block:?} but never defined")]
    UndefinedVar { var: ArcVarId, block: ArcBlockId },
}

/// Check the structural properties the analyses rely on.
///
/// Returns an empty vector for a well-formed function.
pub fn verify_function(func: &ArcFunction) -> Vec<IrProblem> {
    let mut problems = Vec::new();

    if func.blocks.is_empty() {
        problems.push(IrProblem::NoBlocks);
        return problems;
    }
    if func.entry.index() >= func.blocks.len() {
        problems.push(IrProblem::MissingEntry(func.entry));
    }

    let num_vars = func.var_types.len();
    let mut defined = FxHashSet::default();
    let mut define = |var: ArcVarId, problems: &mut Vec<IrProblem>| {
        if var.index() >= num_vars {
            problems.push(IrProblem::VarOutOfRange { var, num_vars });
        }
        if !defined.insert(var) {
            problems.push(IrProblem::DuplicateDefinition(var));
        }
    };

    for param in &func.params {
        define(param.var, &mut problems);
    }
    for (position, block) in func.blocks.iter().enumerate() {
        if block.id.index() != position {
            problems.push(IrProblem::BlockIdMismatch {
                position,
                id: block.id,
            });
        }
        for &(var, _) in &block.params {
            define(var, &mut problems);
        }
        for instr in &block.body {
            if let Some(dst) = instr.defined_var() {
                define(dst, &mut problems);
            }
        }
        if let ArcTerminator::TryApply { dst, .. } = &block.terminator {
            define(*dst, &mut problems);
        }
    }

    for block in &func.blocks {
        check_edges(func, block.id, &block.terminator, &mut problems);

        let views = block
            .body
            .iter()
            .map(InstrView::Instr)
            .chain(std::iter::once(InstrView::Terminator(&block.terminator)));
        for view in views {
            for var in view.used_vars() {
                if !defined.contains(&var) {
                    problems.push(IrProblem::UndefinedVar {
                        var,
                        block: block.id,
                    });
                }
            }
        }
    }

    if !problems.is_empty() {
        tracing::debug!(
            function = func.name.raw(),
            problems = problems.len(),
            "ARC IR failed verification"
        );
    }
    problems
}

fn check_edges(
    func: &ArcFunction,
    block: ArcBlockId,
    terminator: &ArcTerminator,
    problems: &mut Vec<IrProblem>,
) {
    for target in successor_block_ids(terminator) {
        let Some(target_block) = func.blocks.get(target.index()) else {
            problems.push(IrProblem::UnknownSuccessor { block, target });
            continue;
        };
        if let ArcTerminator::Jump { args, .. } = terminator {
            if args.len() != target_block.params.len() {
                problems.push(IrProblem::JumpArity {
                    block,
                    target,
                    expected: target_block.params.len(),
                    found: args.len(),
                });
            }
        }
    }
}
