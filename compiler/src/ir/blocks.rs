//! MIR Basic Blocks
//!
//! A basic block is a labeled, ordered sequence of instructions whose last
//! instruction is the block's single terminator. All non-terminator
//! instructions precede the terminator; appending past a terminator is a
//! structural error.

use super::{Instruction, IrError};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A basic block in a MIR function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    /// Unique label within the owning function (e.g. `entry_0`,
    /// `while_header_1`)
    pub label: String,

    /// Instructions in execution order; the terminator, when present, is
    /// the last element
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// Create a new, empty basic block.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            instructions: Vec::new(),
        }
    }

    /// Append an instruction. Fails if the block already ends in a
    /// terminator.
    pub fn append(&mut self, instr: Instruction) -> Result<(), IrError> {
        if self.is_terminated() {
            return Err(IrError::BlockTerminated {
                block: self.label.clone(),
            });
        }
        self.instructions.push(instr);
        Ok(())
    }

    /// The block's terminator, if it has one.
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    /// Whether the block ends in a terminator.
    pub fn is_terminated(&self) -> bool {
        self.terminator().is_some()
    }

    /// Labels of successor blocks, derived from the terminator.
    pub fn successors(&self) -> SmallVec<[&str; 2]> {
        self.terminator()
            .map(|t| t.successors())
            .unwrap_or_default()
    }

    /// Remove and return the terminator. Used by block merging when a
    /// block's trailing `br` is replaced by the merged successor's body.
    pub fn take_terminator(&mut self) -> Option<Instruction> {
        if self.is_terminated() {
            self.instructions.pop()
        } else {
            None
        }
    }
}
