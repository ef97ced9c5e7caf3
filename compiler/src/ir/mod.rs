//! Mid-level Intermediate Representation (MIR) for the Kestrel compiler
//!
//! This module defines the SSA-like intermediate representation that sits
//! between the high-level HIR and later code generation stages. The MIR is
//! designed to be:
//! - Simple and explicit (no implicit operations)
//! - Deterministic: value names, block labels, and print order are stable
//!   within a compilation
//! - Easy to optimize and transform
//! - The single input read by the memory-safety analyses

pub mod blocks;
pub mod dump;
pub mod functions;
pub mod hir; // High-level IR consumed by lowering (close to source syntax)
pub mod hir_to_mir; // HIR to MIR lowering
pub mod instructions;
pub mod modules;
pub mod optimization;
pub mod tree_shake; // Module-level reachable-function pruning
pub mod validation;
pub mod values;

pub use blocks::*;
pub use dump::{dump_block, dump_function, dump_instruction, dump_module, dump_value};
pub use functions::*;
pub use instructions::*;
pub use modules::*;
pub use values::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// IR version for compatibility checking
pub const IR_VERSION: u32 = 1;

/// Errors raised by structural operations on the MIR model itself.
///
/// These are the only fallible operations in the data model; everything else
/// is append-only construction. Analysis findings are reported through
/// [`crate::diagnostics::Diagnostic`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrError {
    /// An instruction was appended to a block that already ends in a
    /// terminator.
    BlockTerminated { block: String },

    /// A block label was defined twice within one function.
    DuplicateBlock { block: String },

    /// A lookup referenced a block label that does not exist.
    UnknownBlock { block: String },
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrError::BlockTerminated { block } => {
                write!(f, "block '{}' already ends in a terminator", block)
            }
            IrError::DuplicateBlock { block } => {
                write!(f, "block '{}' is defined more than once", block)
            }
            IrError::UnknownBlock { block } => {
                write!(f, "block '{}' does not exist", block)
            }
        }
    }
}

impl std::error::Error for IrError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ir_error_display() {
        let err = IrError::BlockTerminated {
            block: "entry_0".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "block 'entry_0' already ends in a terminator"
        );
    }
}
