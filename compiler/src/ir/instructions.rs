//! MIR Instructions
//!
//! Defines the instruction set for the mid-level IR. Instructions are
//! SSA-style: each destination name is defined at most once within its
//! function. Terminators (`ret`, `br`, `brcond`) end a basic block and may
//! only appear as the last instruction of a block.

use super::{Value, ValueClass};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Binary arithmetic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
        }
    }
}

/// Comparison predicates. Comparisons produce 0/1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpPredicate {
    Eq,
    Ne,
    // Signed integer comparisons
    Slt,
    Sle,
    Sgt,
    Sge,
    // Unsigned integer comparisons
    Ult,
    Ule,
    Ugt,
    Uge,
    // Floating point comparisons
    Flt,
    Fle,
    Fgt,
    Fge,
}

impl CmpPredicate {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            CmpPredicate::Eq => "eq",
            CmpPredicate::Ne => "ne",
            CmpPredicate::Slt => "slt",
            CmpPredicate::Sle => "sle",
            CmpPredicate::Sgt => "sgt",
            CmpPredicate::Sge => "sge",
            CmpPredicate::Ult => "ult",
            CmpPredicate::Ule => "ule",
            CmpPredicate::Ugt => "ugt",
            CmpPredicate::Uge => "uge",
            CmpPredicate::Flt => "flt",
            CmpPredicate::Fle => "fle",
            CmpPredicate::Fgt => "fgt",
            CmpPredicate::Fge => "fge",
        }
    }
}

/// Callee of a call instruction: direct (named) or indirect (value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    /// Direct call to a function known by name
    Named(String),
    /// Indirect call through a computed value
    Value(Value),
}

/// MIR instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// Allocate a local slot; `dst` is the address value.
    Alloca { dst: String, name: Option<String> },

    /// Read the value at `addr`.
    Load { dst: String, addr: Value },

    /// Write `value` to `addr`.
    Store { addr: Value, value: Value },

    /// Binary arithmetic.
    BinOp {
        dst: String,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },

    /// Comparison producing 0/1.
    Cmp {
        dst: String,
        pred: CmpPredicate,
        lhs: Value,
        rhs: Value,
    },

    /// Direct or indirect function call. `arg_classes` and `ret_class` are
    /// optional lowering-hint annotations carried through to the text form.
    Call {
        dst: Option<String>,
        callee: Callee,
        args: Vec<Value>,
        arg_classes: Vec<ValueClass>,
        ret_class: Option<ValueClass>,
    },

    /// Terminator: return an optional value.
    Ret { value: Option<Value> },

    /// Terminator: unconditional jump.
    Br { target: String },

    /// Terminator: branch on zero/nonzero.
    CondBr {
        cond: Value,
        true_target: String,
        false_target: String,
    },
}

impl Instruction {
    /// The destination name, if this instruction defines a value.
    pub fn dst(&self) -> Option<&str> {
        match self {
            Instruction::Alloca { dst, .. }
            | Instruction::Load { dst, .. }
            | Instruction::BinOp { dst, .. }
            | Instruction::Cmp { dst, .. } => Some(dst.as_str()),
            Instruction::Call { dst, .. } => dst.as_deref(),
            _ => None,
        }
    }

    /// All value operands read by this instruction, in operand order.
    pub fn operands(&self) -> SmallVec<[&Value; 2]> {
        let mut ops: SmallVec<[&Value; 2]> = SmallVec::new();
        match self {
            Instruction::Load { addr, .. } => ops.push(addr),
            Instruction::Store { addr, value } => {
                ops.push(addr);
                ops.push(value);
            }
            Instruction::BinOp { lhs, rhs, .. } | Instruction::Cmp { lhs, rhs, .. } => {
                ops.push(lhs);
                ops.push(rhs);
            }
            Instruction::Call { callee, args, .. } => {
                if let Callee::Value(v) = callee {
                    ops.push(v);
                }
                ops.extend(args.iter());
            }
            Instruction::Ret { value } => {
                if let Some(v) = value {
                    ops.push(v);
                }
            }
            Instruction::CondBr { cond, .. } => ops.push(cond),
            Instruction::Alloca { .. } | Instruction::Br { .. } => {}
        }
        ops
    }

    /// Names of all referenced values read by this instruction.
    pub fn used_names(&self) -> SmallVec<[&str; 2]> {
        self.operands()
            .into_iter()
            .filter_map(|v| v.ref_name())
            .collect()
    }

    /// Check if this is a terminator instruction.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Ret { .. } | Instruction::Br { .. } | Instruction::CondBr { .. }
        )
    }

    /// Check if this instruction has observable side effects. Side-effecting
    /// instructions are never removed by dead-code elimination. Calls are
    /// conservatively treated as side-effecting: no purity information is
    /// carried at this level.
    pub fn has_side_effects(&self) -> bool {
        matches!(self, Instruction::Store { .. } | Instruction::Call { .. })
    }

    /// Successor block labels, if this is a branching terminator.
    pub fn successors(&self) -> SmallVec<[&str; 2]> {
        let mut succs: SmallVec<[&str; 2]> = SmallVec::new();
        match self {
            Instruction::Br { target } => succs.push(target.as_str()),
            Instruction::CondBr {
                true_target,
                false_target,
                ..
            } => {
                succs.push(true_target.as_str());
                succs.push(false_target.as_str());
            }
            _ => {}
        }
        succs
    }

    /// Rewrite branch targets equal to `from` into `to`. Used by block
    /// merging, which must keep every label reference consistent.
    pub fn rewrite_target(&mut self, from: &str, to: &str) {
        match self {
            Instruction::Br { target } => {
                if target == from {
                    *target = to.to_string();
                }
            }
            Instruction::CondBr {
                true_target,
                false_target,
                ..
            } => {
                if true_target == from {
                    *true_target = to.to_string();
                }
                if false_target == from {
                    *false_target = to.to_string();
                }
            }
            _ => {}
        }
    }
}
