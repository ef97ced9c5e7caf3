//! MIR Dump Utility
//!
//! Pretty-prints MIR in its stable textual form. The text form is normative
//! for golden tests, so output is purely a function of the model: block
//! order is the function's block list, function order is the module's
//! insertion order.
//!
//! ```text
//! module demo
//!
//! func main() {
//! entry_0:
//!   %x.addr = alloca x
//!   store %x.addr, 10
//!   %v0 = load %x.addr
//!   ret %v0
//! }
//! ```

use super::{Callee, Function, Instruction, Module, Value, ValueClass};
use std::fmt::Write;

/// Dump an entire module to a string.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();
    writeln!(out, "module {}", module.name).unwrap();
    for func in module.functions.values() {
        writeln!(out).unwrap();
        write!(out, "{}", dump_function(func)).unwrap();
    }
    out
}

/// Dump a single function to a string.
pub fn dump_function(func: &Function) -> String {
    let mut out = String::new();
    let params: Vec<&str> = func.params.iter().map(|p| p.value.as_str()).collect();
    writeln!(out, "func {}({}) {{", func.name, params.join(", ")).unwrap();
    for block in &func.blocks {
        write!(out, "{}", dump_block(block)).unwrap();
    }
    writeln!(out, "}}").unwrap();
    out
}

/// Dump a basic block: the label followed by `:` on its own line, then each
/// instruction indented by two spaces.
pub fn dump_block(block: &super::BasicBlock) -> String {
    let mut out = String::new();
    writeln!(out, "{}:", block.label).unwrap();
    for instr in &block.instructions {
        writeln!(out, "  {}", dump_instruction(instr)).unwrap();
    }
    out
}

/// Dump an instruction to a string (without indentation).
pub fn dump_instruction(instr: &Instruction) -> String {
    match instr {
        Instruction::Alloca { dst, name } => match name {
            Some(n) => format!("{} = alloca {}", dst, n),
            None => format!("{} = alloca", dst),
        },
        Instruction::Load { dst, addr } => format!("{} = load {}", dst, addr),
        Instruction::Store { addr, value } => format!("store {}, {}", addr, value),
        Instruction::BinOp { dst, op, lhs, rhs } => {
            format!("{} = {} {}, {}", dst, op.mnemonic(), lhs, rhs)
        }
        Instruction::Cmp {
            dst,
            pred,
            lhs,
            rhs,
        } => format!("{} = cmp.{} {}, {}", dst, pred.mnemonic(), lhs, rhs),
        Instruction::Call {
            dst,
            callee,
            args,
            arg_classes,
            ret_class,
        } => {
            let args_str: Vec<String> = args.iter().map(|a| format!("{}", a)).collect();
            let callee_str = match callee {
                Callee::Named(name) => name.clone(),
                Callee::Value(v) => format!("{}", v),
            };
            let mut s = match dst {
                Some(d) => format!("{} = call {}({})", d, callee_str, args_str.join(", ")),
                None => format!("call {}({})", callee_str, args_str.join(", ")),
            };
            if let Some(annot) = call_annotation(arg_classes, *ret_class) {
                s.push_str(&annot);
            }
            s
        }
        Instruction::Ret { value } => match value {
            Some(v) => format!("ret {}", v),
            None => "ret".to_string(),
        },
        Instruction::Br { target } => format!("br {}", target),
        Instruction::CondBr {
            cond,
            true_target,
            false_target,
        } => format!("brcond {}, {}, {}", cond, true_target, false_target),
    }
}

/// Dump a value operand.
pub fn dump_value(value: &Value) -> String {
    format!("{}", value)
}

// The annotation is only worth printing when it says something: at least
// one argument class or the return class is known.
fn call_annotation(arg_classes: &[ValueClass], ret_class: Option<ValueClass>) -> Option<String> {
    let any_arg = arg_classes.iter().any(|c| *c != ValueClass::Unknown);
    if !any_arg && ret_class.is_none() {
        return None;
    }
    let args: Vec<String> = arg_classes.iter().map(|c| c.to_string()).collect();
    let ret = ret_class.unwrap_or(ValueClass::Unknown);
    Some(format!(" ; args:{} ret:{}", args.join(","), ret))
}
