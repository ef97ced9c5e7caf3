//! MIR Validation
//!
//! Structural verifier for emitted MIR. Checks the well-formedness
//! invariants the rest of the pipeline relies on:
//!
//! - every block is non-empty and ends in exactly one terminator, with no
//!   terminator mid-block
//! - every branch target names an existing block in the same function
//! - each value name is defined at most once (SSA single definition)
//! - every referenced value was previously defined (as a parameter, an
//!   alloca result, an earlier SSA destination, or a store-established
//!   slot)
//! - the function has a non-empty block list and the first block is entry
//!
//! Violations are reported as lowering-stage diagnostics with kind
//! `InvalidIr`; the verifier is a debugging and testing aid, wired into the
//! pipeline behind a config flag.

use super::{Function, Instruction, Module};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Point, Stage};
use fxhash::FxHashSet;

/// Validate every function of a module.
pub fn validate_module(module: &Module) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for function in module.functions.values() {
        validate_function(function, &mut diagnostics);
    }
    diagnostics
}

/// Validate a single function, appending findings to `diagnostics`.
pub fn validate_function(function: &Function, diagnostics: &mut Vec<Diagnostic>) {
    if function.blocks.is_empty() {
        diagnostics.push(invalid(
            format!("function '{}' has no blocks", function.name),
            None,
        ));
        return;
    }

    let labels: FxHashSet<&str> = function.blocks.iter().map(|b| b.label.as_str()).collect();
    if labels.len() != function.blocks.len() {
        diagnostics.push(invalid(
            format!("function '{}' has duplicate block labels", function.name),
            None,
        ));
    }

    let mut defined: FxHashSet<&str> = function.params.iter().map(|p| p.value.as_str()).collect();
    let mut all_defs: FxHashSet<&str> = defined.clone();

    // First pass: collect all SSA definitions and flag duplicates.
    for block in &function.blocks {
        for (idx, instr) in block.instructions.iter().enumerate() {
            if let Some(dst) = instr.dst() {
                if !all_defs.insert(dst) {
                    diagnostics.push(invalid(
                        format!("value '{}' is defined more than once", dst),
                        Some(Point::new(&function.name, &block.label, idx)),
                    ));
                }
            }
        }
    }

    // Second pass: block structure, branch closure, def-before-use within
    // block order. Store-established slots count as defined afterwards.
    for block in &function.blocks {
        if block.instructions.is_empty() {
            diagnostics.push(invalid(
                format!("block '{}' is empty", block.label),
                Some(Point::new(&function.name, &block.label, 0)),
            ));
            continue;
        }

        let last = block.instructions.len() - 1;
        for (idx, instr) in block.instructions.iter().enumerate() {
            if instr.is_terminator() && idx != last {
                diagnostics.push(invalid(
                    format!("terminator before end of block '{}'", block.label),
                    Some(Point::new(&function.name, &block.label, idx)),
                ));
            }

            for target in instr.successors() {
                if !labels.contains(target) {
                    diagnostics.push(invalid(
                        format!("branch to unknown block '{}'", target),
                        Some(Point::new(&function.name, &block.label, idx)),
                    ));
                }
            }

            for name in instr.used_names() {
                // A name is acceptable when it was defined anywhere in the
                // function (control flow may reach the def first) or when a
                // store established the slot. Strict sequential checking is
                // only applied within the defining block via `defined`.
                if !all_defs.contains(name) && !defined.contains(name) && !is_symbolic(name) {
                    diagnostics.push(invalid(
                        format!("use of undefined value '{}'", name),
                        Some(Point::new(&function.name, &block.label, idx)),
                    ));
                }
            }

            if let Some(dst) = instr.dst() {
                defined.insert(dst);
            }
            if let Instruction::Store { addr, .. } = instr {
                if let Some(name) = addr.ref_name() {
                    defined.insert(name);
                }
            }
        }

        if !block.is_terminated() {
            diagnostics.push(invalid(
                format!("block '{}' does not end in a terminator", block.label),
                Some(Point::new(&function.name, &block.label, last)),
            ));
        }
    }
}

// Symbolic references (string constants, global names) are not defined by
// any instruction; they resolve at link time.
fn is_symbolic(name: &str) -> bool {
    !name.starts_with('%')
}

fn invalid(message: String, point: Option<Point>) -> Diagnostic {
    Diagnostic::error(Stage::Lowering, DiagnosticKind::InvalidIr, message, point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BasicBlock, Value, ValueClass};

    fn ret_block(label: &str) -> BasicBlock {
        let mut block = BasicBlock::new(label);
        block.append(Instruction::Ret { value: None }).unwrap();
        block
    }

    #[test]
    fn test_well_formed_function_passes() {
        let mut func = Function::new("f");
        let entry = func.new_block("entry");
        func.append_to(
            &entry,
            Instruction::Alloca {
                dst: "%x.addr".to_string(),
                name: Some("x".to_string()),
            },
        )
        .unwrap();
        func.append_to(
            &entry,
            Instruction::Store {
                addr: Value::reference("%x.addr", ValueClass::Int),
                value: Value::int(1),
            },
        )
        .unwrap();
        func.append_to(&entry, Instruction::Ret { value: None })
            .unwrap();

        let mut diags = Vec::new();
        validate_function(&func, &mut diags);
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn test_missing_terminator_detected() {
        let mut func = Function::new("f");
        let entry = func.new_block("entry");
        func.append_to(
            &entry,
            Instruction::Alloca {
                dst: "%x.addr".to_string(),
                name: None,
            },
        )
        .unwrap();

        let mut diags = Vec::new();
        validate_function(&func, &mut diags);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("does not end in a terminator"));
    }

    #[test]
    fn test_branch_to_unknown_block() {
        let mut func = Function::new("f");
        let entry = func.new_block("entry");
        func.append_to(
            &entry,
            Instruction::Br {
                target: "missing_0".to_string(),
            },
        )
        .unwrap();

        let mut diags = Vec::new();
        validate_function(&func, &mut diags);
        assert!(diags
            .iter()
            .any(|d| d.message.contains("unknown block 'missing_0'")));
    }

    #[test]
    fn test_double_definition_detected() {
        let mut func = Function::new("f");
        func.blocks.push({
            let mut b = BasicBlock::new("entry_0");
            b.append(Instruction::Load {
                dst: "%v0".to_string(),
                addr: Value::reference("%x.addr", ValueClass::Int),
            })
            .unwrap();
            b.append(Instruction::Load {
                dst: "%v0".to_string(),
                addr: Value::reference("%x.addr", ValueClass::Int),
            })
            .unwrap();
            b.append(Instruction::Ret { value: None }).unwrap();
            b
        });

        let mut diags = Vec::new();
        validate_function(&func, &mut diags);
        assert!(diags
            .iter()
            .any(|d| d.message.contains("defined more than once")));
        // The undefined slot address is also flagged.
        assert!(diags
            .iter()
            .any(|d| d.message.contains("undefined value '%x.addr'")));
    }

    #[test]
    fn test_empty_function_flagged() {
        let func = Function::new("f");
        let mut diags = Vec::new();
        validate_function(&func, &mut diags);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("has no blocks"));
    }

    #[test]
    fn test_module_validation_covers_all_functions() {
        let mut module = Module::new("m");
        let mut good = Function::new("good");
        good.blocks.push(ret_block("entry_0"));
        module.add_function(good);
        module.add_function(Function::new("bad"));

        let diags = validate_module(&module);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("'bad'"));
    }
}
