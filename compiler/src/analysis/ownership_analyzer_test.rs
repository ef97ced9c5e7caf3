//! Ownership engine tests over hand-built MIR
//!
//! These cover the state machine transitions, the conservative call-moves
//! policy, the copy/move decision, drop ordering at function exit, and the
//! use-after-move/drop diagnostics.

use super::lifetime_analyzer::LifetimeEngine;
use super::ownership_analyzer::{
    MoveContext, MoveKind, OwnershipEngine, OwnershipState, TraitFlags,
};
use crate::diagnostics::{DiagnosticKind, Point};
use crate::ir::{Callee, Function, Instruction, Value, ValueClass};

fn slot(name: &str) -> Value {
    Value::reference(name, ValueClass::Int)
}

fn engines() -> (OwnershipEngine, LifetimeEngine) {
    crate::logging::init_test();
    (OwnershipEngine::new(), LifetimeEngine::new())
}

fn call(callee: &str, args: Vec<Value>) -> Instruction {
    Instruction::Call {
        dst: None,
        callee: Callee::Named(callee.to_string()),
        args,
        arg_classes: vec![],
        ret_class: None,
    }
}

#[test]
fn test_use_after_move_from_call() {
    // %x.addr = alloca x; call f(%x.addr); %v0 = load %x.addr
    // The call moves the owned slot; the load reports exactly one
    // use-after-move at its point.
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    for instr in [
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
        call("f", vec![slot("%x.addr")]),
        Instruction::Load {
            dst: "%v0".to_string(),
            addr: slot("%x.addr"),
        },
        Instruction::Ret { value: None },
    ] {
        func.append_to(&entry, instr).unwrap();
    }

    let (mut ownership, lifetimes) = engines();
    ownership.check_function(&func, &lifetimes);

    let errors = ownership.get_errors();
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].kind, DiagnosticKind::UseAfterMove);
    assert_eq!(errors[0].point, Some(Point::new("g", "entry_0", 2)));

    // The move was recorded with kind Call.
    assert!(ownership
        .move_records()
        .any(|m| m.kind == MoveKind::Call && m.from == "%x.addr"));
}

#[test]
fn test_copy_argument_is_not_moved() {
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    for instr in [
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
        call("f", vec![slot("%x.addr")]),
        Instruction::Load {
            dst: "%v0".to_string(),
            addr: slot("%x.addr"),
        },
        Instruction::Ret { value: None },
    ] {
        func.append_to(&entry, instr).unwrap();
    }

    let (mut ownership, lifetimes) = engines();
    ownership.mark_copy("%x.addr");
    ownership.check_function(&func, &lifetimes);

    assert!(ownership.get_errors().is_empty(), "{:?}", ownership.get_errors());
    assert_eq!(ownership.state("%x.addr"), Some(OwnershipState::Dropped));
}

#[test]
fn test_move_policy_contexts() {
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    func.append_to(
        &entry,
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
    )
    .unwrap();
    func.append_to(&entry, Instruction::Ret { value: None })
        .unwrap();

    let (mut ownership, lifetimes) = engines();
    ownership.mark_copy("%x.addr");
    ownership.check_function(&func, &lifetimes);

    assert!(ownership.can_copy("%x.addr"));
    // Copy values are copied for assignments and call arguments but still
    // moved for returns and explicit moves.
    assert!(!ownership.should_move("%x.addr", MoveContext::Assignment));
    assert!(!ownership.should_move("%x.addr", MoveContext::CallArg));
    assert!(ownership.should_move("%x.addr", MoveContext::Return));
    assert!(ownership.should_move("%x.addr", MoveContext::ExplicitMove));
    // Untracked values default to moving everywhere.
    assert!(ownership.should_move("%unknown", MoveContext::CallArg));
}

#[test]
fn test_store_to_moved_slot() {
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    for instr in [
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
        call("f", vec![slot("%x.addr")]),
        Instruction::Store {
            addr: slot("%x.addr"),
            value: Value::int(1),
        },
        Instruction::Ret { value: None },
    ] {
        func.append_to(&entry, instr).unwrap();
    }

    let (mut ownership, lifetimes) = engines();
    ownership.check_function(&func, &lifetimes);

    let errors = ownership.get_errors();
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].kind, DiagnosticKind::StoreToMoved);
    // The store re-initializes the slot, so the scope-exit drop is clean.
    assert_eq!(ownership.state("%x.addr"), Some(OwnershipState::Dropped));
}

#[test]
fn test_alloca_defaults() {
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    func.append_to(
        &entry,
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
    )
    .unwrap();
    func.append_to(&entry, Instruction::Ret { value: None })
        .unwrap();

    let (mut ownership, lifetimes) = engines();
    ownership.check_function(&func, &lifetimes);

    // Default traits: Clone+Drop+Send+Unpin+Sized, not Copy, not Sync.
    let record = ownership
        .move_records()
        .find(|m| m.kind == MoveKind::Drop)
        .and_then(|m| m.ownership)
        .and_then(|id| ownership.ownership(id))
        .expect("drop recorded against the alloca's ownership record");
    assert_eq!(
        record.traits,
        TraitFlags {
            copy: false,
            clone: true,
            drop: true,
            send: true,
            sync: false,
            unpin: true,
            sized: true,
        }
    );
}

#[test]
fn test_scope_exit_drops_in_reverse_order() {
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    for instr in [
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
        Instruction::Alloca {
            dst: "%y.addr".to_string(),
            name: Some("y".to_string()),
        },
        Instruction::Ret { value: None },
    ] {
        func.append_to(&entry, instr).unwrap();
    }

    let (mut ownership, lifetimes) = engines();
    ownership.check_function(&func, &lifetimes);

    assert!(ownership.get_errors().is_empty());
    let drops: Vec<&str> = ownership
        .move_records()
        .filter(|m| m.kind == MoveKind::Drop)
        .map(|m| m.from.as_str())
        .collect();
    assert_eq!(drops, vec!["%y.addr", "%x.addr"]);
    assert_eq!(ownership.stats.drops_recorded, 2);
}

#[test]
fn test_moved_slot_is_not_dropped_at_exit() {
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    for instr in [
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
        call("f", vec![slot("%x.addr")]),
        Instruction::Ret { value: None },
    ] {
        func.append_to(&entry, instr).unwrap();
    }

    let (mut ownership, lifetimes) = engines();
    ownership.check_function(&func, &lifetimes);

    assert!(ownership.get_errors().is_empty(), "{:?}", ownership.get_errors());
    assert_eq!(ownership.state("%x.addr"), Some(OwnershipState::Moved));
    assert!(ownership.move_records().all(|m| m.kind != MoveKind::Drop));
}

#[test]
fn test_double_drop_and_drop_of_moved() {
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    func.append_to(
        &entry,
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
    )
    .unwrap();
    func.append_to(&entry, Instruction::Ret { value: None })
        .unwrap();

    let (mut ownership, lifetimes) = engines();
    // The scope-exit pass drops the slot once.
    ownership.check_function(&func, &lifetimes);
    assert_eq!(ownership.state("%x.addr"), Some(OwnershipState::Dropped));

    // Dropping again is a double drop.
    ownership.create_drop("%x.addr", Point::new("g", "entry_0", 1));
    let errors = ownership.get_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DiagnosticKind::DoubleDrop);

    // Dropping a moved value is its own kind.
    ownership.create_move("%m", None, MoveKind::Explicit, Point::new("g", "entry_0", 0));
    ownership.create_drop("%m", Point::new("g", "entry_0", 1));
    let errors = ownership.get_errors();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[1].kind, DiagnosticKind::DropOfMoved);
}

#[test]
fn test_explicit_move_transitions_both_sides() {
    let (mut ownership, _) = engines();
    let point = Point::new("g", "entry_0", 0);
    ownership.create_move("%a", Some("%b".to_string()), MoveKind::Explicit, point);

    assert_eq!(ownership.state("%a"), Some(OwnershipState::Moved));
    assert_eq!(ownership.state("%b"), Some(OwnershipState::Owned));
    assert_eq!(ownership.stats.moves_recorded, 1);
}

#[test]
fn test_return_moves_owned_value() {
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    for instr in [
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
        Instruction::Load {
            dst: "%v0".to_string(),
            addr: slot("%x.addr"),
        },
        Instruction::Ret {
            value: Some(slot("%v0")),
        },
    ] {
        func.append_to(&entry, instr).unwrap();
    }

    let (mut ownership, lifetimes) = engines();
    ownership.check_function(&func, &lifetimes);

    assert!(ownership.get_errors().is_empty());
    assert!(ownership
        .move_records()
        .any(|m| m.kind == MoveKind::Return && m.from == "%v0"));
}

#[test]
fn test_binop_rejects_moved_operand() {
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    for instr in [
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
        call("f", vec![slot("%x.addr")]),
        Instruction::BinOp {
            dst: "%v0".to_string(),
            op: crate::ir::BinaryOp::Add,
            lhs: slot("%x.addr"),
            rhs: Value::int(1),
        },
        Instruction::Ret { value: None },
    ] {
        func.append_to(&entry, instr).unwrap();
    }

    let (mut ownership, lifetimes) = engines();
    ownership.check_function(&func, &lifetimes);

    let errors = ownership.get_errors();
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].kind, DiagnosticKind::UseAfterMove);
}

#[test]
fn test_store_of_moved_source() {
    // store %y.addr, %v0 where %v0 was already moved.
    let mut func = Function::new("g");
    let entry = func.new_block("entry");
    for instr in [
        Instruction::Alloca {
            dst: "%x.addr".to_string(),
            name: Some("x".to_string()),
        },
        Instruction::Alloca {
            dst: "%y.addr".to_string(),
            name: Some("y".to_string()),
        },
        Instruction::Load {
            dst: "%v0".to_string(),
            addr: slot("%x.addr"),
        },
        // First store moves %v0 into %x... then a second store reuses it.
        Instruction::Store {
            addr: slot("%y.addr"),
            value: slot("%v0"),
        },
        Instruction::Store {
            addr: slot("%y.addr"),
            value: slot("%v0"),
        },
        Instruction::Ret { value: None },
    ] {
        func.append_to(&entry, instr).unwrap();
    }

    let (mut ownership, lifetimes) = engines();
    ownership.check_function(&func, &lifetimes);

    let errors = ownership.get_errors();
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].kind, DiagnosticKind::UseAfterMove);
    assert_eq!(errors[0].point, Some(Point::new("g", "entry_0", 4)));
}

#[test]
fn test_clear_errors() {
    let (mut ownership, _) = engines();
    ownership.create_move("%a", None, MoveKind::Explicit, Point::new("g", "entry_0", 0));
    ownership.create_drop("%a", Point::new("g", "entry_0", 1));
    assert_eq!(ownership.get_errors().len(), 1);
    ownership.clear_errors();
    assert!(ownership.get_errors().is_empty());
}
