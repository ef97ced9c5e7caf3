//! Lifetime analysis integration tests
//!
//! Runs inference and solving over MIR produced by the real lowering, and
//! exercises the named-lifetime and constraint APIs end to end.

use super::lifetime_analyzer::{
    ConstraintKind, LifetimeEngine, LifetimeKind, LifetimeOrigin, ScopeId, ScopeKind,
};
use crate::diagnostics::DiagnosticKind;
use crate::ir::hir::*;
use crate::ir::hir_to_mir::HirToMir;

fn lower_one(func: HirFunction) -> crate::ir::Module {
    crate::logging::init_test();
    let mut hir = HirModule::new("m");
    hir.functions.push(func);
    let (module, diags) = HirToMir::new().transform_module(&hir);
    assert!(diags.is_empty(), "{:?}", diags);
    module
}

#[test]
fn test_lowered_function_has_consistent_lifetimes() {
    let module = lower_one(HirFunction {
        name: "sum".to_string(),
        parameters: vec![HirParameter {
            name: "n".to_string(),
            ty: Some(HirType::Primitive("int".to_string())),
        }],
        return_type: Some(HirType::Primitive("int".to_string())),
        body: Some(HirBlock::new(vec![
            HirStatement::Let {
                name: "acc".to_string(),
                ty: None,
                value: Some(HirExpression::int(0)),
            },
            HirStatement::While {
                condition: HirExpression::binary(
                    HirBinaryOp::Gt,
                    HirExpression::var("n"),
                    HirExpression::int(0),
                ),
                body: HirBlock::new(vec![HirStatement::Assign {
                    target: "acc".to_string(),
                    value: HirExpression::binary(
                        HirBinaryOp::Add,
                        HirExpression::var("acc"),
                        HirExpression::var("n"),
                    ),
                }]),
            },
            HirStatement::Return(Some(HirExpression::var("acc"))),
        ])),
    });

    let mut engine = LifetimeEngine::new();
    for function in module.functions.values() {
        engine.infer(function);
    }
    engine.solve();

    // Every slot-outlives-temp constraint holds: slots live at the
    // function scope, temps in block scopes underneath it.
    assert!(engine.get_errors().is_empty(), "{:?}", engine.get_errors());
    assert!(engine.stats.constraints_checked > 0);

    // The slot has a function-scoped Local lifetime.
    let slot_lt = engine.value_lifetime("sum", "%acc.addr").unwrap();
    let slot = engine.lifetime(slot_lt).unwrap();
    assert_eq!(slot.kind, LifetimeKind::Local);
    assert_eq!(Some(slot.scope), engine.function_scope("sum"));

    // Each block got its own scope.
    for label in ["entry_0", "while_header_0", "while_body_0", "while_exit_0"] {
        assert!(engine.block_scope("sum", label).is_some(), "{}", label);
    }
}

#[test]
fn test_reference_parameter_gets_function_scoped_lifetime() {
    let module = lower_one(HirFunction {
        name: "reader".to_string(),
        parameters: vec![HirParameter {
            name: "src".to_string(),
            ty: Some(HirType::Reference(Box::new(HirType::Primitive(
                "i64".to_string(),
            )))),
        }],
        return_type: Some(HirType::Primitive("i64".to_string())),
        body: Some(HirBlock::new(vec![HirStatement::Return(Some(
            HirExpression::var("src"),
        ))])),
    });

    let mut engine = LifetimeEngine::new();
    for function in module.functions.values() {
        engine.infer(function);
    }
    engine.solve();

    assert!(engine.get_errors().is_empty(), "{:?}", engine.get_errors());
    let lt = engine.value_lifetime("reader", "%param_src").unwrap();
    let record = engine.lifetime(lt).unwrap();
    assert_eq!(record.kind, LifetimeKind::Local);
    assert_eq!(record.origin, LifetimeOrigin::Parameter);
    assert_eq!(Some(record.scope), engine.function_scope("reader"));
}

#[test]
fn test_named_lifetimes_and_equality() {
    let mut engine = LifetimeEngine::new();
    let scope = engine.create_scope(ScopeKind::Function, ScopeId::root(), "f");
    let a = engine.create_named("a", scope, LifetimeOrigin::Parameter);
    let a_again = engine.create_named("a", scope, LifetimeOrigin::Parameter);
    let b = engine.create_named("b", scope, LifetimeOrigin::Parameter);

    engine.add_constraint(ConstraintKind::Equal, a, a_again, "same name, same record");
    engine.add_constraint(ConstraintKind::Equal, a, b, "distinct names");
    engine.solve();

    let errors = engine.get_errors();
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert_eq!(errors[0].kind, DiagnosticKind::LifetimeEqualityViolation);
}

#[test]
fn test_cross_function_inference_is_isolated() {
    // Two lowered functions reuse value names like %v0; per-function
    // lifetime maps keep them apart.
    let mut hir = HirModule::new("m");
    for name in ["first", "second"] {
        hir.functions.push(HirFunction {
            name: name.to_string(),
            parameters: vec![],
            return_type: None,
            body: Some(HirBlock::new(vec![
                HirStatement::Let {
                    name: "x".to_string(),
                    ty: None,
                    value: Some(HirExpression::int(1)),
                },
                HirStatement::Return(Some(HirExpression::var("x"))),
            ])),
        });
    }
    crate::logging::init_test();
    let (module, diags) = HirToMir::new().transform_module(&hir);
    assert!(diags.is_empty(), "{:?}", diags);

    let mut engine = LifetimeEngine::new();
    for function in module.functions.values() {
        engine.infer(function);
    }
    engine.solve();

    assert!(engine.get_errors().is_empty(), "{:?}", engine.get_errors());
    let first = engine.value_lifetime("first", "%v0").unwrap();
    let second = engine.value_lifetime("second", "%v0").unwrap();
    assert_ne!(first, second);
}
