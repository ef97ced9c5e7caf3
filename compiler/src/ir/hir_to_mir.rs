//! HIR to MIR Lowering
//!
//! Translates an HIR module into a well-formed MIR module. Lowering is
//! best-effort: a failing construct reports one diagnostic and lowering
//! continues with its sibling constructs, so a single compilation surfaces
//! as many issues as possible. A failing function never aborts the module.
//!
//! Per function the lowering resets its symbol table and counters, emits an
//! `entry_0` block, walks the body in source order, and finally guarantees
//! that every block ends in a terminator (an implicit `ret` when the source
//! falls through).

use super::hir::*;
use super::{
    BinaryOp, Callee, CmpPredicate, Function, Instruction, Module, Value, ValueClass,
};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Point, Stage};
use fxhash::FxHashMap;
use log::{debug, trace};

/// Lowering context. One instance handles one `transform_module` call; the
/// per-function state is reset for every function.
pub struct HirToMir {
    /// Accumulated lowering diagnostics
    diagnostics: Vec<Diagnostic>,

    /// Current binding of source names to value names. Parameters map to
    /// `%param_<name>`, `let` bindings map to their `alloca` address.
    symbols: FxHashMap<String, String>,

    /// Class hints: for slot addresses this is the class of the stored
    /// content, for SSA values the class of the value itself.
    classes: FxHashMap<String, ValueClass>,

    /// Label of the block instructions are currently appended to
    current: String,

    /// Per-function counter for string literal symbols (`str_<n>`)
    str_counter: u32,
}

impl HirToMir {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
            symbols: FxHashMap::default(),
            classes: FxHashMap::default(),
            current: String::new(),
            str_counter: 0,
        }
    }

    /// Translate an HIR module into MIR. Returns the (possibly partial)
    /// module together with every diagnostic collected on the way.
    pub fn transform_module(&mut self, hir: &HirModule) -> (Module, Vec<Diagnostic>) {
        if hir.name.is_empty() {
            self.diagnostics.push(Diagnostic::error(
                Stage::Lowering,
                DiagnosticKind::NilInput,
                "module has no name",
                None,
            ));
        }
        let mut module = Module::new(hir.name.clone());

        for hir_fn in &hir.functions {
            if hir_fn.name.is_empty() {
                self.diagnostics.push(Diagnostic::error(
                    Stage::Lowering,
                    DiagnosticKind::NilInput,
                    "function has no name",
                    None,
                ));
                continue;
            }
            debug!("lowering function '{}'", hir_fn.name);
            let function = self.lower_function(hir_fn);
            module.add_function(function);
        }

        (module, std::mem::take(&mut self.diagnostics))
    }

    fn lower_function(&mut self, hir_fn: &HirFunction) -> Function {
        // Per-function reset: symbol table, class hints, string counter.
        self.symbols.clear();
        self.classes.clear();
        self.str_counter = 0;

        let mut func = Function::new(hir_fn.name.clone());
        for param in &hir_fn.parameters {
            let class = param
                .ty
                .as_ref()
                .map(Self::classify_type)
                .unwrap_or_default();
            let is_reference = param.ty.as_ref().map(|t| t.is_reference()).unwrap_or(false);
            func.add_param(param.name.clone(), class, is_reference);
            let value = format!("%param_{}", param.name);
            self.symbols.insert(param.name.clone(), value.clone());
            self.classes.insert(value, class);
        }

        self.current = func.new_block("entry");

        if let Some(body) = &hir_fn.body {
            let trailing = self.lower_block(&mut func, body);
            if let Some(v) = trailing {
                if !self.current_terminated(&func) {
                    self.emit(&mut func, Instruction::Ret { value: Some(v) });
                }
            }
        }

        self.ensure_terminator(&mut func);
        func
    }

    /// Give every block that still falls through an implicit `ret` with no
    /// value.
    fn ensure_terminator(&mut self, func: &mut Function) {
        for block in &mut func.blocks {
            if !block.is_terminated() {
                // Cannot fail: the block is unterminated by the check above.
                let _ = block.append(Instruction::Ret { value: None });
            }
        }
    }

    /// Lower a block's statements in order; returns the value of the
    /// trailing expression, if any.
    fn lower_block(&mut self, func: &mut Function, block: &HirBlock) -> Option<Value> {
        for stmt in &block.statements {
            self.lower_statement(func, stmt);
        }
        match &block.expression {
            Some(expr) if !self.current_terminated(func) => self.lower_expression(func, expr),
            _ => None,
        }
    }

    fn lower_statement(&mut self, func: &mut Function, stmt: &HirStatement) {
        if self.current_terminated(func) {
            // Everything after a terminator in the same block is
            // unreachable source; nothing is emitted for it.
            trace!("skipping unreachable statement in '{}'", self.current);
            return;
        }
        match stmt {
            HirStatement::Expression(expr) => {
                self.lower_expression(func, expr);
            }
            HirStatement::Let { name, ty, value } => {
                self.lower_let(func, name, ty.as_ref(), value.as_ref());
            }
            HirStatement::Assign { target, value } => {
                self.lower_assign(func, target, value);
            }
            HirStatement::Return(expr) => {
                let value = match expr {
                    Some(e) => match self.lower_expression(func, e) {
                        Some(v) => Some(v),
                        // The error is already reported; the implicit
                        // terminator sweep closes the block.
                        None => return,
                    },
                    None => None,
                };
                self.emit(func, Instruction::Ret { value });
            }
            HirStatement::If {
                condition,
                then_block,
                else_block,
            } => {
                self.lower_if(func, condition, then_block, else_block.as_ref());
            }
            HirStatement::While { condition, body } => {
                self.lower_while(func, condition, body);
            }
            HirStatement::For {
                binding,
                iterable,
                body,
            } => {
                self.lower_for(func, binding.as_deref(), iterable.as_ref(), body);
            }
        }
    }

    fn lower_let(
        &mut self,
        func: &mut Function,
        name: &str,
        ty: Option<&HirType>,
        value: Option<&HirExpression>,
    ) {
        let addr = func.new_named_value(&format!("{}.addr", name));
        self.emit(
            func,
            Instruction::Alloca {
                dst: addr.clone(),
                name: Some(name.to_string()),
            },
        );

        let declared = ty.map(Self::classify_type);
        let mut content_class = declared.unwrap_or_default();

        if let Some(expr) = value {
            if let Some(v) = self.lower_expression(func, expr) {
                if declared.is_none() {
                    content_class = v.class();
                }
                self.emit(
                    func,
                    Instruction::Store {
                        addr: Value::reference(addr.clone(), ValueClass::Int),
                        value: v,
                    },
                );
            }
        }

        self.classes.insert(addr.clone(), content_class);
        self.symbols.insert(name.to_string(), addr);
    }

    fn lower_assign(&mut self, func: &mut Function, target: &str, value: &HirExpression) {
        let addr = match self.symbols.get(target) {
            Some(addr) => addr.clone(),
            None => {
                let point = self.cursor(func);
                self.diagnostics.push(Diagnostic::error(
                    Stage::Lowering,
                    DiagnosticKind::Unsupported,
                    format!("assignment to unknown name '{}'", target),
                    Some(point),
                ));
                return;
            }
        };
        if let Some(v) = self.lower_expression(func, value) {
            self.emit(
                func,
                Instruction::Store {
                    addr: Value::reference(addr, ValueClass::Int),
                    value: v,
                },
            );
        }
    }

    fn lower_if(
        &mut self,
        func: &mut Function,
        condition: &HirExpression,
        then_block: &HirBlock,
        else_block: Option<&HirBlock>,
    ) {
        let cond = match self.lower_expression(func, condition) {
            Some(c) => c,
            None => return,
        };

        let then_label = func.new_block_name("if_then");
        let else_label = else_block.map(|_| func.new_block_name("if_else"));
        let cont_label = func.new_block_name("if_cont");

        self.emit(
            func,
            Instruction::CondBr {
                cond,
                true_target: then_label.clone(),
                false_target: else_label.clone().unwrap_or_else(|| cont_label.clone()),
            },
        );

        self.start_block(func, &then_label);
        self.lower_block(func, then_block);
        if !self.current_terminated(func) {
            self.emit(
                func,
                Instruction::Br {
                    target: cont_label.clone(),
                },
            );
        }

        if let (Some(label), Some(block)) = (else_label, else_block) {
            self.start_block(func, &label);
            self.lower_block(func, block);
            if !self.current_terminated(func) {
                self.emit(
                    func,
                    Instruction::Br {
                        target: cont_label.clone(),
                    },
                );
            }
        }

        self.start_block(func, &cont_label);
    }

    fn lower_while(&mut self, func: &mut Function, condition: &HirExpression, body: &HirBlock) {
        let header = func.new_block_name("while_header");
        let body_label = func.new_block_name("while_body");
        let exit = func.new_block_name("while_exit");

        self.emit(
            func,
            Instruction::Br {
                target: header.clone(),
            },
        );

        self.start_block(func, &header);
        match self.lower_expression(func, condition) {
            Some(cond) => {
                self.emit(
                    func,
                    Instruction::CondBr {
                        cond,
                        true_target: body_label.clone(),
                        false_target: exit.clone(),
                    },
                );
                self.start_block(func, &body_label);
                self.lower_block(func, body);
                if !self.current_terminated(func) {
                    self.emit(
                        func,
                        Instruction::Br {
                            target: header.clone(),
                        },
                    );
                }
            }
            None => {
                // Condition failed to lower; close the header so the
                // function stays well-formed and continue after the loop.
                self.emit(
                    func,
                    Instruction::Br {
                        target: exit.clone(),
                    },
                );
            }
        }

        self.start_block(func, &exit);
    }

    // `for` lowers as an unconditional loop: the header branches straight
    // into the body and the body branches back to the header. The exit
    // block is reserved for a future `break`; until then it is unreachable
    // and normally pruned.
    fn lower_for(
        &mut self,
        func: &mut Function,
        binding: Option<&str>,
        iterable: Option<&HirExpression>,
        body: &HirBlock,
    ) {
        if let Some(expr) = iterable {
            self.lower_expression(func, expr);
        }
        if let Some(name) = binding {
            let addr = func.new_named_value(&format!("{}.addr", name));
            self.emit(
                func,
                Instruction::Alloca {
                    dst: addr.clone(),
                    name: Some(name.to_string()),
                },
            );
            self.classes.insert(addr.clone(), ValueClass::Unknown);
            self.symbols.insert(name.to_string(), addr);
        }

        let header = func.new_block_name("for_header");
        let body_label = func.new_block_name("for_body");
        let exit = func.new_block_name("for_exit");

        self.emit(
            func,
            Instruction::Br {
                target: header.clone(),
            },
        );

        self.start_block(func, &header);
        self.emit(
            func,
            Instruction::Br {
                target: body_label.clone(),
            },
        );

        self.start_block(func, &body_label);
        self.lower_block(func, body);
        if !self.current_terminated(func) {
            self.emit(
                func,
                Instruction::Br {
                    target: header.clone(),
                },
            );
        }

        self.start_block(func, &exit);
    }

    fn lower_expression(&mut self, func: &mut Function, expr: &HirExpression) -> Option<Value> {
        match expr {
            HirExpression::Literal(lit) => Some(self.lower_literal(lit)),
            HirExpression::Variable(name) => self.lower_variable(func, name),
            HirExpression::Binary { op, lhs, rhs } => self.lower_binary(func, *op, lhs, rhs),
            HirExpression::Unary { op, operand } => self.lower_unary(func, *op, operand),
            HirExpression::Call { callee, args } => self.lower_call(func, callee, args),
            HirExpression::FieldAccess { base, .. } => self.lower_base_load(func, base, None),
            HirExpression::Index { base, index } => {
                self.lower_base_load(func, base, Some(index))
            }
        }
    }

    fn lower_literal(&mut self, lit: &HirLiteral) -> Value {
        match lit {
            HirLiteral::Integer(v) => Value::int(*v),
            HirLiteral::Float(v) => Value::float(*v),
            HirLiteral::Bool(v) => Value::int(if *v { 1 } else { 0 }),
            HirLiteral::String(_) => {
                let sym = format!("str_{}", self.str_counter);
                self.str_counter += 1;
                Value::reference(sym, ValueClass::Int)
            }
        }
    }

    fn lower_variable(&mut self, func: &mut Function, name: &str) -> Option<Value> {
        let addr = match self.symbols.get(name) {
            Some(addr) => addr.clone(),
            None => {
                let point = self.cursor(func);
                self.diagnostics.push(Diagnostic::error(
                    Stage::Lowering,
                    DiagnosticKind::Undefined,
                    format!("undefined name '{}'", name),
                    Some(point),
                ));
                return None;
            }
        };
        let class = self.classes.get(&addr).copied().unwrap_or_default();
        let dst = func.new_value_name();
        self.emit(
            func,
            Instruction::Load {
                dst: dst.clone(),
                addr: Value::reference(addr, ValueClass::Int),
            },
        );
        self.classes.insert(dst.clone(), class);
        Some(Value::reference(dst, class))
    }

    fn lower_binary(
        &mut self,
        func: &mut Function,
        op: HirBinaryOp,
        lhs: &HirExpression,
        rhs: &HirExpression,
    ) -> Option<Value> {
        let l = self.lower_expression(func, lhs)?;
        let r = self.lower_expression(func, rhs)?;
        let class = l.class().merge(r.class());

        if let Some(arith) = Self::arith_op(op) {
            let dst = func.new_value_name();
            self.emit(
                func,
                Instruction::BinOp {
                    dst: dst.clone(),
                    op: arith,
                    lhs: l,
                    rhs: r,
                },
            );
            self.classes.insert(dst.clone(), class);
            return Some(Value::reference(dst, class));
        }

        let pred = Self::cmp_predicate(op, class);
        let dst = func.new_value_name();
        self.emit(
            func,
            Instruction::Cmp {
                dst: dst.clone(),
                pred,
                lhs: l,
                rhs: r,
            },
        );
        self.classes.insert(dst.clone(), ValueClass::Int);
        Some(Value::reference(dst, ValueClass::Int))
    }

    fn lower_unary(
        &mut self,
        func: &mut Function,
        op: HirUnaryOp,
        operand: &HirExpression,
    ) -> Option<Value> {
        let v = self.lower_expression(func, operand)?;
        match op {
            HirUnaryOp::Neg => {
                let class = v.class();
                let zero = if class == ValueClass::Float {
                    Value::float(0.0)
                } else {
                    Value::int(0)
                };
                let dst = func.new_value_name();
                self.emit(
                    func,
                    Instruction::BinOp {
                        dst: dst.clone(),
                        op: BinaryOp::Sub,
                        lhs: zero,
                        rhs: v,
                    },
                );
                self.classes.insert(dst.clone(), class);
                Some(Value::reference(dst, class))
            }
            HirUnaryOp::Not => {
                let dst = func.new_value_name();
                self.emit(
                    func,
                    Instruction::Cmp {
                        dst: dst.clone(),
                        pred: CmpPredicate::Eq,
                        lhs: v,
                        rhs: Value::int(0),
                    },
                );
                self.classes.insert(dst.clone(), ValueClass::Int);
                Some(Value::reference(dst, ValueClass::Int))
            }
        }
    }

    fn lower_call(
        &mut self,
        func: &mut Function,
        callee: &HirExpression,
        args: &[HirExpression],
    ) -> Option<Value> {
        // A variable naming no local binding is a direct callee; anything
        // else is computed and called indirectly.
        let callee = match callee {
            HirExpression::Variable(name) if !self.symbols.contains_key(name) => {
                Callee::Named(name.clone())
            }
            other => Callee::Value(self.lower_expression(func, other)?),
        };

        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            lowered.push(self.lower_expression(func, arg)?);
        }
        let arg_classes: Vec<ValueClass> = lowered.iter().map(|v| v.class()).collect();

        let dst = func.new_value_name();
        self.emit(
            func,
            Instruction::Call {
                dst: Some(dst.clone()),
                callee,
                args: lowered,
                arg_classes,
                ret_class: None,
            },
        );
        self.classes.insert(dst.clone(), ValueClass::Unknown);
        Some(Value::reference(dst, ValueClass::Unknown))
    }

    // Field access and indexing lower as a load from the base; structural
    // offset computation belongs to a later stage.
    fn lower_base_load(
        &mut self,
        func: &mut Function,
        base: &HirExpression,
        index: Option<&HirExpression>,
    ) -> Option<Value> {
        let base_v = self.lower_expression(func, base)?;
        if let Some(index) = index {
            self.lower_expression(func, index)?;
        }
        let dst = func.new_value_name();
        self.emit(
            func,
            Instruction::Load {
                dst: dst.clone(),
                addr: base_v,
            },
        );
        self.classes.insert(dst.clone(), ValueClass::Unknown);
        Some(Value::reference(dst, ValueClass::Unknown))
    }

    // === helpers ===

    fn classify_type(ty: &HirType) -> ValueClass {
        match ty {
            HirType::Primitive(name) => ValueClass::from_primitive(name),
            // Pointers and references classify as integers.
            HirType::Pointer(_) | HirType::Reference(_) => ValueClass::Int,
            HirType::Named(_) => ValueClass::Unknown,
        }
    }

    fn arith_op(op: HirBinaryOp) -> Option<BinaryOp> {
        match op {
            HirBinaryOp::Add => Some(BinaryOp::Add),
            HirBinaryOp::Sub => Some(BinaryOp::Sub),
            HirBinaryOp::Mul => Some(BinaryOp::Mul),
            HirBinaryOp::Div => Some(BinaryOp::Div),
            _ => None,
        }
    }

    fn cmp_predicate(op: HirBinaryOp, class: ValueClass) -> CmpPredicate {
        let float = class == ValueClass::Float;
        match op {
            HirBinaryOp::Eq => CmpPredicate::Eq,
            HirBinaryOp::Ne => CmpPredicate::Ne,
            HirBinaryOp::Lt => {
                if float {
                    CmpPredicate::Flt
                } else {
                    CmpPredicate::Slt
                }
            }
            HirBinaryOp::Le => {
                if float {
                    CmpPredicate::Fle
                } else {
                    CmpPredicate::Sle
                }
            }
            HirBinaryOp::Gt => {
                if float {
                    CmpPredicate::Fgt
                } else {
                    CmpPredicate::Sgt
                }
            }
            HirBinaryOp::Ge => {
                if float {
                    CmpPredicate::Fge
                } else {
                    CmpPredicate::Sge
                }
            }
            _ => CmpPredicate::Eq,
        }
    }

    fn current_terminated(&self, func: &Function) -> bool {
        func.block(&self.current)
            .map(|b| b.is_terminated())
            .unwrap_or(true)
    }

    fn start_block(&mut self, func: &mut Function, label: &str) {
        if let Err(err) = func.add_block(label) {
            self.diagnostics.push(Diagnostic::error(
                Stage::Lowering,
                DiagnosticKind::InvalidIr,
                err.to_string(),
                None,
            ));
        }
        self.current = label.to_string();
    }

    fn cursor(&self, func: &Function) -> Point {
        let stmt = func
            .block(&self.current)
            .map(|b| b.instructions.len())
            .unwrap_or(0);
        Point::new(&func.name, &self.current, stmt)
    }

    fn emit(&mut self, func: &mut Function, instr: Instruction) {
        trace!("emit [{}] {}", self.current, super::dump_instruction(&instr));
        let current = self.current.clone();
        if let Err(err) = func.append_to(&current, instr) {
            self.diagnostics.push(Diagnostic::error(
                Stage::Lowering,
                DiagnosticKind::InvalidIr,
                err.to_string(),
                None,
            ));
        }
    }
}

impl Default for HirToMir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::dump_function;

    fn lower(hir: &HirModule) -> (Module, Vec<Diagnostic>) {
        crate::logging::init_test();
        HirToMir::new().transform_module(hir)
    }

    fn single_fn_module(func: HirFunction) -> HirModule {
        let mut module = HirModule::new("test");
        module.functions.push(func);
        module
    }

    #[test]
    fn test_return_constant() {
        // fn f() -> i32 { return 42; }
        let hir = single_fn_module(HirFunction {
            name: "f".to_string(),
            parameters: vec![],
            return_type: Some(HirType::Primitive("i32".to_string())),
            body: Some(HirBlock::new(vec![HirStatement::Return(Some(
                HirExpression::int(42),
            ))])),
        });

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);

        let func = module.function("f").unwrap();
        assert_eq!(func.blocks.len(), 1);
        assert_eq!(func.blocks[0].label, "entry_0");
        assert_eq!(
            dump_function(func),
            "func f() {\nentry_0:\n  ret 42\n}\n"
        );
    }

    #[test]
    fn test_let_chain() {
        // fn h() -> i32 { let x = 10; let y = x + 5; return y; }
        let hir = single_fn_module(HirFunction {
            name: "h".to_string(),
            parameters: vec![],
            return_type: Some(HirType::Primitive("i32".to_string())),
            body: Some(HirBlock::new(vec![
                HirStatement::Let {
                    name: "x".to_string(),
                    ty: None,
                    value: Some(HirExpression::int(10)),
                },
                HirStatement::Let {
                    name: "y".to_string(),
                    ty: None,
                    value: Some(HirExpression::binary(
                        HirBinaryOp::Add,
                        HirExpression::var("x"),
                        HirExpression::int(5),
                    )),
                },
                HirStatement::Return(Some(HirExpression::var("y"))),
            ])),
        });

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);

        let func = module.function("h").unwrap();
        assert_eq!(
            dump_function(func),
            "func h() {\n\
             entry_0:\n\
             \x20 %x.addr = alloca x\n\
             \x20 store %x.addr, 10\n\
             \x20 %y.addr = alloca y\n\
             \x20 %v0 = load %x.addr\n\
             \x20 %v1 = add %v0, 5\n\
             \x20 store %y.addr, %v1\n\
             \x20 %v2 = load %y.addr\n\
             \x20 ret %v2\n\
             }\n"
        );
    }

    #[test]
    fn test_if_else_blocks() {
        // fn i(x) { if true { return 1 } else { return 0 } }
        let hir = single_fn_module(HirFunction {
            name: "i".to_string(),
            parameters: vec![HirParameter {
                name: "x".to_string(),
                ty: None,
            }],
            return_type: None,
            body: Some(HirBlock::new(vec![HirStatement::If {
                condition: HirExpression::bool(true),
                then_block: HirBlock::new(vec![HirStatement::Return(Some(
                    HirExpression::int(1),
                ))]),
                else_block: Some(HirBlock::new(vec![HirStatement::Return(Some(
                    HirExpression::int(0),
                ))])),
            }])),
        });

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);

        let func = module.function("i").unwrap();
        let labels: Vec<&str> = func.blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["entry_0", "if_then_0", "if_else_0", "if_cont_0"]);

        let entry = func.block("entry_0").unwrap();
        assert_eq!(
            super::super::dump_instruction(entry.terminator().unwrap()),
            "brcond 1, if_then_0, if_else_0"
        );
        assert!(matches!(
            func.block("if_then_0").unwrap().terminator(),
            Some(Instruction::Ret { .. })
        ));
        assert!(matches!(
            func.block("if_else_0").unwrap().terminator(),
            Some(Instruction::Ret { .. })
        ));
        // The continuation is unreachable here; it still ends in the
        // implicit ret so the function stays well-formed.
        assert!(func.block("if_cont_0").unwrap().is_terminated());
    }

    #[test]
    fn test_while_shape() {
        // fn w() { let i = 0; while i < 10 { i = i + 1 } }
        let hir = single_fn_module(HirFunction {
            name: "w".to_string(),
            parameters: vec![],
            return_type: None,
            body: Some(HirBlock::new(vec![
                HirStatement::Let {
                    name: "i".to_string(),
                    ty: Some(HirType::Primitive("int".to_string())),
                    value: Some(HirExpression::int(0)),
                },
                HirStatement::While {
                    condition: HirExpression::binary(
                        HirBinaryOp::Lt,
                        HirExpression::var("i"),
                        HirExpression::int(10),
                    ),
                    body: HirBlock::new(vec![HirStatement::Assign {
                        target: "i".to_string(),
                        value: HirExpression::binary(
                            HirBinaryOp::Add,
                            HirExpression::var("i"),
                            HirExpression::int(1),
                        ),
                    }]),
                },
            ])),
        });

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);

        let func = module.function("w").unwrap();
        let labels: Vec<&str> = func.blocks.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["entry_0", "while_header_0", "while_body_0", "while_exit_0"]
        );

        // Entry falls into the header; the header compares and branches.
        let entry = func.block("entry_0").unwrap();
        assert_eq!(entry.successors().as_slice(), &["while_header_0"]);
        let header = func.block("while_header_0").unwrap();
        assert_eq!(
            header.successors().as_slice(),
            &["while_body_0", "while_exit_0"]
        );
        // The body loops back to the header.
        let body = func.block("while_body_0").unwrap();
        assert_eq!(body.successors().as_slice(), &["while_header_0"]);
        // The exit falls through with the implicit ret.
        assert!(matches!(
            func.block("while_exit_0").unwrap().terminator(),
            Some(Instruction::Ret { value: None })
        ));
    }

    #[test]
    fn test_signed_predicate_for_int_and_float() {
        let hir = single_fn_module(HirFunction {
            name: "c".to_string(),
            parameters: vec![
                HirParameter {
                    name: "a".to_string(),
                    ty: Some(HirType::Primitive("i32".to_string())),
                },
                HirParameter {
                    name: "b".to_string(),
                    ty: Some(HirType::Primitive("f64".to_string())),
                },
            ],
            return_type: None,
            body: Some(HirBlock::new(vec![
                HirStatement::Expression(HirExpression::binary(
                    HirBinaryOp::Lt,
                    HirExpression::var("a"),
                    HirExpression::int(3),
                )),
                HirStatement::Expression(HirExpression::binary(
                    HirBinaryOp::Lt,
                    HirExpression::var("b"),
                    HirExpression::float(3.0),
                )),
            ])),
        });

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);

        let text = dump_function(module.function("c").unwrap());
        assert!(text.contains("cmp.slt"), "{}", text);
        assert!(text.contains("cmp.flt"), "{}", text);
    }

    #[test]
    fn test_undefined_variable_reports_and_continues() {
        let hir = single_fn_module(HirFunction {
            name: "u".to_string(),
            parameters: vec![],
            return_type: None,
            body: Some(HirBlock::new(vec![
                HirStatement::Expression(HirExpression::var("ghost")),
                HirStatement::Return(Some(HirExpression::int(0))),
            ])),
        });

        let (module, diags) = lower(&hir);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::Undefined);
        assert!(diags[0].message.contains("ghost"));

        // The sibling return still lowered.
        let func = module.function("u").unwrap();
        assert!(matches!(
            func.block("entry_0").unwrap().terminator(),
            Some(Instruction::Ret {
                value: Some(Value::ConstInt(0))
            })
        ));
    }

    #[test]
    fn test_assign_to_unknown_name() {
        let hir = single_fn_module(HirFunction {
            name: "a".to_string(),
            parameters: vec![],
            return_type: None,
            body: Some(HirBlock::new(vec![HirStatement::Assign {
                target: "nope".to_string(),
                value: HirExpression::int(1),
            }])),
        });

        let (_, diags) = lower(&hir);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::Unsupported);
    }

    #[test]
    fn test_unary_lowering() {
        let hir = single_fn_module(HirFunction {
            name: "n".to_string(),
            parameters: vec![HirParameter {
                name: "x".to_string(),
                ty: Some(HirType::Primitive("int".to_string())),
            }],
            return_type: None,
            body: Some(HirBlock::new(vec![
                HirStatement::Expression(HirExpression::Unary {
                    op: HirUnaryOp::Neg,
                    operand: Box::new(HirExpression::var("x")),
                }),
                HirStatement::Expression(HirExpression::Unary {
                    op: HirUnaryOp::Not,
                    operand: Box::new(HirExpression::var("x")),
                }),
            ])),
        });

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);

        let text = dump_function(module.function("n").unwrap());
        assert!(text.contains("= sub 0, %v0"), "{}", text);
        assert!(text.contains("= cmp.eq %v2, 0"), "{}", text);
    }

    #[test]
    fn test_direct_and_indirect_calls() {
        let hir = single_fn_module(HirFunction {
            name: "caller".to_string(),
            parameters: vec![HirParameter {
                name: "callback".to_string(),
                ty: None,
            }],
            return_type: None,
            body: Some(HirBlock::new(vec![
                HirStatement::Expression(HirExpression::call(
                    HirExpression::var("helper"),
                    vec![HirExpression::int(1)],
                )),
                HirStatement::Expression(HirExpression::call(
                    HirExpression::var("callback"),
                    vec![],
                )),
            ])),
        });

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);

        let func = module.function("caller").unwrap();
        let calls: Vec<&Instruction> = func.blocks[0]
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Call { .. }))
            .collect();
        assert_eq!(calls.len(), 2);
        assert!(matches!(
            calls[0],
            Instruction::Call {
                callee: Callee::Named(name),
                ..
            } if name == "helper"
        ));
        // `callback` is a bound parameter, so it is loaded and called
        // indirectly.
        assert!(matches!(
            calls[1],
            Instruction::Call {
                callee: Callee::Value(_),
                ..
            }
        ));
    }

    #[test]
    fn test_string_literal_symbols() {
        let hir = single_fn_module(HirFunction {
            name: "s".to_string(),
            parameters: vec![],
            return_type: None,
            body: Some(HirBlock::new(vec![
                HirStatement::Let {
                    name: "a".to_string(),
                    ty: None,
                    value: Some(HirExpression::string("hello")),
                },
                HirStatement::Let {
                    name: "b".to_string(),
                    ty: None,
                    value: Some(HirExpression::string("world")),
                },
            ])),
        });

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);

        let text = dump_function(module.function("s").unwrap());
        assert!(text.contains("store %a.addr, str_0"), "{}", text);
        assert!(text.contains("store %b.addr, str_1"), "{}", text);
    }

    #[test]
    fn test_for_lowers_as_unconditional_loop() {
        let hir = single_fn_module(HirFunction {
            name: "l".to_string(),
            parameters: vec![],
            return_type: None,
            body: Some(HirBlock::new(vec![HirStatement::For {
                binding: None,
                iterable: None,
                body: HirBlock::new(vec![]),
            }])),
        });

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);

        let func = module.function("l").unwrap();
        let header = func.block("for_header_0").unwrap();
        assert_eq!(header.successors().as_slice(), &["for_body_0"]);
        let body = func.block("for_body_0").unwrap();
        assert_eq!(body.successors().as_slice(), &["for_header_0"]);
        assert!(func.block("for_exit_0").unwrap().is_terminated());
    }

    #[test]
    fn test_function_without_body() {
        let hir = single_fn_module(HirFunction {
            name: "decl".to_string(),
            parameters: vec![],
            return_type: None,
            body: None,
        });

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);
        let func = module.function("decl").unwrap();
        assert_eq!(func.blocks.len(), 1);
        assert!(matches!(
            func.blocks[0].terminator(),
            Some(Instruction::Ret { value: None })
        ));
    }

    #[test]
    fn test_failing_function_does_not_abort_module() {
        let mut hir = HirModule::new("m");
        hir.functions.push(HirFunction {
            name: "broken".to_string(),
            parameters: vec![],
            return_type: None,
            body: Some(HirBlock::new(vec![HirStatement::Expression(
                HirExpression::var("missing"),
            )])),
        });
        hir.functions.push(HirFunction {
            name: "fine".to_string(),
            parameters: vec![],
            return_type: None,
            body: Some(HirBlock::new(vec![HirStatement::Return(Some(
                HirExpression::int(7),
            ))])),
        });

        let (module, diags) = lower(&hir);
        assert_eq!(diags.len(), 1);
        assert_eq!(module.functions.len(), 2);
        assert!(module.function("fine").is_some());
    }

    #[test]
    fn test_lowered_mir_is_valid() {
        // The validator accepts everything the lowering produces.
        let hir = single_fn_module(HirFunction {
            name: "v".to_string(),
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

        let (module, diags) = lower(&hir);
        assert!(diags.is_empty(), "{:?}", diags);
        let findings = crate::ir::validation::validate_module(&module);
        assert!(findings.is_empty(), "{:?}", findings);
    }
}
