//! High-level IR (HIR) consumed by lowering
//!
//! The HIR is the tree-shaped input of the MIR pipeline: a thin,
//! source-order representation produced by earlier front-end stages. The
//! lowering in [`super::hir_to_mir`] is the only consumer. Construction
//! helpers exist mostly for tests and embedders.

use serde::{Deserialize, Serialize};

/// HIR module — a named list of functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirModule {
    pub name: String,
    pub functions: Vec<HirFunction>,
}

impl HirModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }
}

/// HIR function: name, parameters, optional body.
///
/// A function without a body is a declaration; lowering emits an entry
/// block with an implicit `ret` for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirFunction {
    pub name: String,
    pub parameters: Vec<HirParameter>,
    pub return_type: Option<HirType>,
    pub body: Option<HirBlock>,
}

/// Function parameter with an optional declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirParameter {
    pub name: String,
    pub ty: Option<HirType>,
}

/// HIR type. Only the coarse shape matters to this pipeline: primitives
/// map to value classes, pointers and references classify as integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirType {
    /// Primitive type by source name (`i8..i64`, `u8..u64`, `int`, `f32`,
    /// `f64`, `float`, `bool`)
    Primitive(String),

    /// Raw pointer to a pointee type
    Pointer(Box<HirType>),

    /// Reference to a referent type
    Reference(Box<HirType>),

    /// Any other named type
    Named(String),
}

impl HirType {
    /// Whether this type is a reference.
    pub fn is_reference(&self) -> bool {
        matches!(self, HirType::Reference(_))
    }
}

/// A block: ordered statements plus an optional trailing expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HirBlock {
    pub statements: Vec<HirStatement>,
    pub expression: Option<HirExpression>,
}

impl HirBlock {
    pub fn new(statements: Vec<HirStatement>) -> Self {
        Self {
            statements,
            expression: None,
        }
    }
}

/// HIR statement kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirStatement {
    /// Expression evaluated for effect
    Expression(HirExpression),

    /// `let name [: ty] [= value]`
    Let {
        name: String,
        ty: Option<HirType>,
        value: Option<HirExpression>,
    },

    /// `target = value`
    Assign {
        target: String,
        value: HirExpression,
    },

    /// `return [value]`
    Return(Option<HirExpression>),

    /// `if condition { then } [else { otherwise }]`
    If {
        condition: HirExpression,
        then_block: HirBlock,
        else_block: Option<HirBlock>,
    },

    /// `while condition { body }`
    While {
        condition: HirExpression,
        body: HirBlock,
    },

    /// `for [binding in iterable] { body }` — iterator protocol is not part
    /// of this pipeline; the loop lowers as an unconditional loop with a
    /// reserved exit block.
    For {
        binding: Option<String>,
        iterable: Option<HirExpression>,
        body: HirBlock,
    },
}

/// Binary operators appearing in HIR expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HirBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Unary operators appearing in HIR expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HirUnaryOp {
    /// Arithmetic negation, lowered as `0 - x`
    Neg,
    /// Logical not, lowered as `cmp.eq x, 0`
    Not,
}

/// HIR expression kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirExpression {
    Literal(HirLiteral),

    Variable(String),

    Binary {
        op: HirBinaryOp,
        lhs: Box<HirExpression>,
        rhs: Box<HirExpression>,
    },

    Unary {
        op: HirUnaryOp,
        operand: Box<HirExpression>,
    },

    Call {
        callee: Box<HirExpression>,
        args: Vec<HirExpression>,
    },

    FieldAccess {
        base: Box<HirExpression>,
        field: String,
    },

    Index {
        base: Box<HirExpression>,
        index: Box<HirExpression>,
    },
}

impl HirExpression {
    pub fn int(v: i64) -> Self {
        HirExpression::Literal(HirLiteral::Integer(v))
    }

    pub fn float(v: f64) -> Self {
        HirExpression::Literal(HirLiteral::Float(v))
    }

    pub fn bool(v: bool) -> Self {
        HirExpression::Literal(HirLiteral::Bool(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        HirExpression::Literal(HirLiteral::String(v.into()))
    }

    pub fn var(name: impl Into<String>) -> Self {
        HirExpression::Variable(name.into())
    }

    pub fn binary(op: HirBinaryOp, lhs: HirExpression, rhs: HirExpression) -> Self {
        HirExpression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(callee: HirExpression, args: Vec<HirExpression>) -> Self {
        HirExpression::Call {
            callee: Box::new(callee),
            args,
        }
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HirLiteral {
    Integer(i64),
    Float(f64),
    String(String),
    Bool(bool),
}
