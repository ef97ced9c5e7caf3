//! MIR Values
//!
//! Defines the operand model for MIR instructions: integer and float
//! constants plus named references. Every value carries a coarse
//! [`ValueClass`] used as a lowering hint; pointers classify as `Int`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse classification of a value, used as a lowering hint.
///
/// This is deliberately not a type system: it only distinguishes the
/// integer-like world (including booleans and pointers) from floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValueClass {
    /// No classification available
    #[default]
    Unknown,
    /// Integer-like: integers, booleans, pointers, references
    Int,
    /// Floating point
    Float,
}

impl ValueClass {
    /// Classify a primitive type name from the source language.
    pub fn from_primitive(name: &str) -> Self {
        match name {
            "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "int" | "bool" => {
                ValueClass::Int
            }
            "f32" | "f64" | "float" => ValueClass::Float,
            _ => ValueClass::Unknown,
        }
    }

    /// Merge two hints: a known class wins over `Unknown`, `Float` wins
    /// over `Int` (mixed arithmetic widens).
    pub fn merge(self, other: ValueClass) -> ValueClass {
        match (self, other) {
            (ValueClass::Float, _) | (_, ValueClass::Float) => ValueClass::Float,
            (ValueClass::Int, _) | (_, ValueClass::Int) => ValueClass::Int,
            _ => ValueClass::Unknown,
        }
    }
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueClass::Unknown => "unknown",
            ValueClass::Int => "int",
            ValueClass::Float => "float",
        };
        write!(f, "{}", s)
    }
}

/// A MIR operand.
///
/// Constants are embedded directly; everything else is a named reference to
/// a value defined elsewhere in the function (a parameter, an `alloca`
/// result, or an earlier SSA destination). Value names are opaque strings
/// unique within their defining function, e.g. `%v0`, `%x.addr`,
/// `%param_x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Integer constant
    ConstInt(i64),

    /// Floating-point constant
    ConstFloat(f64),

    /// Named reference to a previously defined value
    Ref { name: String, class: ValueClass },
}

impl Value {
    /// Integer constant.
    pub fn int(v: i64) -> Self {
        Value::ConstInt(v)
    }

    /// Floating-point constant.
    pub fn float(v: f64) -> Self {
        Value::ConstFloat(v)
    }

    /// Named reference with a class hint.
    pub fn reference(name: impl Into<String>, class: ValueClass) -> Self {
        Value::Ref {
            name: name.into(),
            class,
        }
    }

    /// The class of this value. Constants classify themselves; references
    /// carry the hint they were built with.
    pub fn class(&self) -> ValueClass {
        match self {
            Value::ConstInt(_) => ValueClass::Int,
            Value::ConstFloat(_) => ValueClass::Float,
            Value::Ref { class, .. } => *class,
        }
    }

    /// The referenced name, if this is a reference.
    pub fn ref_name(&self) -> Option<&str> {
        match self {
            Value::Ref { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Whether this value is a constant (integer or float).
    pub fn is_const(&self) -> bool {
        matches!(self, Value::ConstInt(_) | Value::ConstFloat(_))
    }
}

// Display is the normative operand rendering used by the dump module.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::ConstInt(v) => write!(f, "{}", v),
            Value::ConstFloat(v) => write!(f, "{}", v),
            Value::Ref { name, .. } => write!(f, "{}", name),
        }
    }
}
