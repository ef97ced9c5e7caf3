//! Diagnostics for the Kestrel compiler core
//!
//! This module defines the diagnostic record produced by every stage of the
//! MIR pipeline. Diagnostics are collected, never thrown: each stage
//! accumulates into its own log and the safety pipeline concatenates the
//! logs in stage order, so one compilation surfaces as many issues as
//! possible.
//!
//! # Error Code Ranges
//!
//! - E0100-E0199: Lowering errors
//! - E0200-E0299: Lifetime analysis errors
//! - E0300-E0399: Borrow checking errors
//! - E0400-E0499: Ownership tracking errors
//!
//! The optimizer has no codes: it never reports, it only rewrites.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Lowering,
    Optimizer,
    Lifetime,
    Borrow,
    Ownership,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Lowering => "lowering",
            Stage::Optimizer => "optimizer",
            Stage::Lifetime => "lifetime",
            Stage::Borrow => "borrow",
            Stage::Ownership => "ownership",
        };
        write!(f, "{}", s)
    }
}

/// Diagnostic severity. Any `Error` diagnostic marks the compilation as
/// failed; the MIR may still be inspected but must not be consumed
/// downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// The diagnostic kind taxonomy, spanning every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    // Lowering
    NilInput,
    Unsupported,
    Undefined,
    InvalidIr,

    // Lifetime
    UnknownLifetime,
    OutlivesViolation,
    LifetimeEqualityViolation,
    SubtypeViolation,

    // Borrow
    BorrowConflictLoad,
    BorrowConflictStoreImm,
    BorrowConflictStoreMut,
    BorrowConflictCallArg,
    MutableBorrowNotExclusive,
    BorrowLifetimeInvalid,

    // Ownership
    UseAfterMove,
    UseAfterDrop,
    UseInvalid,
    DoubleDrop,
    DropOfMoved,
    StoreToMoved,
    StoreToDropped,
}

impl DiagnosticKind {
    /// Stable error code, formatted as `E{code:04}`.
    pub fn code(&self) -> u16 {
        match self {
            DiagnosticKind::NilInput => 100,
            DiagnosticKind::Unsupported => 101,
            DiagnosticKind::Undefined => 102,
            DiagnosticKind::InvalidIr => 103,

            DiagnosticKind::UnknownLifetime => 200,
            DiagnosticKind::OutlivesViolation => 201,
            DiagnosticKind::LifetimeEqualityViolation => 202,
            DiagnosticKind::SubtypeViolation => 203,

            DiagnosticKind::BorrowConflictLoad => 300,
            DiagnosticKind::BorrowConflictStoreImm => 301,
            DiagnosticKind::BorrowConflictStoreMut => 302,
            DiagnosticKind::BorrowConflictCallArg => 303,
            DiagnosticKind::MutableBorrowNotExclusive => 304,
            DiagnosticKind::BorrowLifetimeInvalid => 305,

            DiagnosticKind::UseAfterMove => 400,
            DiagnosticKind::UseAfterDrop => 401,
            DiagnosticKind::UseInvalid => 402,
            DiagnosticKind::DoubleDrop => 403,
            DiagnosticKind::DropOfMoved => 404,
            DiagnosticKind::StoreToMoved => 405,
            DiagnosticKind::StoreToDropped => 406,
        }
    }

    /// Format the code as "E0301"-style.
    pub fn format_code(&self) -> String {
        format!("E{:04}", self.code())
    }
}

/// A program point: function, block label, and statement index within the
/// block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub function: String,
    pub block: String,
    pub stmt: usize,
}

impl Point {
    pub fn new(function: impl Into<String>, block: impl Into<String>, stmt: usize) -> Self {
        Self {
            function: function.into(),
            block: block.into(),
            stmt,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.function, self.block, self.stmt)
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub point: Option<Point>,
}

impl Diagnostic {
    /// Create an error-severity diagnostic.
    pub fn error(
        stage: Stage,
        kind: DiagnosticKind,
        message: impl Into<String>,
        point: Option<Point>,
    ) -> Self {
        Self {
            stage,
            kind,
            severity: Severity::Error,
            message: message.into(),
            point,
        }
    }

    /// Create a warning-severity diagnostic.
    pub fn warning(
        stage: Stage,
        kind: DiagnosticKind,
        message: impl Into<String>,
        point: Option<Point>,
    ) -> Self {
        Self {
            stage,
            kind,
            severity: Severity::Warning,
            message: message.into(),
            point,
        }
    }

    /// Serialize for tooling output.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.kind.format_code(),
            self.stage,
            self.message
        )?;
        if let Some(point) = &self.point {
            write!(f, " at {}", point)?;
        }
        Ok(())
    }
}

/// Whether a diagnostic list contains any error-severity entry.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}
