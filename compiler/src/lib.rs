//! Kestrel compiler core: MIR pipeline with integrated memory-safety
//! analysis
//!
//! This crate lowers a high-level AST (HIR) into a mid-level IR (MIR) in
//! SSA-like form, runs classical intra-function optimizations, and performs
//! lifetime inference, borrow checking, and ownership tracking across the
//! emitted MIR. The front end (lexer, parser) and the later back-end stages
//! (LIR, machine-code emission) live elsewhere; this crate consumes an HIR
//! tree and produces a MIR module plus a consolidated diagnostic report.
//!
//! Entry points:
//! - [`pipeline::CompilationPipeline`] for the full HIR → MIR → analysis run
//! - [`ir::hir_to_mir::HirToMir`] for lowering alone
//! - [`analysis::AnalysisEngine`] for the safety analyses over existing MIR

pub mod analysis;
pub mod diagnostics;
pub mod ir;
pub mod logging;
pub mod pipeline;

pub use diagnostics::{Diagnostic, DiagnosticKind, Point, Severity, Stage};
pub use ir::{dump_function, dump_module, Function, Instruction, Module, Value, ValueClass};
pub use pipeline::{CompilationPipeline, CompilationResult, PipelineConfig};
