//! Memory-safety analysis for MIR
//!
//! This module provides the analysis engines that run over emitted MIR:
//! lifetime inference and constraint solving, borrow tracking and rule
//! enforcement, and ownership state tracking with move/copy/drop
//! semantics. The [`engine`] module orchestrates the three in order and
//! consolidates their error logs.

pub mod borrow_checker;
pub mod engine;
pub mod lifetime_analyzer;
pub mod lifetime_solver;
pub mod ownership_analyzer;

#[cfg(test)]
mod lifetime_analysis_test;
#[cfg(test)]
mod ownership_analyzer_test;

pub use borrow_checker::{Borrow, BorrowEngine, BorrowId, BorrowKind, Region, RegionKind};
pub use engine::{AnalysisEngine, AnalysisReport, SafetyConfig};
pub use lifetime_analyzer::{
    ConstraintKind, Lifetime, LifetimeConstraint, LifetimeEngine, LifetimeId, LifetimeKind,
    LifetimeOrigin, Scope, ScopeId, ScopeKind,
};
pub use ownership_analyzer::{
    MoveContext, MoveKind, MoveRecord, Ownership, OwnershipEngine, OwnershipId, OwnershipKind,
    OwnershipState, TraitFlags,
};
