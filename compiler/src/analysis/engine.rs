//! Analysis Engine
//!
//! Orchestrates the memory-safety analyses over an emitted MIR module:
//! lifetime inference and solving, then borrow checking, then ownership
//! tracking. Each stage runs to completion over the whole module and
//! accumulates into its own log; the report is the concatenation of the
//! logs in stage order. A violation in one stage never aborts the stages
//! after it — the goal is to surface every issue of a compilation at once.

use super::borrow_checker::BorrowEngine;
use super::lifetime_analyzer::LifetimeEngine;
use super::ownership_analyzer::OwnershipEngine;
use crate::diagnostics::{has_errors, Diagnostic};
use crate::ir::Module;
use log::debug;

/// Per-stage enable flags.
#[derive(Debug, Clone, Copy)]
pub struct SafetyConfig {
    pub enable_lifetime_analysis: bool,
    pub enable_borrow_checking: bool,
    pub enable_ownership_analysis: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enable_lifetime_analysis: true,
            enable_borrow_checking: true,
            enable_ownership_analysis: true,
        }
    }
}

/// Consolidated result of one validation run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Diagnostics in stage order (lifetime, borrow, ownership), each
    /// stage's findings in discovery order
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisReport {
    /// Whether any error-severity finding is present.
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

/// The safety pipeline: owns the three engines and runs them in order.
pub struct AnalysisEngine {
    config: SafetyConfig,
    lifetime: LifetimeEngine,
    borrow: BorrowEngine,
    ownership: OwnershipEngine,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self::with_config(SafetyConfig::default())
    }

    pub fn with_config(config: SafetyConfig) -> Self {
        Self {
            config,
            lifetime: LifetimeEngine::new(),
            borrow: BorrowEngine::new(),
            ownership: OwnershipEngine::new(),
        }
    }

    /// Run every enabled stage over the module and collect the union of
    /// their findings.
    pub fn validate_module(&mut self, module: &Module) -> AnalysisReport {
        debug!(
            "validating module '{}' ({} functions)",
            module.name,
            module.functions.len()
        );

        if self.config.enable_lifetime_analysis {
            for function in module.functions.values() {
                self.lifetime.infer(function);
            }
            self.lifetime.solve();
        }

        if self.config.enable_borrow_checking {
            for function in module.functions.values() {
                self.borrow.check_function(function, &mut self.lifetime);
            }
            self.borrow.check_rules(&self.lifetime);
        }

        if self.config.enable_ownership_analysis {
            for function in module.functions.values() {
                self.ownership.check_function(function, &self.lifetime);
            }
        }

        let mut diagnostics = Vec::new();
        diagnostics.extend_from_slice(self.lifetime.get_errors());
        diagnostics.extend_from_slice(self.borrow.get_errors());
        diagnostics.extend_from_slice(self.ownership.get_errors());

        AnalysisReport { diagnostics }
    }

    /// The lifetime engine, for inspection.
    pub fn lifetimes(&self) -> &LifetimeEngine {
        &self.lifetime
    }

    /// The borrow engine, for inspection.
    pub fn borrows(&self) -> &BorrowEngine {
        &self.borrow
    }

    /// The ownership engine, for inspection.
    pub fn ownership(&self) -> &OwnershipEngine {
        &self.ownership
    }

    /// Clear every engine's error log.
    pub fn clear_errors(&mut self) {
        self.lifetime.clear_errors();
        self.borrow.clear_errors();
        self.ownership.clear_errors();
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}
