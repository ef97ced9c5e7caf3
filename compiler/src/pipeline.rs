//! Complete MIR compilation pipeline: HIR -> MIR -> optimized MIR -> safety report
//!
//! This module wires the stages together:
//! 1. Lower HIR to MIR (best-effort, per function)
//! 2. Run the optimizer (constant propagation, DCE, block merging, module
//!    pruning) when enabled
//! 3. Optionally validate the MIR's structural invariants
//! 4. Run the memory-safety analyses and consolidate every stage's
//!    diagnostics
//!
//! The result always carries the (possibly partial) MIR module; when any
//! error-severity diagnostic is present the compilation counts as failed
//! and downstream consumers must refuse the module.

use crate::analysis::{AnalysisEngine, SafetyConfig};
use crate::diagnostics::{has_errors, Diagnostic, Severity};
use crate::ir::hir::HirModule;
use crate::ir::hir_to_mir::HirToMir;
use crate::ir::optimization::PassManager;
use crate::ir::{validation, Module};
use log::{debug, info};
use std::time::Instant;

/// Configuration for the compilation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Run the optimizer between lowering and analysis
    pub optimize: bool,

    /// Run the structural MIR verifier after lowering/optimization
    pub validate_mir: bool,

    /// Enable lifetime inference and constraint solving
    pub enable_lifetime_analysis: bool,

    /// Enable borrow checking
    pub enable_borrow_checking: bool,

    /// Enable ownership tracking
    pub enable_ownership_analysis: bool,

    /// Stop running further stages once this many diagnostics accumulated
    pub max_errors: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            optimize: true,
            validate_mir: false,
            enable_lifetime_analysis: true,
            enable_borrow_checking: true,
            enable_ownership_analysis: true,
            max_errors: 100,
        }
    }
}

/// Statistics collected during compilation.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub functions_lowered: usize,
    pub blocks_emitted: usize,
    pub instructions_emitted: usize,
    pub instructions_eliminated: usize,
    pub blocks_eliminated: usize,
    pub functions_pruned: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub lowering_time_us: u64,
    pub optimization_time_us: u64,
    pub analysis_time_us: u64,
}

/// The final result of one compilation.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    /// The emitted MIR; may be partial when diagnostics are present
    pub module: Module,

    /// Every diagnostic, in stage order
    pub diagnostics: Vec<Diagnostic>,

    pub stats: PipelineStats,
}

impl CompilationResult {
    /// A compilation succeeds when no error-severity diagnostic exists.
    pub fn is_success(&self) -> bool {
        !has_errors(&self.diagnostics)
    }
}

/// The compilation pipeline.
pub struct CompilationPipeline {
    config: PipelineConfig,
    stats: PipelineStats,
}

impl CompilationPipeline {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            stats: PipelineStats::default(),
        }
    }

    /// Compile an HIR module end to end.
    pub fn compile_module(&mut self, hir: &HirModule) -> CompilationResult {
        info!("compiling module '{}'", hir.name);
        self.stats = PipelineStats::default();
        let mut diagnostics = Vec::new();

        // Stage 1: lowering.
        let start = Instant::now();
        let (mut module, lowering_diags) = HirToMir::new().transform_module(hir);
        self.stats.lowering_time_us = start.elapsed().as_micros() as u64;
        diagnostics.extend(lowering_diags);

        let emitted = module.stats();
        self.stats.functions_lowered = emitted.function_count;
        self.stats.blocks_emitted = emitted.block_count;
        self.stats.instructions_emitted = emitted.instruction_count;

        // Stage 2: optimization.
        if self.config.optimize && !self.over_error_budget(&diagnostics) {
            let start = Instant::now();
            let result = PassManager::default_pipeline().run(&mut module);
            self.stats.optimization_time_us = start.elapsed().as_micros() as u64;
            self.stats.instructions_eliminated = result.instructions_eliminated;
            self.stats.blocks_eliminated = result.blocks_eliminated;
            self.stats.functions_pruned = result.functions_eliminated;
            debug!(
                "optimizer eliminated {} instructions, {} blocks, {} functions",
                result.instructions_eliminated,
                result.blocks_eliminated,
                result.functions_eliminated
            );
        }

        // Stage 3: structural validation (debugging aid).
        if self.config.validate_mir && !self.over_error_budget(&diagnostics) {
            diagnostics.extend(validation::validate_module(&module));
        }

        // Stage 4: memory-safety analyses.
        if !self.over_error_budget(&diagnostics) {
            let start = Instant::now();
            let mut engine = AnalysisEngine::with_config(SafetyConfig {
                enable_lifetime_analysis: self.config.enable_lifetime_analysis,
                enable_borrow_checking: self.config.enable_borrow_checking,
                enable_ownership_analysis: self.config.enable_ownership_analysis,
            });
            let report = engine.validate_module(&module);
            self.stats.analysis_time_us = start.elapsed().as_micros() as u64;
            diagnostics.extend(report.diagnostics);
        }

        self.stats.error_count = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        self.stats.warning_count = diagnostics.len() - self.stats.error_count;

        info!(
            "module '{}': {} errors, {} warnings",
            module.name, self.stats.error_count, self.stats.warning_count
        );

        CompilationResult {
            module,
            diagnostics,
            stats: self.stats.clone(),
        }
    }

    /// Statistics of the most recent compilation.
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    fn over_error_budget(&self, diagnostics: &[Diagnostic]) -> bool {
        diagnostics.len() >= self.config.max_errors
    }
}

impl Default for CompilationPipeline {
    fn default() -> Self {
        Self::new()
    }
}
