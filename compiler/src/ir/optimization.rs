//! MIR Optimization Passes
//!
//! Intra-function rewrites plus module-level pruning, organized as passes
//! behind a small pass manager. The default pipeline runs, per function and
//! in this order: constant propagation, dead-code elimination, basic-block
//! merging; then reachable-function pruning over the whole module. Passes
//! run once each, in sequence — pass order is part of the observable
//! contract.
//!
//! The optimizer never reports diagnostics. It only rewrites; an unsound
//! rewrite is a correctness bug.

use super::tree_shake;
use super::{BasicBlock, BinaryOp, Function, Instruction, Module, Value};
use fxhash::{FxHashMap, FxHashSet};
use log::debug;
use std::collections::HashMap;

/// Optimization pass trait.
pub trait OptimizationPass {
    /// Name of this pass, for logging and stats.
    fn name(&self) -> &'static str;

    /// Run the pass on a module. The default applies
    /// [`OptimizationPass::run_on_function`] to every function in order.
    fn run_on_module(&mut self, module: &mut Module) -> OptimizationResult {
        let mut result = OptimizationResult::unchanged();
        for function in module.functions.values_mut() {
            result = result.combine(self.run_on_function(function));
        }
        result
    }

    /// Run the pass on a single function.
    fn run_on_function(&mut self, _function: &mut Function) -> OptimizationResult {
        OptimizationResult::unchanged()
    }
}

/// Result of an optimization pass.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Whether the IR was modified
    pub modified: bool,

    /// Number of instructions eliminated
    pub instructions_eliminated: usize,

    /// Number of blocks eliminated
    pub blocks_eliminated: usize,

    /// Number of functions eliminated (module pruning)
    pub functions_eliminated: usize,

    /// Additional per-pass counters
    pub stats: HashMap<String, usize>,
}

impl OptimizationResult {
    pub fn unchanged() -> Self {
        Self {
            modified: false,
            instructions_eliminated: 0,
            blocks_eliminated: 0,
            functions_eliminated: 0,
            stats: HashMap::new(),
        }
    }

    pub fn combine(mut self, other: OptimizationResult) -> Self {
        self.modified |= other.modified;
        self.instructions_eliminated += other.instructions_eliminated;
        self.blocks_eliminated += other.blocks_eliminated;
        self.functions_eliminated += other.functions_eliminated;
        for (key, value) in other.stats {
            *self.stats.entry(key).or_insert(0) += value;
        }
        self
    }
}

/// Optimization pass manager.
pub struct PassManager {
    passes: Vec<Box<dyn OptimizationPass>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn add_pass<P: OptimizationPass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    /// The documented default sequence: constant propagation → DCE →
    /// block merging → module pruning.
    pub fn default_pipeline() -> Self {
        let mut manager = Self::new();
        manager.add_pass(ConstantPropagationPass::new());
        manager.add_pass(DeadCodeEliminationPass::new());
        manager.add_pass(BlockMergePass::new());
        manager.add_pass(ModulePrunePass::new());
        manager
    }

    /// Run every configured pass once, in order.
    pub fn run(&mut self, module: &mut Module) -> OptimizationResult {
        let mut total = OptimizationResult::unchanged();
        for pass in &mut self.passes {
            let result = pass.run_on_module(module);
            debug!(
                "pass '{}': modified={} instructions_eliminated={} blocks_eliminated={}",
                pass.name(),
                result.modified,
                result.instructions_eliminated,
                result.blocks_eliminated
            );
            total = total.combine(result);
        }
        total
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::default_pipeline()
    }
}

// ===========================================================================
// Constant propagation
// ===========================================================================

/// Block-local constant propagation and folding.
///
/// Maintains a `name → constant` map per block. Arithmetic over two
/// constants of the same numeric kind folds (two's-complement wrapping for
/// integers; integer division by zero never folds). A load from a slot
/// known to hold a constant propagates that constant. A store invalidates
/// every constant keyed by an address starting with the store target, then
/// records the stored constant; a call invalidates all slot constants,
/// since callees may write through escaped addresses.
///
/// Folded instructions are left in place with their results substituted
/// downstream; dead-code elimination removes them afterwards.
pub struct ConstantPropagationPass;

impl ConstantPropagationPass {
    pub fn new() -> Self {
        Self
    }

    fn fold_binop(op: BinaryOp, lhs: &Value, rhs: &Value) -> Option<Value> {
        match (lhs, rhs) {
            (Value::ConstInt(a), Value::ConstInt(b)) => {
                let v = match op {
                    BinaryOp::Add => a.wrapping_add(*b),
                    BinaryOp::Sub => a.wrapping_sub(*b),
                    BinaryOp::Mul => a.wrapping_mul(*b),
                    BinaryOp::Div => {
                        if *b == 0 {
                            return None;
                        }
                        a.wrapping_div(*b)
                    }
                };
                Some(Value::ConstInt(v))
            }
            (Value::ConstFloat(a), Value::ConstFloat(b)) => {
                let v = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                };
                Some(Value::ConstFloat(v))
            }
            _ => None,
        }
    }

    fn substitute_value(value: &mut Value, consts: &FxHashMap<String, Value>) {
        if let Some(name) = value.ref_name() {
            if let Some(constant) = consts.get(name) {
                *value = constant.clone();
            }
        }
    }

    // Substitute value operands only. Address operands of loads and stores
    // are locations, not values; slot constants flow through the load's
    // destination instead.
    fn substitute(instr: &mut Instruction, consts: &FxHashMap<String, Value>) {
        match instr {
            Instruction::BinOp { lhs, rhs, .. } | Instruction::Cmp { lhs, rhs, .. } => {
                Self::substitute_value(lhs, consts);
                Self::substitute_value(rhs, consts);
            }
            Instruction::Store { value, .. } => Self::substitute_value(value, consts),
            Instruction::Call { args, .. } => {
                for arg in args {
                    Self::substitute_value(arg, consts);
                }
            }
            Instruction::Ret { value: Some(v) } => Self::substitute_value(v, consts),
            Instruction::CondBr { cond, .. } => Self::substitute_value(cond, consts),
            _ => {}
        }
    }

    // Two maps with different keys: `consts` holds SSA results known to be
    // constant (safe to substitute anywhere the value is read), `slots`
    // holds slot contents keyed by address (only a load may consume these —
    // an address operand must never be replaced by the content behind it).
    fn run_on_block(&self, block: &mut BasicBlock) -> usize {
        let mut consts: FxHashMap<String, Value> = FxHashMap::default();
        let mut slots: FxHashMap<String, Value> = FxHashMap::default();
        let mut folded = 0;

        for instr in &mut block.instructions {
            Self::substitute(instr, &consts);

            match instr {
                Instruction::BinOp { dst, op, lhs, rhs } => {
                    if let Some(value) = Self::fold_binop(*op, lhs, rhs) {
                        consts.insert(dst.clone(), value);
                        folded += 1;
                    }
                }
                Instruction::Load { dst, addr } => {
                    if let Some(name) = addr.ref_name() {
                        if let Some(value) = slots.get(name).cloned() {
                            consts.insert(dst.clone(), value);
                        }
                    }
                }
                Instruction::Store { addr, value } => {
                    if let Some(name) = addr.ref_name() {
                        let target = name.to_string();
                        slots.retain(|key, _| !key.starts_with(target.as_str()));
                        if value.is_const() {
                            slots.insert(target, value.clone());
                        }
                    }
                }
                Instruction::Call { .. } => {
                    slots.clear();
                }
                _ => {}
            }
        }

        folded
    }
}

impl OptimizationPass for ConstantPropagationPass {
    fn name(&self) -> &'static str {
        "constant-propagation"
    }

    fn run_on_function(&mut self, function: &mut Function) -> OptimizationResult {
        let mut result = OptimizationResult::unchanged();
        let mut folds = 0;
        for block in &mut function.blocks {
            folds += self.run_on_block(block);
        }
        if folds > 0 {
            result.modified = true;
            result.stats.insert("constants_folded".to_string(), folds);
        }
        result
    }
}

// ===========================================================================
// Dead-code elimination
// ===========================================================================

/// Dead-code elimination.
///
/// Two criteria: (1) blocks unreachable from the entry are dropped;
/// (2) pure defining instructions (`BinOp`, `Load`, `Cmp`) whose result is
/// never used are dropped, iterating until no more fall out. Stores and
/// calls are never removed — calls carry no purity information here, so
/// their effects are treated as visible. Terminators have no destination
/// and are never candidates.
pub struct DeadCodeEliminationPass;

impl DeadCodeEliminationPass {
    pub fn new() -> Self {
        Self
    }

    fn reachable_blocks(function: &Function) -> FxHashSet<String> {
        let mut reachable = FxHashSet::default();
        let mut worklist: Vec<&str> = Vec::new();
        if let Some(entry) = function.entry_block() {
            worklist.push(entry.label.as_str());
        }
        while let Some(label) = worklist.pop() {
            if !reachable.insert(label.to_string()) {
                continue;
            }
            if let Some(block) = function.block(label) {
                for succ in block.successors() {
                    if !reachable.contains(succ) {
                        worklist.push(succ);
                    }
                }
            }
        }
        reachable
    }

    fn used_names(function: &Function) -> FxHashSet<String> {
        let mut used = FxHashSet::default();
        for block in &function.blocks {
            for instr in &block.instructions {
                for name in instr.used_names() {
                    used.insert(name.to_string());
                }
            }
        }
        used
    }

    fn is_droppable(instr: &Instruction) -> bool {
        matches!(
            instr,
            Instruction::BinOp { .. } | Instruction::Load { .. } | Instruction::Cmp { .. }
        )
    }
}

impl OptimizationPass for DeadCodeEliminationPass {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn run_on_function(&mut self, function: &mut Function) -> OptimizationResult {
        let mut result = OptimizationResult::unchanged();

        // 1. Unreachable-block pruning.
        let reachable = Self::reachable_blocks(function);
        let before = function.blocks.len();
        function.blocks.retain(|b| reachable.contains(&b.label));
        result.blocks_eliminated = before - function.blocks.len();

        // 2. Unused pure definitions, to a fixpoint: removing one def can
        // strand the defs feeding it.
        loop {
            let used = Self::used_names(function);
            let mut removed = 0;
            for block in &mut function.blocks {
                let before = block.instructions.len();
                block.instructions.retain(|instr| match instr.dst() {
                    Some(dst) if Self::is_droppable(instr) => used.contains(dst),
                    _ => true,
                });
                removed += before - block.instructions.len();
            }
            result.instructions_eliminated += removed;
            if removed == 0 {
                break;
            }
        }

        result.modified = result.blocks_eliminated > 0 || result.instructions_eliminated > 0;
        result
    }
}

// ===========================================================================
// Block merging
// ===========================================================================

/// Basic-block merging.
///
/// Repeats until fixpoint: for a block `A` ending in `br B` where `B` has
/// exactly one predecessor (`A`), `B`'s instructions are concatenated onto
/// `A` in place of the branch, every remaining reference to `B` is
/// rewritten to `A`, and `B` is removed. The entry block is never merged
/// away.
pub struct BlockMergePass;

impl BlockMergePass {
    pub fn new() -> Self {
        Self
    }

    fn predecessor_counts(function: &Function) -> FxHashMap<String, usize> {
        let mut counts: FxHashMap<String, usize> = FxHashMap::default();
        for block in &function.blocks {
            for succ in block.successors() {
                *counts.entry(succ.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Find the first (in block order) merge candidate `(A, B)`.
    fn find_candidate(function: &Function) -> Option<(String, String)> {
        let entry = function.entry_block()?.label.clone();
        let counts = Self::predecessor_counts(function);
        for block in &function.blocks {
            if let Some(Instruction::Br { target }) = block.terminator() {
                if *target != block.label
                    && *target != entry
                    && counts.get(target).copied().unwrap_or(0) == 1
                {
                    return Some((block.label.clone(), target.clone()));
                }
            }
        }
        None
    }

    fn merge(function: &mut Function, a: &str, b: &str) {
        let Some(b_idx) = function.blocks.iter().position(|blk| blk.label == b) else {
            return;
        };
        let merged = function.blocks.remove(b_idx);

        if let Some(a_block) = function.block_mut(a) {
            a_block.take_terminator();
            a_block.instructions.extend(merged.instructions);
        }

        // Every remaining reference to B now means A.
        for block in &mut function.blocks {
            for instr in &mut block.instructions {
                instr.rewrite_target(b, a);
            }
        }
    }
}

impl OptimizationPass for BlockMergePass {
    fn name(&self) -> &'static str {
        "block-merging"
    }

    fn run_on_function(&mut self, function: &mut Function) -> OptimizationResult {
        let mut result = OptimizationResult::unchanged();
        while let Some((a, b)) = Self::find_candidate(function) {
            Self::merge(function, &a, &b);
            result.blocks_eliminated += 1;
            // The replaced `br` no longer exists.
            result.instructions_eliminated += 1;
        }
        result.modified = result.blocks_eliminated > 0;
        result
    }
}

// ===========================================================================
// Module pruning
// ===========================================================================

/// Reachable-function pruning over the whole module; see
/// [`tree_shake::prune_module`].
pub struct ModulePrunePass;

impl ModulePrunePass {
    pub fn new() -> Self {
        Self
    }
}

impl OptimizationPass for ModulePrunePass {
    fn name(&self) -> &'static str {
        "module-pruning"
    }

    fn run_on_module(&mut self, module: &mut Module) -> OptimizationResult {
        let stats = tree_shake::prune_module(module);
        let mut result = OptimizationResult::unchanged();
        result.functions_eliminated = stats.functions_removed;
        result.modified = stats.functions_removed > 0;
        result
    }
}
