//! Module-level reachable-function pruning.
//!
//! Removes functions that can never execute. Reachability is seeded with
//! `main` when the module has one; a module without `main` is treated as a
//! library and keeps every function. Only direct (named) call targets are
//! followed — indirect calls contribute no additional reachability at this
//! level.

use super::{Callee, Instruction, Module};
use fxhash::FxHashSet;
use log::debug;

/// Statistics from module pruning.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TreeShakeStats {
    pub functions_removed: usize,
    pub functions_kept: usize,
}

/// Prune unreachable functions from a module.
pub fn prune_module(module: &mut Module) -> TreeShakeStats {
    let mut stats = TreeShakeStats::default();

    if module.function("main").is_none() {
        // Library mode: every function is a potential entry point.
        stats.functions_kept = module.functions.len();
        return stats;
    }

    let mut reachable: FxHashSet<String> = FxHashSet::default();
    let mut worklist: Vec<String> = vec!["main".to_string()];

    while let Some(name) = worklist.pop() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        let Some(function) = module.function(&name) else {
            continue;
        };
        for block in &function.blocks {
            for instr in &block.instructions {
                if let Instruction::Call {
                    callee: Callee::Named(callee),
                    ..
                } = instr
                {
                    if !reachable.contains(callee) {
                        worklist.push(callee.clone());
                    }
                }
            }
        }
    }

    let before = module.functions.len();
    module.functions.retain(|name, _| reachable.contains(name));
    stats.functions_removed = before - module.functions.len();
    stats.functions_kept = module.functions.len();

    if stats.functions_removed > 0 {
        debug!(
            "pruned {} unreachable functions from module '{}'",
            stats.functions_removed, module.name
        );
    }

    stats
}
