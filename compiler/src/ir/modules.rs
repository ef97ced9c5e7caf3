//! MIR Modules
//!
//! The top-level compilation unit: a named, ordered container of functions.
//! Function order is insertion order and is observable (dump order,
//! analysis order), so the table is an `IndexMap` rather than a hash map.

use super::Function;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// MIR module — a named container of functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Module name
    pub name: String,

    /// Functions in insertion order, keyed by name
    pub functions: IndexMap<String, Function>,
}

/// Module statistics, used by the pipeline's reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleStats {
    pub function_count: usize,
    pub block_count: usize,
    pub instruction_count: usize,
}

impl Module {
    /// Create a new, empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: IndexMap::new(),
        }
    }

    /// Add a function, keyed by its name. A function with the same name
    /// replaces the previous definition.
    pub fn add_function(&mut self, function: Function) {
        self.functions.insert(function.name.clone(), function);
    }

    /// Look up a function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    /// Look up a function mutably by name.
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.get_mut(name)
    }

    /// Compute summary statistics.
    pub fn stats(&self) -> ModuleStats {
        ModuleStats {
            function_count: self.functions.len(),
            block_count: self.functions.values().map(|f| f.blocks.len()).sum(),
            instruction_count: self
                .functions
                .values()
                .map(|f| f.instruction_count())
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_preserves_insertion_order() {
        let mut module = Module::new("m");
        module.add_function(Function::new("zeta"));
        module.add_function(Function::new("alpha"));
        module.add_function(Function::new("main"));

        let names: Vec<&str> = module.functions.keys().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "main"]);
        assert!(module.function("alpha").is_some());
        assert!(module.function("missing").is_none());
    }

    #[test]
    fn test_stats() {
        let mut module = Module::new("m");
        let mut f = Function::new("f");
        let entry = f.new_block("entry");
        f.append_to(&entry, crate::ir::Instruction::Ret { value: None })
            .unwrap();
        module.add_function(f);

        let stats = module.stats();
        assert_eq!(stats.function_count, 1);
        assert_eq!(stats.block_count, 1);
        assert_eq!(stats.instruction_count, 1);
    }
}
