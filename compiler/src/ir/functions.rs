//! MIR Functions
//!
//! A function owns an ordered list of basic blocks (the first block is the
//! entry) plus the per-function name generators for values and block
//! labels. All counters are scoped to the function so independent
//! compilations of different functions never share naming state.

use super::{BasicBlock, Instruction, IrError, ValueClass};
use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// A function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Source-level name (e.g. `x`)
    pub name: String,

    /// MIR value name bound to the parameter (e.g. `%param_x`)
    pub value: String,

    /// Lowering-hint class derived from the declared type
    pub class: ValueClass,

    /// Whether the parameter is a reference; reference parameters acquire
    /// a function-scoped lifetime during analysis
    pub is_reference: bool,
}

/// MIR function representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// Function name, unique within the module
    pub name: String,

    /// Ordered parameter values
    pub params: Vec<Parameter>,

    /// Ordered basic blocks; the first block is the entry
    pub blocks: Vec<BasicBlock>,

    /// Next SSA value counter (`%v<n>`)
    next_value: u32,

    /// Per-prefix block label counters (`<prefix>_<n>`)
    block_counters: FxHashMap<String, u32>,

    /// All value names handed out so far; uniqueness is a hard invariant
    value_names: FxHashSet<String>,
}

impl Function {
    /// Create a new function with no parameters and no blocks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            blocks: Vec::new(),
            next_value: 0,
            block_counters: FxHashMap::default(),
            value_names: FxHashSet::default(),
        }
    }

    /// Add a parameter, registering its value name as `%param_<name>`.
    pub fn add_param(&mut self, name: impl Into<String>, class: ValueClass, is_reference: bool) {
        let name = name.into();
        let value = format!("%param_{}", name);
        self.value_names.insert(value.clone());
        self.params.push(Parameter {
            name,
            value,
            class,
            is_reference,
        });
    }

    /// Return a fresh anonymous value name, unique within this function.
    pub fn new_value_name(&mut self) -> String {
        loop {
            let candidate = format!("%v{}", self.next_value);
            self.next_value += 1;
            if self.value_names.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Return a value name derived from `base` (e.g. `x.addr` becomes
    /// `%x.addr`), de-duplicated with a numeric suffix when shadowed.
    pub fn new_named_value(&mut self, base: &str) -> String {
        let candidate = format!("%{}", base);
        if self.value_names.insert(candidate.clone()) {
            return candidate;
        }
        let mut n = 1u32;
        loop {
            let candidate = format!("%{}.{}", base, n);
            if self.value_names.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Create a new block labeled `<prefix>_<n>` with a monotonically
    /// increasing per-prefix counter, append it, and return its label.
    pub fn new_block(&mut self, prefix: &str) -> String {
        let counter = self.block_counters.entry(prefix.to_string()).or_insert(0);
        let label = format!("{}_{}", prefix, counter);
        *counter += 1;
        self.blocks.push(BasicBlock::new(label.clone()));
        label
    }

    /// Reserve a label without appending the block yet. Paired with
    /// [`Function::add_block`]; lowering uses this to name all blocks of a
    /// construct up front while controlling their placement order.
    pub fn new_block_name(&mut self, prefix: &str) -> String {
        let counter = self.block_counters.entry(prefix.to_string()).or_insert(0);
        let label = format!("{}_{}", prefix, counter);
        *counter += 1;
        label
    }

    /// Append a block with a previously reserved label.
    pub fn add_block(&mut self, label: impl Into<String>) -> Result<(), IrError> {
        let label = label.into();
        if self.block(&label).is_some() {
            return Err(IrError::DuplicateBlock { block: label });
        }
        self.blocks.push(BasicBlock::new(label));
        Ok(())
    }

    /// Look up a block by label.
    pub fn block(&self, label: &str) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.label == label)
    }

    /// Look up a block mutably by label.
    pub fn block_mut(&mut self, label: &str) -> Option<&mut BasicBlock> {
        self.blocks.iter_mut().find(|b| b.label == label)
    }

    /// The entry block, when the function has any blocks.
    pub fn entry_block(&self) -> Option<&BasicBlock> {
        self.blocks.first()
    }

    /// Append an instruction to the named block.
    pub fn append_to(&mut self, label: &str, instr: Instruction) -> Result<(), IrError> {
        let block = self.block_mut(label).ok_or_else(|| IrError::UnknownBlock {
            block: label.to_string(),
        })?;
        block.append(instr)
    }

    /// Total instruction count across all blocks.
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instructions.len()).sum()
    }

    /// All value names defined by instructions in this function, in block
    /// and instruction order.
    pub fn defined_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.params.iter().map(|p| p.value.as_str()).collect();
        for block in &self.blocks {
            for instr in &block.instructions {
                if let Some(dst) = instr.dst() {
                    names.push(dst);
                }
            }
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Value;

    #[test]
    fn test_value_names_are_unique() {
        let mut func = Function::new("f");
        let a = func.new_value_name();
        let b = func.new_value_name();
        assert_eq!(a, "%v0");
        assert_eq!(b, "%v1");

        let x = func.new_named_value("x.addr");
        let x2 = func.new_named_value("x.addr");
        assert_eq!(x, "%x.addr");
        assert_eq!(x2, "%x.addr.1");
    }

    #[test]
    fn test_block_names_per_prefix() {
        let mut func = Function::new("f");
        assert_eq!(func.new_block("entry"), "entry_0");
        assert_eq!(func.new_block("if_then"), "if_then_0");
        assert_eq!(func.new_block("if_cont"), "if_cont_0");
        assert_eq!(func.new_block("if_then"), "if_then_1");
        assert_eq!(func.blocks.len(), 4);
        assert_eq!(func.entry_block().unwrap().label, "entry_0");
    }

    #[test]
    fn test_append_to() {
        let mut func = Function::new("f");
        let entry = func.new_block("entry");
        func.append_to(&entry, Instruction::Ret { value: None })
            .unwrap();
        assert!(func.block(&entry).unwrap().is_terminated());

        let err = func.append_to(
            &entry,
            Instruction::Ret {
                value: Some(Value::int(1)),
            },
        );
        assert!(err.is_err());
        let err = func.append_to("nope", Instruction::Ret { value: None });
        assert_eq!(
            err,
            Err(IrError::UnknownBlock {
                block: "nope".to_string()
            })
        );
    }

    #[test]
    fn test_param_registration() {
        let mut func = Function::new("f");
        func.add_param("x", ValueClass::Int, false);
        assert_eq!(func.params[0].value, "%param_x");
        // The parameter name is reserved; a clashing named value gets a
        // suffix.
        assert_eq!(func.new_named_value("param_x"), "%param_x.1");
    }
}
