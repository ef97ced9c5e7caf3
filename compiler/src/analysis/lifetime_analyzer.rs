//! Lifetime Analysis
//!
//! Tracks symbolic validity intervals for MIR values. Lifetimes live in a
//! scope tree rooted at a pre-seeded static scope; function scopes hang off
//! the root and block scopes off their function. Scope containment drives
//! the outlives relation evaluated by the solver in
//! [`super::lifetime_solver`].
//!
//! `infer` walks a function and creates the lifetime implied by each
//! instruction: allocas get a `Local` lifetime at the function scope (a
//! slot lives as long as its frame), loads and call results get a `Temp`
//! lifetime at their block scope, and reference parameters get a `Local`
//! lifetime at the function scope. Loads additionally constrain the source
//! slot to outlive the loaded temporary.

use crate::diagnostics::Diagnostic;
use crate::ir::Function;
use crate::ir::Instruction;
use fxhash::FxHashMap;
use indexmap::IndexMap;
use log::debug;

/// Identifier of a lifetime record. Id 0 is always `'static`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LifetimeId(pub u32);

impl LifetimeId {
    pub fn static_lifetime() -> Self {
        Self(0)
    }
}

/// Identifier of a scope-tree node. Id 0 is always the root scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn root() -> Self {
        Self(0)
    }
}

/// Classification of a lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifetimeKind {
    /// The pre-seeded `'static` lifetime; outlives everything
    Static,
    /// Explicitly named lifetime
    Named,
    /// Lifetime of a local slot
    Local,
    /// Lifetime of a temporary
    Temp,
    /// Unnamed, otherwise unclassified lifetime
    Anon,
}

/// Where a lifetime came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifetimeOrigin {
    Parameter,
    LocalSlot,
    BorrowExpression,
    Return,
    Inferred,
}

/// A lifetime record.
#[derive(Debug, Clone)]
pub struct Lifetime {
    pub id: LifetimeId,
    pub kind: LifetimeKind,
    /// Source-level name for `Named` lifetimes
    pub name: Option<String>,
    pub scope: ScopeId,
    pub origin: LifetimeOrigin,
}

/// Constraint relating two lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// `from` is valid at least wherever `to` is valid
    Outlives,
    /// `from` and `to` are the same lifetime
    Equal,
    /// `from` is a subtype of `to`; reduces to Outlives
    Subtype,
}

/// A recorded lifetime constraint with a human-readable reason.
#[derive(Debug, Clone)]
pub struct LifetimeConstraint {
    pub kind: ConstraintKind,
    pub from: LifetimeId,
    pub to: LifetimeId,
    pub reason: String,
}

/// Kind of a scope-tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Function,
    Block,
}

/// A node of the scope tree.
#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    pub name: String,
}

/// Counters for reporting and tests.
#[derive(Debug, Clone, Default)]
pub struct LifetimeStats {
    pub lifetimes_created: usize,
    pub scopes_created: usize,
    pub constraints_added: usize,
    pub constraints_checked: usize,
    pub violations_found: usize,
}

/// The lifetime engine: scope tree, lifetime records, constraint list, and
/// an append-only error log filled by the solver.
pub struct LifetimeEngine {
    pub(crate) lifetimes: IndexMap<LifetimeId, Lifetime>,
    pub(crate) scopes: IndexMap<ScopeId, Scope>,
    named: FxHashMap<String, LifetimeId>,
    pub(crate) constraints: Vec<LifetimeConstraint>,

    /// Function name → its function scope
    function_scopes: FxHashMap<String, ScopeId>,
    /// (function, block label) → block scope
    block_scopes: FxHashMap<(String, String), ScopeId>,
    /// Function name → value name → lifetime
    value_lifetimes: FxHashMap<String, FxHashMap<String, LifetimeId>>,

    pub(crate) errors: Vec<Diagnostic>,
    pub stats: LifetimeStats,

    next_lifetime: u32,
    next_scope: u32,
}

impl LifetimeEngine {
    /// Create an engine with the root scope and `'static` pre-seeded.
    pub fn new() -> Self {
        let mut engine = Self {
            lifetimes: IndexMap::new(),
            scopes: IndexMap::new(),
            named: FxHashMap::default(),
            constraints: Vec::new(),
            function_scopes: FxHashMap::default(),
            block_scopes: FxHashMap::default(),
            value_lifetimes: FxHashMap::default(),
            errors: Vec::new(),
            stats: LifetimeStats::default(),
            next_lifetime: 0,
            next_scope: 0,
        };

        let root = ScopeId(engine.next_scope);
        engine.next_scope += 1;
        engine.scopes.insert(
            root,
            Scope {
                id: root,
                parent: None,
                kind: ScopeKind::Root,
                name: "static".to_string(),
            },
        );

        let statik = LifetimeId(engine.next_lifetime);
        engine.next_lifetime += 1;
        engine.lifetimes.insert(
            statik,
            Lifetime {
                id: statik,
                kind: LifetimeKind::Static,
                name: Some("static".to_string()),
                scope: root,
                origin: LifetimeOrigin::Inferred,
            },
        );
        engine.named.insert("static".to_string(), statik);

        engine
    }

    /// Create a scope under `parent`.
    pub fn create_scope(
        &mut self,
        kind: ScopeKind,
        parent: ScopeId,
        name: impl Into<String>,
    ) -> ScopeId {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        self.scopes.insert(
            id,
            Scope {
                id,
                parent: Some(parent),
                kind,
                name: name.into(),
            },
        );
        self.stats.scopes_created += 1;
        id
    }

    /// Create a fresh lifetime.
    pub fn create_lifetime(
        &mut self,
        kind: LifetimeKind,
        scope: ScopeId,
        origin: LifetimeOrigin,
    ) -> LifetimeId {
        let id = LifetimeId(self.next_lifetime);
        self.next_lifetime += 1;
        self.lifetimes.insert(
            id,
            Lifetime {
                id,
                kind,
                name: None,
                scope,
                origin,
            },
        );
        self.stats.lifetimes_created += 1;
        id
    }

    /// Create (or return the existing) lifetime with the given source
    /// name. Idempotent on the name.
    pub fn create_named(
        &mut self,
        name: &str,
        scope: ScopeId,
        origin: LifetimeOrigin,
    ) -> LifetimeId {
        if let Some(&id) = self.named.get(name) {
            return id;
        }
        let id = LifetimeId(self.next_lifetime);
        self.next_lifetime += 1;
        self.lifetimes.insert(
            id,
            Lifetime {
                id,
                kind: LifetimeKind::Named,
                name: Some(name.to_string()),
                scope,
                origin,
            },
        );
        self.named.insert(name.to_string(), id);
        self.stats.lifetimes_created += 1;
        id
    }

    /// Record a constraint between two lifetimes.
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        from: LifetimeId,
        to: LifetimeId,
        reason: impl Into<String>,
    ) {
        self.constraints.push(LifetimeConstraint {
            kind,
            from,
            to,
            reason: reason.into(),
        });
        self.stats.constraints_added += 1;
    }

    /// Look up a lifetime record.
    pub fn lifetime(&self, id: LifetimeId) -> Option<&Lifetime> {
        self.lifetimes.get(&id)
    }

    /// Look up a scope node.
    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(&id)
    }

    /// Whether scope `a` is `b` itself or one of `b`'s ancestors.
    pub fn is_ancestor_or_equal(&self, a: ScopeId, b: ScopeId) -> bool {
        let mut cursor = Some(b);
        while let Some(id) = cursor {
            if id == a {
                return true;
            }
            cursor = self.scopes.get(&id).and_then(|s| s.parent);
        }
        false
    }

    /// The function scope created by `infer` for a function, if any.
    pub fn function_scope(&self, function: &str) -> Option<ScopeId> {
        self.function_scopes.get(function).copied()
    }

    /// The block scope created by `infer` for a block, if any.
    pub fn block_scope(&self, function: &str, block: &str) -> Option<ScopeId> {
        self.block_scopes
            .get(&(function.to_string(), block.to_string()))
            .copied()
    }

    /// The lifetime inferred for a value, if any.
    pub fn value_lifetime(&self, function: &str, value: &str) -> Option<LifetimeId> {
        self.value_lifetimes
            .get(function)
            .and_then(|m| m.get(value))
            .copied()
    }

    /// Infer lifetimes for one function: a function scope, one block scope
    /// per block, and the per-instruction lifetimes described in the
    /// module docs.
    pub fn infer(&mut self, function: &Function) {
        debug!("inferring lifetimes for '{}'", function.name);

        let fn_scope =
            self.create_scope(ScopeKind::Function, ScopeId::root(), function.name.clone());
        self.function_scopes
            .insert(function.name.clone(), fn_scope);

        let mut values: FxHashMap<String, LifetimeId> = FxHashMap::default();

        for param in &function.params {
            if param.is_reference {
                let lt =
                    self.create_lifetime(LifetimeKind::Local, fn_scope, LifetimeOrigin::Parameter);
                values.insert(param.value.clone(), lt);
            }
        }

        for block in &function.blocks {
            let block_scope = self.create_scope(
                ScopeKind::Block,
                fn_scope,
                format!("{}::{}", function.name, block.label),
            );
            self.block_scopes
                .insert((function.name.clone(), block.label.clone()), block_scope);

            for instr in &block.instructions {
                match instr {
                    Instruction::Alloca { dst, .. } => {
                        // Slots live as long as the frame.
                        let lt = self.create_lifetime(
                            LifetimeKind::Local,
                            fn_scope,
                            LifetimeOrigin::LocalSlot,
                        );
                        values.insert(dst.clone(), lt);
                    }
                    Instruction::Load { dst, addr } => {
                        let lt = self.create_lifetime(
                            LifetimeKind::Temp,
                            block_scope,
                            LifetimeOrigin::Inferred,
                        );
                        values.insert(dst.clone(), lt);
                        if let Some(name) = addr.ref_name() {
                            if let Some(&src) = values.get(name) {
                                self.add_constraint(
                                    ConstraintKind::Outlives,
                                    src,
                                    lt,
                                    format!(
                                        "slot '{}' must outlive temporary '{}' loaded from it",
                                        name, dst
                                    ),
                                );
                            }
                        }
                    }
                    Instruction::Call { dst: Some(dst), .. } => {
                        let lt = self.create_lifetime(
                            LifetimeKind::Temp,
                            block_scope,
                            LifetimeOrigin::Inferred,
                        );
                        values.insert(dst.clone(), lt);
                    }
                    _ => {}
                }
            }
        }

        self.value_lifetimes.insert(function.name.clone(), values);
    }

    /// The accumulated error log.
    pub fn get_errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// Clear the error log.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }
}

impl Default for LifetimeEngine {
    fn default() -> Self {
        Self::new()
    }
}
