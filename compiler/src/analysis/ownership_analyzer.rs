//! Ownership Tracking
//!
//! Per-value ownership state machine with move/copy/drop semantics.
//! Every tracked value is in one of the states `Uninitialized → Owned →
//! {Moved | Borrowed | Dropped}` (plus `Invalid` for poisoned values), and
//! each instruction's operands are checked for accessibility before the
//! instruction's own transitions are applied:
//!
//! - an alloca establishes an `Owned` slot with the default trait flags;
//! - loads and stores require their slot to be in an accessible state;
//! - a call conservatively moves `Owned`, non-`Copy` arguments — no
//!   per-callee signatures exist at this level;
//! - returning a value moves it, regardless of `Copy`.
//!
//! When a function's walk completes, slots still owned are dropped in
//! reverse allocation order, recording `Drop`-kind move operations.

use super::lifetime_analyzer::{LifetimeEngine, LifetimeId};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Point, Stage};
use crate::ir::{Function, Instruction};
use fxhash::FxHashMap;
use indexmap::IndexMap;
use log::{debug, trace};

/// Identifier of an ownership record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnershipId(pub u32);

/// Identifier of a move record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MoveId(pub u32);

/// Kind of ownership relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipKind {
    Owned,
    Borrowed,
    Mutable,
    Shared,
    Weak,
}

/// Trait flags attached to an ownership record. Move/copy decisions are a
/// policy over these flags, not a type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraitFlags {
    pub copy: bool,
    pub clone: bool,
    pub drop: bool,
    pub send: bool,
    pub sync: bool,
    pub unpin: bool,
    pub sized: bool,
}

impl TraitFlags {
    /// Defaults for a freshly allocated local slot.
    pub fn default_local() -> Self {
        Self {
            copy: false,
            clone: true,
            drop: true,
            send: true,
            sync: false,
            unpin: true,
            sized: true,
        }
    }
}

/// Per-value ownership state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipState {
    Uninitialized,
    Owned,
    Moved,
    Borrowed,
    Dropped,
    Invalid,
}

/// Where an ownership record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipOrigin {
    Alloca,
    Parameter,
    CallResult,
    External,
}

/// An ownership record.
#[derive(Debug, Clone)]
pub struct Ownership {
    pub id: OwnershipId,
    pub kind: OwnershipKind,
    /// The owning context (the function for locals)
    pub owner: String,
    /// The owned value
    pub owned: String,
    pub lifetime: LifetimeId,
    pub traits: TraitFlags,
    pub state: OwnershipState,
    pub origin: OwnershipOrigin,
}

/// Kind of a move operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveKind {
    Explicit,
    Implicit,
    Return,
    Call,
    Drop,
}

/// A recorded move operation.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    pub id: MoveId,
    pub kind: MoveKind,
    pub from: String,
    pub to: Option<String>,
    pub point: Point,
    pub ownership: Option<OwnershipId>,
}

/// Context in which a move/copy decision is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveContext {
    Assignment,
    CallArg,
    Return,
    ExplicitMove,
}

/// Counters for reporting and tests.
#[derive(Debug, Clone, Default)]
pub struct OwnershipStats {
    pub ownerships_created: usize,
    pub moves_recorded: usize,
    pub drops_recorded: usize,
    pub violations_found: usize,
}

/// The ownership engine: records, move log, per-value states, and an
/// append-only error log.
pub struct OwnershipEngine {
    ownerships: IndexMap<OwnershipId, Ownership>,
    moves: IndexMap<MoveId, MoveRecord>,

    /// Per-function working state, reset by `check_function`
    value_state: FxHashMap<String, OwnershipState>,
    value_ownership: FxHashMap<String, OwnershipId>,
    /// Slot allocation order, for reverse-order drops at function exit
    alloc_order: Vec<String>,

    /// Value names whose records are created with the `Copy` trait set;
    /// stands in for the type information a later phase will carry
    copy_values: fxhash::FxHashSet<String>,

    errors: Vec<Diagnostic>,
    pub stats: OwnershipStats,

    next_ownership: u32,
    next_move: u32,
}

impl OwnershipEngine {
    pub fn new() -> Self {
        Self {
            ownerships: IndexMap::new(),
            moves: IndexMap::new(),
            value_state: FxHashMap::default(),
            value_ownership: FxHashMap::default(),
            alloc_order: Vec::new(),
            copy_values: fxhash::FxHashSet::default(),
            errors: Vec::new(),
            stats: OwnershipStats::default(),
            next_ownership: 0,
            next_move: 0,
        }
    }

    /// Current state of a value, if tracked.
    pub fn state(&self, value: &str) -> Option<OwnershipState> {
        self.value_state.get(value).copied()
    }

    /// Look up an ownership record.
    pub fn ownership(&self, id: OwnershipId) -> Option<&Ownership> {
        self.ownerships.get(&id)
    }

    /// Recorded move operations, in recording order.
    pub fn move_records(&self) -> impl Iterator<Item = &MoveRecord> {
        self.moves.values()
    }

    /// Whether the value's traits permit copying.
    pub fn can_copy(&self, value: &str) -> bool {
        self.value_ownership
            .get(value)
            .and_then(|id| self.ownerships.get(id))
            .map(|o| o.traits.copy)
            .unwrap_or(false)
    }

    /// Move/copy policy: moving is the default; `Copy` values prefer a
    /// copy for assignments and call arguments but still move for returns
    /// and explicit moves.
    pub fn should_move(&self, value: &str, context: MoveContext) -> bool {
        match context {
            MoveContext::Assignment | MoveContext::CallArg => !self.can_copy(value),
            MoveContext::Return | MoveContext::ExplicitMove => true,
        }
    }

    /// Record an explicit move of `from` (into `to`, when given): `from`
    /// becomes `Moved`, `to` becomes `Owned`.
    pub fn create_move(
        &mut self,
        from: impl Into<String>,
        to: Option<String>,
        kind: MoveKind,
        point: Point,
    ) -> MoveId {
        let from = from.into();
        let id = MoveId(self.next_move);
        self.next_move += 1;

        self.set_state(&from, OwnershipState::Moved);
        if let Some(to) = &to {
            self.set_state(to, OwnershipState::Owned);
        }

        let ownership = self.value_ownership.get(&from).copied();
        self.moves.insert(
            id,
            MoveRecord {
                id,
                kind,
                from,
                to,
                point,
                ownership,
            },
        );
        self.stats.moves_recorded += 1;
        id
    }

    /// Drop a value. Dropping a moved value or dropping twice is an
    /// error; a successful drop transitions the value to `Dropped`.
    pub fn create_drop(&mut self, value: &str, point: Point) {
        match self.state(value) {
            Some(OwnershipState::Moved) => {
                self.violation(
                    DiagnosticKind::DropOfMoved,
                    format!("drop of moved value '{}'", value),
                    Some(point),
                );
            }
            Some(OwnershipState::Dropped) => {
                self.violation(
                    DiagnosticKind::DoubleDrop,
                    format!("double drop of value '{}'", value),
                    Some(point),
                );
            }
            _ => {
                self.set_state(value, OwnershipState::Dropped);
                let id = MoveId(self.next_move);
                self.next_move += 1;
                let ownership = self.value_ownership.get(value).copied();
                self.moves.insert(
                    id,
                    MoveRecord {
                        id,
                        kind: MoveKind::Drop,
                        from: value.to_string(),
                        to: None,
                        point,
                        ownership,
                    },
                );
                self.stats.drops_recorded += 1;
            }
        }
    }

    /// Walk one function, checking operand accessibility and applying the
    /// per-instruction ownership transitions. The lifetime engine supplies
    /// inferred lifetimes for the created records.
    pub fn check_function(&mut self, function: &Function, lifetimes: &LifetimeEngine) {
        debug!("tracking ownership in '{}'", function.name);
        self.value_state.clear();
        self.value_ownership.clear();
        self.alloc_order.clear();

        for param in &function.params {
            let kind = if param.is_reference {
                OwnershipKind::Borrowed
            } else {
                OwnershipKind::Owned
            };
            self.create_record(
                function,
                lifetimes,
                &param.value,
                kind,
                OwnershipOrigin::Parameter,
            );
            self.value_state
                .insert(param.value.clone(), OwnershipState::Owned);
        }

        for block in &function.blocks {
            for (idx, instr) in block.instructions.iter().enumerate() {
                let point = Point::new(&function.name, &block.label, idx);
                self.step(function, lifetimes, instr, point);
            }
        }

        self.drop_remaining(function);
    }

    fn step(
        &mut self,
        function: &Function,
        lifetimes: &LifetimeEngine,
        instr: &Instruction,
        point: Point,
    ) {
        match instr {
            Instruction::Alloca { dst, .. } => {
                self.create_record(
                    function,
                    lifetimes,
                    dst,
                    OwnershipKind::Owned,
                    OwnershipOrigin::Alloca,
                );
                self.value_state.insert(dst.clone(), OwnershipState::Owned);
                self.alloc_order.push(dst.clone());
            }
            Instruction::Load { dst, addr } => {
                if let Some(name) = addr.ref_name() {
                    self.check_accessible(name, &point);
                }
                self.value_state.insert(dst.clone(), OwnershipState::Owned);
            }
            Instruction::Store { addr, value } => {
                if let Some(name) = addr.ref_name() {
                    match self.state(name) {
                        Some(OwnershipState::Moved) => self.violation(
                            DiagnosticKind::StoreToMoved,
                            format!("store to moved value '{}'", name),
                            Some(point.clone()),
                        ),
                        Some(OwnershipState::Dropped) => self.violation(
                            DiagnosticKind::StoreToDropped,
                            format!("store to dropped value '{}'", name),
                            Some(point.clone()),
                        ),
                        Some(OwnershipState::Invalid) => self.violation(
                            DiagnosticKind::UseInvalid,
                            format!("store to invalid value '{}'", name),
                            Some(point.clone()),
                        ),
                        // Uninitialized, Owned and Borrowed slots are
                        // legal store targets.
                        _ => {}
                    }
                }
                if let Some(src) = value.ref_name() {
                    let accessible = self.check_accessible(src, &point);
                    if accessible
                        && self.state(src) == Some(OwnershipState::Owned)
                        && self.should_move(src, MoveContext::Assignment)
                    {
                        let to = addr.ref_name().map(|s| s.to_string());
                        self.create_move(src, to, MoveKind::Implicit, point.clone());
                    }
                }
                if let Some(name) = addr.ref_name() {
                    if self.state(name) != Some(OwnershipState::Invalid) {
                        self.value_state
                            .insert(name.to_string(), OwnershipState::Owned);
                    }
                }
            }
            Instruction::BinOp { lhs, rhs, .. } | Instruction::Cmp { lhs, rhs, .. } => {
                for operand in [lhs, rhs] {
                    if let Some(name) = operand.ref_name() {
                        self.check_accessible(name, &point);
                    }
                }
            }
            Instruction::Call { dst, args, .. } => {
                for arg in args {
                    if let Some(name) = arg.ref_name() {
                        let accessible = self.check_accessible(name, &point);
                        if accessible
                            && self.state(name) == Some(OwnershipState::Owned)
                            && self.should_move(name, MoveContext::CallArg)
                        {
                            trace!("call moves argument '{}'", name);
                            self.create_move(name, None, MoveKind::Call, point.clone());
                        }
                    }
                }
                if let Some(dst) = dst {
                    self.create_record(
                        function,
                        lifetimes,
                        dst,
                        OwnershipKind::Owned,
                        OwnershipOrigin::CallResult,
                    );
                    self.value_state.insert(dst.clone(), OwnershipState::Owned);
                }
            }
            Instruction::Ret { value: Some(value) } => {
                if let Some(name) = value.ref_name() {
                    let accessible = self.check_accessible(name, &point);
                    if accessible && self.state(name) == Some(OwnershipState::Owned) {
                        self.create_move(name, None, MoveKind::Return, point);
                    }
                }
            }
            Instruction::CondBr { cond, .. } => {
                if let Some(name) = cond.ref_name() {
                    self.check_accessible(name, &point);
                }
            }
            _ => {}
        }
    }

    /// Scope-exit drops: slots still owned at the end of the walk are
    /// dropped in reverse allocation order.
    fn drop_remaining(&mut self, function: &Function) {
        let Some(last) = function.blocks.last() else {
            return;
        };
        let point = Point::new(&function.name, &last.label, last.instructions.len());

        let remaining: Vec<String> = self
            .alloc_order
            .iter()
            .rev()
            .filter(|name| self.state(name) == Some(OwnershipState::Owned))
            .cloned()
            .collect();
        for name in remaining {
            trace!("scope-exit drop of '{}'", name);
            self.create_drop(&name, point.clone());
        }
    }

    // Reports at most one violation per use; the instruction's transition
    // is skipped for inaccessible operands.
    fn check_accessible(&mut self, value: &str, point: &Point) -> bool {
        match self.state(value) {
            Some(OwnershipState::Moved) => {
                self.violation(
                    DiagnosticKind::UseAfterMove,
                    format!("use of moved value '{}'", value),
                    Some(point.clone()),
                );
                false
            }
            Some(OwnershipState::Dropped) => {
                self.violation(
                    DiagnosticKind::UseAfterDrop,
                    format!("use of dropped value '{}'", value),
                    Some(point.clone()),
                );
                false
            }
            Some(OwnershipState::Invalid) => {
                self.violation(
                    DiagnosticKind::UseInvalid,
                    format!("use of invalid value '{}'", value),
                    Some(point.clone()),
                );
                false
            }
            _ => true,
        }
    }

    fn create_record(
        &mut self,
        function: &Function,
        lifetimes: &LifetimeEngine,
        value: &str,
        kind: OwnershipKind,
        origin: OwnershipOrigin,
    ) -> OwnershipId {
        let id = OwnershipId(self.next_ownership);
        self.next_ownership += 1;
        let lifetime = lifetimes
            .value_lifetime(&function.name, value)
            .unwrap_or_else(LifetimeId::static_lifetime);
        let mut traits = TraitFlags::default_local();
        traits.copy = self.copy_values.contains(value);
        self.ownerships.insert(
            id,
            Ownership {
                id,
                kind,
                owner: function.name.clone(),
                owned: value.to_string(),
                lifetime,
                traits,
                state: OwnershipState::Owned,
                origin,
            },
        );
        self.value_ownership.insert(value.to_string(), id);
        self.stats.ownerships_created += 1;
        id
    }

    fn set_state(&mut self, value: &str, state: OwnershipState) {
        self.value_state.insert(value.to_string(), state);
        if let Some(id) = self.value_ownership.get(value) {
            if let Some(record) = self.ownerships.get_mut(id) {
                record.state = state;
            }
        }
    }

    /// Mark a value's trait flags; used by embedders and tests to model
    /// `Copy` types.
    pub fn set_traits(&mut self, value: &str, traits: TraitFlags) {
        if let Some(id) = self.value_ownership.get(value) {
            if let Some(record) = self.ownerships.get_mut(id) {
                record.traits = traits;
            }
        }
    }

    /// Pre-mark a value name as `Copy`: records created for it get the
    /// `Copy` trait flag. Stands in for the type information a later
    /// phase will carry.
    pub fn mark_copy(&mut self, value: impl Into<String>) {
        self.copy_values.insert(value.into());
    }

    fn violation(&mut self, kind: DiagnosticKind, message: String, point: Option<Point>) {
        self.errors
            .push(Diagnostic::error(Stage::Ownership, kind, message, point));
        self.stats.violations_found += 1;
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

impl Default for OwnershipEngine {
    fn default() -> Self {
        Self::new()
    }
}
