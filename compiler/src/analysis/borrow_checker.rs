//! Borrow Checking
//!
//! Tracks borrow records keyed to MIR values and enforces the borrowing
//! rules: aliasing XOR mutability, and lifetime validity of each borrow.
//!
//! `check_function` replays a function instruction by instruction. Each
//! instruction is first checked against the currently active borrows and
//! then applies its implicit borrow events:
//!
//! - a load checks for an active mutable borrow of its source, then
//!   creates an immutable borrow of the source with a fresh `Temp`
//!   lifetime;
//! - a store checks for any active borrow of its target, then invalidates
//!   the active immutable borrows of that target;
//! - a call checks each reference argument against active mutable borrows,
//!   then creates an immutable borrow per reference argument;
//! - binary-operation operands follow the usage rule: an active mutable
//!   borrow rejects the read.
//!
//! A borrow with an attached region is only active at points inside that
//! region; a borrow without one is conservatively active function-wide.

use super::lifetime_analyzer::{LifetimeEngine, LifetimeId, LifetimeKind, LifetimeOrigin, ScopeId};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Point, Stage};
use crate::ir::{Function, Instruction};
use fxhash::FxHashMap;
use indexmap::IndexMap;
use log::{debug, trace};
use smallvec::SmallVec;

/// Identifier of a borrow record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BorrowId(pub u32);

/// Kind of borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowKind {
    Immutable,
    Mutable,
    Shared,
}

/// Where a borrow came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowOrigin {
    /// Implicit immutable borrow created by a load
    Load,
    /// Implicit immutable borrow of a call's reference argument
    CallArgument,
    /// Borrow created explicitly through the engine API
    Explicit,
}

/// Kind of region granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Statement,
    Block,
    Function,
}

/// A region of program points within one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub start: Point,
    pub end: Point,
    pub kind: RegionKind,
}

impl Region {
    /// Whether `point` falls inside this region: same function, the block
    /// of the region start, and a statement index between start and end
    /// inclusive.
    pub fn contains(&self, point: &Point) -> bool {
        point.function == self.start.function
            && point.block == self.start.block
            && self.start.stmt <= point.stmt
            && point.stmt <= self.end.stmt
    }
}

/// A borrow record.
#[derive(Debug, Clone)]
pub struct Borrow {
    pub id: BorrowId,
    pub kind: BorrowKind,
    /// The borrowed value
    pub borrowed: String,
    /// The value holding the borrow
    pub borrower: String,
    pub lifetime: LifetimeId,
    pub region: Option<Region>,
    pub origin: BorrowOrigin,
    /// Cleared when the borrow is invalidated
    pub active: bool,
}

/// Counters for reporting and tests.
#[derive(Debug, Clone, Default)]
pub struct BorrowStats {
    pub borrows_created: usize,
    pub borrows_invalidated: usize,
    pub conflicts_found: usize,
}

/// The borrow engine: borrow records, per-value active lists, and an
/// append-only error log.
pub struct BorrowEngine {
    borrows: IndexMap<BorrowId, Borrow>,
    /// value name → active borrow ids, in creation order
    active: FxHashMap<String, SmallVec<[BorrowId; 4]>>,
    errors: Vec<Diagnostic>,
    pub stats: BorrowStats,
    next_borrow: u32,
}

impl BorrowEngine {
    pub fn new() -> Self {
        Self {
            borrows: IndexMap::new(),
            active: FxHashMap::default(),
            errors: Vec::new(),
            stats: BorrowStats::default(),
            next_borrow: 0,
        }
    }

    /// Create a borrow of `borrowed` held by `borrower` and add it to the
    /// active list.
    pub fn create_borrow(
        &mut self,
        kind: BorrowKind,
        borrowed: impl Into<String>,
        borrower: impl Into<String>,
        lifetime: LifetimeId,
        origin: BorrowOrigin,
        region: Option<Region>,
    ) -> BorrowId {
        let id = BorrowId(self.next_borrow);
        self.next_borrow += 1;
        let borrowed = borrowed.into();
        self.borrows.insert(
            id,
            Borrow {
                id,
                kind,
                borrowed: borrowed.clone(),
                borrower: borrower.into(),
                lifetime,
                region,
                origin,
                active: true,
            },
        );
        self.active.entry(borrowed).or_default().push(id);
        self.stats.borrows_created += 1;
        id
    }

    /// Remove a borrow from the active set.
    pub fn invalidate(&mut self, id: BorrowId, point: &Point) {
        if let Some(borrow) = self.borrows.get_mut(&id) {
            if borrow.active {
                trace!(
                    "invalidating borrow of '{}' at {}",
                    borrow.borrowed,
                    point
                );
                borrow.active = false;
                self.stats.borrows_invalidated += 1;
                if let Some(list) = self.active.get_mut(&borrow.borrowed) {
                    list.retain(|b| *b != id);
                }
            }
        }
    }

    /// Look up a borrow record.
    pub fn borrow(&self, id: BorrowId) -> Option<&Borrow> {
        self.borrows.get(&id)
    }

    /// Ids of borrows of `value` active at `point`, respecting regions.
    pub fn active_borrows_at(&self, value: &str, point: &Point) -> SmallVec<[BorrowId; 4]> {
        let Some(list) = self.active.get(value) else {
            return SmallVec::new();
        };
        list.iter()
            .copied()
            .filter(|id| {
                self.borrows
                    .get(id)
                    .map(|b| match &b.region {
                        Some(region) => region.contains(point),
                        None => true,
                    })
                    .unwrap_or(false)
            })
            .collect()
    }

    fn has_active_of_kind(&self, value: &str, point: &Point, kind: BorrowKind) -> bool {
        self.active_borrows_at(value, point)
            .iter()
            .any(|id| self.borrows.get(id).map(|b| b.kind == kind).unwrap_or(false))
    }

    /// Replay one function, checking each instruction against the active
    /// borrows and then applying its implicit borrow events. The lifetime
    /// engine supplies scopes for the fresh `Temp` lifetimes of implicit
    /// borrows.
    pub fn check_function(&mut self, function: &Function, lifetimes: &mut LifetimeEngine) {
        debug!("borrow-checking '{}'", function.name);
        // Implicit borrows carry regions and are therefore inert at points
        // of other functions; explicit region-less borrows stay active for
        // the function they were created against.
        for block in &function.blocks {
            let scope = lifetimes
                .block_scope(&function.name, &block.label)
                .unwrap_or_else(ScopeId::root);
            let block_end = block.instructions.len().saturating_sub(1);

            for (idx, instr) in block.instructions.iter().enumerate() {
                let point = Point::new(&function.name, &block.label, idx);
                self.check_instruction(instr, &point);
                self.analyze(instr, &point, block_end, scope, lifetimes);
            }
        }
    }

    // Conflict checks run before the instruction's own events so a borrow
    // created by an instruction never conflicts with itself.
    fn check_instruction(&mut self, instr: &Instruction, point: &Point) {
        match instr {
            Instruction::Load { addr, .. } => {
                if let Some(name) = addr.ref_name() {
                    if self.has_active_of_kind(name, point, BorrowKind::Mutable) {
                        self.conflict(
                            DiagnosticKind::BorrowConflictLoad,
                            format!("load from '{}' while it is mutably borrowed", name),
                            point,
                        );
                    }
                }
            }
            Instruction::Store { addr, .. } => {
                if let Some(name) = addr.ref_name() {
                    if self.has_active_of_kind(name, point, BorrowKind::Immutable)
                        || self.has_active_of_kind(name, point, BorrowKind::Shared)
                    {
                        self.conflict(
                            DiagnosticKind::BorrowConflictStoreImm,
                            format!("store to '{}' while it is immutably borrowed", name),
                            point,
                        );
                    }
                    if self.has_active_of_kind(name, point, BorrowKind::Mutable) {
                        self.conflict(
                            DiagnosticKind::BorrowConflictStoreMut,
                            format!("store to '{}' while it is mutably borrowed", name),
                            point,
                        );
                    }
                }
            }
            Instruction::Call { args, .. } => {
                for arg in args {
                    if let Some(name) = arg.ref_name() {
                        if self.has_active_of_kind(name, point, BorrowKind::Mutable) {
                            self.conflict(
                                DiagnosticKind::BorrowConflictCallArg,
                                format!(
                                    "'{}' passed to call while it is mutably borrowed",
                                    name
                                ),
                                point,
                            );
                        }
                    }
                }
            }
            Instruction::BinOp { lhs, rhs, .. } => {
                for operand in [lhs, rhs] {
                    if let Some(name) = operand.ref_name() {
                        if self.has_active_of_kind(name, point, BorrowKind::Mutable) {
                            self.conflict(
                                DiagnosticKind::BorrowConflictLoad,
                                format!("'{}' read while it is mutably borrowed", name),
                                point,
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Fire the implicit borrow events for one instruction at `point`.
    pub fn analyze(
        &mut self,
        instr: &Instruction,
        point: &Point,
        block_end: usize,
        scope: ScopeId,
        lifetimes: &mut LifetimeEngine,
    ) {
        match instr {
            Instruction::Load { dst, addr } => {
                if let Some(name) = addr.ref_name() {
                    let lifetime = lifetimes.create_lifetime(
                        LifetimeKind::Temp,
                        scope,
                        LifetimeOrigin::BorrowExpression,
                    );
                    let region = Region {
                        start: point.clone(),
                        end: Point::new(&point.function, &point.block, block_end),
                        kind: RegionKind::Block,
                    };
                    self.create_borrow(
                        BorrowKind::Immutable,
                        name,
                        dst.clone(),
                        lifetime,
                        BorrowOrigin::Load,
                        Some(region),
                    );
                }
            }
            Instruction::Store { addr, .. } => {
                if let Some(name) = addr.ref_name() {
                    let stale: Vec<BorrowId> = self
                        .active_borrows_at(name, point)
                        .into_iter()
                        .filter(|id| {
                            self.borrows
                                .get(id)
                                .map(|b| b.kind == BorrowKind::Immutable)
                                .unwrap_or(false)
                        })
                        .collect();
                    for id in stale {
                        self.invalidate(id, point);
                    }
                }
            }
            Instruction::Call { dst, args, .. } => {
                for arg in args {
                    if let Some(name) = arg.ref_name() {
                        let lifetime = lifetimes.create_lifetime(
                            LifetimeKind::Temp,
                            scope,
                            LifetimeOrigin::BorrowExpression,
                        );
                        let region = Region {
                            start: point.clone(),
                            end: point.clone(),
                            kind: RegionKind::Statement,
                        };
                        let borrower = dst.clone().unwrap_or_else(|| "call".to_string());
                        self.create_borrow(
                            BorrowKind::Immutable,
                            name,
                            borrower,
                            lifetime,
                            BorrowOrigin::CallArgument,
                            Some(region),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    /// Per-borrow rule check: a mutable borrow must be exclusive among the
    /// active borrows of its value, and every borrow must be bound to a
    /// valid lifetime (a mutable borrow bound to a `Temp` lifetime is
    /// invalid).
    pub fn check_rules(&mut self, lifetimes: &LifetimeEngine) {
        let ids: Vec<BorrowId> = self.borrows.keys().copied().collect();
        for id in ids {
            let Some(borrow) = self.borrows.get(&id) else {
                continue;
            };
            let kind = borrow.kind;
            let borrowed = borrow.borrowed.clone();
            let lifetime = borrow.lifetime;
            let active = borrow.active;

            if active && kind == BorrowKind::Mutable {
                let shared_with: usize = self
                    .active
                    .get(&borrowed)
                    .map(|list| list.iter().filter(|b| **b != id).count())
                    .unwrap_or(0);
                if shared_with > 0 {
                    self.errors.push(Diagnostic::error(
                        Stage::Borrow,
                        DiagnosticKind::MutableBorrowNotExclusive,
                        format!(
                            "mutable borrow of '{}' shares the value with {} other active borrow(s)",
                            borrowed, shared_with
                        ),
                        None,
                    ));
                    self.stats.conflicts_found += 1;
                }
            }

            match lifetimes.lifetime(lifetime) {
                None => {
                    self.errors.push(Diagnostic::error(
                        Stage::Borrow,
                        DiagnosticKind::BorrowLifetimeInvalid,
                        format!(
                            "borrow of '{}' is bound to unknown lifetime #{}",
                            borrowed, lifetime.0
                        ),
                        None,
                    ));
                    self.stats.conflicts_found += 1;
                }
                Some(record) => {
                    if kind == BorrowKind::Mutable && record.kind == LifetimeKind::Temp {
                        self.errors.push(Diagnostic::error(
                            Stage::Borrow,
                            DiagnosticKind::BorrowLifetimeInvalid,
                            format!(
                                "mutable borrow of '{}' is bound to a temporary lifetime",
                                borrowed
                            ),
                            None,
                        ));
                        self.stats.conflicts_found += 1;
                    }
                }
            }
        }
    }

    fn conflict(&mut self, kind: DiagnosticKind, message: String, point: &Point) {
        self.errors.push(Diagnostic::error(
            Stage::Borrow,
            kind,
            message,
            Some(point.clone()),
        ));
        self.stats.conflicts_found += 1;
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

impl Default for BorrowEngine {
    fn default() -> Self {
        Self::new()
    }
}
