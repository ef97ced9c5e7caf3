//! Lifetime Constraint Solver
//!
//! Evaluates the constraint list accumulated by the
//! [`super::lifetime_analyzer::LifetimeEngine`] against the scope tree.
//! The relations are deliberately simple:
//!
//! - **Outlives(A, B)** holds trivially when `A` is `'static`, never when
//!   `B` is `'static` and `A` is not, and otherwise exactly when `A`'s
//!   scope is an ancestor of (or equal to) `B`'s scope.
//! - **Equal(A, B)** holds exactly when the two ids are the same record;
//!   extensional equality is not attempted.
//! - **Subtype(A, B)** reduces to Outlives(A, B).
//!
//! Every violation is appended to the engine's error log; solving never
//! stops at the first failure.

use super::lifetime_analyzer::{ConstraintKind, Lifetime, LifetimeEngine, LifetimeKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Stage};
use log::debug;

impl LifetimeEngine {
    /// Evaluate every recorded constraint, appending violations to the
    /// error log.
    pub fn solve(&mut self) {
        debug!("solving {} lifetime constraints", self.constraints.len());
        let constraints = self.constraints.clone();

        for constraint in &constraints {
            self.stats.constraints_checked += 1;

            let (from, to) = match (
                self.lifetimes.get(&constraint.from),
                self.lifetimes.get(&constraint.to),
            ) {
                (Some(from), Some(to)) => (from.clone(), to.clone()),
                (from, to) => {
                    let missing = if from.is_none() {
                        constraint.from.0
                    } else {
                        // `to` must be the missing one.
                        debug_assert!(to.is_none());
                        constraint.to.0
                    };
                    self.errors.push(Diagnostic::error(
                        Stage::Lifetime,
                        DiagnosticKind::UnknownLifetime,
                        format!("constraint references unknown lifetime #{}", missing),
                        None,
                    ));
                    self.stats.violations_found += 1;
                    continue;
                }
            };

            match constraint.kind {
                ConstraintKind::Outlives => {
                    if !self.outlives_holds(&from, &to) {
                        self.errors.push(Diagnostic::error(
                            Stage::Lifetime,
                            DiagnosticKind::OutlivesViolation,
                            format!(
                                "lifetime #{} does not outlive lifetime #{}: {}",
                                from.id.0, to.id.0, constraint.reason
                            ),
                            None,
                        ));
                        self.stats.violations_found += 1;
                    }
                }
                ConstraintKind::Equal => {
                    if from.id != to.id {
                        self.errors.push(Diagnostic::error(
                            Stage::Lifetime,
                            DiagnosticKind::LifetimeEqualityViolation,
                            format!(
                                "lifetimes #{} and #{} are not equal: {}",
                                from.id.0, to.id.0, constraint.reason
                            ),
                            None,
                        ));
                        self.stats.violations_found += 1;
                    }
                }
                ConstraintKind::Subtype => {
                    if !self.outlives_holds(&from, &to) {
                        self.errors.push(Diagnostic::error(
                            Stage::Lifetime,
                            DiagnosticKind::SubtypeViolation,
                            format!(
                                "lifetime #{} is not a subtype of lifetime #{}: {}",
                                from.id.0, to.id.0, constraint.reason
                            ),
                            None,
                        ));
                        self.stats.violations_found += 1;
                    }
                }
            }
        }
    }

    fn outlives_holds(&self, from: &Lifetime, to: &Lifetime) -> bool {
        if from.kind == LifetimeKind::Static {
            return true;
        }
        if to.kind == LifetimeKind::Static {
            return false;
        }
        self.is_ancestor_or_equal(from.scope, to.scope)
    }
}
