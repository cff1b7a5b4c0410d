//! Error types returned by the simulation core.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A single configuration field outside its domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    /// Name of the offending field.
    pub field: &'static str,
    /// Human readable description of the constraint that failed.
    pub reason: String,
}

impl Violation {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Configuration rejected at construction.
///
/// Lists every violated constraint, not only the first one found.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid configuration: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Returns `true` if any violation refers to `field`.
    pub fn cites(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Class of internal-consistency failure raised by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimulationErrorKind {
    /// Stock negative, above capacity or not finite where a model needs it in domain.
    StockOutOfDomain,
    /// A model produced NaN or an infinite value.
    NonFiniteValue,
    /// The recruitment noise distribution could not be built.
    InvalidDistribution,
}

/// Fatal engine defect. Never raised for valid inputs; a collapse is not an error.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind:?} at step {step_index}: {message}")]
pub struct SimulationError {
    pub kind: SimulationErrorKind,
    pub step_index: usize,
    pub message: String,
}

impl SimulationError {
    pub fn new(kind: SimulationErrorKind, step_index: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            step_index,
            message: message.into(),
        }
    }
}
