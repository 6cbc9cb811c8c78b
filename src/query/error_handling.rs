//! Error detection and classification utilities.
//!
//! This module provides utilities for detecting and classifying database errors,
//! particularly for distinguishing "no rows found" errors and integrity
//! constraint violations from other database errors.
//!
//! PostgreSQL errors are classified by SQLSTATE where the driver exposes one.
//! Message patterns are only a fallback for errors that reach us as text.

use crate::executor::LifeError;

/// SQLSTATE class 23: integrity constraint violation.
const INTEGRITY_CONSTRAINT_CLASS: &str = "23";

const NO_ROWS_PATTERNS: &[&str] = &[
    "no rows",
    "no row",
    "row not found",
    "expected one row",
    "unexpected number of rows",
];

const CONSTRAINT_PATTERNS: &[&str] = &[
    "violates unique constraint",
    "violates foreign key constraint",
    "violates not-null constraint",
    "violates check constraint",
    "violates exclusion constraint",
    "duplicate key value",
];

fn matches_any(message: &str, patterns: &[&str]) -> bool {
    let message = message.to_lowercase();
    patterns.iter().any(|pattern| message.contains(pattern))
}

/// Check if an error represents a "no rows found" condition.
///
/// Uses specific patterns to avoid false positives from legitimate database
/// errors like "table not found", "column not found" or "constraint not found".
/// Returns `false` for `None`.
pub fn is_not_found_error(error: Option<&LifeError>) -> bool {
    match error {
        None => false,
        Some(LifeError::NotFound) => true,
        Some(LifeError::PostgresError(pg_error)) => {
            pg_error.code().is_none() && matches_any(&pg_error.to_string(), NO_ROWS_PATTERNS)
        }
        Some(LifeError::QueryError(msg) | LifeError::Other(msg)) => {
            matches_any(msg, NO_ROWS_PATTERNS)
        }
        Some(
            LifeError::ParseError(_)
            | LifeError::ConstraintViolation(_)
            | LifeError::Cancelled(_)
            | LifeError::Connect(_)
            | LifeError::PoolTimeout(_),
        ) => false,
    }
}

/// Check if an error is an integrity constraint violation (unique, foreign
/// key, not-null, check or exclusion). Returns `false` for `None`.
pub fn is_constraint_error(error: Option<&LifeError>) -> bool {
    match error {
        None => false,
        Some(LifeError::ConstraintViolation(_)) => true,
        Some(LifeError::PostgresError(pg_error)) => match pg_error.code() {
            Some(state) => state.code().starts_with(INTEGRITY_CONSTRAINT_CLASS),
            None => matches_any(&pg_error.to_string(), CONSTRAINT_PATTERNS),
        },
        Some(LifeError::QueryError(msg) | LifeError::Other(msg)) => {
            matches_any(msg, CONSTRAINT_PATTERNS)
        }
        Some(
            LifeError::NotFound
            | LifeError::ParseError(_)
            | LifeError::Cancelled(_)
            | LifeError::Connect(_)
            | LifeError::PoolTimeout(_),
        ) => false,
    }
}

/// Lift driver-level constraint violations into `LifeError::ConstraintViolation`
/// so callers can match on the variant instead of inspecting SQLSTATEs.
pub(crate) fn classify(error: LifeError) -> LifeError {
    if is_constraint_error(Some(&error)) {
        if let LifeError::PostgresError(pg_error) = &error {
            return LifeError::ConstraintViolation(pg_error.to_string());
        }
    }
    error
}

impl LifeError {
    pub fn is_not_found(&self) -> bool {
        is_not_found_error(Some(self))
    }

    pub fn is_constraint_violation(&self) -> bool {
        is_constraint_error(Some(self))
    }
}
