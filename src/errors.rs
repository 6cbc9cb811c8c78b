//! Selector construction errors and caller-facing sentinel errors.

use thiserror::Error;

/// Raised while building selectors, before anything reaches the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid column name: {0:?}")]
    InvalidColumn(String),
    #[error("JSON path must contain at least one key")]
    EmptyJsonPath,
    #[error("JSON key must not be empty")]
    EmptyJsonKey,
}

/// Sentinels for misuse by the application layer above this crate.
///
/// Nothing in this crate returns these; they exist so services built on top
/// of it share one vocabulary for malformed requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("invalid request")]
    InvalidRequest,
    #[error("invalid response")]
    InvalidResponse,
    #[error("empty primary key")]
    EmptyPrimaryKey,
    #[error("request is nil")]
    NilRequest,
}
