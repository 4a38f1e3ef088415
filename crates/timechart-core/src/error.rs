// File: crates/timechart-core/src/error.rs
// Summary: Error types for the chart engine and the backend contract.

use thiserror::Error;

/// Errors raised by engine operations. None of these are fatal: the engine keeps
/// showing its last good state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ChartError {
    #[error("invalid range: start {start} is not before end {end}")]
    InvalidRange { start: String, end: String },
    #[error("could not parse timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("dataset {0:?} is not on the chart")]
    UnknownDataset(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("no annotation form is open")]
    NoAnnotationForm,
}

/// Errors surfaced by a [`Backend`](crate::backend::Backend) implementation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}
