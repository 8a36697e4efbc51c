//! Crate-wide error type.
//!
//! Mirrors the five externally observable error kinds of the point-value
//! processing contract: a peer that cannot be reached, a bad setup
//! parameter, a storage I/O failure, a serialized datum that violates the
//! wire tag table, and queue cancellation.

use std::io;

use thiserror::Error;
use tracing::error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, PointError>;

#[derive(Debug, Error)]
pub enum PointError {
    /// A peer service (store, queue) was not reachable within the caller's
    /// timeout.
    #[error("service not available: {0}")]
    ServiceNotAvailable(String),

    /// Configuration or a runtime-supplied value is out of range. Setup
    /// fails; no partial state is persisted.
    #[error("bad parameter: {0}")]
    BadParameter(String),

    /// Underlying storage I/O failed. The writer aborts the current
    /// transaction and releases its locks.
    #[error("store access error: {0}")]
    StoreAccess(#[from] io::Error),

    /// A serialized datum violates the tag table of the wire format.
    #[error("format error: {0}")]
    FormatError(String),

    /// A queue was closed, or a timeout elapsed. Callers treat this as
    /// control flow rather than a hard error.
    #[error("cancelled")]
    Cancelled,

    /// The value/archive data on disk does not match its checksum or
    /// structural invariants.
    #[error("corruption: {0}")]
    Corruption(String),

    /// A point, relation, or stamp could not be found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl PointError {
    /// Logs the error at the point it is about to be surfaced to a caller
    /// that cannot retry.
    pub fn log_surfaced(self) -> Self {
        error!(error = %self, "surfacing unrecoverable error");
        self
    }
}
