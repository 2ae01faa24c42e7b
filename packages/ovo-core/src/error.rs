//! Tagged error kinds shared by the storage, partitioning, and REST layers.

use thiserror::Error;

/// The complete set of failure kinds the core ever produces.
///
/// Validation and CAS-predicate failures are meant to reach the caller
/// unchanged; `PeerFailure` is absorbed by the outbound queue and never
/// surfaces past it; `Fatal` is reserved for unrecoverable startup errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OvoError {
    /// A required object payload was missing or malformed at the boundary.
    #[error("object is null")]
    NullObject,
    /// The key field was empty.
    #[error("object key is null")]
    NullKey,
    /// The key does not exist, or the stored entry has expired.
    #[error("not found")]
    NotFound,
    /// A compare-and-swap predicate (hash equality) did not hold.
    #[error("objects are not equal")]
    NotEqual,
    /// A rename target already exists.
    #[error("conflict: target key already exists")]
    Conflict,
    /// No Active node owns the given hash.
    #[error("no active owner for hash")]
    NoOwner,
    /// A peer RPC failed (transport error or timeout). Retried by the
    /// outbound queue; never surfaced to the client that triggered it.
    #[error("peer failure: {0}")]
    PeerFailure(String),
    /// An unrecoverable startup condition (missing config, no bindable
    /// interface). The only error kind that legitimately aborts the process.
    #[error("fatal: {0}")]
    Fatal(String),
}
