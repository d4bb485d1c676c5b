//! Error types for Settee
//!
//! This module defines all error types used throughout the client.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! # Categories
//!
//! | Category | Variants | Retryable |
//! |----------|----------|-----------|
//! | Lifecycle | `IllegalTransition`, `ImmutableRevision`, `ReservedField` | no |
//! | Server | `RevisionConflict`, `NotFound`, `Server`, `Protocol` | conflict only |
//! | Transport | `Transport` | yes |
//! | Validation | `InvalidId`, `InvalidDatabaseName`, `InvalidInput` | no |
//! | System | `Io`, `Config` | no |

use crate::state::{DocState, Operation};
use std::io;
use thiserror::Error;

/// Result type alias for Settee operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a transport before a server status is available
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, reset, etc.
    #[error("network error: {0}")]
    Network(String),

    /// Request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// Request could not be encoded
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// Response body could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Error types for the Settee client
#[derive(Debug, Error)]
pub enum Error {
    /// Operation requested from a lifecycle state that forbids it.
    ///
    /// Always raised before any network call.
    #[error("cannot {operation} document {id} in state {state}: {reason}")]
    IllegalTransition {
        /// Document id, or `<unsaved>` when none is assigned yet
        id: String,
        /// State the document was in
        state: DocState,
        /// Operation that was refused
        operation: Operation,
        /// Human-readable reason
        reason: String,
    },

    /// Server rejected a write because the supplied revision is stale
    #[error("revision conflict on {path}: {reason}")]
    RevisionConflict {
        /// Resource path
        path: String,
        /// Server-provided reason
        reason: String,
    },

    /// Resource does not exist on the server
    #[error("not found: {path}")]
    NotFound {
        /// Resource path
        path: String,
    },

    /// Any other non-success status
    #[error("server error {status} on {path}: {error}: {reason}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Resource path
        path: String,
        /// CouchDB `error` field
        error: String,
        /// CouchDB `reason` field
        reason: String,
    },

    /// Response was successful but malformed
    #[error("unexpected response: {reason}")]
    Protocol {
        /// What was missing or malformed
        reason: String,
    },

    /// Transport failed before a response was received
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Document identifier rejected
    #[error("invalid document id {id:?}: {reason}")]
    InvalidId {
        /// Offending id
        id: String,
        /// Why it was rejected
        reason: String,
    },

    /// Database name rejected
    #[error("invalid database name {name:?}: {reason}")]
    InvalidDatabaseName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Attempt to write `_id` or `_rev` through the field accessors
    #[error("field {field} is managed by the server and cannot be modified")]
    ReservedField {
        /// The reserved key
        field: String,
    },

    /// Mutation attempted on a historical revision
    #[error("revision {rev} of {id} is a historical snapshot and cannot be modified")]
    ImmutableRevision {
        /// Document id
        id: String,
        /// Pinned revision
        rev: String,
    },

    /// Invalid argument
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Description
        reason: String,
    },

    /// Configuration could not be read or is invalid
    #[error("configuration error: {reason}")]
    Config {
        /// Description
        reason: String,
    },

    /// I/O error (reading staged files, config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build an `IllegalTransition` error
    pub fn illegal(
        id: impl Into<String>,
        state: DocState,
        operation: Operation,
        reason: impl Into<String>,
    ) -> Self {
        Error::IllegalTransition {
            id: id.into(),
            state,
            operation,
            reason: reason.into(),
        }
    }

    /// Build an `InvalidInput` error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Build a `Protocol` error
    pub fn protocol(reason: impl Into<String>) -> Self {
        Error::Protocol {
            reason: reason.into(),
        }
    }

    /// Build a `Config` error
    pub fn config(reason: impl Into<String>) -> Self {
        Error::Config {
            reason: reason.into(),
        }
    }

    /// True for `RevisionConflict`
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::RevisionConflict { .. })
    }

    /// True for `NotFound`
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for `IllegalTransition`
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Error::IllegalTransition { .. })
    }

    /// Whether the caller may reasonably retry after corrective action.
    ///
    /// Conflicts are retryable after a fetch; transport failures are
    /// retryable as-is. Everything else indicates misuse or a hard failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RevisionConflict { .. } | Error::Transport(_))
    }
}
