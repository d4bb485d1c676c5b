//! Document lifecycle vocabulary
//!
//! ## Design
//!
//! - `DocState`: where an in-memory document stands relative to the server
//! - `Operation`: the events a document facade raises into the lifecycle
//!
//! The legality table itself lives in `settee-model::lifecycle`; this crate
//! only names the states and events so errors can carry them.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an in-memory document
///
/// - Fresh: never persisted, a pending creation
/// - Valid: content matches the last-known server content
/// - Dirty: local mutations not yet sent
/// - Stale: possibly outdated, must fetch before trusting content
/// - Evicted: deleted, or moved out of active tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocState {
    /// No persisted revision yet
    Fresh,
    /// In sync with the last-known server revision
    Valid,
    /// Local edits pending
    Dirty,
    /// Content may be outdated
    Stale,
    /// Removed from active tracking
    Evicted,
}

impl DocState {
    /// Check if the document has ever been persisted (as far as we know)
    pub fn is_persisted(&self) -> bool {
        !matches!(self, DocState::Fresh)
    }

    /// Check if local edits are pending
    pub fn is_dirty(&self) -> bool {
        matches!(self, DocState::Dirty)
    }

    /// Check if the document is no longer usable
    pub fn is_evicted(&self) -> bool {
        matches!(self, DocState::Evicted)
    }

    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DocState::Fresh => "FRESH",
            DocState::Valid => "VALID",
            DocState::Dirty => "DIRTY",
            DocState::Stale => "STALE",
            DocState::Evicted => "EVICTED",
        }
    }
}

impl std::fmt::Display for DocState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events raised against a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Construction through the identity registry
    Instantiate,
    /// Local set/remove/extend
    Mutate,
    /// Send as a new document
    Create,
    /// Reload from the server
    Fetch,
    /// Send local changes
    Update,
    /// Delete on the server
    Delete,
    /// Read a standalone attachment
    AttachmentGet,
    /// Upload a standalone attachment
    AttachmentPut,
    /// Remove a standalone attachment
    AttachmentDelete,
    /// Stage an inline attachment for creation
    StageAttachment,
    /// Move from active tracking into the cache pool
    Demote,
    /// Read-only server probes (revision lists, HEAD, COPY source)
    Inspect,
}

impl Operation {
    /// Verb used in error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Instantiate => "instantiate",
            Operation::Mutate => "mutate",
            Operation::Create => "create",
            Operation::Fetch => "fetch",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::AttachmentGet => "get attachment of",
            Operation::AttachmentPut => "put attachment on",
            Operation::AttachmentDelete => "delete attachment of",
            Operation::StageAttachment => "stage attachment on",
            Operation::Demote => "detach",
            Operation::Inspect => "inspect",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
